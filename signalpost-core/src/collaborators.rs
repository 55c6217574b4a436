//! Narrow interfaces to the systems the engine talks to but does not own.

use crate::{
    ContentDraft, CoreError, DraftRef, MarketSignal, PlatformCredentials, PlatformItem, PostedRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// `Ok(None)` means the account has no connected platform credentials.
    async fn account_credentials(
        &self,
        account_id: &str,
    ) -> Result<Option<PlatformCredentials>, CoreError>;
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn fetch_mentions(
        &self,
        credentials: &PlatformCredentials,
        limit: usize,
    ) -> Result<Vec<PlatformItem>, CoreError>;

    async fn fetch_timeline(
        &self,
        credentials: &PlatformCredentials,
        limit: usize,
    ) -> Result<Vec<PlatformItem>, CoreError>;

    async fn post_content(
        &self,
        credentials: &PlatformCredentials,
        text: &str,
    ) -> Result<PostedRef, CoreError>;

    async fn reply_to(
        &self,
        credentials: &PlatformCredentials,
        text: &str,
        item_id: &str,
    ) -> Result<PostedRef, CoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
}

impl CompletionParams {
    /// Roughly one token per three characters of output, never below 16.
    pub fn for_length(max_length: usize) -> Self {
        Self {
            max_new_tokens: ((max_length / 3).max(16)) as u32,
            temperature: 0.8,
        }
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, params: &CompletionParams)
        -> Result<String, CoreError>;
}

#[async_trait]
pub trait MarketSignalSource: Send + Sync {
    /// Signals ordered by rank, best first.
    async fn top_signals(&self, limit: usize) -> Result<Vec<MarketSignal>, CoreError>;
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save_draft(&self, draft: &ContentDraft) -> Result<DraftRef, CoreError>;

    async fn schedule_draft(
        &self,
        draft: &DraftRef,
        publish_at: DateTime<Utc>,
    ) -> Result<(), CoreError>;

    async fn mark_draft_used(&self, draft: &DraftRef) -> Result<(), CoreError>;
}
