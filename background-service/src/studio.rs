use crate::planner::{ContentPlan, ContentPlanner};
use chrono::{DateTime, Local, TimeZone, Utc};
use llm_interface::{GenerationChain, GenerationRequest, MAX_POST_LENGTH};
use serde::Serialize;
use signalpost_core::{ContentDraft, DraftRef, DraftStore, PlatformCredentials, TrendTopic};
use std::sync::Arc;
use tracing::{info, warn};
use trend_aggregator::TrendAggregator;

pub const MAX_DRAFTS_PER_RUN: usize = 8;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentReport {
    pub scheduled: Vec<(DraftRef, DateTime<Utc>)>,
    pub unscheduled: Vec<DraftRef>,
    pub failures: Vec<String>,
}

/// Trending topics in, scheduled drafts out.
pub struct ContentStudio {
    aggregator: Arc<TrendAggregator>,
    chain: Arc<GenerationChain>,
    planner: ContentPlanner,
    store: Arc<dyn DraftStore>,
}

impl ContentStudio {
    pub fn new(
        aggregator: Arc<TrendAggregator>,
        chain: Arc<GenerationChain>,
        planner: ContentPlanner,
        store: Arc<dyn DraftStore>,
    ) -> Self {
        Self {
            aggregator,
            chain,
            planner,
            store,
        }
    }

    pub async fn run(&self, credentials: Option<&PlatformCredentials>) -> ContentReport {
        self.run_at(credentials, Local::now()).await
    }

    pub async fn run_at<Tz: TimeZone>(
        &self,
        credentials: Option<&PlatformCredentials>,
        now: DateTime<Tz>,
    ) -> ContentReport {
        let topics = self.aggregator.aggregate(credentials).await;
        let drafts = self.draft_topics(&topics).await;
        let plan = self.planner.plan(drafts, &now);
        self.commit(plan).await
    }

    pub async fn draft_topics(&self, topics: &[TrendTopic]) -> Vec<ContentDraft> {
        let mut drafts = Vec::with_capacity(topics.len().min(MAX_DRAFTS_PER_RUN));
        for topic in topics.iter().take(MAX_DRAFTS_PER_RUN) {
            let request = GenerationRequest::new(topic.keyword.clone(), "post", MAX_POST_LENGTH);
            let text = self.chain.generate(&request).await;
            drafts.push(ContentDraft {
                content_type: request.content_type(),
                text,
                target_length: MAX_POST_LENGTH,
                source_topic: Some(topic.clone()),
            });
        }
        drafts
    }

    /// Saves every draft and schedules the planned ones. A store failure
    /// only affects its own draft.
    pub async fn commit(&self, plan: ContentPlan) -> ContentReport {
        let mut report = ContentReport::default();

        for scheduled in plan.scheduled {
            let draft_ref = match self.store.save_draft(&scheduled.draft).await {
                Ok(draft_ref) => draft_ref,
                Err(e) => {
                    warn!("Could not save draft: {}", e);
                    report.failures.push(e.to_string());
                    continue;
                }
            };
            match self
                .store
                .schedule_draft(&draft_ref, scheduled.publish_at)
                .await
            {
                Ok(()) => report.scheduled.push((draft_ref, scheduled.publish_at)),
                Err(e) => {
                    warn!("Could not schedule draft {}: {}", draft_ref, e);
                    report.failures.push(e.to_string());
                    report.unscheduled.push(draft_ref);
                }
            }
        }

        for draft in plan.unscheduled {
            match self.store.save_draft(&draft).await {
                Ok(draft_ref) => report.unscheduled.push(draft_ref),
                Err(e) => {
                    warn!("Could not save draft: {}", e);
                    report.failures.push(e.to_string());
                }
            }
        }

        info!(
            "Content run: {} scheduled, {} unscheduled, {} failures",
            report.scheduled.len(),
            report.unscheduled.len(),
            report.failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use signalpost_core::{
        CoreError, FixedRandom, MarketSignal, MarketSignalSource, PlatformClient, PlatformItem,
        PostedRef, StoreError,
    };
    use tokio::sync::Mutex;

    struct DownMarket;

    #[async_trait]
    impl MarketSignalSource for DownMarket {
        async fn top_signals(&self, _limit: usize) -> Result<Vec<MarketSignal>, CoreError> {
            Err(CoreError::Internal {
                message: "down".to_string(),
            })
        }
    }

    struct NoPlatform;

    #[async_trait]
    impl PlatformClient for NoPlatform {
        async fn fetch_mentions(
            &self,
            _credentials: &PlatformCredentials,
            _limit: usize,
        ) -> Result<Vec<PlatformItem>, CoreError> {
            Ok(Vec::new())
        }

        async fn fetch_timeline(
            &self,
            _credentials: &PlatformCredentials,
            _limit: usize,
        ) -> Result<Vec<PlatformItem>, CoreError> {
            Ok(Vec::new())
        }

        async fn post_content(
            &self,
            _credentials: &PlatformCredentials,
            _text: &str,
        ) -> Result<PostedRef, CoreError> {
            Ok(PostedRef { id: "p".to_string() })
        }

        async fn reply_to(
            &self,
            _credentials: &PlatformCredentials,
            _text: &str,
            _item_id: &str,
        ) -> Result<PostedRef, CoreError> {
            Ok(PostedRef { id: "r".to_string() })
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<ContentDraft>>,
        scheduled: Mutex<Vec<(DraftRef, DateTime<Utc>)>>,
        fail_on_save: Option<usize>,
    }

    #[async_trait]
    impl DraftStore for RecordingStore {
        async fn save_draft(&self, draft: &ContentDraft) -> Result<DraftRef, CoreError> {
            let mut saved = self.saved.lock().await;
            if self.fail_on_save == Some(saved.len()) {
                saved.push(draft.clone());
                return Err(StoreError::DatabaseLocked.into());
            }
            saved.push(draft.clone());
            Ok(DraftRef(format!("draft-{}", saved.len())))
        }

        async fn schedule_draft(
            &self,
            draft: &DraftRef,
            publish_at: DateTime<Utc>,
        ) -> Result<(), CoreError> {
            self.scheduled.lock().await.push((draft.clone(), publish_at));
            Ok(())
        }

        async fn mark_draft_used(&self, _draft: &DraftRef) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn studio(store: Arc<RecordingStore>) -> ContentStudio {
        let random = Arc::new(FixedRandom::new(0.5, 0));
        ContentStudio::new(
            Arc::new(TrendAggregator::new(Arc::new(DownMarket), Arc::new(NoPlatform))),
            Arc::new(GenerationChain::new(random.clone())),
            ContentPlanner::new(random),
            store,
        )
    }

    #[tokio::test]
    async fn test_run_schedules_fallback_topics() {
        let store = Arc::new(RecordingStore::default());
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let report = studio(store.clone()).run_at(None, now).await;

        // Market down and no credentials: the four fallback topics, all fit.
        assert_eq!(report.scheduled.len(), 4);
        assert!(report.unscheduled.is_empty());
        assert!(report.failures.is_empty());

        let saved = store.saved.lock().await;
        assert_eq!(
            saved[0].source_topic.as_ref().map(|t| t.keyword.as_str()),
            Some("bitcoin")
        );
        assert!(saved.iter().all(|d| d.text.chars().count() <= MAX_POST_LENGTH));
        assert!(report.scheduled.iter().all(|(_, at)| *at > now));
    }

    #[tokio::test]
    async fn test_store_failure_only_drops_one_draft() {
        let store = Arc::new(RecordingStore {
            fail_on_save: Some(1),
            ..Default::default()
        });
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let report = studio(store.clone()).run_at(None, now).await;

        assert_eq!(report.scheduled.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(store.scheduled.lock().await.len(), 3);
    }
}
