use crate::activity::ActivityLog;
use crate::budget::RateBudgetGovernor;
use crate::policy::EngagementPolicy;
use futures::FutureExt;
use llm_interface::{GenerationChain, GenerationRequest, MAX_POST_LENGTH};
use signalpost_core::{
    ActivityKind, ActivityRecord, ContentDraft, ContentType, CoreError, CredentialResolver,
    DraftRef, DraftStore, EngagementConfig, ErrorExt, PlatformClient, PlatformCredentials,
    PlatformItem, RandomSource,
};
use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

pub const MENTION_FETCH_LIMIT: usize = 5;
pub const TIMELINE_FETCH_LIMIT: usize = 10;
pub const PROACTIVE_POST_PROBABILITY: f64 = 0.3;
const HANDLED_ITEMS_CAPACITY: usize = 500;
const REPLY_TOPIC_WORDS: usize = 6;

/// Pauses between consecutive outbound actions inside one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngagementPacing {
    pub mention_pause: Duration,
    pub timeline_pause: Duration,
}

impl Default for EngagementPacing {
    fn default() -> Self {
        Self {
            mention_pause: Duration::from_secs(2),
            timeline_pause: Duration::from_secs(3),
        }
    }
}

impl EngagementPacing {
    pub fn immediate() -> Self {
        Self {
            mention_pause: Duration::ZERO,
            timeline_pause: Duration::ZERO,
        }
    }
}

/// External systems a cycle talks to.
pub struct EngineDeps {
    pub credentials: Arc<dyn CredentialResolver>,
    pub platform: Arc<dyn PlatformClient>,
    pub chain: Arc<GenerationChain>,
    pub store: Option<Arc<dyn DraftStore>>,
    pub random: Arc<dyn RandomSource>,
}

impl EngineDeps {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        platform: Arc<dyn PlatformClient>,
        chain: Arc<GenerationChain>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            credentials,
            platform,
            chain,
            store: None,
            random,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DraftStore>) -> Self {
        self.store = Some(store);
        self
    }
}

/// Item ids already answered, oldest forgotten first.
#[derive(Debug, Default)]
struct HandledItems {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl HandledItems {
    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: &str) {
        if !self.ids.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());
        if self.order.len() > HANDLED_ITEMS_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

/// State that outlives a single run: history, the rate budget, the cycle
/// lock and the topic rotation.
pub(crate) struct EngineShared {
    pub(crate) activity: RwLock<ActivityLog>,
    pub(crate) governor: Arc<RateBudgetGovernor>,
    cycle_lock: Mutex<()>,
    topic_cursor: AtomicUsize,
    proactive_topics: Vec<String>,
    handled: Mutex<HandledItems>,
}

impl EngineShared {
    pub(crate) fn new(proactive_topics: Vec<String>, governor: RateBudgetGovernor) -> Self {
        Self {
            activity: RwLock::new(ActivityLog::new()),
            governor: Arc::new(governor),
            cycle_lock: Mutex::new(()),
            topic_cursor: AtomicUsize::new(0),
            proactive_topics,
            handled: Mutex::new(HandledItems::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyOutcome {
    Posted,
    Failed,
    BudgetExhausted,
}

/// Everything one run (start to stop) needs. The config is fixed for the run.
pub(crate) struct RunContext {
    pub(crate) account_id: String,
    pub(crate) config: EngagementConfig,
    pub(crate) policy: EngagementPolicy,
    pub(crate) pacing: EngagementPacing,
    pub(crate) deps: Arc<EngineDeps>,
    pub(crate) shared: Arc<EngineShared>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl RunContext {
    pub(crate) fn is_stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs one cycle. Cycles of the same engine never overlap, and nothing
    /// inside a cycle escapes it: errors and panics become failed records.
    pub(crate) async fn run_cycle(&self) {
        let _guard = self.shared.cycle_lock.lock().await;
        if self.is_stopping() {
            debug!("Engine for {} is stopping, skipping cycle", self.account_id);
            return;
        }

        let outcome = AssertUnwindSafe(self.cycle_body()).catch_unwind().await;
        if outcome.is_err() {
            error!("Engagement cycle for {} panicked", self.account_id);
            self.record(ActivityRecord::failed(
                ActivityKind::TimelineObservation,
                "Engagement cycle aborted",
                "cycle panicked",
            ))
            .await;
        }
    }

    async fn cycle_body(&self) {
        let credentials = match self
            .deps
            .credentials
            .account_credentials(&self.account_id)
            .await
        {
            Ok(Some(credentials)) => credentials,
            Ok(None) => {
                info!(
                    "No platform credentials for account {}, skipping cycle",
                    self.account_id
                );
                return;
            }
            Err(e) => {
                e.log_warn();
                info!(
                    "Could not resolve credentials for account {}, skipping cycle",
                    self.account_id
                );
                return;
            }
        };

        debug!("Running engagement cycle for account {}", self.account_id);

        if self.config.auto_reply_to_mentions {
            if let Err(e) = self.handle_mentions(&credentials).await {
                e.log_error();
                self.record(ActivityRecord::failed(
                    ActivityKind::MentionReply,
                    "Mention handling failed",
                    e.user_friendly_message(),
                ))
                .await;
            }
        }

        if self.config.auto_engage_with_timeline && !self.is_stopping() {
            if let Err(e) = self.handle_timeline(&credentials).await {
                e.log_error();
                self.record(ActivityRecord::failed(
                    ActivityKind::TimelineObservation,
                    "Timeline handling failed",
                    e.user_friendly_message(),
                ))
                .await;
            }
        }

        if !self.is_stopping() && self.deps.random.next_f64() < PROACTIVE_POST_PROBABILITY {
            self.proactive_post(&credentials).await;
        }
    }

    async fn handle_mentions(&self, credentials: &PlatformCredentials) -> Result<(), CoreError> {
        let mentions = self
            .deps
            .platform
            .fetch_mentions(credentials, MENTION_FETCH_LIMIT)
            .await?;
        debug!("Fetched {} mentions", mentions.len());

        let mut acted = false;
        for mention in &mentions {
            if self.is_stopping() {
                info!("Stop requested, leaving mention handling early");
                break;
            }
            if mention.author == credentials.user_id || self.already_handled(&mention.id).await {
                continue;
            }
            if !self.shared.governor.has_budget().await {
                info!("Rate budget exhausted, skipping remaining mentions");
                break;
            }
            if acted {
                tokio::time::sleep(self.pacing.mention_pause).await;
            }
            acted = true;
            if self
                .reply(credentials, mention, ActivityKind::MentionReply, "reply")
                .await
                == ReplyOutcome::BudgetExhausted
            {
                break;
            }
        }
        Ok(())
    }

    async fn handle_timeline(&self, credentials: &PlatformCredentials) -> Result<(), CoreError> {
        let items = self
            .deps
            .platform
            .fetch_timeline(credentials, TIMELINE_FETCH_LIMIT)
            .await?;

        let mut qualified = 0usize;
        let mut replied = 0usize;
        let mut skipped = 0usize;
        let mut acted = false;

        for item in &items {
            if item.author == credentials.user_id || !self.policy.should_engage(item) {
                continue;
            }
            if self.already_handled(&item.id).await {
                continue;
            }
            qualified += 1;

            if self.is_stopping() || !self.shared.governor.has_budget().await {
                skipped += 1;
                continue;
            }
            if acted {
                tokio::time::sleep(self.pacing.timeline_pause).await;
            }
            acted = true;
            match self
                .reply(credentials, item, ActivityKind::EngagementReply, "engagement-reply")
                .await
            {
                ReplyOutcome::Posted => replied += 1,
                ReplyOutcome::Failed => {}
                ReplyOutcome::BudgetExhausted => skipped += 1,
            }
        }

        info!(
            "Timeline scan: {} items, {} qualified, {} replied",
            items.len(),
            qualified,
            replied
        );
        self.record(ActivityRecord::succeeded(
            ActivityKind::TimelineObservation,
            format!(
                "Scanned {} timeline items: {} qualified, {} replied, {} skipped",
                items.len(),
                qualified,
                replied,
                skipped
            ),
        ))
        .await;
        Ok(())
    }

    /// Generates and posts one reply. Budget is charged right before the
    /// platform call, so a failed post still counts.
    async fn reply(
        &self,
        credentials: &PlatformCredentials,
        item: &PlatformItem,
        kind: ActivityKind,
        intent: &str,
    ) -> ReplyOutcome {
        let request = GenerationRequest::new(reply_topic(&self.policy, item), intent, MAX_POST_LENGTH)
            .with_context(item.text.clone());
        let text = self.deps.chain.generate(&request).await;

        if !self.shared.governor.try_consume().await {
            return ReplyOutcome::BudgetExhausted;
        }

        match self
            .deps
            .platform
            .reply_to(credentials, &text, &item.id)
            .await
        {
            Ok(posted) => {
                self.shared.handled.lock().await.insert(&item.id);
                info!("Replied to {} from @{} as {}", item.id, item.author, posted.id);
                self.record(ActivityRecord::succeeded(
                    kind,
                    format!("Replied to @{} ({}): {}", item.author, item.id, text),
                ))
                .await;
                ReplyOutcome::Posted
            }
            Err(e) => {
                e.log_warn();
                self.record(ActivityRecord::failed(
                    kind,
                    format!("Reply to @{} ({}) failed", item.author, item.id),
                    e.user_friendly_message(),
                ))
                .await;
                ReplyOutcome::Failed
            }
        }
    }

    async fn proactive_post(&self, credentials: &PlatformCredentials) {
        let topics = &self.shared.proactive_topics;
        if topics.is_empty() {
            return;
        }
        let index = self.shared.topic_cursor.fetch_add(1, Ordering::Relaxed) % topics.len();
        let topic = &topics[index];

        let text = self
            .deps
            .chain
            .generate(&GenerationRequest::new(topic.clone(), "post", MAX_POST_LENGTH))
            .await;
        let draft = self.save_draft(&text).await;

        match self.deps.platform.post_content(credentials, &text).await {
            Ok(posted) => {
                if let (Some(store), Some(draft)) = (&self.deps.store, &draft) {
                    if let Err(e) = store.mark_draft_used(draft).await {
                        warn!("Could not mark draft {} as used: {}", draft, e);
                    }
                }
                info!("Posted proactive content about {} as {}", topic, posted.id);
                self.record(ActivityRecord::succeeded(
                    ActivityKind::ProactivePost,
                    format!("Posted about {}: {}", topic, text),
                ))
                .await;
            }
            Err(e) => {
                e.log_warn();
                self.record(ActivityRecord::failed(
                    ActivityKind::ProactivePost,
                    format!("Proactive post about {} failed", topic),
                    e.user_friendly_message(),
                ))
                .await;
            }
        }
    }

    async fn save_draft(&self, text: &str) -> Option<DraftRef> {
        let store = self.deps.store.as_ref()?;
        let draft = ContentDraft {
            text: text.to_string(),
            target_length: MAX_POST_LENGTH,
            source_topic: None,
            content_type: ContentType::Post,
        };
        match store.save_draft(&draft).await {
            Ok(draft_ref) => Some(draft_ref),
            Err(e) => {
                warn!("Could not save proactive draft: {}", e);
                None
            }
        }
    }

    async fn already_handled(&self, item_id: &str) -> bool {
        self.shared.handled.lock().await.contains(item_id)
    }

    async fn record(&self, record: ActivityRecord) {
        self.shared.activity.write().await.push(record);
    }
}

/// Topic handed to generation for a reply: the matched keyword, then the
/// first annotation, then the opening words of the item itself.
pub fn reply_topic(policy: &EngagementPolicy, item: &PlatformItem) -> String {
    if let Some(keyword) = policy.matched_keyword(&item.text) {
        return keyword.to_string();
    }
    if let Some(annotation) = item.annotations.first() {
        return annotation.to_lowercase();
    }
    let words: Vec<&str> = item
        .text
        .split_whitespace()
        .filter(|word| !word.starts_with('@') && !word.starts_with("http"))
        .take(REPLY_TOPIC_WORDS)
        .collect();
    if words.is_empty() {
        "your post".to_string()
    } else {
        words.join(" ")
    }
}
