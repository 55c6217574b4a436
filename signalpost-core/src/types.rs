use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Per-run engagement settings. The engine copies this on `start` and never
/// mutates it; a new configuration takes effect only after a stop/start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    pub enabled: bool,
    pub check_interval_minutes: u64,
    pub max_actions_per_hour: u32,
    pub auto_reply_to_mentions: bool,
    pub auto_engage_with_timeline: bool,
    /// Minimum `likes + reshares` a timeline item needs before it is considered.
    pub engagement_threshold: u64,
    pub keywords: Vec<String>,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_minutes: 15,
            max_actions_per_hour: 10,
            auto_reply_to_mentions: true,
            auto_engage_with_timeline: true,
            engagement_threshold: 5,
            keywords: Vec::new(),
        }
    }
}

impl EngagementConfig {
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self.normalized()
    }

    /// Lowercases keywords and drops duplicates, keeping first-seen order.
    pub fn normalized(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.keywords.len());
        for keyword in self.keywords.drain(..) {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !seen.contains(&keyword) {
                seen.push(keyword);
            }
        }
        self.keywords = seen;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    TimelineObservation,
    MentionReply,
    ProactivePost,
    EngagementReply,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityKind::TimelineObservation => "timeline-observation",
            ActivityKind::MentionReply => "mention-reply",
            ActivityKind::ProactivePost => "proactive-post",
            ActivityKind::EngagementReply => "engagement-reply",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub success: bool,
    pub error: Option<String>,
}

impl ActivityRecord {
    pub fn succeeded(kind: ActivityKind, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            summary: summary.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(kind: ActivityKind, summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            summary: summary.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicCategory {
    Crypto,
    Finance,
    Technology,
    Macro,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendTopic {
    /// Lowercase, trimmed.
    pub keyword: String,
    pub volume: f64,
    pub sentiment: Sentiment,
    pub category: TopicCategory,
    pub relevance_score: f64,
}

impl TrendTopic {
    pub fn new(
        keyword: &str,
        volume: f64,
        sentiment: Sentiment,
        category: TopicCategory,
        relevance_score: f64,
    ) -> Self {
        Self {
            keyword: normalize_keyword(keyword),
            volume: volume.max(0.0),
            sentiment,
            category,
            relevance_score,
        }
    }
}

pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// What a piece of generated text is for. Each type has its own template table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Post,
    Thread,
    Reply,
    Meme,
}

impl ContentType {
    /// Maps a free-form intent label onto a content type. Unknown labels are posts.
    pub fn from_intent(intent: &str) -> Self {
        match intent.trim().to_lowercase().as_str() {
            "reply" | "engagement-reply" | "mention-reply" => ContentType::Reply,
            "thread" => ContentType::Thread,
            "meme" => ContentType::Meme,
            _ => ContentType::Post,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Thread => "thread",
            ContentType::Reply => "reply",
            ContentType::Meme => "meme",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDraft {
    pub text: String,
    pub target_length: usize,
    pub source_topic: Option<TrendTopic>,
    pub content_type: ContentType,
}

impl ContentDraft {
    /// Ranking key used when drafts compete for posting slots.
    pub fn source_relevance(&self) -> f64 {
        self.source_topic
            .as_ref()
            .map(|topic| topic.relevance_score)
            .unwrap_or(f64::MIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InteractionCounts {
    pub likes: u64,
    pub reshares: u64,
    pub replies: u64,
}

impl InteractionCounts {
    pub fn total_engagement(&self) -> u64 {
        self.likes + self.reshares
    }
}

/// A mention or timeline post as seen by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformItem {
    pub id: String,
    pub author: String,
    pub text: String,
    pub interactions: Option<InteractionCounts>,
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedRef {
    pub id: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCredentials {
    pub user_id: String,
    pub access_token: String,
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    pub name: String,
    pub volume: f64,
    pub pct_change_24h: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftRef(pub String);

impl fmt::Display for DraftRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
