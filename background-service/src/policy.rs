use signalpost_core::{EngagementConfig, PlatformItem};

/// Topical annotations that qualify an item even without a keyword hit.
pub const DOMAIN_VOCABULARY: &[&str] = &[
    "cryptocurrency",
    "crypto",
    "bitcoin",
    "ethereum",
    "blockchain",
    "defi",
    "nft",
    "web3",
    "finance",
    "fintech",
    "investing",
    "stocks",
    "trading",
    "economy",
];

/// Decides whether a timeline item deserves a reply.
#[derive(Debug, Clone)]
pub struct EngagementPolicy {
    threshold: u64,
    keywords: Vec<String>,
}

impl EngagementPolicy {
    pub fn new(threshold: u64, keywords: Vec<String>) -> Self {
        Self {
            threshold,
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &EngagementConfig) -> Self {
        Self::new(config.engagement_threshold, config.keywords.clone())
    }

    /// Items with counts below the threshold are rejected outright. Items
    /// without counts go straight to the topical checks.
    pub fn should_engage(&self, item: &PlatformItem) -> bool {
        if let Some(interactions) = &item.interactions {
            if interactions.total_engagement() < self.threshold {
                return false;
            }
        }
        self.matched_keyword(&item.text).is_some() || has_domain_annotation(item)
    }

    pub fn matched_keyword(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| text.contains(keyword.as_str()))
            .map(String::as_str)
    }
}

pub fn has_domain_annotation(item: &PlatformItem) -> bool {
    item.annotations.iter().any(|annotation| {
        let annotation = annotation.to_lowercase();
        DOMAIN_VOCABULARY
            .iter()
            .any(|term| annotation.contains(term))
    })
}
