use crate::market::{fallback_topics, market_topics, MAX_MARKET_SIGNALS};
use crate::timeline::{score_timeline, MAX_TIMELINE_ITEMS};
use signalpost_core::{
    Cache, ErrorExt, MarketSignal, MarketSignalSource, PlatformClient, PlatformCredentials,
    TrendTopic,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MAX_TRENDS: usize = 20;

/// Share of a timeline score added to a topic the market source already reported.
const TIMELINE_BOOST: f64 = 0.5;

const MARKET_CACHE_KEY: &str = "trends:market";
const MARKET_CACHE_TTL: Duration = Duration::from_secs(300);
const TRENDS_CACHE_TTL: Duration = Duration::from_secs(900);

/// Merges market and timeline topics into one ranked list.
///
/// Keywords present in both keep the market entry, boosted by half the
/// timeline score, with volumes summed.
pub fn merge_topics(market: Vec<TrendTopic>, timeline: Vec<TrendTopic>) -> Vec<TrendTopic> {
    let mut merged: HashMap<String, TrendTopic> = HashMap::with_capacity(market.len());
    for topic in market {
        merged.entry(topic.keyword.clone()).or_insert(topic);
    }

    for topic in timeline {
        match merged.get_mut(&topic.keyword) {
            Some(existing) => {
                existing.relevance_score += TIMELINE_BOOST * topic.relevance_score;
                existing.volume += topic.volume;
            }
            None => {
                merged.insert(topic.keyword.clone(), topic);
            }
        }
    }

    let mut ranked: Vec<TrendTopic> = merged.into_values().collect();
    ranked.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    ranked.truncate(MAX_TRENDS);
    ranked
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSnapshot {
    pub topics: Vec<TrendTopic>,
    pub used_market_fallback: bool,
    pub timeline_items_scanned: usize,
}

pub struct TrendAggregator {
    market: Arc<dyn MarketSignalSource>,
    platform: Arc<dyn PlatformClient>,
    cache: Option<Cache>,
}

impl TrendAggregator {
    pub fn new(market: Arc<dyn MarketSignalSource>, platform: Arc<dyn PlatformClient>) -> Self {
        Self {
            market,
            platform,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn aggregate(&self, credentials: Option<&PlatformCredentials>) -> Vec<TrendTopic> {
        let key = trends_cache_key(credentials);
        if let Some(cache) = &self.cache {
            if let Some(topics) = cache.get_json::<Vec<TrendTopic>>(&key).await {
                debug!("Using cached trends ({} topics)", topics.len());
                return topics;
            }
        }

        let snapshot = self.collect(credentials).await;
        if let Some(cache) = &self.cache {
            cache.set_json(&key, &snapshot.topics, TRENDS_CACHE_TTL).await;
        }
        snapshot.topics
    }

    /// Queries both sources concurrently and merges them, bypassing the
    /// merged-result cache. A failing source never blocks the other.
    pub async fn collect(&self, credentials: Option<&PlatformCredentials>) -> TrendSnapshot {
        let (market, (timeline, scanned)) =
            tokio::join!(self.market_side(), self.timeline_side(credentials));

        let used_market_fallback = market.is_none();
        let market = market.unwrap_or_else(fallback_topics);
        let topics = merge_topics(market, timeline);

        info!(
            "Aggregated {} trends (market fallback: {}, timeline items: {})",
            topics.len(),
            used_market_fallback,
            scanned
        );
        TrendSnapshot {
            topics,
            used_market_fallback,
            timeline_items_scanned: scanned,
        }
    }

    async fn market_side(&self) -> Option<Vec<TrendTopic>> {
        if let Some(cache) = &self.cache {
            if let Some(signals) = cache.get_json::<Vec<MarketSignal>>(MARKET_CACHE_KEY).await {
                return Some(market_topics(&signals));
            }
        }

        match self.market.top_signals(MAX_MARKET_SIGNALS).await {
            Ok(signals) => {
                if let Some(cache) = &self.cache {
                    cache
                        .set_json(MARKET_CACHE_KEY, &signals, MARKET_CACHE_TTL)
                        .await;
                }
                Some(market_topics(&signals))
            }
            Err(e) => {
                warn!(
                    "Market source failed ({}), using fallback trends: {}",
                    e.error_code(),
                    e
                );
                None
            }
        }
    }

    async fn timeline_side(
        &self,
        credentials: Option<&PlatformCredentials>,
    ) -> (Vec<TrendTopic>, usize) {
        let Some(credentials) = credentials else {
            debug!("No credentials, skipping timeline trends");
            return (Vec::new(), 0);
        };

        match self
            .platform
            .fetch_timeline(credentials, MAX_TIMELINE_ITEMS)
            .await
        {
            Ok(items) => {
                let scanned = items.len().min(MAX_TIMELINE_ITEMS);
                (score_timeline(&items), scanned)
            }
            Err(e) => {
                warn!("Timeline source failed, continuing without it: {}", e);
                (Vec::new(), 0)
            }
        }
    }
}

fn trends_cache_key(credentials: Option<&PlatformCredentials>) -> String {
    match credentials {
        Some(credentials) => format!("trends:aggregate:{}", credentials.user_id),
        None => "trends:aggregate:anonymous".to_string(),
    }
}
