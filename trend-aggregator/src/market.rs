use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use signalpost_core::{
    ConfigError, CoreError, MarketError, MarketSignal, MarketSignalSource, Sentiment,
    TopicCategory, TrendTopic,
};
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

pub const MAX_MARKET_SIGNALS: usize = 20;

/// Score for a signal at 0-based `rank`: 100 for the top entry, 5 less per place.
pub fn rank_score(rank: usize) -> f64 {
    (100.0 - 5.0 * rank as f64).max(0.0)
}

fn sentiment_from_change(pct_change_24h: f64) -> Sentiment {
    if pct_change_24h > 0.0 {
        Sentiment::Positive
    } else if pct_change_24h < 0.0 {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Converts ranked market signals into topics. Later duplicates of a name are ignored.
pub fn market_topics(signals: &[MarketSignal]) -> Vec<TrendTopic> {
    let mut topics: Vec<TrendTopic> = Vec::with_capacity(signals.len());
    for (rank, signal) in signals.iter().take(MAX_MARKET_SIGNALS).enumerate() {
        let topic = TrendTopic::new(
            &signal.name,
            signal.volume,
            sentiment_from_change(signal.pct_change_24h),
            TopicCategory::Crypto,
            rank_score(rank),
        );
        if topic.keyword.is_empty() || topics.iter().any(|t| t.keyword == topic.keyword) {
            continue;
        }
        topics.push(topic);
    }
    topics
}

/// Stand-in topics used when the market source cannot be reached.
pub fn fallback_topics() -> Vec<TrendTopic> {
    vec![
        TrendTopic::new("bitcoin", 0.0, Sentiment::Neutral, TopicCategory::Crypto, 80.0),
        TrendTopic::new("ethereum", 0.0, Sentiment::Neutral, TopicCategory::Crypto, 70.0),
        TrendTopic::new("altcoins", 0.0, Sentiment::Neutral, TopicCategory::Crypto, 60.0),
        TrendTopic::new("stablecoins", 0.0, Sentiment::Neutral, TopicCategory::Crypto, 50.0),
    ]
}

/// Market signals from a CoinGecko-style `/coins/markets` endpoint, ordered by volume.
#[derive(Debug)]
pub struct CoinGeckoSource {
    http_client: Client,
    markets_url: Url,
}

#[derive(Debug, Deserialize)]
struct CoinMarket {
    name: String,
    total_volume: Option<f64>,
    price_change_percentage_24h: Option<f64>,
}

impl CoinGeckoSource {
    pub const NAME: &'static str = "coingecko";

    pub fn new(base_url: &str) -> Result<Self, CoreError> {
        let invalid = || ConfigError::InvalidValue {
            field: "market.base_url".to_string(),
            value: base_url.to_string(),
        };
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|_| invalid())?;
        let markets_url = base.join("coins/markets").map_err(|_| invalid())?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            http_client,
            markets_url,
        })
    }

    pub fn markets_url(&self) -> &Url {
        &self.markets_url
    }
}

#[async_trait]
impl MarketSignalSource for CoinGeckoSource {
    async fn top_signals(&self, limit: usize) -> Result<Vec<MarketSignal>, CoreError> {
        let per_page = limit.clamp(1, 250).to_string();
        debug!("Fetching top {} market signals", per_page);

        let response = self
            .http_client
            .get(self.markets_url.clone())
            .query(&[
                ("vs_currency", "usd"),
                ("order", "volume_desc"),
                ("per_page", per_page.as_str()),
                ("page", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("Market source request failed: {}", e);
                MarketError::SourceUnavailable {
                    source_name: Self::NAME.to_string(),
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(MarketError::RateLimitExceeded { retry_after }.into());
        }
        if !status.is_success() {
            error!("Market source returned status {}", status);
            return Err(MarketError::SourceUnavailable {
                source_name: Self::NAME.to_string(),
            }
            .into());
        }

        let markets: Vec<CoinMarket> = response.json().await.map_err(|e| {
            error!("Failed to parse market data: {}", e);
            MarketError::InvalidData {
                details: "unexpected /coins/markets payload".to_string(),
            }
        })?;

        info!("Retrieved {} market signals", markets.len());
        Ok(markets
            .into_iter()
            .take(limit)
            .map(|market| MarketSignal {
                name: market.name,
                volume: market.total_volume.unwrap_or(0.0),
                pct_change_24h: market.price_change_percentage_24h.unwrap_or(0.0),
            })
            .collect())
    }
}
