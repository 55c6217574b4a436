pub mod aggregator;
pub mod market;
pub mod timeline;

pub use aggregator::{merge_topics, TrendAggregator, TrendSnapshot, MAX_TRENDS};
pub use market::{fallback_topics, market_topics, CoinGeckoSource};
pub use timeline::score_timeline;
