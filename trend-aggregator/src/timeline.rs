//! Keyword scoring over recent timeline posts.

use signalpost_core::{PlatformItem, Sentiment, TopicCategory, TrendTopic};

pub const MAX_TIMELINE_ITEMS: usize = 50;
pub const MAX_TIMELINE_TOPICS: usize = 15;
const MIN_MENTIONS: usize = 2;
const POSITIVE_ENGAGEMENT: f64 = 10.0;

/// Terms tracked on the timeline, with the category each one reports under.
pub const TRACKED_TERMS: &[(&str, TopicCategory)] = &[
    ("bitcoin", TopicCategory::Crypto),
    ("btc", TopicCategory::Crypto),
    ("ethereum", TopicCategory::Crypto),
    ("eth", TopicCategory::Crypto),
    ("crypto", TopicCategory::Crypto),
    ("defi", TopicCategory::Crypto),
    ("nft", TopicCategory::Crypto),
    ("web3", TopicCategory::Crypto),
    ("blockchain", TopicCategory::Crypto),
    ("solana", TopicCategory::Crypto),
    ("altcoin", TopicCategory::Crypto),
    ("stablecoin", TopicCategory::Crypto),
    ("trading", TopicCategory::Finance),
    ("stocks", TopicCategory::Finance),
    ("market", TopicCategory::Finance),
    ("ai", TopicCategory::Technology),
    ("fed", TopicCategory::Macro),
    ("inflation", TopicCategory::Macro),
];

/// Splits text into lowercase words, dropping `#`/`$` prefixes and punctuation.
fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '#' || c == '$'))
        .map(|word| word.trim_start_matches(['#', '$']).to_lowercase())
        .filter(|word| !word.is_empty())
        .collect()
}

fn mentions(tokens: &[String], term: &str) -> bool {
    tokens
        .iter()
        .any(|token| token == term || token.strip_suffix('s') == Some(term))
}

/// Scores tracked terms mentioned by at least two of the most recent items.
///
/// A term's count is the number of items mentioning it; its score is
/// `min(100, count * 10 + average likes+reshares of those items)`.
pub fn score_timeline(items: &[PlatformItem]) -> Vec<TrendTopic> {
    let items = &items[..items.len().min(MAX_TIMELINE_ITEMS)];
    let tokenized: Vec<(Vec<String>, u64)> = items
        .iter()
        .map(|item| {
            let engagement = item
                .interactions
                .map(|counts| counts.total_engagement())
                .unwrap_or(0);
            (tokens(&item.text), engagement)
        })
        .collect();

    let mut topics: Vec<TrendTopic> = TRACKED_TERMS
        .iter()
        .filter_map(|(term, category)| {
            let engagements: Vec<u64> = tokenized
                .iter()
                .filter(|(tokens, _)| mentions(tokens, term))
                .map(|(_, engagement)| *engagement)
                .collect();
            let count = engagements.len();
            if count < MIN_MENTIONS {
                return None;
            }

            let avg_engagement = engagements.iter().sum::<u64>() as f64 / count as f64;
            Some(timeline_topic(term, count, avg_engagement, *category))
        })
        .collect();

    topics.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| a.keyword.cmp(&b.keyword))
    });
    topics.truncate(MAX_TIMELINE_TOPICS);
    topics
}

/// Builds a timeline topic from a mention count and average engagement.
pub fn timeline_topic(
    keyword: &str,
    count: usize,
    avg_engagement: f64,
    category: TopicCategory,
) -> TrendTopic {
    let score = (count as f64 * 10.0 + avg_engagement).min(100.0);
    let sentiment = if avg_engagement > POSITIVE_ENGAGEMENT {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    };
    TrendTopic::new(keyword, count as f64, sentiment, category, score)
}
