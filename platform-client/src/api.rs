use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use signalpost_core::{
    ConfigError, CoreError, InteractionCounts, PlatformClient, PlatformCredentials, PlatformError,
    PlatformItem, PostedRef,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

const TWEET_FIELDS: &str = "author_id,public_metrics,context_annotations";
const DEFAULT_RETRY_AFTER: u64 = 60;
/// The listing endpoints reject `max_results` outside this range.
const MIN_PAGE_SIZE: usize = 5;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct TweetList {
    #[serde(default)]
    pub data: Vec<TweetData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub public_metrics: Option<PublicMetrics>,
    #[serde(default)]
    pub context_annotations: Vec<ContextAnnotation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextAnnotation {
    pub domain: AnnotationEntity,
    pub entity: AnnotationEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationEntity {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostedTweet {
    data: PostedTweetData,
}

#[derive(Debug, Deserialize)]
struct PostedTweetData {
    id: String,
}

#[derive(Debug, Serialize)]
struct NewTweet<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplySettings<'a>>,
}

#[derive(Debug, Serialize)]
struct ReplySettings<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: Option<String>,
    title: Option<String>,
}

impl From<TweetData> for PlatformItem {
    fn from(tweet: TweetData) -> Self {
        let mut annotations: Vec<String> = Vec::new();
        for annotation in tweet.context_annotations {
            for name in [annotation.domain.name, annotation.entity.name]
                .into_iter()
                .flatten()
            {
                if !annotations.contains(&name) {
                    annotations.push(name);
                }
            }
        }

        Self {
            id: tweet.id,
            author: tweet.author_id.unwrap_or_default(),
            text: tweet.text,
            interactions: tweet.public_metrics.map(|metrics| InteractionCounts {
                likes: metrics.like_count,
                reshares: metrics.retweet_count,
                replies: metrics.reply_count,
            }),
            annotations,
        }
    }
}

pub fn error_detail(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    parsed.detail.or(parsed.title)
}

/// Maps a non-success status onto the platform error taxonomy. Writes that
/// the platform refuses become `PostRejected` with its stated reason.
pub fn map_status(
    status: StatusCode,
    method: &Method,
    route: &str,
    retry_after: u64,
    detail: Option<String>,
) -> PlatformError {
    match status.as_u16() {
        429 => PlatformError::RateLimitExceeded { retry_after },
        401 => PlatformError::InvalidToken,
        400 | 403 if *method == Method::POST => PlatformError::PostRejected {
            reason: detail.unwrap_or_else(|| status.to_string()),
        },
        403 => PlatformError::Forbidden {
            resource: route.to_string(),
        },
        404 => PlatformError::ItemNotFound {
            item_id: route.to_string(),
        },
        code if status.is_server_error() => PlatformError::ServerError { status_code: code },
        _ => PlatformError::InvalidResponse {
            details: detail.unwrap_or_else(|| format!("unexpected status {}", status)),
        },
    }
}

/// Platform API client speaking the v2 REST endpoints with bearer tokens.
#[derive(Debug)]
pub struct HttpPlatformClient {
    http_client: Client,
    api_base: Url,
    metrics: Arc<MetricsCollector>,
}

impl HttpPlatformClient {
    pub fn new(api_base: &str, user_agent: &str) -> Result<Self, CoreError> {
        let api_base = Url::parse(api_base).map_err(|_| ConfigError::InvalidValue {
            field: "platform.api_base".to_string(),
            value: api_base.to_string(),
        })?;
        if api_base.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                field: "platform.api_base".to_string(),
                value: api_base.to_string(),
            }
            .into());
        }

        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            api_base,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute(
        &self,
        route: &str,
        method: Method,
        request: RequestBuilder,
    ) -> Result<Response, CoreError> {
        let start_time = Instant::now();
        info!("Platform API request: {} {}", method, route);

        let (status_code, result) = match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Request successful: {} {}", response.status(), route);
                (Some(response.status().as_u16()), Ok(response))
            }
            Ok(response) => {
                let status = response.status();
                error!("Request failed with status {} for {}", status, route);
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                if status == StatusCode::TOO_MANY_REQUESTS {
                    warn!("Rate limited, retry after {} seconds", retry_after);
                }
                let detail = response
                    .text()
                    .await
                    .ok()
                    .and_then(|body| error_detail(&body));
                let mapped = map_status(status, &method, route, retry_after, detail);
                (Some(status.as_u16()), Err(CoreError::from(mapped)))
            }
            Err(e) => {
                error!("Network error for {} {}: {}", method, route, e);
                let mapped = if e.is_timeout() {
                    PlatformError::RequestTimeout.into()
                } else {
                    CoreError::Network(e)
                };
                (None, Err(mapped))
            }
        };

        self.metrics
            .record_request(RequestMetrics {
                endpoint: route.to_string(),
                method: method.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: result.is_ok(),
                rate_limited: status_code == Some(429),
            })
            .await;

        result
    }

    async fn fetch_listing(
        &self,
        route: &str,
        credentials: &PlatformCredentials,
        listing: &[&str],
        limit: usize,
    ) -> Result<Vec<PlatformItem>, CoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut segments = vec!["2", "users", credentials.user_id.as_str()];
        segments.extend_from_slice(listing);
        let url = self.endpoint(&segments);
        let max_results = limit.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE).to_string();
        let request = self
            .http_client
            .get(url)
            .bearer_auth(&credentials.access_token)
            .query(&[
                ("max_results", max_results.as_str()),
                ("tweet.fields", TWEET_FIELDS),
            ]);

        let response = self.execute(route, Method::GET, request).await?;
        let list: TweetList = response.json().await.map_err(|e| {
            error!("Failed to parse {} listing: {}", route, e);
            PlatformError::InvalidResponse {
                details: format!("Failed to parse {} listing", route),
            }
        })?;

        info!("Retrieved {} items from {}", list.data.len(), route);
        Ok(list
            .data
            .into_iter()
            .take(limit)
            .map(PlatformItem::from)
            .collect())
    }

    async fn create_post(
        &self,
        route: &str,
        credentials: &PlatformCredentials,
        body: &NewTweet<'_>,
    ) -> Result<PostedRef, CoreError> {
        let request = self
            .http_client
            .post(self.endpoint(&["2", "tweets"]))
            .bearer_auth(&credentials.access_token)
            .json(body);

        let response = self.execute(route, Method::POST, request).await?;
        let posted: PostedTweet = response.json().await.map_err(|e| {
            error!("Failed to parse created post: {}", e);
            PlatformError::InvalidResponse {
                details: "Failed to parse created post".to_string(),
            }
        })?;
        Ok(PostedRef { id: posted.data.id })
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn export_metrics(&self) -> Result<String, serde_json::Error> {
        self.metrics.export_metrics().await
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn fetch_mentions(
        &self,
        credentials: &PlatformCredentials,
        limit: usize,
    ) -> Result<Vec<PlatformItem>, CoreError> {
        self.fetch_listing("mentions", credentials, &["mentions"], limit)
            .await
    }

    async fn fetch_timeline(
        &self,
        credentials: &PlatformCredentials,
        limit: usize,
    ) -> Result<Vec<PlatformItem>, CoreError> {
        self.fetch_listing(
            "timeline",
            credentials,
            &["timelines", "reverse_chronological"],
            limit,
        )
        .await
    }

    async fn post_content(
        &self,
        credentials: &PlatformCredentials,
        text: &str,
    ) -> Result<PostedRef, CoreError> {
        self.create_post("post", credentials, &NewTweet { text, reply: None })
            .await
    }

    async fn reply_to(
        &self,
        credentials: &PlatformCredentials,
        text: &str,
        item_id: &str,
    ) -> Result<PostedRef, CoreError> {
        self.create_post(
            "reply",
            credentials,
            &NewTweet {
                text,
                reply: Some(ReplySettings {
                    in_reply_to_tweet_id: item_id,
                }),
            },
        )
        .await
    }
}

#[cfg(test)]
pub(crate) fn new_tweet_json(text: &str, reply_to: Option<&str>) -> serde_json::Value {
    serde_json::to_value(NewTweet {
        text,
        reply: reply_to.map(|id| ReplySettings {
            in_reply_to_tweet_id: id,
        }),
    })
    .unwrap_or_default()
}
