use crate::api::{self, HttpPlatformClient, TweetList};
use crate::StaticCredentialResolver;
use reqwest::{Method, StatusCode};
use signalpost_core::{
    AccountConfig, ConfigError, CoreError, CredentialResolver, PlatformCredentials, PlatformError,
    PlatformItem,
};

const MENTIONS_FIXTURE: &str = r#"{
    "data": [
        {
            "id": "1790",
            "text": "@signalpost what do you make of the ETF flows?",
            "author_id": "42",
            "public_metrics": {"retweet_count": 3, "reply_count": 1, "like_count": 12, "quote_count": 0},
            "context_annotations": [
                {"domain": {"id": "66", "name": "Interests and Hobbies Category"}, "entity": {"id": "1", "name": "Cryptocurrency"}},
                {"domain": {"id": "131", "name": "Unified Twitter Taxonomy"}, "entity": {"id": "2", "name": "Cryptocurrency"}}
            ]
        },
        {
            "id": "1791",
            "text": "gm"
        }
    ],
    "meta": {"result_count": 2, "newest_id": "1791", "oldest_id": "1790"}
}"#;

fn client() -> HttpPlatformClient {
    HttpPlatformClient::new("https://api.example.com", "signalpost-test/1.0").unwrap()
}

#[test]
fn test_listing_conversion() {
    let list: TweetList = serde_json::from_str(MENTIONS_FIXTURE).unwrap();
    let items: Vec<PlatformItem> = list.data.into_iter().map(PlatformItem::from).collect();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].author, "42");
    let counts = items[0].interactions.unwrap();
    assert_eq!(counts.total_engagement(), 15);
    assert_eq!(counts.replies, 1);
    assert_eq!(
        items[0].annotations,
        vec![
            "Interests and Hobbies Category",
            "Cryptocurrency",
            "Unified Twitter Taxonomy"
        ]
    );

    assert!(items[1].interactions.is_none());
    assert!(items[1].annotations.is_empty());
    assert_eq!(items[1].author, "");
}

#[test]
fn test_empty_listing_has_no_data_field() {
    let list: TweetList = serde_json::from_str(r#"{"meta": {"result_count": 0}}"#).unwrap();
    assert!(list.data.is_empty());
}

#[test]
fn test_endpoint_building() {
    let client = client();
    assert_eq!(
        client
            .endpoint(&["2", "users", "42", "timelines", "reverse_chronological"])
            .as_str(),
        "https://api.example.com/2/users/42/timelines/reverse_chronological"
    );

    let nested = HttpPlatformClient::new("https://proxy.example.com/x/", "ua").unwrap();
    assert_eq!(
        nested.endpoint(&["2", "tweets"]).as_str(),
        "https://proxy.example.com/x/2/tweets"
    );
}

#[test]
fn test_invalid_api_base_rejected() {
    assert!(matches!(
        HttpPlatformClient::new("not a url", "ua"),
        Err(CoreError::Config(ConfigError::InvalidValue { .. }))
    ));
    assert!(matches!(
        HttpPlatformClient::new("mailto:someone@example.com", "ua"),
        Err(CoreError::Config(ConfigError::InvalidValue { .. }))
    ));
}

#[test]
fn test_status_mapping() {
    assert!(matches!(
        api::map_status(StatusCode::TOO_MANY_REQUESTS, &Method::GET, "mentions", 15, None),
        PlatformError::RateLimitExceeded { retry_after: 15 }
    ));
    assert!(matches!(
        api::map_status(StatusCode::UNAUTHORIZED, &Method::GET, "mentions", 60, None),
        PlatformError::InvalidToken
    ));
    assert!(matches!(
        api::map_status(StatusCode::FORBIDDEN, &Method::GET, "timeline", 60, None),
        PlatformError::Forbidden { resource } if resource == "timeline"
    ));
    assert!(matches!(
        api::map_status(
            StatusCode::FORBIDDEN,
            &Method::POST,
            "post",
            60,
            Some("You are not allowed to create a Tweet with duplicate content.".to_string())
        ),
        PlatformError::PostRejected { reason } if reason.contains("duplicate content")
    ));
    assert!(matches!(
        api::map_status(StatusCode::BAD_GATEWAY, &Method::GET, "timeline", 60, None),
        PlatformError::ServerError { status_code: 502 }
    ));
    assert!(matches!(
        api::map_status(StatusCode::CONFLICT, &Method::GET, "timeline", 60, None),
        PlatformError::InvalidResponse { .. }
    ));
}

#[test]
fn test_error_detail_parsing() {
    assert_eq!(
        api::error_detail(r#"{"title": "Forbidden", "detail": "duplicate content", "type": "about:blank"}"#),
        Some("duplicate content".to_string())
    );
    assert_eq!(
        api::error_detail(r#"{"title": "Unauthorized"}"#),
        Some("Unauthorized".to_string())
    );
    assert_eq!(api::error_detail("<html>"), None);
}

#[test]
fn test_reply_payload_shape() {
    assert_eq!(
        api::new_tweet_json("gm", Some("1790")),
        serde_json::json!({"text": "gm", "reply": {"in_reply_to_tweet_id": "1790"}})
    );
    assert_eq!(api::new_tweet_json("gm", None), serde_json::json!({"text": "gm"}));
}

#[tokio::test]
async fn test_metrics_start_empty() {
    let client = client();
    assert_eq!(client.get_metrics().await.total_requests, 0);
    assert!(client.get_metrics().await.requests_by_endpoint.is_empty());
    assert!(client.export_metrics().await.unwrap().contains("\"total_requests\": 0"));
}

#[tokio::test]
async fn test_zero_limit_skips_request() {
    let client = client();
    let credentials = PlatformCredentials {
        user_id: "42".to_string(),
        access_token: "token".to_string(),
    };
    let items = signalpost_core::PlatformClient::fetch_mentions(&client, &credentials, 0)
        .await
        .unwrap();
    assert!(items.is_empty());
    assert_eq!(client.get_metrics().await.total_requests, 0);
}

#[tokio::test]
async fn test_static_resolver() {
    let account = AccountConfig {
        id: "acct-1".to_string(),
        platform_user_id: "42".to_string(),
        access_token: Some("token".to_string()),
    };
    let resolver = StaticCredentialResolver::from_config(&account);
    let credentials = resolver.account_credentials("acct-1").await.unwrap().unwrap();
    assert_eq!(credentials.user_id, "42");
    assert!(resolver.account_credentials("acct-2").await.unwrap().is_none());

    let without_token = AccountConfig {
        access_token: None,
        ..account
    };
    assert!(StaticCredentialResolver::from_config(&without_token)
        .account_credentials("acct-1")
        .await
        .unwrap()
        .is_none());
}
