use signalpost_core::{
    ConfigError, CoreError, ErrorExt, GenerationError, MarketError, PlatformError, StoreError,
};

#[test]
fn test_error_codes() {
    let platform_error = CoreError::Platform(PlatformError::InvalidToken);
    assert_eq!(platform_error.error_code(), "PLATFORM");

    let store_error = CoreError::Store(StoreError::DatabaseLocked);
    assert_eq!(store_error.error_code(), "STORE");

    let generation_error = CoreError::Generation(GenerationError::InvalidApiKey {
        provider: "openai".to_string(),
    });
    assert_eq!(generation_error.error_code(), "GENERATION");

    let market_error = CoreError::Market(MarketError::InvalidData {
        details: "empty".to_string(),
    });
    assert_eq!(market_error.error_code(), "MARKET");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "account.id".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");
}

#[test]
fn test_nested_error_codes() {
    assert_eq!(
        PlatformError::RateLimitExceeded { retry_after: 60 }.error_code(),
        "PLATFORM_RATE_LIMIT"
    );
    assert_eq!(
        StoreError::DraftNotFound {
            draft_id: "d1".to_string()
        }
        .error_code(),
        "DB_DRAFT_NOT_FOUND"
    );
}

#[test]
fn test_retryable_errors() {
    let retryable_error = CoreError::Platform(PlatformError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let server_error = CoreError::Platform(PlatformError::ServerError { status_code: 503 });
    assert!(server_error.is_retryable());

    let non_retryable_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert!(!non_retryable_error.is_retryable());

    let bad_key = CoreError::Generation(GenerationError::InvalidApiKey {
        provider: "inference".to_string(),
    });
    assert!(!bad_key.is_retryable());
}

#[test]
fn test_user_friendly_messages() {
    let platform_error = CoreError::Platform(PlatformError::InvalidToken);
    let message = platform_error.user_friendly_message();
    assert!(message.contains("access token is invalid"));

    let outage = CoreError::Platform(PlatformError::ServerError { status_code: 503 });
    assert!(outage.user_friendly_message().contains("HTTP 503"));

    let rejected = CoreError::Platform(PlatformError::PostRejected {
        reason: "duplicate content".to_string(),
    });
    assert_eq!(
        rejected.user_friendly_message(),
        "The platform rejected the post: duplicate content"
    );

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("api_key"));
}

#[test]
fn test_from_conversions_and_display() {
    let error: CoreError = PlatformError::PostRejected {
        reason: "duplicate content".to_string(),
    }
    .into();
    assert!(matches!(error, CoreError::Platform(_)));
    assert_eq!(
        error.to_string(),
        "Platform API error: Post rejected by platform: duplicate content"
    );

    // Logging helpers hand back the same error for chaining.
    let logged = error.log_warn();
    assert_eq!(logged.error_code(), "PLATFORM");
}
