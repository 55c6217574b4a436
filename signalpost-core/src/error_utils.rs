use crate::error::*;
use tracing::{error, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::Platform(e) => {
                error!("Platform error details: {:?}", e);
            }
            CoreError::Generation(e) => {
                error!("Generation error details: {:?}", e);
            }
            CoreError::Store(e) => {
                error!("Store error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Platform(e) => e.is_retryable(),
            CoreError::Generation(e) => e.is_retryable(),
            CoreError::Market(e) => e.is_retryable(),
            CoreError::Store(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::Platform(e) => e.user_friendly_message(),
            CoreError::Generation(e) => e.user_friendly_message(),
            CoreError::Market(e) => e.user_friendly_message(),
            CoreError::Store(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { .. } => {
                "Invalid input provided. Please check your input and try again.".to_string()
            }
            CoreError::NotFound { resource } => format!("Could not find: {}", resource),
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::Platform(_) => "PLATFORM".to_string(),
            CoreError::Generation(_) => "GENERATION".to_string(),
            CoreError::Market(_) => "MARKET".to_string(),
            CoreError::Store(_) => "STORE".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::NotFound { .. } => "NOT_FOUND".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for PlatformError {
    fn log_error(&self) -> &Self {
        error!("PlatformError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("PlatformError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            PlatformError::RateLimitExceeded { .. } => true,
            PlatformError::RequestTimeout => true,
            PlatformError::ServerError { status_code } => *status_code >= 500,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            PlatformError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            PlatformError::Forbidden { resource } => {
                format!("Access denied to {}. The account may lack permission.", resource)
            }
            PlatformError::ItemNotFound { .. } => {
                "The requested post could not be found.".to_string()
            }
            PlatformError::InvalidToken => {
                "Platform access token is invalid. Please reconnect the account.".to_string()
            }
            PlatformError::RequestTimeout => {
                "Request to the platform timed out. Please try again.".to_string()
            }
            PlatformError::PostRejected { reason } => {
                format!("The platform rejected the post: {}", reason)
            }
            PlatformError::ServerError { status_code } => format!(
                "The platform is having trouble (HTTP {}). Please try again later.",
                status_code
            ),
            _ => "Platform API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            PlatformError::RateLimitExceeded { .. } => "PLATFORM_RATE_LIMIT".to_string(),
            PlatformError::Forbidden { .. } => "PLATFORM_FORBIDDEN".to_string(),
            PlatformError::ItemNotFound { .. } => "PLATFORM_ITEM_NOT_FOUND".to_string(),
            PlatformError::InvalidToken => "PLATFORM_INVALID_TOKEN".to_string(),
            PlatformError::RequestTimeout => "PLATFORM_TIMEOUT".to_string(),
            PlatformError::InvalidResponse { .. } => "PLATFORM_INVALID_RESPONSE".to_string(),
            PlatformError::ServerError { .. } => "PLATFORM_SERVER_ERROR".to_string(),
            PlatformError::PostRejected { .. } => "PLATFORM_POST_REJECTED".to_string(),
        }
    }
}

impl ErrorExt for GenerationError {
    fn log_error(&self) -> &Self {
        error!("GenerationError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("GenerationError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimitExceeded { .. }
                | GenerationError::ServiceUnavailable { .. }
                | GenerationError::RequestTimeout { .. }
                | GenerationError::ModelNotAvailable { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            GenerationError::InvalidApiKey { provider } => format!(
                "Invalid API key for {}. Please update your credentials.",
                provider
            ),
            GenerationError::RateLimitExceeded {
                provider,
                retry_after,
            } => format!(
                "Rate limit exceeded for {}. Please wait {} seconds.",
                provider, retry_after
            ),
            GenerationError::ModelNotAvailable { model } => format!(
                "Model '{}' is not available (it may still be loading).",
                model
            ),
            GenerationError::ServiceUnavailable { provider } => format!(
                "{} service is temporarily unavailable. Please try again later.",
                provider
            ),
            _ => "Text generation failed. Template content was used instead.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            GenerationError::InvalidApiKey { .. } => "GEN_INVALID_API_KEY".to_string(),
            GenerationError::RateLimitExceeded { .. } => "GEN_RATE_LIMIT".to_string(),
            GenerationError::ModelNotAvailable { .. } => "GEN_MODEL_NOT_AVAILABLE".to_string(),
            GenerationError::ServiceUnavailable { .. } => "GEN_SERVICE_UNAVAILABLE".to_string(),
            GenerationError::RequestTimeout { .. } => "GEN_TIMEOUT".to_string(),
            GenerationError::InvalidResponseFormat { .. } => "GEN_INVALID_RESPONSE".to_string(),
            GenerationError::EmptyCompletion { .. } => "GEN_EMPTY_COMPLETION".to_string(),
        }
    }
}

impl ErrorExt for MarketError {
    fn log_error(&self) -> &Self {
        error!("MarketError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("MarketError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        !matches!(self, MarketError::InvalidData { .. })
    }

    fn user_friendly_message(&self) -> String {
        match self {
            MarketError::RateLimitExceeded { retry_after } => format!(
                "Market data source is rate limiting. Please wait {} seconds.",
                retry_after
            ),
            _ => "Market data is unavailable. Fallback trends were used.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            MarketError::SourceUnavailable { .. } => "MARKET_UNAVAILABLE".to_string(),
            MarketError::RateLimitExceeded { .. } => "MARKET_RATE_LIMIT".to_string(),
            MarketError::InvalidData { .. } => "MARKET_INVALID_DATA".to_string(),
        }
    }
}

impl ErrorExt for StoreError {
    fn log_error(&self) -> &Self {
        error!("StoreError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("StoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::DatabaseLocked | StoreError::ConnectionFailed { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            StoreError::ConnectionFailed { .. } => {
                "Database connection failed. Please try again.".to_string()
            }
            StoreError::DatabaseLocked => {
                "Database is temporarily busy. Please try again.".to_string()
            }
            StoreError::DraftNotFound { draft_id } => {
                format!("Draft '{}' no longer exists.", draft_id)
            }
            _ => "Database error occurred. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            StoreError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            StoreError::MigrationFailed { .. } => "DB_MIGRATION_FAILED".to_string(),
            StoreError::QueryFailed { .. } => "DB_QUERY_FAILED".to_string(),
            StoreError::DraftNotFound { .. } => "DB_DRAFT_NOT_FOUND".to_string(),
            StoreError::DatabaseLocked => "DB_LOCKED".to_string(),
            StoreError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}
