use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Platform API error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Market data error: {0}")]
    Market(#[from] MarketError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Post rejected by platform: {reason}")]
    PostRejected { reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error("API key invalid or missing for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("Model not available: {model}")]
    ModelNotAvailable { model: String },

    #[error("Provider service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Request timeout for {provider}")]
    RequestTimeout { provider: String },

    #[error("Invalid response format from {provider}")]
    InvalidResponseFormat { provider: String },

    #[error("Empty completion from {provider}")]
    EmptyCompletion { provider: String },
}

#[derive(Error, Debug, Clone)]
pub enum MarketError {
    #[error("Market source unavailable: {source_name}")]
    SourceUnavailable { source_name: String },

    #[error("Market source rate limited. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Invalid market data: {details}")]
    InvalidData { details: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Query execution failed: {query}")]
    QueryFailed { query: String },

    #[error("Draft not found: {draft_id}")]
    DraftNotFound { draft_id: String },

    #[error("Database locked")]
    DatabaseLocked,

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
