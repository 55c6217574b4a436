pub mod api;
pub mod credentials;
pub mod metrics;

#[cfg(test)]
mod tests;

pub use api::HttpPlatformClient;
pub use credentials::StaticCredentialResolver;
pub use metrics::{ApiMetrics, EndpointMetrics, MetricsCollector};
