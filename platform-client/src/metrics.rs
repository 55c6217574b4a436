use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub average_response_time: Duration,
    pub last_request_time: Option<SystemTime>,
    pub requests_by_endpoint: HashMap<String, EndpointMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_response_time: Duration,
    pub min_response_time: Duration,
    pub max_response_time: Duration,
    pub last_status: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct RequestMetrics {
    /// Route name such as `mentions`, not the concrete URL.
    pub endpoint: String,
    pub method: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub success: bool,
    pub rate_limited: bool,
}

impl EndpointMetrics {
    fn new() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            error_count: 0,
            total_response_time: Duration::ZERO,
            min_response_time: Duration::MAX,
            max_response_time: Duration::ZERO,
            last_status: None,
        }
    }

    fn update(&mut self, metrics: &RequestMetrics) {
        self.request_count += 1;
        self.total_response_time += metrics.response_time;
        self.min_response_time = self.min_response_time.min(metrics.response_time);
        self.max_response_time = self.max_response_time.max(metrics.response_time);
        self.last_status = metrics.status_code;

        if metrics.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            Duration::ZERO
        } else {
            self.total_response_time / self.request_count as u32
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.request_count as f64
        }
    }
}

/// Request counters for the platform API, kept per route.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<ApiMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, request_metrics: RequestMetrics) {
        let mut metrics = self.metrics.write().await;

        metrics.total_requests += 1;
        metrics.last_request_time = Some(SystemTime::now());

        if request_metrics.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
        }
        if request_metrics.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        // Running mean over all requests.
        let previous = metrics.average_response_time * (metrics.total_requests - 1) as u32;
        metrics.average_response_time =
            (previous + request_metrics.response_time) / metrics.total_requests as u32;

        metrics
            .requests_by_endpoint
            .entry(request_metrics.endpoint.clone())
            .or_insert_with(EndpointMetrics::new)
            .update(&request_metrics);
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn export_metrics(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.get_metrics().await)
    }
}
