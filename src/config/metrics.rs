//! Metrics provider client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Default provider endpoint.
pub const DEFAULT_METRICS_BASE_URL: &str = "http://localhost:8090";
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Default number of retries after a transient failure.
pub const DEFAULT_TRANSIENT_RETRIES: usize = 2;
/// Default first backoff delay.
pub const DEFAULT_RETRY_MIN_DELAY_MS: u64 = 200;

/// HTTP metrics provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsProviderConfig {
    /// Base URL; posts are fetched from `{base_url}/v1/metrics?post=<ref>`.
    pub base_url: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub transient_retries: usize,
    pub retry_min_delay_ms: u64,
}

impl MetricsProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_min_delay(&self) -> Duration {
        Duration::from_millis(self.retry_min_delay_ms)
    }
}

impl Default for MetricsProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_METRICS_BASE_URL.to_string(),
            api_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            transient_retries: DEFAULT_TRANSIENT_RETRIES,
            retry_min_delay_ms: DEFAULT_RETRY_MIN_DELAY_MS,
        }
    }
}
