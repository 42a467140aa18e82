//! JSON-over-HTTP metrics provider.
//!
//! Fetches `GET {base_url}/v1/metrics?post=<ref>` and expects a body of the
//! form `{"viewCount": .., "likeCount": .., "shareCount": .., "commentCount": ..}`.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::MetricsProviderConfig;
use crate::interfaces::{MetricsError, MetricsProvider};
use crate::model::PostMetrics;

/// Metrics provider backed by an HTTP API.
///
/// Transient failures (429, timeouts, 5xx, connection errors) are retried
/// with exponential backoff up to `transient_retries` times; not-found and
/// private posts fail immediately.
pub struct HttpMetricsProvider {
    client: Client,
    config: MetricsProviderConfig,
}

impl HttpMetricsProvider {
    pub fn new(config: MetricsProviderConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.config.retry_min_delay())
            .with_max_times(self.config.transient_retries)
            .with_jitter()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/metrics", self.config.base_url.trim_end_matches('/'))
    }

    async fn fetch_once(&self, post_ref: &str) -> Result<PostMetrics, MetricsError> {
        let mut request = self.client.get(self.endpoint()).query(&[("post", post_ref)]);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<PostMetrics>()
                .await
                .map_err(|e| MetricsError::Unavailable(format!("invalid response body: {}", e)));
        }

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => MetricsError::RateLimited,
            StatusCode::NOT_FOUND => MetricsError::NotFound(post_ref.to_string()),
            StatusCode::FORBIDDEN => MetricsError::Private(post_ref.to_string()),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => MetricsError::Timeout,
            other => MetricsError::Unavailable(format!("HTTP {}", other)),
        })
    }
}

fn classify_transport_error(err: reqwest::Error) -> MetricsError {
    if err.is_timeout() {
        MetricsError::Timeout
    } else {
        MetricsError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl MetricsProvider for HttpMetricsProvider {
    async fn fetch(&self, post_ref: &str) -> Result<PostMetrics, MetricsError> {
        let result = (|| async { self.fetch_once(post_ref).await })
            .retry(self.backoff())
            .when(MetricsError::is_transient)
            .notify(|err, delay| {
                warn!(post_ref = %post_ref, error = %err, ?delay, "Retrying metrics fetch");
            })
            .await;

        if let Ok(metrics) = &result {
            debug!(post_ref = %post_ref, views = metrics.view_count, "Fetched metrics");
        }
        result
    }
}
