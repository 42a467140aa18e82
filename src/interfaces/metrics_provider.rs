//! Metrics provider interface.

use async_trait::async_trait;

use crate::model::PostMetrics;

/// Classified failure from a metrics provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    #[error("Rate limited by metrics provider")]
    RateLimited,

    #[error("Timed out fetching metrics")]
    Timeout,

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Post is private: {0}")]
    Private(String),

    #[error("Metrics provider unavailable: {0}")]
    Unavailable(String),
}

impl MetricsError {
    /// Whether retrying later might succeed.
    ///
    /// Rate limits, timeouts and provider outages are transient; a missing
    /// or private post is permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MetricsError::RateLimited | MetricsError::Timeout | MetricsError::Unavailable(_)
        )
    }
}

/// Interface for fetching engagement counts of a published post.
///
/// Implementations:
/// - `HttpMetricsProvider`: JSON-over-HTTP provider with bounded retries
/// - `MockMetricsProvider`: Scripted responses for testing
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Fetch current counts for `post_ref`.
    async fn fetch(&self, post_ref: &str) -> Result<PostMetrics, MetricsError>;
}
