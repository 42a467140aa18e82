//! Bounded, failure-isolated metrics fan-out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::interfaces::{MetricsError, MetricsProvider};
use crate::model::{PostMetrics, Submission};
use crate::storage::MetricsUpdate;

/// Why a single fetch produced no metrics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Provider(#[from] MetricsError),

    /// The fetch task panicked or was cancelled.
    #[error("Fetch task aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Provider(e) => e.is_transient(),
            FetchError::Aborted(_) => true,
        }
    }
}

/// A submission whose metrics could not be fetched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFetch {
    pub submission_id: Uuid,
    pub error: String,
    pub transient: bool,
}

/// Outcome of refreshing a batch of submissions.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub transient_failures: usize,
    pub permanent_failures: usize,
    /// Transient failures over attempts. Permanent failures would not
    /// improve on retry, so they do not count here.
    pub failure_rate: f64,
    pub failures: Vec<FailedFetch>,
    #[serde(skip)]
    pub updates: Vec<MetricsUpdate>,
}

impl RefreshSummary {
    pub fn failed(&self) -> usize {
        self.transient_failures + self.permanent_failures
    }
}

/// Fetches metrics for many submissions, each on its own task, with at most
/// `concurrency` fetches in flight.
pub struct MetricsRefresher {
    provider: Arc<dyn MetricsProvider>,
    concurrency: usize,
    fetch_timeout: Duration,
}

impl MetricsRefresher {
    pub fn new(provider: Arc<dyn MetricsProvider>, concurrency: usize, fetch_timeout: Duration) -> Self {
        Self {
            provider,
            concurrency: concurrency.max(1),
            fetch_timeout,
        }
    }

    /// Fetch every submission's metrics. A failing or panicking fetch is
    /// counted and never cancels the others.
    pub async fn refresh(&self, submissions: &[Submission]) -> RefreshSummary {
        // Collected up front so the stream holds no borrowing closure and the
        // refresh future stays Send.
        let fetches: Vec<_> = submissions
            .iter()
            .map(|s| self.fetch_isolated(s.id, s.post_ref.clone()))
            .collect();
        let results: Vec<(Uuid, Result<PostMetrics, FetchError>)> = stream::iter(fetches)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = RefreshSummary {
            attempted: results.len(),
            ..Default::default()
        };

        for (submission_id, result) in results {
            match result {
                Ok(metrics) => {
                    summary.succeeded += 1;
                    summary.updates.push(MetricsUpdate {
                        submission_id,
                        metrics,
                        fetched_at: Utc::now(),
                    });
                }
                Err(e) => {
                    let transient = e.is_transient();
                    if transient {
                        summary.transient_failures += 1;
                    } else {
                        summary.permanent_failures += 1;
                    }
                    summary.failures.push(FailedFetch {
                        submission_id,
                        error: e.to_string(),
                        transient,
                    });
                }
            }
        }

        if summary.attempted > 0 {
            summary.failure_rate = summary.transient_failures as f64 / summary.attempted as f64;
        }

        debug!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            transient = summary.transient_failures,
            permanent = summary.permanent_failures,
            "Metrics refresh complete"
        );
        summary
    }

    async fn fetch_isolated(
        &self,
        submission_id: Uuid,
        post_ref: String,
    ) -> (Uuid, Result<PostMetrics, FetchError>) {
        let provider = Arc::clone(&self.provider);
        let fetch_timeout = self.fetch_timeout;

        let handle = tokio::spawn(async move {
            match tokio::time::timeout(fetch_timeout, provider.fetch(&post_ref)).await {
                Ok(result) => result,
                Err(_) => Err(MetricsError::Timeout),
            }
        });

        let result = match handle.await {
            Ok(result) => result.map_err(FetchError::from),
            Err(e) => {
                warn!(submission_id = %submission_id, error = %e, "Metrics fetch task aborted");
                Err(FetchError::Aborted(e.to_string()))
            }
        };
        (submission_id, result)
    }
}
