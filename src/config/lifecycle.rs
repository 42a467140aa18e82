//! Lifecycle controller configuration.
//!
//! Timing and thresholds for the lock and distribute phases.

use std::time::Duration;

use serde::Deserialize;

/// Default delay between a campaign's end date and its distribution (2 hours).
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 2 * 60 * 60;
/// Default number of metrics fetches in flight during a lock.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 50;
/// Failure rate above which a lock is released and retried.
pub const DEFAULT_RETRY_FAILURE_THRESHOLD: f64 = 0.20;
/// RETRY audit entries after which a lock proceeds with partial data.
pub const DEFAULT_MAX_LOCK_RETRIES: usize = 3;
/// Default settlement transaction timeout.
pub const DEFAULT_SETTLEMENT_TIMEOUT_SECS: u64 = 30;
/// Default per-fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
/// Default wait for outstanding audit writes at the end of a tick.
pub const DEFAULT_AUDIT_FLUSH_TIMEOUT_SECS: u64 = 5;

/// Lifecycle controller configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Seconds after `end_date` before a locked campaign is distributed.
    pub grace_period_secs: u64,
    /// Maximum concurrent metrics fetches.
    pub fetch_concurrency: usize,
    /// Failure rate (0.0-1.0) that triggers a lock retry.
    pub retry_failure_threshold: f64,
    /// Maximum lock retries before proceeding with partial metrics.
    pub max_lock_retries: usize,
    /// Upper bound on a settlement transaction.
    pub settlement_timeout_secs: u64,
    /// Upper bound on a single metrics fetch.
    pub fetch_timeout_secs: u64,
    /// Upper bound on waiting for audit writes.
    pub audit_flush_timeout_secs: u64,
}

impl LifecycleConfig {
    pub fn grace_period(&self) -> chrono::Duration {
        i64::try_from(self.grace_period_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn settlement_timeout(&self) -> Duration {
        Duration::from_secs(self.settlement_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn audit_flush_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_flush_timeout_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            retry_failure_threshold: DEFAULT_RETRY_FAILURE_THRESHOLD,
            max_lock_retries: DEFAULT_MAX_LOCK_RETRIES,
            settlement_timeout_secs: DEFAULT_SETTLEMENT_TIMEOUT_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            audit_flush_timeout_secs: DEFAULT_AUDIT_FLUSH_TIMEOUT_SECS,
        }
    }
}
