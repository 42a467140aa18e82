//! Best-effort lifecycle audit writes.
//!
//! Entries are appended on spawned tasks after the primary write commits;
//! a failed append is logged and dropped. `flush` waits for outstanding
//! appends so the next tick's retry count sees them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::{AuditEntry, AuditOutcome, AuditPhase};
use crate::storage::{AuditStore, Result};

/// Fire-and-forget front for an [`AuditStore`].
pub struct AuditSink {
    store: Arc<dyn AuditStore>,
    pending: Mutex<JoinSet<()>>,
}

impl AuditSink {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    /// Queue an append. Never blocks on the store and never fails.
    pub fn record(
        &self,
        campaign_id: Uuid,
        phase: AuditPhase,
        outcome: AuditOutcome,
        snapshot: serde_json::Value,
    ) {
        let entry = AuditEntry::new(campaign_id, phase, outcome, snapshot);
        let store = Arc::clone(&self.store);

        let task = async move {
            match store.append(&entry).await {
                Ok(()) => debug!(
                    campaign_id = %entry.campaign_id,
                    phase = %entry.phase,
                    outcome = %entry.outcome,
                    "Audit entry written"
                ),
                Err(e) => warn!(
                    campaign_id = %entry.campaign_id,
                    phase = %entry.phase,
                    outcome = %entry.outcome,
                    error = %e,
                    "Failed to write audit entry"
                ),
            }
        };

        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .spawn(task);
    }

    /// Wait up to `timeout` for queued appends. Appends still running
    /// afterwards are left to finish in the background.
    pub async fn flush(&self, timeout: Duration) {
        let mut pending = std::mem::take(
            &mut *self
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );

        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = pending.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Audit task did not complete");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(remaining = pending.len(), "Audit flush timed out");
            pending.detach_all();
        }
    }

    /// Number of lock-phase RETRY entries recorded for a campaign.
    pub async fn retry_count(&self, campaign_id: Uuid) -> Result<usize> {
        self.store
            .count(campaign_id, AuditPhase::Lock, AuditOutcome::Retry)
            .await
    }
}
