//! Mock AuditStore implementation for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::injected_failure;
use crate::model::{AuditEntry, AuditOutcome, AuditPhase};
use crate::storage::{AuditStore, Result};

/// Mock audit store that keeps entries in memory.
#[derive(Default)]
pub struct MockAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
    fail_on_append: RwLock<bool>,
    fail_on_count: RwLock<bool>,
}

impl MockAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_append(&self, fail: bool) {
        *self.fail_on_append.write().await = fail;
    }

    pub async fn set_fail_on_count(&self, fail: bool) {
        *self.fail_on_count.write().await = fail;
    }

    /// Every entry across all campaigns, in append order.
    pub async fn all(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditStore for MockAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        if *self.fail_on_append.read().await {
            return Err(injected_failure());
        }
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn count(
        &self,
        campaign_id: Uuid,
        phase: AuditPhase,
        outcome: AuditOutcome,
    ) -> Result<usize> {
        if *self.fail_on_count.read().await {
            return Err(injected_failure());
        }
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.campaign_id == campaign_id && e.phase == phase && e.outcome == outcome)
            .count())
    }

    async fn entries(&self, campaign_id: Uuid) -> Result<Vec<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|e| e.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}
