//! Lifecycle audit storage interface.

use async_trait::async_trait;
use uuid::Uuid;

use super::campaign_store::Result;
use crate::model::{AuditEntry, AuditOutcome, AuditPhase};

/// Interface for the append-only lifecycle audit log.
///
/// The log doubles as the retry counter for the lock phase: the number of
/// `(Lock, Retry)` entries for a campaign is its retry count.
///
/// Implementations:
/// - `SqliteAuditStore`: SQLite storage
/// - `MockAuditStore`: In-memory mock for testing
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an entry.
    async fn append(&self, entry: &AuditEntry) -> Result<()>;

    /// Count entries for a campaign with the given phase and outcome.
    async fn count(&self, campaign_id: Uuid, phase: AuditPhase, outcome: AuditOutcome)
        -> Result<usize>;

    /// All entries for a campaign, oldest first.
    async fn entries(&self, campaign_id: Uuid) -> Result<Vec<AuditEntry>>;
}
