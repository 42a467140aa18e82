//! Mock storage implementations for testing.

mod audit_store;
mod campaign_store;

pub use audit_store::MockAuditStore;
pub use campaign_store::MockCampaignStore;

/// Error returned by a mock when failure injection is switched on.
fn injected_failure() -> super::StorageError {
    super::StorageError::Database(sqlx::Error::PoolTimedOut)
}
