//! Abstract interfaces for payout engine components.
//!
//! These traits define the contracts for:
//! - Campaign and wallet storage (lock flag, estimates, atomic settlement)
//! - Lifecycle audit storage (append-only, retry counting)
//! - Metrics provider (engagement counts for a published post)

pub mod audit_store;
pub mod campaign_store;
pub mod metrics_provider;

pub use audit_store::AuditStore;
pub use campaign_store::{
    CampaignStore, MetricsUpdate, Result, SettlementCommit, SettlementPlanner, StorageError,
};
pub use metrics_provider::{MetricsError, MetricsProvider};
