//! SQLite implementations of storage interfaces.

mod audit_store;
mod campaign_store;
mod ledger;

pub use audit_store::SqliteAuditStore;
pub use campaign_store::SqliteCampaignStore;
