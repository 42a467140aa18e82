//! Storage implementations.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use crate::config::StorageConfig;

pub mod helpers;
pub mod mock;
pub mod schema;
pub mod sqlite;

pub use crate::interfaces::{
    AuditStore, CampaignStore, MetricsUpdate, Result, SettlementCommit, SettlementPlanner,
    StorageError,
};
pub use sqlite::{SqliteAuditStore, SqliteCampaignStore};

/// Initialize storage based on configuration.
///
/// Returns the campaign store and the audit store, both backed by the same
/// SQLite pool, with their schemas created.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<(Arc<dyn CampaignStore>, Arc<dyn AuditStore>), Box<dyn std::error::Error>>
{
    info!(path = %config.path, "Storage: sqlite");

    if config.path != ":memory:" {
        if let Some(parent) = std::path::Path::new(&config.path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout());

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    let campaign_store = Arc::new(SqliteCampaignStore::new(pool.clone()));
    campaign_store.init().await?;

    let audit_store = Arc::new(SqliteAuditStore::new(pool));
    audit_store.init().await?;

    Ok((campaign_store, audit_store))
}
