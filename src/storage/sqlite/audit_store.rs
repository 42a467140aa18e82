//! SQLite AuditStore implementation.

use async_trait::async_trait;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::model::{AuditEntry, AuditOutcome, AuditPhase};
use crate::storage::helpers::{format_timestamp, parse_timestamp};
use crate::storage::schema::{AuditEntries, CREATE_AUDIT_TABLE};
use crate::storage::{AuditStore, Result};

/// SQLite implementation of AuditStore.
pub struct SqliteAuditStore {
    pool: SqlitePool,
}

impl SqliteAuditStore {
    /// Create a new SQLite audit store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_AUDIT_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let snapshot = serde_json::to_string(&entry.snapshot)?;

        let query = Query::insert()
            .into_table(AuditEntries::Table)
            .columns([
                AuditEntries::Id,
                AuditEntries::CampaignId,
                AuditEntries::Phase,
                AuditEntries::Outcome,
                AuditEntries::Snapshot,
                AuditEntries::CreatedAt,
            ])
            .values_panic([
                entry.id.to_string().into(),
                entry.campaign_id.to_string().into(),
                entry.phase.as_str().into(),
                entry.outcome.as_str().into(),
                snapshot.into(),
                format_timestamp(entry.created_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn count(
        &self,
        campaign_id: Uuid,
        phase: AuditPhase,
        outcome: AuditOutcome,
    ) -> Result<usize> {
        let query = Query::select()
            .expr(Expr::col(AuditEntries::Id).count())
            .from(AuditEntries::Table)
            .and_where(Expr::col(AuditEntries::CampaignId).eq(campaign_id.to_string()))
            .and_where(Expr::col(AuditEntries::Phase).eq(phase.as_str()))
            .and_where(Expr::col(AuditEntries::Outcome).eq(outcome.as_str()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get(0)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn entries(&self, campaign_id: Uuid) -> Result<Vec<AuditEntry>> {
        let query = Query::select()
            .columns([
                AuditEntries::Id,
                AuditEntries::CampaignId,
                AuditEntries::Phase,
                AuditEntries::Outcome,
                AuditEntries::Snapshot,
                AuditEntries::CreatedAt,
            ])
            .from(AuditEntries::Table)
            .and_where(Expr::col(AuditEntries::CampaignId).eq(campaign_id.to_string()))
            .order_by(AuditEntries::CreatedAt, Order::Asc)
            .order_by_expr(Expr::cust("rowid"), Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<AuditEntry> {
                Ok(AuditEntry {
                    id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
                    campaign_id: Uuid::parse_str(&row.try_get::<String, _>("campaign_id")?)?,
                    phase: row.try_get::<String, _>("phase")?.parse()?,
                    outcome: row.try_get::<String, _>("outcome")?.parse()?,
                    snapshot: serde_json::from_str(&row.try_get::<String, _>("snapshot")?)?,
                    created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }
}
