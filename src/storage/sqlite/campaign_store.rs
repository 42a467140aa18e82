//! SQLite CampaignStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Expr, OnConflict, Order, Query, SelectStatement, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::ledger::{increment_balance, record_transaction};
use crate::calculation::ShareAllocation;
use crate::model::{
    Campaign, CampaignStatus, LedgerTransaction, Money, PayoutStatus, PostMetrics, Submission,
    SubmissionStatus,
};
use crate::storage::helpers::{
    counter_from_i64, counter_to_i64, format_timestamp, parse_optional_timestamp, parse_timestamp,
};
use crate::storage::schema::{
    Campaigns, LedgerTransactions, Submissions, Wallets, CREATE_CAMPAIGN_TABLES,
};
use crate::storage::{
    CampaignStore, MetricsUpdate, Result, SettlementCommit, SettlementPlanner, StorageError,
};

const CAMPAIGN_COLUMNS: [Campaigns; 11] = [
    Campaigns::Id,
    Campaigns::SponsorId,
    Campaigns::TotalBudget,
    Campaigns::CommissionPercent,
    Campaigns::Status,
    Campaigns::PayoutStatus,
    Campaigns::LockedAt,
    Campaigns::EndDate,
    Campaigns::TotalViews,
    Campaigns::CompletedAt,
    Campaigns::InsuranceTriggered,
];

const SUBMISSION_COLUMNS: [Submissions; 13] = [
    Submissions::Id,
    Submissions::CampaignId,
    Submissions::CreatorId,
    Submissions::PostRef,
    Submissions::ViewCount,
    Submissions::LikeCount,
    Submissions::ShareCount,
    Submissions::CommentCount,
    Submissions::MetricsUpdatedAt,
    Submissions::Status,
    Submissions::SharePercent,
    Submissions::EstimatedEarnings,
    Submissions::FinalEarnings,
];

/// SQLite implementation of CampaignStore.
pub struct SqliteCampaignStore {
    pool: SqlitePool,
}

impl SqliteCampaignStore {
    /// Create a new SQLite campaign store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_CAMPAIGN_TABLES).execute(&self.pool).await?;
        Ok(())
    }
}

fn select_campaigns() -> SelectStatement {
    Query::select()
        .columns(CAMPAIGN_COLUMNS)
        .from(Campaigns::Table)
        .to_owned()
}

fn select_submissions(campaign_id: Uuid) -> SelectStatement {
    Query::select()
        .columns(SUBMISSION_COLUMNS)
        .from(Submissions::Table)
        .and_where(Expr::col(Submissions::CampaignId).eq(campaign_id.to_string()))
        .order_by(Submissions::Id, Order::Asc)
        .to_owned()
}

fn campaign_from_row(row: &SqliteRow) -> Result<Campaign> {
    let commission: i64 = row.try_get("commission_percent")?;
    let commission_percent = u8::try_from(commission).map_err(|_| StorageError::Corrupt {
        table: "campaigns",
        message: format!("commission_percent out of range: {}", commission),
    })?;

    Ok(Campaign {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
        sponsor_id: Uuid::parse_str(&row.try_get::<String, _>("sponsor_id")?)?,
        total_budget: Money::from_minor(row.try_get("total_budget")?),
        commission_percent,
        status: row.try_get::<String, _>("status")?.parse()?,
        payout_status: row.try_get::<String, _>("payout_status")?.parse()?,
        locked_at: parse_optional_timestamp(row.try_get("locked_at")?)?,
        end_date: parse_timestamp(&row.try_get::<String, _>("end_date")?)?,
        total_views: counter_from_i64(row.try_get("total_views")?, "campaigns")?,
        completed_at: parse_optional_timestamp(row.try_get("completed_at")?)?,
        insurance_triggered: row.try_get("insurance_triggered")?,
    })
}

fn submission_from_row(row: &SqliteRow) -> Result<Submission> {
    let counter = |column: &str| -> Result<u64> {
        counter_from_i64(row.try_get(column)?, "submissions")
    };

    Ok(Submission {
        id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
        campaign_id: Uuid::parse_str(&row.try_get::<String, _>("campaign_id")?)?,
        creator_id: Uuid::parse_str(&row.try_get::<String, _>("creator_id")?)?,
        post_ref: row.try_get("post_ref")?,
        metrics: PostMetrics {
            view_count: counter("view_count")?,
            like_count: counter("like_count")?,
            share_count: counter("share_count")?,
            comment_count: counter("comment_count")?,
        },
        metrics_updated_at: parse_optional_timestamp(row.try_get("metrics_updated_at")?)?,
        status: row.try_get::<String, _>("status")?.parse()?,
        share_percent: row.try_get("share_percent")?,
        estimated_earnings: Money::from_minor(row.try_get("estimated_earnings")?),
        final_earnings: Money::from_minor(row.try_get("final_earnings")?),
    })
}

async fn load_campaign(conn: &mut SqliteConnection, campaign_id: Uuid) -> Result<Option<Campaign>> {
    let query = select_campaigns()
        .and_where(Expr::col(Campaigns::Id).eq(campaign_id.to_string()))
        .to_string(SqliteQueryBuilder);

    let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
    row.as_ref().map(campaign_from_row).transpose()
}

async fn load_submissions(
    conn: &mut SqliteConnection,
    campaign_id: Uuid,
    status: Option<SubmissionStatus>,
) -> Result<Vec<Submission>> {
    // The statement is not Send; render it before the first await.
    let query = {
        let mut select = select_submissions(campaign_id);
        if let Some(status) = status {
            select.and_where(Expr::col(Submissions::Status).eq(status.as_str()));
        }
        select.to_string(SqliteQueryBuilder)
    };

    let rows = sqlx::query(&query).fetch_all(&mut *conn).await?;
    rows.iter().map(submission_from_row).collect()
}

#[async_trait]
impl CampaignStore for SqliteCampaignStore {
    async fn put_campaign(&self, campaign: &Campaign) -> Result<()> {
        let query = Query::insert()
            .into_table(Campaigns::Table)
            .columns(CAMPAIGN_COLUMNS)
            .values_panic([
                campaign.id.to_string().into(),
                campaign.sponsor_id.to_string().into(),
                campaign.total_budget.minor().into(),
                i64::from(campaign.commission_percent).into(),
                campaign.status.as_str().into(),
                campaign.payout_status.as_str().into(),
                campaign.locked_at.map(format_timestamp).into(),
                format_timestamp(campaign.end_date).into(),
                counter_to_i64(campaign.total_views).into(),
                campaign.completed_at.map(format_timestamp).into(),
                campaign.insurance_triggered.into(),
            ])
            .on_conflict(
                OnConflict::column(Campaigns::Id)
                    .update_columns(CAMPAIGN_COLUMNS.into_iter().skip(1))
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn put_submission(&self, submission: &Submission) -> Result<()> {
        let query = Query::insert()
            .into_table(Submissions::Table)
            .columns(SUBMISSION_COLUMNS)
            .values_panic([
                submission.id.to_string().into(),
                submission.campaign_id.to_string().into(),
                submission.creator_id.to_string().into(),
                submission.post_ref.as_str().into(),
                counter_to_i64(submission.metrics.view_count).into(),
                counter_to_i64(submission.metrics.like_count).into(),
                counter_to_i64(submission.metrics.share_count).into(),
                counter_to_i64(submission.metrics.comment_count).into(),
                submission.metrics_updated_at.map(format_timestamp).into(),
                submission.status.as_str().into(),
                submission.share_percent.into(),
                submission.estimated_earnings.minor().into(),
                submission.final_earnings.minor().into(),
            ])
            .on_conflict(
                OnConflict::column(Submissions::Id)
                    .update_columns(SUBMISSION_COLUMNS.into_iter().skip(1))
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>> {
        let mut conn = self.pool.acquire().await?;
        load_campaign(&mut conn, campaign_id).await
    }

    async fn submissions(&self, campaign_id: Uuid) -> Result<Vec<Submission>> {
        let mut conn = self.pool.acquire().await?;
        load_submissions(&mut conn, campaign_id, None).await
    }

    async fn approved_submissions(&self, campaign_id: Uuid) -> Result<Vec<Submission>> {
        let mut conn = self.pool.acquire().await?;
        load_submissions(&mut conn, campaign_id, Some(SubmissionStatus::Approved)).await
    }

    async fn next_lock_candidate(&self, now: DateTime<Utc>) -> Result<Option<Campaign>> {
        let has_approved = Query::select()
            .expr(Expr::val(1))
            .from(Submissions::Table)
            .and_where(
                Expr::col((Submissions::Table, Submissions::CampaignId))
                    .equals((Campaigns::Table, Campaigns::Id)),
            )
            .and_where(
                Expr::col((Submissions::Table, Submissions::Status))
                    .eq(SubmissionStatus::Approved.as_str()),
            )
            .to_owned();

        let query = select_campaigns()
            .and_where(Expr::col(Campaigns::Status).eq(CampaignStatus::Active.as_str()))
            .and_where(Expr::col(Campaigns::LockedAt).is_null())
            .and_where(Expr::col(Campaigns::EndDate).lte(format_timestamp(now)))
            .and_where(Expr::exists(has_approved))
            .order_by(Campaigns::EndDate, Order::Asc)
            .limit(1)
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(campaign_from_row).transpose()
    }

    async fn try_lock(&self, campaign_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let query = Query::update()
            .table(Campaigns::Table)
            .value(Campaigns::LockedAt, format_timestamp(now))
            .and_where(Expr::col(Campaigns::Id).eq(campaign_id.to_string()))
            .and_where(Expr::col(Campaigns::LockedAt).is_null())
            .and_where(Expr::col(Campaigns::Status).eq(CampaignStatus::Active.as_str()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn unlock(&self, campaign_id: Uuid) -> Result<bool> {
        let query = Query::update()
            .table(Campaigns::Table)
            .value(Campaigns::LockedAt, Option::<String>::None)
            .and_where(Expr::col(Campaigns::Id).eq(campaign_id.to_string()))
            .and_where(Expr::col(Campaigns::LockedAt).is_not_null())
            .and_where(Expr::col(Campaigns::PayoutStatus).eq(PayoutStatus::Pending.as_str()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn next_distribute_candidate(
        &self,
        ended_before: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Option<Campaign>> {
        let query = {
            let mut select = select_campaigns();
            select
                .and_where(Expr::col(Campaigns::Status).eq(CampaignStatus::Active.as_str()))
                .and_where(Expr::col(Campaigns::PayoutStatus).eq(PayoutStatus::Pending.as_str()))
                .and_where(Expr::col(Campaigns::LockedAt).is_not_null())
                .and_where(Expr::col(Campaigns::EndDate).lte(format_timestamp(ended_before)));
            if let Some(excluded) = exclude {
                select.and_where(Expr::col(Campaigns::Id).ne(excluded.to_string()));
            }
            select
                .order_by(Campaigns::EndDate, Order::Asc)
                .limit(1)
                .to_string(SqliteQueryBuilder)
        };

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(campaign_from_row).transpose()
    }

    async fn record_metrics(&self, updates: &[MetricsUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for update in updates {
            let query = Query::update()
                .table(Submissions::Table)
                .value(Submissions::ViewCount, counter_to_i64(update.metrics.view_count))
                .value(Submissions::LikeCount, counter_to_i64(update.metrics.like_count))
                .value(Submissions::ShareCount, counter_to_i64(update.metrics.share_count))
                .value(
                    Submissions::CommentCount,
                    counter_to_i64(update.metrics.comment_count),
                )
                .value(Submissions::MetricsUpdatedAt, format_timestamp(update.fetched_at))
                .and_where(Expr::col(Submissions::Id).eq(update.submission_id.to_string()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&query).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_estimates(
        &self,
        campaign_id: Uuid,
        total_views: u64,
        estimates: &[ShareAllocation],
    ) -> Result<bool> {
        let campaign_key = campaign_id.to_string();
        let mut tx = self.pool.begin().await?;

        let query = Query::update()
            .table(Campaigns::Table)
            .value(Campaigns::TotalViews, counter_to_i64(total_views))
            .and_where(Expr::col(Campaigns::Id).eq(campaign_key.as_str()))
            .and_where(Expr::col(Campaigns::PayoutStatus).eq(PayoutStatus::Pending.as_str()))
            .to_string(SqliteQueryBuilder);
        let result = sqlx::query(&query).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return match load_campaign(&mut tx, campaign_id).await? {
                Some(_) => Ok(false),
                None => Err(StorageError::CampaignNotFound(campaign_id)),
            };
        }

        for estimate in estimates {
            let query = Query::update()
                .table(Submissions::Table)
                .value(Submissions::SharePercent, estimate.share_percent)
                .value(Submissions::EstimatedEarnings, estimate.earnings.minor())
                .and_where(Expr::col(Submissions::Id).eq(estimate.id.to_string()))
                .and_where(Expr::col(Submissions::CampaignId).eq(campaign_key.as_str()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&query).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn settle(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
        planner: &SettlementPlanner,
    ) -> Result<SettlementCommit> {
        let campaign_key = campaign_id.to_string();
        let mut tx = self.pool.begin().await?;

        // Claim the payout first so the transaction holds the write lock
        // before anything is read.
        let claim = Query::update()
            .table(Campaigns::Table)
            .value(Campaigns::PayoutStatus, PayoutStatus::Completed.as_str())
            .value(Campaigns::Status, CampaignStatus::Completed.as_str())
            .value(Campaigns::CompletedAt, format_timestamp(now))
            .and_where(Expr::col(Campaigns::Id).eq(campaign_key.as_str()))
            .and_where(Expr::col(Campaigns::PayoutStatus).eq(PayoutStatus::Pending.as_str()))
            .and_where(Expr::col(Campaigns::Status).eq(CampaignStatus::Active.as_str()))
            .and_where(Expr::col(Campaigns::LockedAt).is_not_null())
            .to_string(SqliteQueryBuilder);
        let claimed = sqlx::query(&claim).execute(&mut *tx).await?.rows_affected() == 1;

        let campaign = load_campaign(&mut tx, campaign_id)
            .await?
            .ok_or(StorageError::CampaignNotFound(campaign_id))?;
        if !claimed {
            return match campaign.payout_status {
                PayoutStatus::Completed => Ok(SettlementCommit::AlreadyProcessed),
                PayoutStatus::Pending => Err(StorageError::NotSettleable(campaign_id)),
            };
        }

        let approved =
            load_submissions(&mut tx, campaign_id, Some(SubmissionStatus::Approved)).await?;
        let plan = planner(&campaign, &approved);

        let query = Query::update()
            .table(Campaigns::Table)
            .value(Campaigns::TotalViews, counter_to_i64(plan.total_views))
            .value(Campaigns::InsuranceTriggered, plan.insurance_triggered)
            .and_where(Expr::col(Campaigns::Id).eq(campaign_key.as_str()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut *tx).await?;

        for settled in &plan.submissions {
            let query = Query::update()
                .table(Submissions::Table)
                .value(Submissions::SharePercent, settled.share_percent)
                .value(Submissions::EstimatedEarnings, settled.earnings.minor())
                .value(
                    Submissions::FinalEarnings,
                    Expr::col(Submissions::FinalEarnings).add(settled.earnings.minor()),
                )
                .and_where(Expr::col(Submissions::Id).eq(settled.submission_id.to_string()))
                .and_where(Expr::col(Submissions::CampaignId).eq(campaign_key.as_str()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&query).execute(&mut *tx).await?;
        }

        for credit in &plan.credits {
            increment_balance(&mut tx, credit.user_id, credit.amount, now).await?;
            record_transaction(
                &mut tx,
                credit.user_id,
                credit.kind,
                credit.amount,
                &credit.description,
                &credit.reference,
                now,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(SettlementCommit::Committed(plan))
    }

    async fn wallet_balance(&self, user_id: Uuid) -> Result<Money> {
        let query = Query::select()
            .column(Wallets::Balance)
            .from(Wallets::Table)
            .and_where(Expr::col(Wallets::UserId).eq(user_id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Money::from_minor(row.try_get("balance")?)),
            None => Ok(Money::ZERO),
        }
    }

    async fn transactions(&self, user_id: Uuid) -> Result<Vec<LedgerTransaction>> {
        let query = Query::select()
            .columns([
                LedgerTransactions::Id,
                LedgerTransactions::UserId,
                LedgerTransactions::Kind,
                LedgerTransactions::Amount,
                LedgerTransactions::Description,
                LedgerTransactions::Reference,
                LedgerTransactions::CreatedAt,
            ])
            .from(LedgerTransactions::Table)
            .and_where(Expr::col(LedgerTransactions::UserId).eq(user_id.to_string()))
            .order_by(LedgerTransactions::CreatedAt, Order::Asc)
            .order_by_expr(Expr::cust("rowid"), Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<LedgerTransaction> {
                Ok(LedgerTransaction {
                    id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
                    user_id: Uuid::parse_str(&row.try_get::<String, _>("user_id")?)?,
                    kind: row.try_get::<String, _>("kind")?.parse()?,
                    amount: Money::from_minor(row.try_get("amount")?),
                    description: row.try_get("description")?,
                    reference: row.try_get("reference")?,
                    created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }
}
