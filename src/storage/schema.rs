//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Campaigns table schema.
#[derive(Iden)]
pub enum Campaigns {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "sponsor_id"]
    SponsorId,
    #[iden = "total_budget"]
    TotalBudget,
    #[iden = "commission_percent"]
    CommissionPercent,
    #[iden = "status"]
    Status,
    #[iden = "payout_status"]
    PayoutStatus,
    #[iden = "locked_at"]
    LockedAt,
    #[iden = "end_date"]
    EndDate,
    #[iden = "total_views"]
    TotalViews,
    #[iden = "completed_at"]
    CompletedAt,
    #[iden = "insurance_triggered"]
    InsuranceTriggered,
}

/// Submissions table schema.
#[derive(Iden)]
pub enum Submissions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "campaign_id"]
    CampaignId,
    #[iden = "creator_id"]
    CreatorId,
    #[iden = "post_ref"]
    PostRef,
    #[iden = "view_count"]
    ViewCount,
    #[iden = "like_count"]
    LikeCount,
    #[iden = "share_count"]
    ShareCount,
    #[iden = "comment_count"]
    CommentCount,
    #[iden = "metrics_updated_at"]
    MetricsUpdatedAt,
    #[iden = "status"]
    Status,
    #[iden = "share_percent"]
    SharePercent,
    #[iden = "estimated_earnings"]
    EstimatedEarnings,
    #[iden = "final_earnings"]
    FinalEarnings,
}

/// Wallets table schema.
#[derive(Iden)]
pub enum Wallets {
    Table,
    #[iden = "user_id"]
    UserId,
    #[iden = "balance"]
    Balance,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Ledger transactions table schema.
#[derive(Iden)]
pub enum LedgerTransactions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "user_id"]
    UserId,
    #[iden = "kind"]
    Kind,
    #[iden = "amount"]
    Amount,
    #[iden = "description"]
    Description,
    #[iden = "reference"]
    Reference,
    #[iden = "created_at"]
    CreatedAt,
}

/// Lifecycle audit table schema.
#[derive(Iden)]
pub enum AuditEntries {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "campaign_id"]
    CampaignId,
    #[iden = "phase"]
    Phase,
    #[iden = "outcome"]
    Outcome,
    #[iden = "snapshot"]
    Snapshot,
    #[iden = "created_at"]
    CreatedAt,
}

/// SQL for creating the campaign, submission and wallet tables.
pub const CREATE_CAMPAIGN_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS campaigns (
    id TEXT PRIMARY KEY NOT NULL,
    sponsor_id TEXT NOT NULL,
    total_budget INTEGER NOT NULL,
    commission_percent INTEGER NOT NULL,
    status TEXT NOT NULL,
    payout_status TEXT NOT NULL DEFAULT 'PENDING',
    locked_at TEXT,
    end_date TEXT NOT NULL,
    total_views INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT,
    insurance_triggered INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_campaigns_lifecycle ON campaigns(status, payout_status, end_date);

CREATE TABLE IF NOT EXISTS submissions (
    id TEXT PRIMARY KEY NOT NULL,
    campaign_id TEXT NOT NULL REFERENCES campaigns(id),
    creator_id TEXT NOT NULL,
    post_ref TEXT NOT NULL,
    view_count INTEGER NOT NULL DEFAULT 0,
    like_count INTEGER NOT NULL DEFAULT 0,
    share_count INTEGER NOT NULL DEFAULT 0,
    comment_count INTEGER NOT NULL DEFAULT 0,
    metrics_updated_at TEXT,
    status TEXT NOT NULL,
    share_percent REAL NOT NULL DEFAULT 0,
    estimated_earnings INTEGER NOT NULL DEFAULT 0,
    final_earnings INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_submissions_campaign ON submissions(campaign_id, status);

CREATE TABLE IF NOT EXISTS wallets (
    user_id TEXT PRIMARY KEY NOT NULL,
    balance INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ledger_transactions (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    amount INTEGER NOT NULL,
    description TEXT NOT NULL,
    reference TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_user ON ledger_transactions(user_id, created_at);
"#;

/// SQL for creating the audit table.
pub const CREATE_AUDIT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS audit_entries (
    id TEXT PRIMARY KEY NOT NULL,
    campaign_id TEXT NOT NULL,
    phase TEXT NOT NULL,
    outcome TEXT NOT NULL,
    snapshot TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_campaign ON audit_entries(campaign_id, phase, outcome);
"#;
