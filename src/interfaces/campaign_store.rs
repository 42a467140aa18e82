//! Campaign storage interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::calculation::{settlement::SettlementPlan, ShareAllocation};
use crate::model::{Campaign, LedgerTransaction, Money, PostMetrics, Submission, UnknownVariant};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(Uuid),

    #[error("Campaign {0} is not locked and active; it cannot be settled")]
    NotSettleable(Uuid),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(#[from] UnknownVariant),

    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fresh metrics for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsUpdate {
    pub submission_id: Uuid,
    pub metrics: PostMetrics,
    pub fetched_at: DateTime<Utc>,
}

/// Builds the settlement plan from the campaign and its approved submissions,
/// as read inside the settlement transaction.
pub type SettlementPlanner = dyn Fn(&Campaign, &[Submission]) -> SettlementPlan + Send + Sync;

/// What a settlement call did.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementCommit {
    /// The plan was applied and committed.
    Committed(SettlementPlan),
    /// Payout was already completed; nothing was written.
    AlreadyProcessed,
}

/// Interface for campaign, submission and wallet persistence.
///
/// The lock flag is changed only through conditional updates, and wallet
/// balances and ledger transactions are written only by [`settle`], inside
/// the same transaction that completes the campaign.
///
/// Implementations:
/// - `SqliteCampaignStore`: SQLite storage
/// - `MockCampaignStore`: In-memory mock for testing
///
/// [`settle`]: CampaignStore::settle
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Insert or replace a campaign (intake and tests).
    async fn put_campaign(&self, campaign: &Campaign) -> Result<()>;

    /// Insert or replace a submission (intake and tests).
    async fn put_submission(&self, submission: &Submission) -> Result<()>;

    /// Load a campaign by id.
    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>>;

    /// All submissions of a campaign, any status.
    async fn submissions(&self, campaign_id: Uuid) -> Result<Vec<Submission>>;

    /// APPROVED submissions of a campaign.
    async fn approved_submissions(&self, campaign_id: Uuid) -> Result<Vec<Submission>>;

    /// Earliest-ending unlocked ACTIVE campaign whose end date is at or
    /// before `now` and that has at least one approved submission.
    async fn next_lock_candidate(&self, now: DateTime<Utc>) -> Result<Option<Campaign>>;

    /// Set `locked_at` only if it is currently NULL and the campaign is
    /// ACTIVE. Returns whether this call took the lock.
    async fn try_lock(&self, campaign_id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Clear `locked_at` on a campaign whose payout is still pending.
    /// Returns whether a lock was released.
    async fn unlock(&self, campaign_id: Uuid) -> Result<bool>;

    /// Earliest-ending locked ACTIVE campaign with a pending payout whose end
    /// date is at or before `ended_before`, skipping `exclude`.
    async fn next_distribute_candidate(
        &self,
        ended_before: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Option<Campaign>>;

    /// Overwrite view/like/share/comment counts for the given submissions.
    async fn record_metrics(&self, updates: &[MetricsUpdate]) -> Result<()>;

    /// Store the cached view total and per-submission estimates.
    ///
    /// Overwrites `share_percent` and `estimated_earnings`; never touches
    /// final earnings or wallets. The write happens only while the payout is
    /// still pending, checked in the same transaction. Returns `false` when
    /// the campaign was already settled and nothing was written.
    async fn save_estimates(
        &self,
        campaign_id: Uuid,
        total_views: u64,
        estimates: &[ShareAllocation],
    ) -> Result<bool>;

    /// Settle a campaign atomically.
    ///
    /// Inside one transaction: claim the payout of a locked ACTIVE campaign
    /// whose payout is pending. If nothing was claimed, error if the campaign
    /// is missing, return `AlreadyProcessed` if its payout is completed, and
    /// fail with [`StorageError::NotSettleable`] otherwise. After a claim, load
    /// the approved submissions, build the plan with `planner`, mark the campaign
    /// COMPLETED, apply submission results, and credit wallets with one
    /// ledger transaction per credit. Any failure rolls everything back.
    async fn settle(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
        planner: &SettlementPlanner,
    ) -> Result<SettlementCommit>;

    /// Current wallet balance (zero if the user has no wallet yet).
    async fn wallet_balance(&self, user_id: Uuid) -> Result<Money>;

    /// Ledger transactions of a user, oldest first.
    async fn transactions(&self, user_id: Uuid) -> Result<Vec<LedgerTransaction>>;
}
