//! Domain records for campaigns, submissions, wallets and the lifecycle audit.

mod money;

pub use money::{Money, MINOR_UNITS_PER_MAJOR};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when a stored enum column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum stored
/// as an upper-case text column.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    PendingApproval,
    Active,
    Paused,
    Completed,
    Cancelled,
    Rejected,
}

text_enum!(CampaignStatus, "campaign status", {
    PendingApproval => "PENDING_APPROVAL",
    Active => "ACTIVE",
    Paused => "PAUSED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
    Rejected => "REJECTED",
});

/// Whether the campaign budget has been settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Pending,
    Completed,
}

text_enum!(PayoutStatus, "payout status", {
    Pending => "PENDING",
    Completed => "COMPLETED",
});

/// Review state of a creator submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(SubmissionStatus, "submission status", {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
});

/// Kind of wallet balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Creator payout from a distributed campaign.
    Earning,
    /// Sponsor refund from an insurance-triggered campaign.
    Deposit,
}

text_enum!(TransactionType, "transaction type", {
    Earning => "EARNING",
    Deposit => "DEPOSIT",
});

/// Scheduled step an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditPhase {
    Lock,
    Distribute,
}

text_enum!(AuditPhase, "audit phase", {
    Lock => "LOCK",
    Distribute => "DISTRIBUTE",
});

/// Outcome classification of a lifecycle attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Partial,
    Failed,
    Retry,
    Distributed,
    InsuranceRefund,
    InsuranceRefundNoEligible,
    AlreadyProcessed,
    Error,
}

text_enum!(AuditOutcome, "audit outcome", {
    Success => "SUCCESS",
    Partial => "PARTIAL",
    Failed => "FAILED",
    Retry => "RETRY",
    Distributed => "DISTRIBUTED",
    InsuranceRefund => "INSURANCE_REFUND",
    InsuranceRefundNoEligible => "INSURANCE_REFUND_NO_ELIGIBLE",
    AlreadyProcessed => "ALREADY_PROCESSED",
    Error => "ERROR",
});

/// A funded promotional offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub sponsor_id: Uuid,
    pub total_budget: Money,
    /// Platform commission, 0-100.
    pub commission_percent: u8,
    pub status: CampaignStatus,
    pub payout_status: PayoutStatus,
    /// Start of the lock phase; submission intake is closed once set.
    pub locked_at: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
    /// Cached sum of approved submission views.
    pub total_views: u64,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when the campaign settled through an insurance refund.
    pub insurance_triggered: bool,
}

impl Campaign {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }
}

/// Engagement counters for a published post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMetrics {
    pub view_count: u64,
    pub like_count: u64,
    pub share_count: u64,
    pub comment_count: u64,
}

/// One creator's proof-of-work entry in a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub creator_id: Uuid,
    /// Reference handed to the metrics provider (post URL).
    pub post_ref: String,
    pub metrics: PostMetrics,
    pub metrics_updated_at: Option<DateTime<Utc>>,
    pub status: SubmissionStatus,
    /// Share of the eligible pool, 0.0-1.0.
    pub share_percent: f64,
    /// Live, non-authoritative projection.
    pub estimated_earnings: Money,
    /// Authoritative payout, written once by final settlement.
    pub final_earnings: Money,
}

impl Submission {
    pub fn is_approved(&self) -> bool {
        self.status == SubmissionStatus::Approved
    }

    pub fn views(&self) -> u64 {
        self.metrics.view_count
    }
}

/// Immutable record of a wallet balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionType,
    pub amount: Money,
    pub description: String,
    /// Campaign or submission the transaction settles.
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of a lock or distribute attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub phase: AuditPhase,
    pub outcome: AuditOutcome,
    pub snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        campaign_id: Uuid,
        phase: AuditPhase,
        outcome: AuditOutcome,
        snapshot: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            phase,
            outcome,
            snapshot,
            created_at: Utc::now(),
        }
    }
}
