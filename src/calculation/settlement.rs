//! Final settlement planning.
//!
//! Turns a campaign and its approved submissions into the complete set of
//! writes a settlement must apply: per-submission shares and earnings, the
//! wallet credits (each paired with one ledger transaction), and the outcome
//! to report. Storage applies a plan inside one transaction.

use serde::Serialize;
use uuid::Uuid;

use super::{
    check_insurance, compute_capped_shares, filter_eligible, net_budget, total_views,
    InsuranceFailure, Participant,
};
use crate::model::{AuditOutcome, Campaign, Money, Submission, TransactionType};

/// Final share and earnings for one approved submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSettlement {
    pub submission_id: Uuid,
    pub creator_id: Uuid,
    pub share_percent: f64,
    pub earnings: Money,
}

/// A wallet balance increment and the ledger transaction recording it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCredit {
    pub user_id: Uuid,
    pub kind: TransactionType,
    pub amount: Money,
    pub description: String,
    pub reference: String,
}

/// How a final settlement resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionOutcome {
    #[serde(rename_all = "camelCase")]
    Distributed {
        participants: usize,
        eligible: usize,
        total_views: u64,
        net_budget: Money,
        distributed: Money,
        undistributed: Money,
    },
    #[serde(rename_all = "camelCase")]
    InsuranceRefund {
        failed_checks: Vec<InsuranceFailure>,
        refunded: Money,
    },
    #[serde(rename_all = "camelCase")]
    InsuranceRefundNoEligible { refunded: Money },
    AlreadyProcessed,
}

impl DistributionOutcome {
    pub fn audit_outcome(&self) -> AuditOutcome {
        match self {
            Self::Distributed { .. } => AuditOutcome::Distributed,
            Self::InsuranceRefund { .. } => AuditOutcome::InsuranceRefund,
            Self::InsuranceRefundNoEligible { .. } => AuditOutcome::InsuranceRefundNoEligible,
            Self::AlreadyProcessed => AuditOutcome::AlreadyProcessed,
        }
    }
}

/// Everything a committed settlement writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementPlan {
    /// Views across all approved submissions, cached on the campaign.
    pub total_views: u64,
    pub insurance_triggered: bool,
    /// One entry per approved submission.
    pub submissions: Vec<SubmissionSettlement>,
    pub credits: Vec<WalletCredit>,
    pub outcome: DistributionOutcome,
}

/// Ledger reference for a campaign-level transaction.
pub fn campaign_reference(campaign_id: Uuid) -> String {
    format!("campaign:{}", campaign_id)
}

/// Ledger reference for a creator payout.
pub fn submission_reference(campaign_id: Uuid, submission_id: Uuid) -> String {
    format!("campaign:{}/submission:{}", campaign_id, submission_id)
}

/// Plan the authoritative settlement of a campaign.
///
/// Insurance check, then eligibility filter, then capped redistribution.
/// A failed insurance check or an empty eligible set refunds the entire net
/// budget to the sponsor and settles every submission at zero.
pub fn plan_final_distribution(campaign: &Campaign, submissions: &[Submission]) -> SettlementPlan {
    let approved: Vec<&Submission> = submissions.iter().filter(|s| s.is_approved()).collect();
    let participants: Vec<Participant> = approved.iter().map(|s| Participant::from(*s)).collect();
    let views = total_views(&participants);
    let net = net_budget(campaign.total_budget, campaign.commission_percent);

    let insurance = check_insurance(campaign.total_budget, approved.len(), views);
    if !insurance.passed {
        return refund_plan(
            campaign,
            &approved,
            views,
            net,
            DistributionOutcome::InsuranceRefund {
                failed_checks: insurance.failed_checks,
                refunded: net,
            },
        );
    }

    let eligible = filter_eligible(&participants, views);
    if eligible.is_empty() {
        return refund_plan(
            campaign,
            &approved,
            views,
            net,
            DistributionOutcome::InsuranceRefundNoEligible { refunded: net },
        );
    }

    let distribution = compute_capped_shares(&eligible, total_views(&eligible), net);

    let settlements: Vec<SubmissionSettlement> = approved
        .iter()
        .map(|s| {
            let (share_percent, earnings) = distribution
                .allocation(s.id)
                .map(|a| (a.share_percent, a.earnings))
                .unwrap_or((0.0, Money::ZERO));
            SubmissionSettlement {
                submission_id: s.id,
                creator_id: s.creator_id,
                share_percent,
                earnings,
            }
        })
        .collect();

    let credits = settlements
        .iter()
        .filter(|s| s.earnings.is_positive())
        .map(|s| WalletCredit {
            user_id: s.creator_id,
            kind: TransactionType::Earning,
            amount: s.earnings,
            description: format!(
                "Campaign payout ({:.2}% share)",
                s.share_percent * 100.0
            ),
            reference: submission_reference(campaign.id, s.submission_id),
        })
        .collect();

    SettlementPlan {
        total_views: views,
        insurance_triggered: false,
        submissions: settlements,
        credits,
        outcome: DistributionOutcome::Distributed {
            participants: approved.len(),
            eligible: eligible.len(),
            total_views: views,
            net_budget: net,
            distributed: distribution.distributed,
            undistributed: distribution.undistributed,
        },
    }
}

fn refund_plan(
    campaign: &Campaign,
    approved: &[&Submission],
    views: u64,
    net: Money,
    outcome: DistributionOutcome,
) -> SettlementPlan {
    let credits = if net.is_positive() {
        vec![WalletCredit {
            user_id: campaign.sponsor_id,
            kind: TransactionType::Deposit,
            amount: net,
            description: "Insurance refund of campaign net budget".to_string(),
            reference: campaign_reference(campaign.id),
        }]
    } else {
        Vec::new()
    };

    SettlementPlan {
        total_views: views,
        insurance_triggered: true,
        submissions: approved
            .iter()
            .map(|s| SubmissionSettlement {
                submission_id: s.id,
                creator_id: s.creator_id,
                share_percent: 0.0,
                earnings: Money::ZERO,
            })
            .collect(),
        credits,
        outcome,
    }
}
