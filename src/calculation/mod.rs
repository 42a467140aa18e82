//! Pure payout calculations.
//!
//! Net budget, insurance thresholds, the eligibility filter, and the capped
//! redistribution ("Robin Hood cap") that splits a net budget across
//! participants by measured views. Nothing here performs I/O; the
//! recalculation service feeds these functions and persists the results.

pub mod settlement;

use serde::Serialize;
use uuid::Uuid;

use crate::model::{Money, Submission};

pub use settlement::{
    plan_final_distribution, DistributionOutcome, SettlementPlan, SubmissionSettlement,
    WalletCredit,
};

/// Minimum `views / total_views` a participant needs to share the pool (0.01%).
pub const ELIGIBILITY_MIN_SHARE: f64 = 0.0001;

/// Hard ceiling on any single participant's share.
pub const SHARE_CAP: f64 = 0.40;

/// Cap applied once `MAX_FULL_CAPS` participants already sit at `SHARE_CAP`.
pub const NEAR_CAP: f64 = 0.3999;

/// How many participants may sit at exactly `SHARE_CAP`.
pub const MAX_FULL_CAPS: usize = 2;

/// Distance from 1.0 at which the share sum counts as converged.
pub const CONVERGENCE_EPSILON: f64 = 0.0001;

/// Upper bound on redistribution passes.
pub const MAX_PASSES: usize = 10;

/// Budget remaining after the platform commission.
///
/// Commission above 100 is treated as 100.
pub fn net_budget(total_budget: Money, commission_percent: u8) -> Money {
    let keep = 100 - i128::from(commission_percent.min(100));
    let net = i128::from(total_budget.minor()) * keep / 100;
    Money::from_minor(net as i64)
}

/// Minimum campaign performance required for a normal distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceThresholds {
    pub min_submissions: usize,
    pub min_views: u64,
}

/// Budget brackets, largest first: (budget floor in major units, min submissions, min views).
const INSURANCE_BRACKETS: [(i64, usize, u64); 3] = [
    (100_000, 15, 1_500_000),
    (70_000, 8, 500_000),
    (40_000, 5, 200_000),
];

const BASE_BRACKET: InsuranceThresholds = InsuranceThresholds {
    min_submissions: 3,
    min_views: 50_000,
};

/// Look up the insurance thresholds for a campaign budget.
pub fn insurance_thresholds(total_budget: Money) -> InsuranceThresholds {
    INSURANCE_BRACKETS
        .iter()
        .find(|(floor, _, _)| total_budget >= Money::from_major(*floor))
        .map(|&(_, min_submissions, min_views)| InsuranceThresholds {
            min_submissions,
            min_views,
        })
        .unwrap_or(BASE_BRACKET)
}

/// A single unmet insurance threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "camelCase")]
pub enum InsuranceFailure {
    #[serde(rename_all = "camelCase")]
    Submissions { required: usize, actual: usize },
    #[serde(rename_all = "camelCase")]
    Views { required: u64, actual: u64 },
}

/// Result of evaluating a campaign against its insurance thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceCheck {
    pub passed: bool,
    pub thresholds: InsuranceThresholds,
    /// Every shortfall, not just the first.
    pub failed_checks: Vec<InsuranceFailure>,
}

/// Check submission count and view total against the budget bracket.
pub fn check_insurance(total_budget: Money, submission_count: usize, total_views: u64) -> InsuranceCheck {
    let thresholds = insurance_thresholds(total_budget);
    let mut failed_checks = Vec::new();

    if submission_count < thresholds.min_submissions {
        failed_checks.push(InsuranceFailure::Submissions {
            required: thresholds.min_submissions,
            actual: submission_count,
        });
    }
    if total_views < thresholds.min_views {
        failed_checks.push(InsuranceFailure::Views {
            required: thresholds.min_views,
            actual: total_views,
        });
    }

    InsuranceCheck {
        passed: failed_checks.is_empty(),
        thresholds,
        failed_checks,
    }
}

/// A submission reduced to what the split depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    pub id: Uuid,
    pub views: u64,
}

impl From<&Submission> for Participant {
    fn from(submission: &Submission) -> Self {
        Self {
            id: submission.id,
            views: submission.views(),
        }
    }
}

/// Sum of participant views.
pub fn total_views(participants: &[Participant]) -> u64 {
    participants.iter().map(|p| p.views).sum()
}

/// Keep participants holding at least `ELIGIBILITY_MIN_SHARE` of `total_views`.
///
/// A campaign with zero total views has no eligible participants.
pub fn filter_eligible(participants: &[Participant], total_views: u64) -> Vec<Participant> {
    if total_views == 0 {
        return Vec::new();
    }
    participants
        .iter()
        .filter(|p| p.views as f64 / total_views as f64 >= ELIGIBILITY_MIN_SHARE)
        .copied()
        .collect()
}

/// One participant's slice of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareAllocation {
    pub id: Uuid,
    pub share_percent: f64,
    pub earnings: Money,
}

/// Output of [`compute_capped_shares`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CappedDistribution {
    /// One allocation per input participant, in input order.
    pub allocations: Vec<ShareAllocation>,
    pub share_sum: f64,
    pub converged: bool,
    pub passes: usize,
    pub distributed: Money,
    /// Part of the net budget no participant received.
    pub undistributed: Money,
}

impl CappedDistribution {
    fn empty(participants: &[Participant], net_budget: Money) -> Self {
        Self {
            allocations: participants
                .iter()
                .map(|p| ShareAllocation {
                    id: p.id,
                    share_percent: 0.0,
                    earnings: Money::ZERO,
                })
                .collect(),
            share_sum: 0.0,
            converged: false,
            passes: 0,
            distributed: Money::ZERO,
            undistributed: net_budget,
        }
    }

    pub fn allocation(&self, id: Uuid) -> Option<&ShareAllocation> {
        self.allocations.iter().find(|a| a.id == id)
    }
}

/// Split `net_budget` by views with the Robin Hood cap.
///
/// Shares start at `views / total_views`. Each pass caps any uncapped share
/// above `SHARE_CAP` (at `SHARE_CAP` while fewer than `MAX_FULL_CAPS` are
/// capped, `NEAR_CAP` afterwards), then hands any shortfall below 1.0 to the
/// uncapped participants in proportion to their current shares. The loop
/// ends on convergence, on a pass with no new caps, or after `MAX_PASSES`.
///
/// If every remaining participant is capped the shortfall stays
/// undistributed and is reported in `undistributed`.
pub fn compute_capped_shares(
    participants: &[Participant],
    total_views: u64,
    net_budget: Money,
) -> CappedDistribution {
    if participants.is_empty() || total_views == 0 {
        return CappedDistribution::empty(participants, net_budget);
    }

    let mut shares: Vec<f64> = participants
        .iter()
        .map(|p| p.views as f64 / total_views as f64)
        .collect();
    let mut capped = vec![false; shares.len()];
    let mut capped_count = 0usize;
    let mut converged = false;
    let mut passes = 0usize;

    while passes < MAX_PASSES {
        passes += 1;
        let mut newly_capped = false;

        for (share, is_capped) in shares.iter_mut().zip(capped.iter_mut()) {
            if !*is_capped && *share > SHARE_CAP {
                *share = if capped_count < MAX_FULL_CAPS {
                    SHARE_CAP
                } else {
                    NEAR_CAP
                };
                *is_capped = true;
                capped_count += 1;
                newly_capped = true;
            }
        }

        let sum: f64 = shares.iter().sum();
        if (sum - 1.0).abs() < CONVERGENCE_EPSILON {
            converged = true;
            break;
        }

        if sum < 1.0 {
            let uncapped_total: f64 = shares
                .iter()
                .zip(&capped)
                .filter(|(_, c)| !**c)
                .map(|(s, _)| *s)
                .sum();
            if uncapped_total > 0.0 {
                let shortfall = 1.0 - sum;
                for (share, is_capped) in shares.iter_mut().zip(&capped) {
                    if !*is_capped {
                        *share += shortfall * (*share / uncapped_total);
                    }
                }
            }
        }

        if !newly_capped {
            break;
        }
    }

    let earnings = apportion(&shares, net_budget);
    let distributed: Money = earnings.iter().copied().sum();

    CappedDistribution {
        allocations: participants
            .iter()
            .zip(shares.iter().zip(earnings))
            .map(|(p, (&share_percent, earnings))| ShareAllocation {
                id: p.id,
                share_percent,
                earnings,
            })
            .collect(),
        share_sum: shares.iter().sum(),
        converged,
        passes,
        distributed,
        undistributed: net_budget - distributed,
    }
}

/// Round `share × net_budget` to minor units with the largest-remainder rule.
///
/// Each amount lands within one minor unit of its exact value and the total
/// equals the rounded exact total, never exceeding `net_budget`.
fn apportion(shares: &[f64], net_budget: Money) -> Vec<Money> {
    let net = net_budget.as_minor_f64().max(0.0);
    let exact: Vec<f64> = shares.iter().map(|s| (s * net).max(0.0)).collect();
    let mut amounts: Vec<i64> = exact.iter().map(|e| e.floor() as i64).collect();

    let target = (exact.iter().sum::<f64>().round() as i64).min(net_budget.minor());
    let mut remaining = target - amounts.iter().sum::<i64>();

    let mut by_remainder: Vec<usize> = (0..exact.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    for &idx in &by_remainder {
        if remaining <= 0 {
            break;
        }
        amounts[idx] += 1;
        remaining -= 1;
    }

    // Shares summing a hair above 1.0 can floor past the budget.
    for &idx in by_remainder.iter().rev() {
        if remaining >= 0 {
            break;
        }
        if amounts[idx] > 0 {
            amounts[idx] -= 1;
            remaining += 1;
        }
    }

    amounts.into_iter().map(Money::from_minor).collect()
}
