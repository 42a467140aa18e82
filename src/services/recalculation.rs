//! Submission recalculation: live estimates and final settlement.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculation::{
    compute_capped_shares, net_budget, plan_final_distribution, total_views, DistributionOutcome,
    Participant,
};
use crate::model::{Money, PayoutStatus};
use crate::storage::{CampaignStore, SettlementCommit, StorageError};

/// Errors from either recalculation path.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The settlement transaction did not finish in time and was rolled back.
    #[error("Settlement timed out after {0:?}")]
    Timeout(Duration),
}

/// Result of an estimate pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstimateOutcome {
    #[serde(rename_all = "camelCase")]
    Updated {
        participants: usize,
        total_views: u64,
        estimated: Money,
    },
    /// Payout already completed; estimates are frozen.
    Settled,
}

/// Recomputes submission shares for a campaign.
///
/// `recalculate` is the live projection; `process_final_distribution` is the
/// authoritative, idempotent settlement.
pub struct SubmissionRecalculationService {
    store: Arc<dyn CampaignStore>,
    settlement_timeout: Duration,
}

impl SubmissionRecalculationService {
    pub fn new(store: Arc<dyn CampaignStore>, settlement_timeout: Duration) -> Self {
        Self {
            store,
            settlement_timeout,
        }
    }

    /// Recompute the cached view total and every approved submission's share
    /// and estimated earnings. No insurance or eligibility gating applies.
    pub async fn recalculate(&self, campaign_id: Uuid) -> Result<EstimateOutcome, SettlementError> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or(StorageError::CampaignNotFound(campaign_id))?;
        if campaign.payout_status == PayoutStatus::Completed {
            return Ok(EstimateOutcome::Settled);
        }

        let approved = self.store.approved_submissions(campaign_id).await?;
        let participants: Vec<Participant> = approved.iter().map(Participant::from).collect();
        let views = total_views(&participants);
        let net = net_budget(campaign.total_budget, campaign.commission_percent);

        let distribution = compute_capped_shares(&participants, views, net);
        let written = self
            .store
            .save_estimates(campaign_id, views, &distribution.allocations)
            .await?;
        if !written {
            info!(campaign_id = %campaign_id, "Campaign settled during estimate pass; estimates discarded");
            return Ok(EstimateOutcome::Settled);
        }

        Ok(EstimateOutcome::Updated {
            participants: participants.len(),
            total_views: views,
            estimated: distribution.distributed,
        })
    }

    /// Settle the campaign exactly once.
    ///
    /// Returns `AlreadyProcessed` without writing if the payout is already
    /// completed. On timeout or storage failure nothing is written and the
    /// payout stays pending.
    pub async fn process_final_distribution(
        &self,
        campaign_id: Uuid,
    ) -> Result<DistributionOutcome, SettlementError> {
        let settle = self
            .store
            .settle(campaign_id, Utc::now(), &plan_final_distribution);

        let commit = match tokio::time::timeout(self.settlement_timeout, settle).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    campaign_id = %campaign_id,
                    timeout = ?self.settlement_timeout,
                    "Settlement timed out; transaction rolled back"
                );
                return Err(SettlementError::Timeout(self.settlement_timeout));
            }
        };

        match commit {
            SettlementCommit::AlreadyProcessed => {
                info!(campaign_id = %campaign_id, "Campaign already settled");
                Ok(DistributionOutcome::AlreadyProcessed)
            }
            SettlementCommit::Committed(plan) => {
                info!(
                    campaign_id = %campaign_id,
                    outcome = %plan.outcome.audit_outcome(),
                    credits = plan.credits.len(),
                    "Campaign settled"
                );
                Ok(plan.outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::calculation::ShareAllocation;
    use crate::model::{
        Campaign, CampaignStatus, LedgerTransaction, PostMetrics, Submission, SubmissionStatus,
    };
    use crate::storage::mock::MockCampaignStore;
    use crate::storage::{MetricsUpdate, SettlementPlanner};

    /// Settles the campaign the moment its approved submissions are read,
    /// as a concurrent settlement would between an estimate pass's reads
    /// and its write.
    struct SettlesOnRead {
        inner: Arc<MockCampaignStore>,
    }

    #[async_trait]
    impl CampaignStore for SettlesOnRead {
        async fn put_campaign(&self, campaign: &Campaign) -> crate::storage::Result<()> {
            self.inner.put_campaign(campaign).await
        }

        async fn put_submission(&self, submission: &Submission) -> crate::storage::Result<()> {
            self.inner.put_submission(submission).await
        }

        async fn get_campaign(&self, campaign_id: Uuid) -> crate::storage::Result<Option<Campaign>> {
            self.inner.get_campaign(campaign_id).await
        }

        async fn submissions(&self, campaign_id: Uuid) -> crate::storage::Result<Vec<Submission>> {
            self.inner.submissions(campaign_id).await
        }

        async fn approved_submissions(
            &self,
            campaign_id: Uuid,
        ) -> crate::storage::Result<Vec<Submission>> {
            self.inner
                .settle(campaign_id, Utc::now(), &plan_final_distribution)
                .await?;
            self.inner.approved_submissions(campaign_id).await
        }

        async fn next_lock_candidate(
            &self,
            now: DateTime<Utc>,
        ) -> crate::storage::Result<Option<Campaign>> {
            self.inner.next_lock_candidate(now).await
        }

        async fn try_lock(&self, campaign_id: Uuid, now: DateTime<Utc>) -> crate::storage::Result<bool> {
            self.inner.try_lock(campaign_id, now).await
        }

        async fn unlock(&self, campaign_id: Uuid) -> crate::storage::Result<bool> {
            self.inner.unlock(campaign_id).await
        }

        async fn next_distribute_candidate(
            &self,
            ended_before: DateTime<Utc>,
            exclude: Option<Uuid>,
        ) -> crate::storage::Result<Option<Campaign>> {
            self.inner.next_distribute_candidate(ended_before, exclude).await
        }

        async fn record_metrics(&self, updates: &[MetricsUpdate]) -> crate::storage::Result<()> {
            self.inner.record_metrics(updates).await
        }

        async fn save_estimates(
            &self,
            campaign_id: Uuid,
            total_views: u64,
            estimates: &[ShareAllocation],
        ) -> crate::storage::Result<bool> {
            self.inner.save_estimates(campaign_id, total_views, estimates).await
        }

        async fn settle(
            &self,
            campaign_id: Uuid,
            now: DateTime<Utc>,
            planner: &SettlementPlanner,
        ) -> crate::storage::Result<SettlementCommit> {
            self.inner.settle(campaign_id, now, planner).await
        }

        async fn wallet_balance(&self, user_id: Uuid) -> crate::storage::Result<Money> {
            self.inner.wallet_balance(user_id).await
        }

        async fn transactions(&self, user_id: Uuid) -> crate::storage::Result<Vec<LedgerTransaction>> {
            self.inner.transactions(user_id).await
        }
    }

    fn campaign(budget_major: i64) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            sponsor_id: Uuid::new_v4(),
            total_budget: Money::from_major(budget_major),
            commission_percent: 20,
            status: CampaignStatus::Active,
            payout_status: PayoutStatus::Pending,
            locked_at: Some(Utc::now()),
            end_date: Utc::now() - ChronoDuration::hours(3),
            total_views: 0,
            completed_at: None,
            insurance_triggered: false,
        }
    }

    fn submission(campaign: &Campaign, views: u64, status: SubmissionStatus) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            campaign_id: campaign.id,
            creator_id: Uuid::new_v4(),
            post_ref: format!("post-{}", Uuid::new_v4()),
            metrics: PostMetrics {
                view_count: views,
                ..Default::default()
            },
            metrics_updated_at: None,
            status,
            share_percent: 0.0,
            estimated_earnings: Money::ZERO,
            final_earnings: Money::ZERO,
        }
    }

    async fn seeded(
        budget_major: i64,
        views: &[u64],
    ) -> (Arc<MockCampaignStore>, Campaign, Vec<Submission>) {
        let store = Arc::new(MockCampaignStore::new());
        let c = campaign(budget_major);
        store.put_campaign(&c).await.unwrap();
        let mut subs = Vec::new();
        for &v in views {
            let s = submission(&c, v, SubmissionStatus::Approved);
            store.put_submission(&s).await.unwrap();
            subs.push(s);
        }
        (store, c, subs)
    }

    #[tokio::test]
    async fn test_recalculate_writes_estimates_without_gating() {
        // Two submissions fail insurance, but estimates still show a split.
        let (store, c, subs) = seeded(30_000, &[30_000, 10_000]).await;
        let service = SubmissionRecalculationService::new(store.clone(), Duration::from_secs(5));

        let outcome = service.recalculate(c.id).await.unwrap();

        assert!(matches!(outcome, EstimateOutcome::Updated { total_views: 40_000, .. }));
        let stored = store.get_campaign(c.id).await.unwrap().unwrap();
        assert_eq!(stored.total_views, 40_000);
        let estimates = store.submissions(c.id).await.unwrap();
        assert!(estimates.iter().all(|s| s.estimated_earnings.is_positive()));
        assert!(estimates.iter().all(|s| s.final_earnings.is_zero()));
        assert_eq!(store.wallet_balance(subs[0].creator_id).await.unwrap(), Money::ZERO);
    }

    #[tokio::test]
    async fn test_recalculate_missing_campaign() {
        let service =
            SubmissionRecalculationService::new(Arc::new(MockCampaignStore::new()), Duration::from_secs(5));
        let err = service.recalculate(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SettlementError::Storage(StorageError::CampaignNotFound(_))));
    }

    #[tokio::test]
    async fn test_final_distribution_is_idempotent() {
        let (store, c, subs) = seeded(30_000, &[30_000, 25_000, 20_000]).await;
        let service = SubmissionRecalculationService::new(store.clone(), Duration::from_secs(5));

        let first = service.process_final_distribution(c.id).await.unwrap();
        assert!(matches!(first, DistributionOutcome::Distributed { .. }));
        let balance = store.wallet_balance(subs[0].creator_id).await.unwrap();
        let ledger = store.ledger_len().await;

        let second = service.process_final_distribution(c.id).await.unwrap();
        assert_eq!(second, DistributionOutcome::AlreadyProcessed);
        assert_eq!(store.wallet_balance(subs[0].creator_id).await.unwrap(), balance);
        assert_eq!(store.ledger_len().await, ledger);

        // Estimates are frozen once settled.
        assert_eq!(service.recalculate(c.id).await.unwrap(), EstimateOutcome::Settled);
    }

    #[tokio::test]
    async fn test_final_distribution_timeout_leaves_payout_pending() {
        let (store, c, _) = seeded(30_000, &[30_000, 25_000, 20_000]).await;
        store.set_settle_delay(Some(Duration::from_millis(500))).await;
        let service = SubmissionRecalculationService::new(store.clone(), Duration::from_millis(20));

        let err = service.process_final_distribution(c.id).await.unwrap_err();

        assert!(matches!(err, SettlementError::Timeout(_)));
        let stored = store.get_campaign(c.id).await.unwrap().unwrap();
        assert_eq!(stored.payout_status, PayoutStatus::Pending);
        assert_eq!(store.ledger_len().await, 0);
    }

    #[tokio::test]
    async fn test_recalculate_discards_estimates_when_settled_mid_pass() {
        // Fails insurance, so settlement refunds the sponsor and pays nobody.
        let (store, c, subs) = seeded(30_000, &[30_000, 10_000]).await;
        let racing = Arc::new(SettlesOnRead {
            inner: store.clone(),
        });
        let service = SubmissionRecalculationService::new(racing, Duration::from_secs(5));

        let outcome = service.recalculate(c.id).await.unwrap();

        assert_eq!(outcome, EstimateOutcome::Settled);
        let stored = store.get_campaign(c.id).await.unwrap().unwrap();
        assert_eq!(stored.payout_status, PayoutStatus::Completed);
        assert!(stored.insurance_triggered);
        for s in store.submissions(c.id).await.unwrap() {
            assert_eq!(s.share_percent, 0.0);
            assert!(s.estimated_earnings.is_zero());
        }
        assert_eq!(store.wallet_balance(subs[0].creator_id).await.unwrap(), Money::ZERO);
    }
}
