//! Mock CampaignStore implementation for testing.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::injected_failure;
use crate::calculation::ShareAllocation;
use crate::model::{
    Campaign, CampaignStatus, LedgerTransaction, Money, PayoutStatus, Submission,
};
use crate::storage::{
    CampaignStore, MetricsUpdate, Result, SettlementCommit, SettlementPlanner, StorageError,
};

#[derive(Default)]
struct State {
    campaigns: HashMap<Uuid, Campaign>,
    /// Keyed by id so iteration order matches the SQL backend.
    submissions: BTreeMap<Uuid, Submission>,
    wallets: HashMap<Uuid, Money>,
    ledger: Vec<LedgerTransaction>,
}

impl State {
    fn campaign_submissions(&self, campaign_id: Uuid) -> impl Iterator<Item = &Submission> {
        self.submissions
            .values()
            .filter(move |s| s.campaign_id == campaign_id)
    }
}

/// Mock campaign store that keeps campaigns, submissions and wallets in memory.
///
/// `settle` applies its plan under a single write lock, so a failed or
/// cancelled settlement leaves no partial writes behind.
#[derive(Default)]
pub struct MockCampaignStore {
    state: RwLock<State>,
    fail_on_settle: RwLock<bool>,
    fail_on_record_metrics: RwLock<bool>,
    fail_on_select: RwLock<bool>,
    settle_delay: RwLock<Option<Duration>>,
}

impl MockCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_settle(&self, fail: bool) {
        *self.fail_on_settle.write().await = fail;
    }

    pub async fn set_fail_on_record_metrics(&self, fail: bool) {
        *self.fail_on_record_metrics.write().await = fail;
    }

    /// Fail candidate selection in both lifecycle phases.
    pub async fn set_fail_on_select(&self, fail: bool) {
        *self.fail_on_select.write().await = fail;
    }

    /// Sleep before applying a settlement, to exercise timeouts.
    pub async fn set_settle_delay(&self, delay: Option<Duration>) {
        *self.settle_delay.write().await = delay;
    }

    /// Number of ledger transactions across all users.
    pub async fn ledger_len(&self) -> usize {
        self.state.read().await.ledger.len()
    }

    async fn check_select(&self) -> Result<()> {
        if *self.fail_on_select.read().await {
            return Err(injected_failure());
        }
        Ok(())
    }
}

#[async_trait]
impl CampaignStore for MockCampaignStore {
    async fn put_campaign(&self, campaign: &Campaign) -> Result<()> {
        self.state
            .write()
            .await
            .campaigns
            .insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn put_submission(&self, submission: &Submission) -> Result<()> {
        self.state
            .write()
            .await
            .submissions
            .insert(submission.id, submission.clone());
        Ok(())
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<Campaign>> {
        Ok(self.state.read().await.campaigns.get(&campaign_id).cloned())
    }

    async fn submissions(&self, campaign_id: Uuid) -> Result<Vec<Submission>> {
        let state = self.state.read().await;
        Ok(state.campaign_submissions(campaign_id).cloned().collect())
    }

    async fn approved_submissions(&self, campaign_id: Uuid) -> Result<Vec<Submission>> {
        let state = self.state.read().await;
        Ok(state
            .campaign_submissions(campaign_id)
            .filter(|s| s.is_approved())
            .cloned()
            .collect())
    }

    async fn next_lock_candidate(&self, now: DateTime<Utc>) -> Result<Option<Campaign>> {
        self.check_select().await?;
        let state = self.state.read().await;
        Ok(state
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Active && !c.is_locked() && c.end_date <= now)
            .filter(|c| state.campaign_submissions(c.id).any(|s| s.is_approved()))
            .min_by_key(|c| (c.end_date, c.id))
            .cloned())
    }

    async fn try_lock(&self, campaign_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.campaigns.get_mut(&campaign_id) {
            Some(c) if c.locked_at.is_none() && c.status == CampaignStatus::Active => {
                c.locked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unlock(&self, campaign_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.campaigns.get_mut(&campaign_id) {
            Some(c) if c.locked_at.is_some() && c.payout_status == PayoutStatus::Pending => {
                c.locked_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn next_distribute_candidate(
        &self,
        ended_before: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Option<Campaign>> {
        self.check_select().await?;
        let state = self.state.read().await;
        Ok(state
            .campaigns
            .values()
            .filter(|c| {
                c.status == CampaignStatus::Active
                    && c.payout_status == PayoutStatus::Pending
                    && c.is_locked()
                    && c.end_date <= ended_before
                    && Some(c.id) != exclude
            })
            .min_by_key(|c| (c.end_date, c.id))
            .cloned())
    }

    async fn record_metrics(&self, updates: &[MetricsUpdate]) -> Result<()> {
        if *self.fail_on_record_metrics.read().await {
            return Err(injected_failure());
        }
        let mut state = self.state.write().await;
        for update in updates {
            if let Some(s) = state.submissions.get_mut(&update.submission_id) {
                s.metrics = update.metrics;
                s.metrics_updated_at = Some(update.fetched_at);
            }
        }
        Ok(())
    }

    async fn save_estimates(
        &self,
        campaign_id: Uuid,
        total_views: u64,
        estimates: &[ShareAllocation],
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let campaign = state
            .campaigns
            .get_mut(&campaign_id)
            .ok_or(StorageError::CampaignNotFound(campaign_id))?;
        if campaign.payout_status != PayoutStatus::Pending {
            return Ok(false);
        }
        campaign.total_views = total_views;

        for estimate in estimates {
            if let Some(s) = state.submissions.get_mut(&estimate.id) {
                if s.campaign_id == campaign_id {
                    s.share_percent = estimate.share_percent;
                    s.estimated_earnings = estimate.earnings;
                }
            }
        }
        Ok(true)
    }

    async fn settle(
        &self,
        campaign_id: Uuid,
        now: DateTime<Utc>,
        planner: &SettlementPlanner,
    ) -> Result<SettlementCommit> {
        if let Some(delay) = *self.settle_delay.read().await {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_on_settle.read().await {
            return Err(injected_failure());
        }

        let mut state = self.state.write().await;
        let campaign = state
            .campaigns
            .get(&campaign_id)
            .cloned()
            .ok_or(StorageError::CampaignNotFound(campaign_id))?;
        if campaign.payout_status == PayoutStatus::Completed {
            return Ok(SettlementCommit::AlreadyProcessed);
        }
        if campaign.status != CampaignStatus::Active || !campaign.is_locked() {
            return Err(StorageError::NotSettleable(campaign_id));
        }

        let approved: Vec<Submission> = state
            .campaign_submissions(campaign_id)
            .filter(|s| s.is_approved())
            .cloned()
            .collect();
        let plan = planner(&campaign, &approved);

        if let Some(c) = state.campaigns.get_mut(&campaign_id) {
            c.payout_status = PayoutStatus::Completed;
            c.status = CampaignStatus::Completed;
            c.completed_at = Some(now);
            c.total_views = plan.total_views;
            c.insurance_triggered = plan.insurance_triggered;
        }

        for settled in &plan.submissions {
            if let Some(s) = state.submissions.get_mut(&settled.submission_id) {
                s.share_percent = settled.share_percent;
                s.estimated_earnings = settled.earnings;
                s.final_earnings += settled.earnings;
            }
        }

        for credit in &plan.credits {
            *state.wallets.entry(credit.user_id).or_default() += credit.amount;
            state.ledger.push(LedgerTransaction {
                id: Uuid::new_v4(),
                user_id: credit.user_id,
                kind: credit.kind,
                amount: credit.amount,
                description: credit.description.clone(),
                reference: credit.reference.clone(),
                created_at: now,
            });
        }

        Ok(SettlementCommit::Committed(plan))
    }

    async fn wallet_balance(&self, user_id: Uuid) -> Result<Money> {
        Ok(self
            .state
            .read()
            .await
            .wallets
            .get(&user_id)
            .copied()
            .unwrap_or_default())
    }

    async fn transactions(&self, user_id: Uuid) -> Result<Vec<LedgerTransaction>> {
        Ok(self
            .state
            .read()
            .await
            .ledger
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}
