//! Settlement scenarios using Cucumber.
//!
//! ```bash
//! cargo test --test settlement_features
//! ```
//!
//! Scenarios run against the in-memory campaign store.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cucumber::{given, then, when, World};
use uuid::Uuid;

use campaign_payout::calculation::DistributionOutcome;
use campaign_payout::model::{
    Campaign, CampaignStatus, Money, PayoutStatus, PostMetrics, Submission, SubmissionStatus,
};
use campaign_payout::services::SubmissionRecalculationService;
use campaign_payout::storage::mock::MockCampaignStore;
use campaign_payout::storage::CampaignStore;

/// Test context for settlement scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct SettlementWorld {
    store: Arc<MockCampaignStore>,
    campaign: Option<Campaign>,
    creators: HashMap<String, Uuid>,
    last_outcome: Option<DistributionOutcome>,
}

impl fmt::Debug for SettlementWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlementWorld")
            .field("campaign", &self.campaign)
            .field("creators", &self.creators)
            .field("last_outcome", &self.last_outcome)
            .finish()
    }
}

impl SettlementWorld {
    fn new() -> Self {
        Self {
            store: Arc::new(MockCampaignStore::new()),
            campaign: None,
            creators: HashMap::new(),
            last_outcome: None,
        }
    }

    fn campaign(&self) -> &Campaign {
        self.campaign.as_ref().expect("Campaign not initialized")
    }

    fn creator(&self, name: &str) -> Uuid {
        *self
            .creators
            .get(name)
            .unwrap_or_else(|| panic!("Unknown creator {}", name))
    }

    async fn add_submission(&mut self, name: String, views: u64, status: SubmissionStatus) {
        let campaign_id = self.campaign().id;
        let creator_id = Uuid::new_v4();
        let submission = Submission {
            id: Uuid::new_v4(),
            campaign_id,
            creator_id,
            post_ref: format!("post-{}", name),
            metrics: PostMetrics {
                view_count: views,
                ..Default::default()
            },
            metrics_updated_at: None,
            status,
            share_percent: 0.0,
            estimated_earnings: Money::ZERO,
            final_earnings: Money::ZERO,
        };
        self.store
            .put_submission(&submission)
            .await
            .expect("Failed to put submission");
        self.creators.insert(name, creator_id);
    }
}

// --- Given steps ---

#[given(expr = "a locked campaign with a budget of {int} and {int} percent commission")]
async fn given_locked_campaign(world: &mut SettlementWorld, budget: i64, commission: u8) {
    let ended = Utc::now() - chrono::Duration::hours(3);
    let campaign = Campaign {
        id: Uuid::new_v4(),
        sponsor_id: Uuid::new_v4(),
        total_budget: Money::from_major(budget),
        commission_percent: commission,
        status: CampaignStatus::Active,
        payout_status: PayoutStatus::Pending,
        locked_at: Some(ended),
        end_date: ended,
        total_views: 0,
        completed_at: None,
        insurance_triggered: false,
    };
    world
        .store
        .put_campaign(&campaign)
        .await
        .expect("Failed to put campaign");
    world.campaign = Some(campaign);
}

#[given(expr = "creator {string} has an approved submission with {int} views")]
async fn given_approved_submission(world: &mut SettlementWorld, name: String, views: u64) {
    world
        .add_submission(name, views, SubmissionStatus::Approved)
        .await;
}

#[given(expr = "creator {string} has a rejected submission with {int} views")]
async fn given_rejected_submission(world: &mut SettlementWorld, name: String, views: u64) {
    world
        .add_submission(name, views, SubmissionStatus::Rejected)
        .await;
}

// --- When steps ---

#[when("the campaign is settled")]
async fn when_settled(world: &mut SettlementWorld) {
    let service = SubmissionRecalculationService::new(world.store.clone(), Duration::from_secs(5));
    let outcome = service
        .process_final_distribution(world.campaign().id)
        .await
        .expect("Settlement failed");
    world.last_outcome = Some(outcome);
}

// --- Then steps ---

#[then(expr = "the outcome is {string}")]
async fn then_outcome(world: &mut SettlementWorld, expected: String) {
    let outcome = world.last_outcome.as_ref().expect("Nothing settled yet");
    assert_eq!(outcome.audit_outcome().as_str(), expected);
}

#[then(expr = "creator {string} is paid {int}")]
async fn then_creator_paid(world: &mut SettlementWorld, name: String, amount: i64) {
    let balance = world
        .store
        .wallet_balance(world.creator(&name))
        .await
        .expect("Failed to read balance");
    assert_eq!(balance, Money::from_major(amount));
}

#[then(expr = "the sponsor is paid {int}")]
async fn then_sponsor_paid(world: &mut SettlementWorld, amount: i64) {
    let balance = world
        .store
        .wallet_balance(world.campaign().sponsor_id)
        .await
        .expect("Failed to read balance");
    assert_eq!(balance, Money::from_major(amount));
}

#[then(expr = "the creators are paid {int} in total")]
async fn then_creators_total(world: &mut SettlementWorld, amount: i64) {
    let mut total = Money::ZERO;
    for creator_id in world.creators.values() {
        total += world
            .store
            .wallet_balance(*creator_id)
            .await
            .expect("Failed to read balance");
    }
    assert_eq!(total, Money::from_major(amount));
}

#[then(expr = "creator {string} has {int} ledger transaction(s)")]
async fn then_creator_transactions(world: &mut SettlementWorld, name: String, count: usize) {
    let txs = world
        .store
        .transactions(world.creator(&name))
        .await
        .expect("Failed to read transactions");
    assert_eq!(txs.len(), count);
}

#[then("the campaign payout is completed")]
async fn then_payout_completed(world: &mut SettlementWorld) {
    let campaign = world
        .store
        .get_campaign(world.campaign().id)
        .await
        .expect("Failed to load campaign")
        .expect("Campaign missing");
    assert_eq!(campaign.payout_status, PayoutStatus::Completed);
    assert_eq!(campaign.status, CampaignStatus::Completed);
}

#[then("the campaign is marked as insurance triggered")]
async fn then_insurance_triggered(world: &mut SettlementWorld) {
    let campaign = world
        .store
        .get_campaign(world.campaign().id)
        .await
        .expect("Failed to load campaign")
        .expect("Campaign missing");
    assert!(campaign.insurance_triggered);
}

#[tokio::main]
async fn main() {
    SettlementWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/settlement_features/features/settlement.feature")
        .await;
}
