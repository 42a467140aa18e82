//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use campaign_payout::config::StorageConfig;
use campaign_payout::model::{
    Campaign, CampaignStatus, Money, PayoutStatus, PostMetrics, Submission, SubmissionStatus,
};
use campaign_payout::storage::{init_storage, AuditStore, CampaignStore};

/// Fresh in-memory SQLite stores with schemas created.
pub async fn sqlite_stores() -> (Arc<dyn CampaignStore>, Arc<dyn AuditStore>) {
    init_storage(&StorageConfig::in_memory())
        .await
        .expect("Failed to initialize SQLite storage")
}

/// ACTIVE campaign with 20% commission.
pub fn campaign(budget_major: i64, end_date: DateTime<Utc>, locked_at: Option<DateTime<Utc>>) -> Campaign {
    Campaign {
        id: Uuid::new_v4(),
        sponsor_id: Uuid::new_v4(),
        total_budget: Money::from_major(budget_major),
        commission_percent: 20,
        status: CampaignStatus::Active,
        payout_status: PayoutStatus::Pending,
        locked_at,
        end_date,
        total_views: 0,
        completed_at: None,
        insurance_triggered: false,
    }
}

/// Campaign that ended `hours_ago` and is locked, ready to settle.
pub fn ended_locked_campaign(budget_major: i64, hours_ago: i64) -> Campaign {
    let end = Utc::now() - Duration::hours(hours_ago);
    campaign(budget_major, end, Some(end))
}

pub fn submission(campaign: &Campaign, post_ref: &str, views: u64, status: SubmissionStatus) -> Submission {
    Submission {
        id: Uuid::new_v4(),
        campaign_id: campaign.id,
        creator_id: Uuid::new_v4(),
        post_ref: post_ref.to_string(),
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

/// Store a campaign and one approved submission per view count. Post
/// references are `"{campaign_id}-{index}"`.
pub async fn seed(store: &dyn CampaignStore, campaign: &Campaign, views: &[u64]) -> Vec<Submission> {
    store.put_campaign(campaign).await.expect("put campaign");
    let mut subs = Vec::with_capacity(views.len());
    for (i, &v) in views.iter().enumerate() {
        let s = submission(
            campaign,
            &format!("{}-{}", campaign.id, i),
            v,
            SubmissionStatus::Approved,
        );
        store.put_submission(&s).await.expect("put submission");
        subs.push(s);
    }
    subs
}
