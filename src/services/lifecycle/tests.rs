use chrono::Duration as ChronoDuration;

use super::*;
use crate::clients::{MockMetricsProvider, ScriptedResponse};
use crate::interfaces::MetricsError;
use crate::model::{
    CampaignStatus, Money, PayoutStatus, PostMetrics, Submission, SubmissionStatus,
    TransactionType,
};
use crate::storage::mock::{MockAuditStore, MockCampaignStore};

struct Harness {
    store: Arc<MockCampaignStore>,
    audit: Arc<MockAuditStore>,
    provider: Arc<MockMetricsProvider>,
    controller: CampaignLifecycleController,
}

fn harness() -> Harness {
    let store = Arc::new(MockCampaignStore::new());
    let audit = Arc::new(MockAuditStore::new());
    let provider = Arc::new(MockMetricsProvider::new());
    let controller = CampaignLifecycleController::new(
        store.clone(),
        audit.clone(),
        provider.clone(),
        LifecycleConfig::default(),
    );
    Harness {
        store,
        audit,
        provider,
        controller,
    }
}

fn campaign(budget_major: i64, ended_ago: ChronoDuration, locked: bool) -> Campaign {
    let now = Utc::now();
    Campaign {
        id: Uuid::new_v4(),
        sponsor_id: Uuid::new_v4(),
        total_budget: Money::from_major(budget_major),
        commission_percent: 20,
        status: CampaignStatus::Active,
        payout_status: PayoutStatus::Pending,
        locked_at: locked.then_some(now - ended_ago),
        end_date: now - ended_ago,
        total_views: 0,
        completed_at: None,
        insurance_triggered: false,
    }
}

impl Harness {
    /// Store a campaign with one approved submission per view count. Each
    /// submission's post reference is `"{campaign}-{index}"`.
    async fn seed(&self, campaign: &Campaign, views: &[u64]) -> Vec<Submission> {
        self.store.put_campaign(campaign).await.unwrap();
        let mut subs = Vec::new();
        for (i, &v) in views.iter().enumerate() {
            let s = Submission {
                id: Uuid::new_v4(),
                campaign_id: campaign.id,
                creator_id: Uuid::new_v4(),
                post_ref: format!("{}-{}", campaign.id, i),
                metrics: PostMetrics {
                    view_count: v,
                    ..Default::default()
                },
                metrics_updated_at: None,
                status: SubmissionStatus::Approved,
                share_percent: 0.0,
                estimated_earnings: Money::ZERO,
                final_earnings: Money::ZERO,
            };
            self.store.put_submission(&s).await.unwrap();
            subs.push(s);
        }
        subs
    }

    async fn outcomes(&self, campaign_id: Uuid) -> Vec<(AuditPhase, AuditOutcome)> {
        self.audit
            .entries(campaign_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.phase, e.outcome))
            .collect()
    }
}

#[tokio::test]
async fn test_idle_tick_skips_both_phases() {
    let h = harness();
    let report = h.controller.run_tick().await;

    assert!(matches!(
        report.lock,
        LockReport::Skipped {
            reason: SkipReason::NoCandidate
        }
    ));
    assert!(matches!(
        report.distribute,
        DistributeReport::Skipped {
            reason: SkipReason::NoCandidate
        }
    ));
}

#[tokio::test]
async fn test_lock_phase_refreshes_metrics_and_estimates() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::minutes(5), false);
    let subs = h.seed(&c, &[1, 1, 1]).await;
    for (s, views) in subs.iter().zip([30_000u64, 20_000, 10_000]) {
        h.provider.set_views(&s.post_ref, views).await;
    }

    let report = h.controller.run_tick().await;

    match report.lock {
        LockReport::Locked {
            campaign_id,
            outcome,
            refresh,
        } => {
            assert_eq!(campaign_id, c.id);
            assert_eq!(outcome, AuditOutcome::Success);
            assert_eq!(refresh.succeeded, 3);
        }
        other => panic!("expected lock, got {:?}", other),
    }

    let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
    assert!(stored.is_locked());
    assert_eq!(stored.total_views, 60_000);
    let refreshed = h.store.submissions(c.id).await.unwrap();
    assert!(refreshed.iter().all(|s| s.metrics_updated_at.is_some()));
    assert!(refreshed.iter().all(|s| s.estimated_earnings.is_positive()));
    assert_eq!(
        h.outcomes(c.id).await,
        vec![(AuditPhase::Lock, AuditOutcome::Success)]
    );
}

#[tokio::test]
async fn test_campaign_without_approved_submissions_is_not_locked() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::minutes(5), false);
    h.store.put_campaign(&c).await.unwrap();

    let report = h.controller.run_tick().await;

    assert!(matches!(report.lock, LockReport::Skipped { .. }));
    assert!(!h.store.get_campaign(c.id).await.unwrap().unwrap().is_locked());
}

#[tokio::test]
async fn test_retry_exhaustion_after_three_retries() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::minutes(5), false);
    let subs = h.seed(&c, &[1, 1, 1]).await;
    h.provider.set_views(&subs[0].post_ref, 50_000).await;
    for s in &subs[1..] {
        h.provider
            .set_response(&s.post_ref, ScriptedResponse::Fail(MetricsError::RateLimited))
            .await;
    }

    for attempt in 1..=3 {
        let report = h.controller.run_tick().await;
        match report.lock {
            LockReport::Retry {
                attempt: reported, ..
            } => assert_eq!(reported, attempt),
            other => panic!("attempt {}: expected retry, got {:?}", attempt, other),
        }
        let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
        assert!(!stored.is_locked(), "lock released after attempt {}", attempt);
    }

    let report = h.controller.run_tick().await;
    match report.lock {
        LockReport::Locked { outcome, .. } => assert_eq!(outcome, AuditOutcome::Partial),
        other => panic!("expected partial lock, got {:?}", other),
    }

    let retries = h
        .audit
        .count(c.id, AuditPhase::Lock, AuditOutcome::Retry)
        .await
        .unwrap();
    assert_eq!(retries, 3);
    assert!(h.store.get_campaign(c.id).await.unwrap().unwrap().is_locked());
}

#[tokio::test]
async fn test_permanent_failures_do_not_trigger_retry() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::minutes(5), false);
    let subs = h.seed(&c, &[1, 1]).await;
    h.provider.set_views(&subs[0].post_ref, 50_000).await;
    h.provider
        .set_response(
            &subs[1].post_ref,
            ScriptedResponse::Fail(MetricsError::NotFound(subs[1].post_ref.clone())),
        )
        .await;

    let report = h.controller.run_tick().await;

    match report.lock {
        LockReport::Locked {
            outcome, refresh, ..
        } => {
            assert_eq!(outcome, AuditOutcome::Partial);
            assert_eq!(refresh.permanent_failures, 1);
        }
        other => panic!("expected lock, got {:?}", other),
    }
    // The missing post keeps its stale count.
    let stale = h
        .store
        .submissions(c.id)
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.id == subs[1].id)
        .unwrap();
    assert_eq!(stale.views(), 1);
    assert!(stale.metrics_updated_at.is_none());
}

#[tokio::test]
async fn test_all_fetches_failing_after_retries_is_failed() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::minutes(5), false);
    let subs = h.seed(&c, &[1]).await;
    h.provider
        .set_response(&subs[0].post_ref, ScriptedResponse::Fail(MetricsError::Timeout))
        .await;

    for _ in 0..3 {
        h.controller.run_tick().await;
    }
    let report = h.controller.run_tick().await;

    assert!(matches!(
        report.lock,
        LockReport::Locked {
            outcome: AuditOutcome::Failed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unreadable_retry_history_proceeds() {
    let h = harness();
    h.audit.set_fail_on_count(true).await;
    let c = campaign(30_000, ChronoDuration::minutes(5), false);
    let subs = h.seed(&c, &[1]).await;
    h.provider
        .set_response(&subs[0].post_ref, ScriptedResponse::Fail(MetricsError::RateLimited))
        .await;

    let report = h.controller.run_tick().await;

    assert!(matches!(report.lock, LockReport::Locked { .. }));
}

#[tokio::test]
async fn test_distribute_waits_for_grace_period() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::hours(1), true);
    h.seed(&c, &[30_000, 25_000, 20_000]).await;

    let report = h.controller.run_tick().await;
    assert!(matches!(report.distribute, DistributeReport::Skipped { .. }));

    let later = Utc::now() + ChronoDuration::hours(2);
    let report = h.controller.run_tick_at(later).await;
    match report.distribute {
        DistributeReport::Settled {
            campaign_id,
            outcome: DistributionOutcome::Distributed { distributed, .. },
        } => {
            assert_eq!(campaign_id, c.id);
            assert_eq!(distributed, Money::from_major(24_000));
        }
        other => panic!("expected distribution, got {:?}", other),
    }

    let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CampaignStatus::Completed);
    assert_eq!(stored.payout_status, PayoutStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert_eq!(
        h.outcomes(c.id).await,
        vec![(AuditPhase::Distribute, AuditOutcome::Distributed)]
    );

    // Settled campaigns are never selected again.
    let report = h.controller.run_tick_at(later).await;
    assert!(matches!(report.distribute, DistributeReport::Skipped { .. }));
}

#[tokio::test]
async fn test_unbounded_grace_period_never_distributes() {
    let store = Arc::new(MockCampaignStore::new());
    let controller = CampaignLifecycleController::new(
        store.clone(),
        Arc::new(MockAuditStore::new()),
        Arc::new(MockMetricsProvider::new()),
        LifecycleConfig {
            grace_period_secs: u64::MAX,
            ..LifecycleConfig::default()
        },
    );
    let c = campaign(30_000, ChronoDuration::days(3650), true);
    store.put_campaign(&c).await.unwrap();

    let report = controller.distribute_phase(Utc::now(), None).await;

    assert!(matches!(
        report,
        DistributeReport::Skipped {
            reason: SkipReason::NoCandidate
        }
    ));
    let stored = store.get_campaign(c.id).await.unwrap().unwrap();
    assert_eq!(stored.payout_status, PayoutStatus::Pending);
}

#[tokio::test]
async fn test_tick_future_is_send() {
    fn assert_send<T: Send>(_: &T) {}

    let h = harness();
    let tick = h.controller.run_tick();
    assert_send(&tick);
    let report = tick.await;
    assert!(matches!(report.lock, LockReport::Skipped { .. }));
}

#[tokio::test]
async fn test_campaign_locked_this_tick_is_not_distributed_this_tick() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::hours(3), false);
    let subs = h.seed(&c, &[1, 1, 1]).await;
    for s in &subs {
        h.provider.set_views(&s.post_ref, 25_000).await;
    }

    let first = h.controller.run_tick().await;
    assert_eq!(first.lock.campaign_id(), Some(c.id));
    assert!(matches!(first.distribute, DistributeReport::Skipped { .. }));

    let second = h.controller.run_tick().await;
    assert!(matches!(second.distribute, DistributeReport::Settled { .. }));
}

#[tokio::test]
async fn test_insurance_refund_through_controller() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::hours(3), true);
    let subs = h.seed(&c, &[25_000, 15_000]).await;

    let report = h.controller.run_tick().await;

    assert!(matches!(
        report.distribute,
        DistributeReport::Settled {
            outcome: DistributionOutcome::InsuranceRefund { .. },
            ..
        }
    ));
    assert_eq!(
        h.store.wallet_balance(c.sponsor_id).await.unwrap(),
        Money::from_major(24_000)
    );
    let refunds = h.store.transactions(c.sponsor_id).await.unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].kind, TransactionType::Deposit);
    for s in &subs {
        assert_eq!(h.store.wallet_balance(s.creator_id).await.unwrap(), Money::ZERO);
    }
    let stored = h.store.get_campaign(c.id).await.unwrap().unwrap();
    assert!(stored.insurance_triggered);
    assert_eq!(
        h.outcomes(c.id).await,
        vec![(AuditPhase::Distribute, AuditOutcome::InsuranceRefund)]
    );
}

#[tokio::test]
async fn test_settlement_failure_is_reported_and_retryable() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::hours(3), true);
    h.seed(&c, &[30_000, 25_000, 20_000]).await;
    h.store.set_fail_on_settle(true).await;

    let report = h.controller.run_tick().await;

    assert!(matches!(
        report.distribute,
        DistributeReport::Error {
            campaign_id: Some(_),
            ..
        }
    ));
    assert_eq!(
        h.store.get_campaign(c.id).await.unwrap().unwrap().payout_status,
        PayoutStatus::Pending
    );
    assert_eq!(
        h.outcomes(c.id).await,
        vec![(AuditPhase::Distribute, AuditOutcome::Error)]
    );

    h.store.set_fail_on_settle(false).await;
    let report = h.controller.run_tick().await;
    assert!(matches!(report.distribute, DistributeReport::Settled { .. }));
}

#[tokio::test]
async fn test_failed_audit_writes_do_not_fail_the_tick() {
    let h = harness();
    h.audit.set_fail_on_append(true).await;
    let c = campaign(30_000, ChronoDuration::hours(3), true);
    h.seed(&c, &[30_000, 25_000, 20_000]).await;

    let report = h.controller.run_tick().await;

    assert!(matches!(report.distribute, DistributeReport::Settled { .. }));
    assert!(h.audit.all().await.is_empty());
}

#[tokio::test]
async fn test_selection_failure_is_reported() {
    let h = harness();
    h.store.set_fail_on_select(true).await;

    let report = h.controller.run_tick().await;

    assert!(matches!(report.lock, LockReport::Error { campaign_id: None, .. }));
    assert!(matches!(
        report.distribute,
        DistributeReport::Error {
            campaign_id: None,
            ..
        }
    ));
}

#[tokio::test]
async fn test_metrics_write_failure_releases_lock() {
    let h = harness();
    let c = campaign(30_000, ChronoDuration::minutes(5), false);
    let subs = h.seed(&c, &[1]).await;
    h.provider.set_views(&subs[0].post_ref, 10).await;
    h.store.set_fail_on_record_metrics(true).await;

    let report = h.controller.run_tick().await;

    assert!(matches!(report.lock, LockReport::Error { campaign_id: Some(_), .. }));
    assert!(!h.store.get_campaign(c.id).await.unwrap().unwrap().is_locked());
    assert_eq!(h.outcomes(c.id).await, vec![(AuditPhase::Lock, AuditOutcome::Error)]);
}

#[tokio::test]
async fn test_overlapping_controllers_lock_once() {
    let h = harness();
    let other = CampaignLifecycleController::new(
        h.store.clone(),
        h.audit.clone(),
        h.provider.clone(),
        LifecycleConfig::default(),
    );
    let c = campaign(30_000, ChronoDuration::minutes(5), false);
    let subs = h.seed(&c, &[1]).await;
    h.provider.set_views(&subs[0].post_ref, 10).await;

    let (a, b) = tokio::join!(h.controller.run_tick(), other.run_tick());

    let locked = [&a.lock, &b.lock]
        .iter()
        .filter(|r| matches!(r, LockReport::Locked { .. }))
        .count();
    assert_eq!(locked, 1);
}

#[test]
fn test_tick_report_serializes_with_status_tags() {
    let report = TickReport {
        started_at: Utc::now(),
        lock: LockReport::Skipped {
            reason: SkipReason::LockContention,
        },
        distribute: DistributeReport::Settled {
            campaign_id: Uuid::nil(),
            outcome: DistributionOutcome::AlreadyProcessed,
        },
    };

    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["lock"]["status"], "SKIPPED");
    assert_eq!(json["lock"]["reason"], "LOCK_CONTENTION");
    assert_eq!(json["distribute"]["status"], "SETTLED");
    assert_eq!(json["distribute"]["outcome"]["result"], "ALREADY_PROCESSED");
}
