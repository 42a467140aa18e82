//! Campaign lifecycle controller.
//!
//! Each tick runs two phases, each acting on at most one campaign:
//!
//! - **Lock**: take the earliest-ending unlocked campaign past its end date,
//!   set `locked_at` with a conditional update, refresh metrics for every
//!   approved submission, and either release the lock for a retry (too many
//!   transient failures, retries left) or keep it and record the result.
//! - **Distribute**: take the earliest-ending locked campaign past its end
//!   date plus the grace period and settle it.
//!
//! Audit entries are written after the phase's own writes, through the
//! best-effort [`AuditSink`], and flushed before the tick returns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::audit::AuditSink;
use super::metrics_refresh::{MetricsRefresher, RefreshSummary};
use super::recalculation::SubmissionRecalculationService;
use crate::calculation::DistributionOutcome;
use crate::config::LifecycleConfig;
use crate::interfaces::MetricsProvider;
use crate::model::{AuditOutcome, AuditPhase, Campaign};
use crate::storage::{AuditStore, CampaignStore};

/// Why a phase did nothing this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// No campaign is due for this phase.
    NoCandidate,
    /// Another worker locked the selected campaign first.
    LockContention,
}

/// What the lock phase did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockReport {
    Skipped {
        reason: SkipReason,
    },
    /// Lock released; the campaign will be picked up again.
    #[serde(rename_all = "camelCase")]
    Retry {
        campaign_id: Uuid,
        attempt: usize,
        refresh: RefreshSummary,
    },
    /// Lock kept; `outcome` is SUCCESS, PARTIAL or FAILED.
    #[serde(rename_all = "camelCase")]
    Locked {
        campaign_id: Uuid,
        outcome: AuditOutcome,
        refresh: RefreshSummary,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        campaign_id: Option<Uuid>,
        message: String,
    },
}

impl LockReport {
    /// Campaign this phase acted on, if any.
    pub fn campaign_id(&self) -> Option<Uuid> {
        match self {
            LockReport::Skipped { .. } => None,
            LockReport::Retry { campaign_id, .. } | LockReport::Locked { campaign_id, .. } => {
                Some(*campaign_id)
            }
            LockReport::Error { campaign_id, .. } => *campaign_id,
        }
    }
}

/// What the distribute phase did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributeReport {
    Skipped {
        reason: SkipReason,
    },
    #[serde(rename_all = "camelCase")]
    Settled {
        campaign_id: Uuid,
        outcome: DistributionOutcome,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        campaign_id: Option<Uuid>,
        message: String,
    },
}

/// Summary of one tick, returned to the trigger caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub lock: LockReport,
    pub distribute: DistributeReport,
}

/// Drives campaigns from ACTIVE through lock to settlement.
pub struct CampaignLifecycleController {
    store: Arc<dyn CampaignStore>,
    refresher: MetricsRefresher,
    recalculation: SubmissionRecalculationService,
    audit: AuditSink,
    config: LifecycleConfig,
    /// Serializes ticks within this process.
    tick_guard: Mutex<()>,
}

impl CampaignLifecycleController {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        audit_store: Arc<dyn AuditStore>,
        provider: Arc<dyn MetricsProvider>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            refresher: MetricsRefresher::new(
                provider,
                config.fetch_concurrency,
                config.fetch_timeout(),
            ),
            recalculation: SubmissionRecalculationService::new(
                Arc::clone(&store),
                config.settlement_timeout(),
            ),
            audit: AuditSink::new(audit_store),
            store,
            config,
            tick_guard: Mutex::new(()),
        }
    }

    /// The recalculation service this controller settles through.
    pub fn recalculation(&self) -> &SubmissionRecalculationService {
        &self.recalculation
    }

    /// Run one tick at the current time.
    pub async fn run_tick(&self) -> TickReport {
        self.run_tick_at(Utc::now()).await
    }

    /// Run one tick as of `now`.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let _guard = self.tick_guard.lock().await;

        let lock = self.lock_phase(now).await;
        let distribute = self.distribute_phase(now, lock.campaign_id()).await;
        self.audit.flush(self.config.audit_flush_timeout()).await;

        TickReport {
            started_at: now,
            lock,
            distribute,
        }
    }

    /// Lock phase for at most one campaign.
    pub async fn lock_phase(&self, now: DateTime<Utc>) -> LockReport {
        let campaign = match self.store.next_lock_candidate(now).await {
            Ok(Some(campaign)) => campaign,
            Ok(None) => {
                return LockReport::Skipped {
                    reason: SkipReason::NoCandidate,
                }
            }
            Err(e) => {
                error!(error = %e, "Lock phase: candidate selection failed");
                return LockReport::Error {
                    campaign_id: None,
                    message: e.to_string(),
                };
            }
        };

        match self.store.try_lock(campaign.id, now).await {
            Ok(true) => {}
            Ok(false) => {
                info!(campaign_id = %campaign.id, "Lock phase: campaign already locked elsewhere");
                return LockReport::Skipped {
                    reason: SkipReason::LockContention,
                };
            }
            Err(e) => {
                error!(campaign_id = %campaign.id, error = %e, "Lock phase: lock update failed");
                return LockReport::Error {
                    campaign_id: Some(campaign.id),
                    message: e.to_string(),
                };
            }
        }

        info!(campaign_id = %campaign.id, end_date = %campaign.end_date, "Campaign locked");

        match self.refresh_locked(&campaign).await {
            Ok(report) => report,
            Err(message) => {
                if let Err(e) = self.store.unlock(campaign.id).await {
                    error!(campaign_id = %campaign.id, error = %e, "Failed to release lock");
                }
                self.audit.record(
                    campaign.id,
                    AuditPhase::Lock,
                    AuditOutcome::Error,
                    json!({ "error": message }),
                );
                LockReport::Error {
                    campaign_id: Some(campaign.id),
                    message,
                }
            }
        }
    }

    /// Refresh metrics of a campaign this tick has locked and decide whether
    /// to keep the lock.
    async fn refresh_locked(&self, campaign: &Campaign) -> Result<LockReport, String> {
        let approved = self
            .store
            .approved_submissions(campaign.id)
            .await
            .map_err(|e| e.to_string())?;
        let refresh = self.refresher.refresh(&approved).await;

        if refresh.failure_rate > self.config.retry_failure_threshold {
            let prior_retries = match self.audit.retry_count(campaign.id).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(
                        campaign_id = %campaign.id,
                        error = %e,
                        "Could not read retry history; proceeding without retry"
                    );
                    self.config.max_lock_retries
                }
            };

            if prior_retries < self.config.max_lock_retries {
                self.store
                    .unlock(campaign.id)
                    .await
                    .map_err(|e| e.to_string())?;
                let attempt = prior_retries + 1;
                warn!(
                    campaign_id = %campaign.id,
                    failure_rate = refresh.failure_rate,
                    attempt,
                    "Metrics refresh degraded; lock released for retry"
                );
                self.audit.record(
                    campaign.id,
                    AuditPhase::Lock,
                    AuditOutcome::Retry,
                    json!({ "attempt": attempt, "refresh": &refresh }),
                );
                return Ok(LockReport::Retry {
                    campaign_id: campaign.id,
                    attempt,
                    refresh,
                });
            }

            warn!(
                campaign_id = %campaign.id,
                failure_rate = refresh.failure_rate,
                retries = prior_retries,
                "Lock retries exhausted; proceeding with partial metrics"
            );
        }

        self.store
            .record_metrics(&refresh.updates)
            .await
            .map_err(|e| e.to_string())?;

        if let Err(e) = self.recalculation.recalculate(campaign.id).await {
            warn!(campaign_id = %campaign.id, error = %e, "Estimate refresh failed");
        }

        let outcome = if refresh.failed() == 0 {
            AuditOutcome::Success
        } else if refresh.succeeded == 0 {
            AuditOutcome::Failed
        } else {
            AuditOutcome::Partial
        };

        info!(
            campaign_id = %campaign.id,
            outcome = %outcome,
            succeeded = refresh.succeeded,
            failed = refresh.failed(),
            "Lock phase complete"
        );
        self.audit.record(
            campaign.id,
            AuditPhase::Lock,
            outcome,
            json!({ "refresh": &refresh }),
        );

        Ok(LockReport::Locked {
            campaign_id: campaign.id,
            outcome,
            refresh,
        })
    }

    /// Distribute phase for at most one campaign, never `exclude`.
    pub async fn distribute_phase(
        &self,
        now: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> DistributeReport {
        // A grace period past the calendar range means nothing is ever due.
        let ended_before = now
            .checked_sub_signed(self.config.grace_period())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let campaign = match self
            .store
            .next_distribute_candidate(ended_before, exclude)
            .await
        {
            Ok(Some(campaign)) => campaign,
            Ok(None) => {
                return DistributeReport::Skipped {
                    reason: SkipReason::NoCandidate,
                }
            }
            Err(e) => {
                error!(error = %e, "Distribute phase: candidate selection failed");
                return DistributeReport::Error {
                    campaign_id: None,
                    message: e.to_string(),
                };
            }
        };

        match self
            .recalculation
            .process_final_distribution(campaign.id)
            .await
        {
            Ok(outcome) => {
                let snapshot = serde_json::to_value(&outcome).unwrap_or_else(|e| {
                    json!({ "serializationError": e.to_string() })
                });
                self.audit.record(
                    campaign.id,
                    AuditPhase::Distribute,
                    outcome.audit_outcome(),
                    snapshot,
                );
                DistributeReport::Settled {
                    campaign_id: campaign.id,
                    outcome,
                }
            }
            Err(e) => {
                error!(campaign_id = %campaign.id, error = %e, "Distribution failed");
                self.audit.record(
                    campaign.id,
                    AuditPhase::Distribute,
                    AuditOutcome::Error,
                    json!({ "error": e.to_string() }),
                );
                DistributeReport::Error {
                    campaign_id: Some(campaign.id),
                    message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
