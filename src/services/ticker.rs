//! In-process lifecycle ticker.
//!
//! Alternative to an external scheduler hitting the trigger endpoint: runs a
//! tick on a fixed interval. Ticks are serialized by the controller, so the
//! ticker and the endpoint may both be active.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::lifecycle::{CampaignLifecycleController, DistributeReport, LockReport};

/// Background task that runs lifecycle ticks periodically.
pub struct LifecycleTicker {
    controller: Arc<CampaignLifecycleController>,
    interval: Duration,
}

impl LifecycleTicker {
    pub fn new(controller: Arc<CampaignLifecycleController>, interval: Duration) -> Self {
        Self {
            controller,
            interval,
        }
    }

    /// Spawn the ticker. Abort the returned handle to stop it.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval = ?self.interval, "Starting lifecycle ticker");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let report = self.controller.run_tick().await;
                if matches!(report.lock, LockReport::Error { .. })
                    || matches!(report.distribute, DistributeReport::Error { .. })
                {
                    warn!(report = ?report, "Lifecycle tick reported errors");
                }
            }
        })
    }
}
