//! campaign-payout: lifecycle controller service
//!
//! Serves the scheduler trigger endpoint and, optionally, runs lifecycle
//! ticks on an internal interval.
//!
//! ## Architecture
//! ```text
//! [scheduler] --(POST /api/cron/campaign-lifecycle)--> [campaign-payout]
//!                                                          |        |
//!                                                          v        v
//!                                                      SQLite   metrics provider
//! ```
//!
//! ## Configuration
//! - PAYOUT_CONFIG: Path to a YAML config file (optional)
//! - PAYOUT__TRIGGER__SECRET: Bearer secret for the trigger endpoint
//! - PAYOUT__TRIGGER__INTERVAL_SECS: Internal ticker period (optional)
//! - PAYOUT__METRICS__BASE_URL / PAYOUT__METRICS__API_KEY: Metrics provider
//! - PAYOUT_LOG: Log filter (default: info)

use std::sync::Arc;

use tracing::{info, warn};

use campaign_payout::clients::HttpMetricsProvider;
use campaign_payout::config::Config;
use campaign_payout::handlers::{router, LIFECYCLE_PATH};
use campaign_payout::services::{CampaignLifecycleController, LifecycleTicker};
use campaign_payout::storage::init_storage;
use campaign_payout::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;

    let (campaign_store, audit_store) = init_storage(&config.storage).await?;
    let provider = Arc::new(HttpMetricsProvider::new(config.metrics.clone())?);

    let controller = Arc::new(CampaignLifecycleController::new(
        campaign_store,
        audit_store,
        provider,
        config.lifecycle.clone(),
    ));

    let ticker = config
        .trigger
        .interval()
        .map(|interval| LifecycleTicker::new(Arc::clone(&controller), interval).spawn());

    if config.trigger.secret.is_none() {
        warn!("No trigger secret configured; {} will refuse requests", LIFECYCLE_PATH);
    }

    let app = router(controller, config.trigger.secret.clone());
    let address = config.trigger.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(address = %address, "campaign-payout started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = ticker {
        handle.abort();
    }

    info!("campaign-payout stopped");
    Ok(())
}
