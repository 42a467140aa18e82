//! Payout services: metrics refresh, recalculation, and the lifecycle
//! controller with its ticker.

pub mod audit;
pub mod lifecycle;
pub mod metrics_refresh;
pub mod recalculation;
pub mod ticker;

pub use audit::AuditSink;
pub use lifecycle::{
    CampaignLifecycleController, DistributeReport, LockReport, SkipReason, TickReport,
};
pub use metrics_refresh::{FailedFetch, FetchError, MetricsRefresher, RefreshSummary};
pub use recalculation::{EstimateOutcome, SettlementError, SubmissionRecalculationService};
pub use ticker::LifecycleTicker;
