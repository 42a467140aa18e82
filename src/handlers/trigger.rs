//! Scheduler trigger endpoint.
//!
//! `POST` or `GET /api/cron/campaign-lifecycle` runs one lifecycle tick and
//! returns its [`TickReport`]. Callers authenticate with
//! `Authorization: Bearer <secret>`; with no secret configured the endpoint
//! refuses every call.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::{info, warn};

use crate::services::{CampaignLifecycleController, TickReport};

/// Route of the lifecycle trigger.
pub const LIFECYCLE_PATH: &str = "/api/cron/campaign-lifecycle";

/// Trigger request rejections.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Trigger secret is not configured")]
    NotConfigured,

    #[error("Missing or invalid bearer token")]
    Unauthorized,
}

impl IntoResponse for TriggerError {
    fn into_response(self) -> Response {
        let status = match self {
            TriggerError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            TriggerError::Unauthorized => StatusCode::UNAUTHORIZED,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
struct TriggerState {
    controller: Arc<CampaignLifecycleController>,
    secret: Option<Arc<str>>,
}

/// Build the trigger router.
pub fn router(controller: Arc<CampaignLifecycleController>, secret: Option<String>) -> Router {
    let state = TriggerState {
        controller,
        secret: secret.filter(|s| !s.is_empty()).map(Arc::from),
    };

    Router::new()
        .route(LIFECYCLE_PATH, get(run_lifecycle).post(run_lifecycle))
        .route("/health", get(health))
        .with_state(state)
}

async fn run_lifecycle(
    State(state): State<TriggerState>,
    headers: HeaderMap,
) -> Result<Json<TickReport>, TriggerError> {
    authorize(state.secret.as_deref(), &headers)?;

    info!("Lifecycle tick triggered");
    let report = state.controller.run_tick().await;
    Ok(Json(report))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn authorize(secret: Option<&str>, headers: &HeaderMap) -> Result<(), TriggerError> {
    let secret = secret.ok_or(TriggerError::NotConfigured)?;

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(TriggerError::Unauthorized)?;

    if constant_time_eq(token.as_bytes(), secret.as_bytes()) {
        Ok(())
    } else {
        warn!("Lifecycle trigger rejected: bad token");
        Err(TriggerError::Unauthorized)
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
