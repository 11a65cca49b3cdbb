//! Scheduler API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use bangumi_core::{SchedulerStatus, SweepReport};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SchedulerStatusResponse {
    /// False when no download daemon is configured.
    pub available: bool,
    #[serde(flatten)]
    pub status: Option<SchedulerStatus>,
}

/// GET /api/v1/scheduler/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatusResponse> {
    match state.scheduler() {
        Some(scheduler) => Json(SchedulerStatusResponse {
            available: true,
            status: Some(scheduler.status().await),
        }),
        None => Json(SchedulerStatusResponse {
            available: false,
            status: None,
        }),
    }
}

/// POST /api/v1/scheduler/trigger
///
/// Runs one sweep now. 409 when another manual sweep holds the guard or
/// the sweep timed out.
pub async fn trigger(State(state): State<Arc<AppState>>) -> Result<Json<SweepReport>, ApiError> {
    let scheduler = state.scheduler().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Scheduler not available (no download daemon configured)",
        )
    })?;

    match scheduler.trigger_now().await {
        Some(report) => Ok(Json(report)),
        None => Err(api_error(
            StatusCode::CONFLICT,
            "Sweep already in progress or timed out",
        )),
    }
}
