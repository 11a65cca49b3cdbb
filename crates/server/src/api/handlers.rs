use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use bangumi_core::{FeedError, OrchestratorError, SanitizedConfig, StoreError};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn store_error(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Integrity(_) | StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

pub fn orchestrator_error(e: OrchestratorError) -> ApiError {
    match e {
        OrchestratorError::Store(e) => store_error(e),
        OrchestratorError::AlreadyTracked(_) => api_error(StatusCode::CONFLICT, e.to_string()),
        OrchestratorError::MissingHash(_) | OrchestratorError::WrongSourceKind { .. } => {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        OrchestratorError::TorrentClient(_) => api_error(StatusCode::BAD_GATEWAY, e.to_string()),
        _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub fn feed_error(e: FeedError) -> ApiError {
    let status = match &e {
        FeedError::Fetch(_) => StatusCode::BAD_GATEWAY,
        FeedError::Parse(_) | FeedError::Torrent(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FeedError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

pub fn daemon_unavailable() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "No download daemon configured. Check the [torrent_client] section.",
    )
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
