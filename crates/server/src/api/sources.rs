//! Source registry API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use bangumi_core::store::{NewSource, Source, SourceKind, SourceStore, SourceUpdate, Torrent};
use bangumi_core::SourceAnalysis;

use super::handlers::{api_error, feed_error, store_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing sources
#[derive(Debug, Deserialize)]
pub struct ListSourcesParams {
    pub kind: Option<SourceKind>,
}

#[derive(Debug, Serialize)]
pub struct ListSourcesResponse {
    pub sources: Vec<Source>,
    pub count: usize,
}

/// Response for creating a source
#[derive(Debug, Serialize)]
pub struct CreateSourceResponse {
    #[serde(flatten)]
    pub source: Source,
    /// Download started for a magnet source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent: Option<Torrent>,
    /// Why a magnet source could not be enqueued; the source is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enqueue_error: Option<String>,
}

/// Request body for analyzing a URL
#[derive(Debug, Deserialize)]
pub struct AnalyzeSourceRequest {
    pub url: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/sources
///
/// Magnet sources are enqueued right away when a daemon is configured.
pub async fn create_source(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewSource>,
) -> Result<(StatusCode, Json<CreateSourceResponse>), ApiError> {
    let source = state.store().create_source(body).map_err(store_error)?;
    info!(source_id = source.id, kind = source.kind.as_str(), title = %source.title, "Source created");

    let mut response = CreateSourceResponse {
        source,
        torrent: None,
        enqueue_error: None,
    };

    if response.source.kind == SourceKind::Magnet {
        match state.orchestrator() {
            Some(orch) => match orch.enqueue_magnet_source(&response.source).await {
                Ok(torrent) => response.torrent = torrent,
                Err(e) => {
                    warn!(source_id = response.source.id, error = %e, "Failed to enqueue magnet source");
                    response.enqueue_error = Some(e.to_string());
                }
            },
            None => response.enqueue_error = Some("no download daemon configured".to_string()),
        }
    }

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/sources
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSourcesParams>,
) -> Result<Json<ListSourcesResponse>, ApiError> {
    let sources = state
        .store()
        .list_sources(params.kind)
        .map_err(store_error)?;
    let count = sources.len();
    Ok(Json(ListSourcesResponse { sources, count }))
}

/// GET /api/v1/sources/{id}
pub async fn get_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Source>, ApiError> {
    match state.store().get_source(id).map_err(store_error)? {
        Some(source) => Ok(Json(source)),
        None => Err(source_not_found(id)),
    }
}

/// PATCH /api/v1/sources/{id}
pub async fn update_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<SourceUpdate>,
) -> Result<Json<Source>, ApiError> {
    match state.store().update_source(id, body).map_err(store_error)? {
        Some(source) => Ok(Json(source)),
        None => Err(source_not_found(id)),
    }
}

/// DELETE /api/v1/sources/{id}
///
/// Torrents and files of the source are deleted with it.
pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.store().delete_source(id).map_err(store_error)? {
        info!(source_id = id, "Source deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(source_not_found(id))
    }
}

/// POST /api/v1/sources/analyze
///
/// Reads the feed (or magnet display name) and suggests a title and season.
/// Nothing is stored.
pub async fn analyze_source(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AnalyzeSourceRequest>,
) -> Result<Json<SourceAnalysis>, ApiError> {
    if body.url.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "url cannot be empty"));
    }
    let analysis = state.analyzer().analyze(&body.url).await.map_err(feed_error)?;
    Ok(Json(analysis))
}

/// POST /api/v1/sources/{id}/reset-check
///
/// Clears `last_check` so the next sweep polls the source.
pub async fn reset_source_check(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Source>, ApiError> {
    match state.store().reset_last_check(id).map_err(store_error)? {
        Some(source) => {
            info!(source_id = id, "Source check time reset");
            Ok(Json(source))
        }
        None => Err(source_not_found(id)),
    }
}

fn source_not_found(id: i64) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("Source not found: {}", id))
}
