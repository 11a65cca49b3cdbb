//! Tracked torrent API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use bangumi_core::store::{FileStore, MediaFile, Torrent, TorrentFilter, TorrentStore};
use bangumi_core::RetryOutcome;

use super::handlers::{api_error, daemon_unavailable, orchestrator_error, store_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DeleteTorrentParams {
    #[serde(default)]
    pub delete_files: bool,
}

#[derive(Debug, Serialize)]
pub struct TorrentListResponse {
    pub torrents: Vec<Torrent>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct TorrentDetailResponse {
    #[serde(flatten)]
    pub torrent: Torrent,
    pub files: Vec<MediaFile>,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    /// False when the daemon rejected the resubmission.
    pub retried: bool,
    pub torrent: Torrent,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/torrents
pub async fn list_torrents(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TorrentFilter>,
) -> Result<Json<TorrentListResponse>, ApiError> {
    let torrents = state.store().list_torrents(&filter).map_err(store_error)?;
    let count = torrents.len();
    Ok(Json(TorrentListResponse { torrents, count }))
}

/// GET /api/v1/torrents/{id}
pub async fn get_torrent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TorrentDetailResponse>, ApiError> {
    let store = state.store();
    let torrent = store
        .get_torrent(id)
        .map_err(store_error)?
        .ok_or_else(|| torrent_not_found(id))?;
    let files = store.list_files(id).map_err(store_error)?;
    Ok(Json(TorrentDetailResponse { torrent, files }))
}

/// POST /api/v1/torrents/{id}/retry
pub async fn retry_torrent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<RetryResponse>, ApiError> {
    let orch = state.orchestrator().ok_or_else(daemon_unavailable)?;

    match orch.retry_download(id).await.map_err(orchestrator_error)? {
        RetryOutcome::NotFound => Err(torrent_not_found(id)),
        RetryOutcome::Retried(torrent) => Ok(Json(RetryResponse {
            retried: true,
            torrent,
        })),
        RetryOutcome::Failed(torrent) => Ok(Json(RetryResponse {
            retried: false,
            torrent,
        })),
    }
}

/// POST /api/v1/torrents/{id}/refresh
///
/// Re-reads the daemon's file list and organizes it again.
pub async fn refresh_torrent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TorrentDetailResponse>, ApiError> {
    let orch = state.orchestrator().ok_or_else(daemon_unavailable)?;

    let torrent = orch
        .refresh_files(id)
        .await
        .map_err(orchestrator_error)?
        .ok_or_else(|| torrent_not_found(id))?;
    let files = state.store().list_files(id).map_err(store_error)?;
    Ok(Json(TorrentDetailResponse { torrent, files }))
}

/// DELETE /api/v1/torrents/{id}
pub async fn delete_torrent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<DeleteTorrentParams>,
) -> Result<StatusCode, ApiError> {
    let orch = state.orchestrator().ok_or_else(daemon_unavailable)?;

    if orch
        .delete_torrent(id, params.delete_files)
        .await
        .map_err(orchestrator_error)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(torrent_not_found(id))
    }
}

fn torrent_not_found(id: i64) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("Torrent not found: {}", id))
}
