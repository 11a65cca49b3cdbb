use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{handlers, scheduler, sources, torrents};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Sources
        .route(
            "/sources",
            get(sources::list_sources).post(sources::create_source),
        )
        .route("/sources/analyze", post(sources::analyze_source))
        .route(
            "/sources/{id}",
            get(sources::get_source)
                .patch(sources::update_source)
                .delete(sources::delete_source),
        )
        .route(
            "/sources/{id}/reset-check",
            post(sources::reset_source_check),
        )
        // Torrents
        .route("/torrents", get(torrents::list_torrents))
        .route(
            "/torrents/{id}",
            get(torrents::get_torrent).delete(torrents::delete_torrent),
        )
        .route("/torrents/{id}/retry", post(torrents::retry_torrent))
        .route("/torrents/{id}/refresh", post(torrents::refresh_torrent))
        // Scheduler
        .route("/scheduler/status", get(scheduler::get_status))
        .route("/scheduler/trigger", post(scheduler::trigger));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
