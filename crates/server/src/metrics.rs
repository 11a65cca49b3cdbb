//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the server:
//! - HTTP request metrics (latency, counts)
//! - Source and torrent counts (collected dynamically)
//! - Scheduler status (collected dynamically)
//!
//! Core pipeline metrics are registered from `bangumi_core::metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::error;

use bangumi_core::store::{DownloadStatus, SourceKind, SourceStore, TorrentFilter, TorrentStore};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "bangumi_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bangumi_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "bangumi_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Library Metrics
// =============================================================================

/// Sources by kind (collected dynamically).
pub static SOURCES_BY_KIND: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("bangumi_sources", "Registered sources by kind"),
        &["kind"],
    )
    .unwrap()
});

/// Torrents by status (collected dynamically).
pub static TORRENTS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("bangumi_torrents", "Tracked torrents by status"),
        &["status"],
    )
    .unwrap()
});

/// Whether the scheduler tick loop is running.
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "bangumi_scheduler_running",
        "Whether the scheduler is running (1) or not (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Library
    registry
        .register(Box::new(SOURCES_BY_KIND.clone()))
        .unwrap();
    registry
        .register(Box::new(TORRENTS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(SCHEDULER_RUNNING.clone()))
        .unwrap();

    // Core metrics (sweeps, downloads, organization, AI)
    for metric in bangumi_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the store and scheduler.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Some(scheduler) = state.scheduler() {
        let status = scheduler.status().await;
        SCHEDULER_RUNNING.set(if status.running { 1 } else { 0 });
    }

    let store = state.store();
    for kind in [SourceKind::Rss, SourceKind::Magnet] {
        if let Ok(sources) = store.list_sources(Some(kind)) {
            SOURCES_BY_KIND
                .with_label_values(&[kind.as_str()])
                .set(sources.len() as i64);
        }
    }

    for status in [
        DownloadStatus::Downloading,
        DownloadStatus::Downloaded,
        DownloadStatus::Failed,
    ] {
        let filter = TorrentFilter::new().with_status(status);
        if let Ok(torrents) = store.list_torrents(&filter) {
            TORRENTS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(torrents.len() as i64);
        }
    }
}

static HASH_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{40}").unwrap());
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = HASH_SEGMENT.replace_all(path, "{hash}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
