//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Scheduler sweeps and feed polling
//! - Downloads and file organization
//! - Classifier votes and LLM usage

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Sweeps total by result.
pub static SWEEPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bangumi_sweeps_total", "Total scheduler sweeps"),
        &["result"], // "completed", "timed_out", "skipped"
    )
    .unwrap()
});

/// Sweep duration in seconds.
pub static SWEEP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("bangumi_sweep_duration_seconds", "Duration of scheduler sweeps")
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
        &[],
    )
    .unwrap()
});

/// Feeds polled total by result.
pub static FEEDS_POLLED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bangumi_feeds_polled_total", "Total feed polls"),
        &["result"], // "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Downloads created total.
pub static DOWNLOADS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("bangumi_downloads_created_total", "Total downloads created").unwrap()
});

/// Downloads completed total.
pub static DOWNLOADS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "bangumi_downloads_completed_total",
        "Total downloads completed successfully",
    )
    .unwrap()
});

/// Downloads failed total.
pub static DOWNLOADS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("bangumi_downloads_failed_total", "Total downloads that failed").unwrap()
});

/// Retry attempts by result.
pub static RETRY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bangumi_retry_attempts_total", "Total manual retries"),
        &["result"], // "retried", "failed"
    )
    .unwrap()
});

// =============================================================================
// Organization Metrics
// =============================================================================

/// Files considered during organization by result.
pub static FILES_ORGANIZED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bangumi_files_organized_total", "Files considered during organization"),
        &["result"], // "kept", "not_main_content", "no_episode"
    )
    .unwrap()
});

/// Hardlink attempts by result.
pub static HARDLINKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bangumi_hardlinks_total", "Total hardlink attempts"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Classifier votes by outcome.
pub static CLASSIFIER_VOTES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bangumi_classifier_votes_total", "Main content votes cast"),
        &["outcome"], // "yes", "no", "error", "timeout"
    )
    .unwrap()
});

/// LLM tokens used.
pub static LLM_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bangumi_llm_tokens_total", "Total LLM tokens used"),
        &["provider", "direction"], // direction: "input", "output"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scheduler
        Box::new(SWEEPS_TOTAL.clone()),
        Box::new(SWEEP_DURATION.clone()),
        Box::new(FEEDS_POLLED.clone()),
        // Downloads
        Box::new(DOWNLOADS_CREATED.clone()),
        Box::new(DOWNLOADS_COMPLETED.clone()),
        Box::new(DOWNLOADS_FAILED.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        // Organization
        Box::new(FILES_ORGANIZED.clone()),
        Box::new(HARDLINKS_TOTAL.clone()),
        Box::new(CLASSIFIER_VOTES.clone()),
        Box::new(LLM_TOKENS.clone()),
    ]
}
