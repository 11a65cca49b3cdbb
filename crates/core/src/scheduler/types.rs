//! Types for the scheduler.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::orchestrator::ReconcileReport;

use super::poller::PollReport;

/// Result of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub poll: PollReport,
    pub reconcile: ReconcileReport,
}

/// Current status of the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the tick loop is running.
    pub running: bool,
    /// Whether ticks are suspended for a manual sweep.
    pub paused: bool,
    /// Whether a sweep is in flight.
    pub sweeping: bool,
    pub tick_interval_secs: u64,
    pub last_sweep: Option<SweepReport>,
}
