//! Download orchestration.
//!
//! The orchestrator owns the torrent state machine:
//! - **downloading**: submitted to the daemon, progress mirrored on each sweep
//! - **downloaded**: daemon reports a seeding state; files organized once
//! - **failed**: daemon error state, missing snapshot or rejected submission
//!
//! `downloading` and `failed` flip back and forth through reconciliation or
//! retry. `downloaded` is terminal; a file refresh may change its files but
//! not its status.

mod downloads;
mod types;

pub use downloads::DownloadOrchestrator;
pub use types::{
    OrchestratorError, OrganizeReport, ReconcileOutcome, ReconcileReport, RetryOutcome,
};
