//! Types for the download orchestrator.

use serde::Serialize;
use thiserror::Error;

use crate::store::Torrent;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A torrent with this hash is already tracked.
    #[error("torrent already tracked: {0}")]
    AlreadyTracked(String),

    /// The magnet URI carries no usable info hash.
    #[error("no info hash in {0}")]
    MissingHash(String),

    /// Operation needs a source of another kind.
    #[error("source {id} is not a {expected} source")]
    WrongSourceKind { id: i64, expected: String },

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Torrent client error.
    #[error("torrent client error: {0}")]
    TorrentClient(#[from] crate::torrent_client::TorrentClientError),

    /// Linker error.
    #[error("linker error: {0}")]
    Link(#[from] crate::linker::LinkError),

    /// Feed error.
    #[error("feed error: {0}")]
    Feed(#[from] crate::feed::FeedError),
}

/// What a reconciliation did to a torrent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Still transferring (or waiting); progress in percent.
    Downloading { progress: f64 },
    /// Just finished; files were organized.
    Completed { report: OrganizeReport },
    /// Already downloaded before this call; nothing re-run.
    AlreadyDownloaded,
    /// Marked failed with this message.
    Failed { message: String },
}

/// Counters from one `reconcile_pending` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub downloading: usize,
    pub completed: usize,
    pub failed: usize,
    /// Torrents whose reconciliation could not be persisted.
    pub errors: usize,
}

/// Counters from one `organize_files` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizeReport {
    /// Files reported by the daemon.
    pub total: usize,
    /// Rows persisted.
    pub kept: usize,
    pub skipped_not_main: usize,
    pub skipped_no_episode: usize,
    pub linked: usize,
    pub link_failed: usize,
}

/// Result of `retry_download`.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// No torrent with that id; nothing changed.
    NotFound,
    /// Re-submitted to the daemon.
    Retried(Torrent),
    /// Re-submission failed; persisted as failed.
    Failed(Torrent),
}

impl RetryOutcome {
    /// The torrent after the retry, if one exists.
    pub fn torrent(&self) -> Option<&Torrent> {
        match self {
            RetryOutcome::NotFound => None,
            RetryOutcome::Retried(t) | RetryOutcome::Failed(t) => Some(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_outcome_serialization() {
        let json = serde_json::to_value(ReconcileOutcome::Failed {
            message: "torrent info unavailable".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["message"], "torrent info unavailable");

        let json = serde_json::to_value(ReconcileOutcome::AlreadyDownloaded).unwrap();
        assert_eq!(json["outcome"], "already_downloaded");
    }

    #[test]
    fn test_retry_outcome_not_found_has_no_torrent() {
        assert!(RetryOutcome::NotFound.torrent().is_none());
    }
}
