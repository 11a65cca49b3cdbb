//! Storage traits for sources, torrents and files.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{
    HardlinkOutcome, MediaFile, NewMediaFile, NewSource, NewTorrent, Source, SourceKind,
    SourceUpdate, Torrent, TorrentFilter,
};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Input rejected before touching the database.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unique key already taken (source url, torrent hash).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A row references a parent that does not exist.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Source registry.
pub trait SourceStore: Send + Sync {
    /// Register a source. Rejects `check_interval == 0` and invalid patterns.
    fn create_source(&self, source: NewSource) -> Result<Source, StoreError>;

    fn get_source(&self, id: i64) -> Result<Option<Source>, StoreError>;

    /// List sources, optionally only those of one kind.
    fn list_sources(&self, kind: Option<SourceKind>) -> Result<Vec<Source>, StoreError>;

    /// Apply a partial update. Returns `None` if the source does not exist.
    fn update_source(&self, id: i64, update: SourceUpdate) -> Result<Option<Source>, StoreError>;

    /// Record a successful poll.
    fn set_last_check(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Forget the last poll so the source is due on the next sweep.
    /// Returns `None` if the source does not exist.
    fn reset_last_check(&self, id: i64) -> Result<Option<Source>, StoreError>;

    /// Delete a source and, transitively, its torrents and files.
    fn delete_source(&self, id: i64) -> Result<bool, StoreError>;
}

/// Torrent records.
pub trait TorrentStore: Send + Sync {
    /// Insert a torrent. Fails with `Conflict` if the hash exists.
    fn create_torrent(&self, torrent: NewTorrent) -> Result<Torrent, StoreError>;

    fn get_torrent(&self, id: i64) -> Result<Option<Torrent>, StoreError>;

    fn get_torrent_by_hash(&self, hash: &str) -> Result<Option<Torrent>, StoreError>;

    fn torrent_exists(&self, hash: &str) -> Result<bool, StoreError>;

    /// List torrents, newest first.
    fn list_torrents(&self, filter: &TorrentFilter) -> Result<Vec<Torrent>, StoreError>;

    /// Torrents whose status is not `downloaded`.
    fn list_unfinished_torrents(&self) -> Result<Vec<Torrent>, StoreError>;

    /// Persist status, progress, timestamps and error of an existing torrent.
    fn update_torrent(&self, torrent: &Torrent) -> Result<(), StoreError>;

    /// Delete a torrent and its files.
    fn delete_torrent(&self, id: i64) -> Result<bool, StoreError>;
}

/// File records of completed torrents.
pub trait FileStore: Send + Sync {
    /// Replace every file row of a torrent in one transaction.
    fn replace_files(
        &self,
        torrent_id: i64,
        files: Vec<NewMediaFile>,
    ) -> Result<Vec<MediaFile>, StoreError>;

    fn list_files(&self, torrent_id: i64) -> Result<Vec<MediaFile>, StoreError>;

    fn record_hardlink(&self, file_id: i64, outcome: &HardlinkOutcome) -> Result<(), StoreError>;

    /// Remove every file row of a torrent. Returns the number removed.
    fn delete_files(&self, torrent_id: i64) -> Result<usize, StoreError>;
}

/// Everything the pipeline persists.
pub trait MediaStore: SourceStore + TorrentStore + FileStore {}

impl<T: SourceStore + TorrentStore + FileStore> MediaStore for T {}
