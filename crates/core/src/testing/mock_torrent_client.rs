//! Mock torrent client for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::torrent_client::{
    extract_hash_from_magnet, AddTorrentRequest, AddTorrentResult, TorrentClient,
    TorrentClientError, TorrentFileEntry, TorrentInfo,
};

/// A recorded torrent addition for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAddTorrent {
    /// The request that was made.
    pub request: AddTorrentRequest,
    /// When the request was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Track added and removed torrents for assertions
/// - Control state strings, progress and file lists
/// - Simulate failures
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
///
/// client.add_torrent(AddTorrentRequest::magnet("magnet:?xt=urn:btih:...")).await?;
/// assert_eq!(client.added_torrents().await.len(), 1);
///
/// // Simulate completion
/// client.set_state(hash, "stalledUP", 1.0).await;
/// client.set_files(hash, vec![fixtures::file_entry("/downloads", "Show - 01.mkv", 100)]).await;
/// ```
#[derive(Debug)]
pub struct MockTorrentClient {
    /// Recorded add_torrent calls.
    added: Arc<RwLock<Vec<RecordedAddTorrent>>>,
    /// Recorded remove_torrent calls as (hash, delete_files).
    removed: Arc<RwLock<Vec<(String, bool)>>>,
    /// Current torrent snapshots by hash.
    torrents: Arc<RwLock<HashMap<String, TorrentInfo>>>,
    /// Hashes whose lookups fail until cleared.
    unreachable: Arc<RwLock<HashSet<String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    /// Counter for generating unique hashes.
    hash_counter: Arc<RwLock<u32>>,
    /// Default save path for new torrents.
    default_save_path: String,
}

impl Default for MockTorrentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self {
            added: Arc::new(RwLock::new(Vec::new())),
            removed: Arc::new(RwLock::new(Vec::new())),
            torrents: Arc::new(RwLock::new(HashMap::new())),
            unreachable: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
            hash_counter: Arc::new(RwLock::new(0)),
            default_save_path: "/mock/downloads".to_string(),
        }
    }

    /// Create a mock client with a custom save path.
    pub fn with_save_path(save_path: impl Into<String>) -> Self {
        Self {
            default_save_path: save_path.into(),
            ..Self::new()
        }
    }

    /// Get all recorded add_torrent calls.
    pub async fn added_torrents(&self) -> Vec<RecordedAddTorrent> {
        self.added.read().await.clone()
    }

    /// Get all recorded remove_torrent calls.
    pub async fn removed_torrents(&self) -> Vec<(String, bool)> {
        self.removed.read().await.clone()
    }

    /// Set the raw daemon state and progress (0.0 to 1.0) for a torrent.
    pub async fn set_state(&self, hash: &str, state: &str, progress: f64) {
        let mut torrents = self.torrents.write().await;
        if let Some(torrent) = torrents.get_mut(hash) {
            torrent.state = state.to_string();
            torrent.progress = progress.clamp(0.0, 1.0);
        }
    }

    /// Replace the file list reported for a torrent.
    pub async fn set_files(&self, hash: &str, files: Vec<TorrentFileEntry>) {
        let mut torrents = self.torrents.write().await;
        if let Some(torrent) = torrents.get_mut(hash) {
            torrent.files = files;
        }
    }

    /// Make lookups of `hash` fail with a connection error.
    pub async fn set_unreachable(&self, hash: &str, unreachable: bool) {
        let mut set = self.unreachable.write().await;
        if unreachable {
            set.insert(hash.to_string());
        } else {
            set.remove(hash);
        }
    }

    /// Forget a torrent as if it was removed outside the application.
    pub async fn forget(&self, hash: &str) {
        self.torrents.write().await.remove(hash);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Check if a torrent exists.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.contains_key(hash)
    }

    /// Get the number of torrents.
    pub async fn torrent_count(&self) -> usize {
        self.torrents.read().await.len()
    }

    /// Pre-populate a torrent (for testing get operations).
    pub async fn add_mock_torrent(&self, info: TorrentInfo) {
        self.torrents.write().await.insert(info.hash.clone(), info);
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<TorrentClientError> {
        self.next_error.write().await.take()
    }

    /// Generate a unique mock hash.
    async fn generate_hash(&self) -> String {
        let mut counter = self.hash_counter.write().await;
        *counter += 1;
        format!("{:040x}", *counter)
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.added.write().await.push(RecordedAddTorrent {
            request: request.clone(),
            timestamp: Utc::now(),
        });

        let hash = match extract_hash_from_magnet(&request.uri) {
            Some(hash) => hash,
            None => self.generate_hash().await,
        };

        let save_path = request
            .download_path
            .clone()
            .unwrap_or_else(|| self.default_save_path.clone());

        let mut torrents = self.torrents.write().await;
        let entry = torrents.entry(hash.clone()).or_insert_with(|| TorrentInfo {
            hash: hash.clone(),
            name: format!("Mock Torrent {}", &hash[..8]),
            state: "metaDL".to_string(),
            progress: 0.0,
            save_path: Some(save_path.clone()),
            content_path: None,
            files: Vec::new(),
        });
        // A re-add restarts the transfer.
        entry.state = "downloading".to_string();

        Ok(AddTorrentResult { hash })
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if self.unreachable.read().await.contains(hash) {
            return Err(TorrentClientError::ConnectionFailed(format!(
                "mock daemon unreachable for {}",
                hash
            )));
        }

        self.torrents
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn remove_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.removed
            .write()
            .await
            .push((hash.to_string(), delete_files));

        if self.torrents.write().await.remove(hash).is_none() {
            return Err(TorrentClientError::TorrentNotFound(hash.to_string()));
        }
        Ok(())
    }
}
