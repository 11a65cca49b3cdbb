//! Types for download daemon operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Invalid torrent data: {0}")]
    InvalidTorrent(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Daemon states that mean the payload is fully on disk.
pub const COMPLETED_STATES: &[&str] = &["uploading", "stalledUP", "forcedUP", "queuedUP", "pausedUP"];

/// Daemon states that mean the transfer is broken.
pub const ERROR_STATES: &[&str] = &["error", "missingFiles"];

/// One file inside a torrent as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentFileEntry {
    /// Path relative to the save path (includes the torrent root folder).
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Absolute path on the daemon's filesystem.
    pub path: String,
}

/// Snapshot of a transfer as reported by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    /// Torrent name.
    pub name: String,
    /// Raw daemon state (e.g. "downloading", "stalledUP", "missingFiles").
    pub state: String,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Save path on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    /// Root of the payload (folder for multi-file, file for single-file).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
    /// Files in the payload. Empty until metadata is known.
    pub files: Vec<TorrentFileEntry>,
}

impl TorrentInfo {
    pub fn is_complete(&self) -> bool {
        COMPLETED_STATES.contains(&self.state.as_str())
    }

    pub fn is_errored(&self) -> bool {
        ERROR_STATES.contains(&self.state.as_str())
    }
}

/// Request to add a new transfer from a magnet URI.
#[derive(Debug, Clone, PartialEq)]
pub struct AddTorrentRequest {
    /// Magnet URI.
    pub uri: String,
    /// Optional download path override.
    pub download_path: Option<String>,
}

impl AddTorrentRequest {
    /// Create a magnet request with default options.
    pub fn magnet(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            download_path: None,
        }
    }

    /// Set the download path.
    pub fn with_download_path(mut self, path: impl Into<String>) -> Self {
        self.download_path = Some(path.into());
        self
    }
}

/// Result of adding a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTorrentResult {
    /// Info hash of the added torrent (empty if the URI carried none).
    pub hash: String,
}

/// Trait for download daemon backends.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Ask the daemon to begin a transfer.
    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError>;

    /// Current snapshot of a transfer, including its file list.
    /// Returns `TorrentNotFound` when the daemon does not know the hash.
    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError>;

    /// Remove a transfer.
    /// If `delete_files` is true, also delete downloaded files.
    async fn remove_torrent(&self, hash: &str, delete_files: bool)
        -> Result<(), TorrentClientError>;
}

/// Extract the info hash from a magnet URI as lowercase hex.
pub fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let (_, query) = magnet.split_once('?')?;

    query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .and_then(normalize_info_hash)
}

/// Normalize a BitTorrent v1 info hash to lowercase hex.
///
/// Accepts 40-char hex or 32-char base32 (as found in some magnet links).
pub fn normalize_info_hash(raw: &str) -> Option<String> {
    match raw.len() {
        40 if raw.chars().all(|c| c.is_ascii_hexdigit()) => Some(raw.to_ascii_lowercase()),
        32 => base32_to_hex(raw),
        _ => None,
    }
}

fn base32_to_hex(raw: &str) -> Option<String> {
    let mut bits: u64 = 0;
    let mut bit_count = 0;
    let mut hex = String::with_capacity(40);

    for c in raw.chars() {
        let value = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        bits = ((bits << 5) | value) & 0xffff;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            let byte = (bits >> bit_count) & 0xff;
            hex.push_str(&format!("{:02x}", byte));
        }
    }

    Some(hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(state: &str) -> TorrentInfo {
        TorrentInfo {
            hash: "abc".to_string(),
            name: "Test".to_string(),
            state: state.to_string(),
            progress: 1.0,
            save_path: None,
            content_path: None,
            files: vec![],
        }
    }

    #[test]
    fn test_completed_states() {
        for state in ["uploading", "stalledUP", "forcedUP", "queuedUP", "pausedUP"] {
            assert!(info(state).is_complete(), "{} should be complete", state);
        }
        assert!(!info("downloading").is_complete());
        assert!(!info("stalledDL").is_complete());
    }

    #[test]
    fn test_error_states() {
        assert!(info("error").is_errored());
        assert!(info("missingFiles").is_errored());
        assert!(!info("pausedDL").is_errored());
    }

    #[test]
    fn test_add_torrent_request_builder() {
        let req = AddTorrentRequest::magnet("magnet:?xt=urn:btih:abc123")
            .with_download_path("/downloads");

        assert_eq!(req.uri, "magnet:?xt=urn:btih:abc123");
        assert_eq!(req.download_path, Some("/downloads".to_string()));
    }

    #[test]
    fn test_extract_hash_from_magnet() {
        let hash = "c12fe1c06bba254a9dc9f519b335aa7c1367a88a";
        let magnet = format!("magnet:?xt=urn:btih:{}&dn=Test", hash);
        assert_eq!(extract_hash_from_magnet(&magnet), Some(hash.to_string()));

        let magnet_upper = format!("magnet:?dn=Test&xt=urn:btih:{}", hash.to_uppercase());
        assert_eq!(extract_hash_from_magnet(&magnet_upper), Some(hash.to_string()));

        assert_eq!(extract_hash_from_magnet("not a magnet"), None);
        assert_eq!(extract_hash_from_magnet("magnet:?dn=Test"), None);
        assert_eq!(extract_hash_from_magnet("magnet:?xt=urn:btih:"), None);
        assert_eq!(extract_hash_from_magnet("magnet:?xt=urn:btih:abc123"), None);
    }

    #[test]
    fn test_normalize_base32_hash() {
        // 20 zero bytes
        assert_eq!(
            normalize_info_hash("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
            Some("0".repeat(40))
        );
        // 20 0xff bytes
        assert_eq!(
            normalize_info_hash("77777777777777777777777777777777"),
            Some("f".repeat(40))
        );
        assert_eq!(normalize_info_hash("1AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"), None);
    }
}
