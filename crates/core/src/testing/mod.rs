//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every external capability
//! (download daemon, AI, feed HTTP), allowing the whole pipeline to be
//! exercised without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use bangumi_core::testing::{fixtures, MockBrain, MockFeedFetcher, MockTorrentClient};
//!
//! let client = MockTorrentClient::new();
//! let brain = MockBrain::new();
//! let fetcher = MockFeedFetcher::new();
//!
//! fetcher.set_feed("https://feeds.example/show", &fixtures::rss_feed("Show", &[...])).await;
//! client.set_state(hash, "stalledUP", 1.0).await;
//! ```

mod mock_brain;
mod mock_feed_fetcher;
mod mock_torrent_client;

pub use mock_brain::{MockBrain, MockVote};
pub use mock_feed_fetcher::MockFeedFetcher;
pub use mock_torrent_client::{MockTorrentClient, RecordedAddTorrent};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::store::{MediaType, Source, SourceKind};
    use crate::torrent_client::{TorrentFileEntry, TorrentInfo};

    /// An in-memory source record (not persisted).
    pub fn source(id: i64, title: &str, media_type: MediaType) -> Source {
        Source {
            id,
            url: format!("https://feeds.example/{}", id),
            kind: SourceKind::Rss,
            media_type,
            title: title.to_string(),
            season: None,
            use_ai_episode: false,
            episode_regex: None,
            episode_offset: 0,
            enable_sr: false,
            check_interval: 3600,
            last_check: None,
            created_at: Utc::now(),
        }
    }

    /// Deterministic 40-char hex hash derived from `seed`.
    pub fn hash(seed: u32) -> String {
        format!("{:040x}", seed)
    }

    /// Minimal magnet link for `hash`.
    pub fn magnet(hash: &str) -> String {
        format!("magnet:?xt=urn:btih:{}", hash)
    }

    /// A daemon file entry under `save_path`.
    pub fn file_entry(save_path: &str, name: &str, size: u64) -> TorrentFileEntry {
        TorrentFileEntry {
            name: name.to_string(),
            size,
            path: format!("{}/{}", save_path.trim_end_matches('/'), name),
        }
    }

    /// A daemon snapshot with no files.
    pub fn torrent_info(hash: &str, state: &str, progress: f64) -> TorrentInfo {
        TorrentInfo {
            hash: hash.to_string(),
            name: format!("Torrent {}", &hash[..hash.len().min(8)]),
            state: state.to_string(),
            progress,
            save_path: Some("/mock/downloads".to_string()),
            content_path: None,
            files: Vec::new(),
        }
    }

    /// An RSS document with one magnet item per `(title, hash)`.
    pub fn rss_feed(channel_title: &str, items: &[(&str, &str)]) -> String {
        let mut xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\"><channel><title>{}</title>\n",
            channel_title
        );
        for (title, hash) in items {
            xml.push_str(&format!(
                "<item><title>{}</title><link>magnet:?xt=urn:btih:{}</link></item>\n",
                title, hash
            ));
        }
        xml.push_str("</channel></rss>\n");
        xml
    }
}
