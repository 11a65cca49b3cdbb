//! RSS feed fetching and parsing.
//!
//! A feed item becomes a download candidate when it has a title and a
//! magnet link. Items that only point at a `.torrent` file get a magnet
//! built from the downloaded metainfo.

mod analyzer;
mod fetcher;
mod parser;
mod torrent_file;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use analyzer::{SourceAnalysis, SourceAnalyzer};
pub use fetcher::{FeedFetcher, HttpFeedFetcher};
pub use parser::{find_magnet, find_torrent_url, parse_feed, parse_rss_date, RawFeed, RawFeedItem};
pub use torrent_file::magnet_from_torrent;

/// Errors from feed handling.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to fetch feed: {0}")]
    Fetch(String),

    #[error("Failed to parse feed: {0}")]
    Parse(String),

    #[error("Invalid torrent file: {0}")]
    Torrent(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A downloadable feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub magnet: String,
    /// Info hash, lowercase hex.
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<DateTime<Utc>>,
}

/// A fetched and resolved feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

/// Fetches a feed and resolves every item to a magnet link.
pub struct FeedReader {
    fetcher: Arc<dyn FeedFetcher>,
}

impl FeedReader {
    pub fn new(fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch and parse `url`. Items without a title or magnet are dropped.
    pub async fn read(&self, url: &str) -> Result<Feed, FeedError> {
        let content = self
            .fetcher
            .fetch(url)
            .await
            .ok_or_else(|| FeedError::Fetch(url.to_string()))?;

        let raw = parse_feed(&content)?;
        let mut items = Vec::with_capacity(raw.items.len());

        for raw_item in raw.items {
            if let Some(item) = self.resolve(raw_item).await {
                items.push(item);
            }
        }

        debug!(url, title = ?raw.title, items = items.len(), "Feed read");
        Ok(Feed {
            title: raw.title,
            items,
        })
    }

    async fn resolve(&self, raw: RawFeedItem) -> Option<FeedItem> {
        let title = raw.title?;

        let (magnet, hash) = match raw.magnet {
            Some(found) => found,
            None => {
                let torrent_url = raw.torrent_url?;
                let bytes = self.fetcher.fetch_bytes(&torrent_url).await?;
                match magnet_from_torrent(&bytes) {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(url = %torrent_url, error = %e, "Skipping item with unreadable torrent");
                        return None;
                    }
                }
            }
        };

        Some(FeedItem {
            title,
            magnet,
            hash,
            link: raw.link,
            pub_date: raw.pub_date,
        })
    }
}
