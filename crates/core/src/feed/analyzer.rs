//! Inspect a URL before it is registered as a source.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::ai::MediaBrain;
use crate::store::SourceKind;
use crate::torrent_client::extract_hash_from_magnet;

use super::{FeedError, FeedItem, FeedReader};

const SAMPLE_ITEMS: usize = 5;

/// What a URL offers as a source, with suggested registry fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceAnalysis {
    pub url: String,
    pub kind: SourceKind,
    /// Feed channel title, or the magnet display name.
    pub title: Option<String>,
    pub suggested_title: Option<String>,
    pub suggested_season: Option<u32>,
    /// Downloadable items currently in the feed.
    pub item_count: usize,
    pub sample_items: Vec<FeedItem>,
}

/// Reads a feed or magnet link and asks the brain for a show name and season.
pub struct SourceAnalyzer {
    reader: FeedReader,
    brain: Arc<dyn MediaBrain>,
}

impl SourceAnalyzer {
    pub fn new(reader: FeedReader, brain: Arc<dyn MediaBrain>) -> Self {
        Self { reader, brain }
    }

    pub async fn analyze(&self, url: &str) -> Result<SourceAnalysis, FeedError> {
        let url = url.trim();
        let mut analysis = if url.starts_with("magnet:") {
            if extract_hash_from_magnet(url).is_none() {
                return Err(FeedError::Parse("magnet link has no info hash".to_string()));
            }
            SourceAnalysis::empty(url, SourceKind::Magnet, magnet_display_name(url))
        } else {
            let feed = self.reader.read(url).await?;
            let title = feed
                .title
                .filter(|t| !t.trim().is_empty())
                .or_else(|| feed.items.first().map(|item| item.title.clone()));
            let mut analysis = SourceAnalysis::empty(url, SourceKind::Rss, title);
            analysis.item_count = feed.items.len();
            analysis.sample_items = feed.items.into_iter().take(SAMPLE_ITEMS).collect();
            analysis
        };

        if let Some(title) = &analysis.title {
            analysis.suggested_title = self.brain.extract_name(title).await;
            analysis.suggested_season = self.brain.extract_season(title).await;
        } else {
            debug!(url, "Nothing to suggest from, no title found");
        }

        info!(
            url,
            title = ?analysis.title,
            suggested_title = ?analysis.suggested_title,
            suggested_season = ?analysis.suggested_season,
            "Source analyzed"
        );
        Ok(analysis)
    }
}

impl SourceAnalysis {
    fn empty(url: &str, kind: SourceKind, title: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            kind,
            title,
            suggested_title: None,
            suggested_season: None,
            item_count: 0,
            sample_items: Vec::new(),
        }
    }
}

/// The `dn` parameter of a magnet URI, decoded.
fn magnet_display_name(magnet: &str) -> Option<String> {
    let (_, query) = magnet.split_once('?')?;
    let raw = query.split('&').find_map(|param| param.strip_prefix("dn="))?;
    let name = urlencoding::decode(&raw.replace('+', " ")).ok()?.trim().to_string();
    (!name.is_empty()).then_some(name)
}
