//! RSS polling: turns new feed items into downloads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::feed::FeedReader;
use crate::metrics::FEEDS_POLLED;
use crate::orchestrator::{DownloadOrchestrator, OrchestratorError};
use crate::store::{MediaStore, Source, SourceKind, SourceStore};

/// Outcome of polling one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourcePoll {
    pub items: usize,
    pub created: usize,
    /// Items whose hash was already tracked.
    pub duplicates: usize,
    /// Items the daemon or store rejected.
    pub rejected: usize,
}

/// Totals across one poll of all due sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub sources_due: usize,
    pub sources_failed: usize,
    pub items: usize,
    pub created: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

impl PollReport {
    fn add(&mut self, poll: &SourcePoll) {
        self.items += poll.items;
        self.created += poll.created;
        self.duplicates += poll.duplicates;
        self.rejected += poll.rejected;
    }
}

/// Polls RSS sources and hands unseen items to the orchestrator.
pub struct FeedPoller {
    store: Arc<dyn MediaStore>,
    reader: FeedReader,
    orchestrator: Arc<DownloadOrchestrator>,
}

impl FeedPoller {
    pub fn new(
        store: Arc<dyn MediaStore>,
        reader: FeedReader,
        orchestrator: Arc<DownloadOrchestrator>,
    ) -> Self {
        Self {
            store,
            reader,
            orchestrator,
        }
    }

    /// Poll every RSS source that is due at `now`.
    ///
    /// A failing source is logged and counted; the others still run.
    pub async fn poll_due(&self, now: DateTime<Utc>) -> Result<PollReport, OrchestratorError> {
        let sources = self.store.list_sources(Some(SourceKind::Rss))?;
        let mut report = PollReport::default();

        for source in sources.iter().filter(|s| s.is_due(now)) {
            report.sources_due += 1;
            match self.poll_source(source).await {
                Ok(poll) => report.add(&poll),
                Err(e) => {
                    warn!(source_id = source.id, url = %source.url, error = %e, "Source poll failed");
                    report.sources_failed += 1;
                }
            }
        }

        if report.sources_due > 0 {
            info!(
                sources = report.sources_due,
                failed = report.sources_failed,
                created = report.created,
                "Feed poll finished"
            );
        }
        Ok(report)
    }

    /// Fetch one source's feed and create downloads for unseen items.
    ///
    /// `last_check` is updated as soon as the feed parses, even when it has
    /// no items.
    pub async fn poll_source(&self, source: &Source) -> Result<SourcePoll, OrchestratorError> {
        let feed = match self.reader.read(&source.url).await {
            Ok(feed) => feed,
            Err(e) => {
                FEEDS_POLLED.with_label_values(&["error"]).inc();
                return Err(e.into());
            }
        };
        FEEDS_POLLED.with_label_values(&["success"]).inc();
        self.store.set_last_check(source.id, Utc::now())?;

        let mut poll = SourcePoll {
            items: feed.items.len(),
            ..Default::default()
        };

        for item in &feed.items {
            if self.orchestrator.is_downloaded(&item.hash)? {
                debug!(source_id = source.id, hash = %item.hash, "Item already tracked");
                poll.duplicates += 1;
                continue;
            }

            match self
                .orchestrator
                .create_download(source.id, &item.magnet, &item.hash)
                .await
            {
                Ok(torrent) => {
                    info!(
                        source_id = source.id,
                        torrent_id = torrent.id,
                        title = %item.title,
                        "New release queued"
                    );
                    poll.created += 1;
                }
                Err(OrchestratorError::AlreadyTracked(_)) => poll.duplicates += 1,
                Err(e) => {
                    warn!(source_id = source.id, title = %item.title, error = %e, "Failed to queue release");
                    poll.rejected += 1;
                }
            }
        }

        Ok(poll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MajorityClassifier;
    use crate::config::{ClassifierConfig, HardlinkConfig};
    use crate::episode::EpisodeExtractor;
    use crate::linker::HardlinkOrganizer;
    use crate::store::{MediaType, NewSource, SqliteStore, TorrentStore};
    use crate::testing::{fixtures, MockBrain, MockFeedFetcher, MockTorrentClient};
    use crate::torrent_client::TorrentClientError;

    struct Harness {
        store: Arc<SqliteStore>,
        fetcher: Arc<MockFeedFetcher>,
        client: Arc<MockTorrentClient>,
        poller: FeedPoller,
    }

    fn harness() -> Harness {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let fetcher = Arc::new(MockFeedFetcher::new());
        let client = Arc::new(MockTorrentClient::new());
        let brain = Arc::new(MockBrain::new());
        let orchestrator = Arc::new(DownloadOrchestrator::new(
            store.clone(),
            client.clone(),
            Arc::new(MajorityClassifier::new(
                brain.clone(),
                &ClassifierConfig::default(),
            )),
            EpisodeExtractor::new(brain),
            HardlinkOrganizer::new(HardlinkConfig::default()),
        ));
        let poller = FeedPoller::new(
            store.clone(),
            FeedReader::new(fetcher.clone()),
            orchestrator,
        );
        Harness {
            store,
            fetcher,
            client,
            poller,
        }
    }

    fn add_source(store: &SqliteStore, url: &str) -> Source {
        store
            .create_source(NewSource::rss(url, "Show", MediaType::Tv).with_check_interval(3600))
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_feed_still_sets_last_check() {
        let h = harness();
        let source = add_source(&h.store, "https://feeds.example/a");
        assert!(source.is_due(Utc::now()));

        h.fetcher
            .set_feed(&source.url, &fixtures::rss_feed("Show", &[]))
            .await;
        let report = h.poller.poll_due(Utc::now()).await.unwrap();
        assert_eq!(report.sources_due, 1);
        assert_eq!(report.items, 0);

        let source = h.store.get_source(source.id).unwrap().unwrap();
        assert!(source.last_check.is_some());
        assert!(!source.is_due(Utc::now()));
    }

    #[tokio::test]
    async fn test_new_items_queued_once() {
        let h = harness();
        let source = add_source(&h.store, "https://feeds.example/a");
        let (h1, h2) = (fixtures::hash(1), fixtures::hash(2));
        h.fetcher
            .set_feed(
                &source.url,
                &fixtures::rss_feed("Show", &[("Show - 01", &h1), ("Show - 02", &h2)]),
            )
            .await;

        let poll = h.poller.poll_source(&source).await.unwrap();
        assert_eq!(poll.created, 2);

        let poll = h.poller.poll_source(&source).await.unwrap();
        assert_eq!(poll.created, 0);
        assert_eq!(poll.duplicates, 2);
        assert_eq!(h.client.added_torrents().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_source_does_not_block_others() {
        let h = harness();
        let broken = add_source(&h.store, "https://feeds.example/broken");
        let ok = add_source(&h.store, "https://feeds.example/ok");
        h.fetcher
            .set_feed(&ok.url, &fixtures::rss_feed("Ok", &[("Ok - 01", &fixtures::hash(9))]))
            .await;

        let report = h.poller.poll_due(Utc::now()).await.unwrap();
        assert_eq!(report.sources_due, 2);
        assert_eq!(report.sources_failed, 1);
        assert_eq!(report.created, 1);

        let broken = h.store.get_source(broken.id).unwrap().unwrap();
        assert!(broken.last_check.is_none());
    }

    #[tokio::test]
    async fn test_rejected_item_counted_and_persisted_failed() {
        let h = harness();
        let source = add_source(&h.store, "https://feeds.example/a");
        let hash = fixtures::hash(3);
        h.fetcher
            .set_feed(&source.url, &fixtures::rss_feed("Show", &[("Show - 03", &hash)]))
            .await;
        h.client
            .set_next_error(TorrentClientError::ApiError("HTTP 500".to_string()))
            .await;

        let poll = h.poller.poll_source(&source).await.unwrap();
        assert_eq!(poll.rejected, 1);
        assert!(h.store.get_torrent_by_hash(&hash).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_not_due_source_skipped() {
        let h = harness();
        let source = add_source(&h.store, "https://feeds.example/a");
        h.store.set_last_check(source.id, Utc::now()).unwrap();

        let report = h.poller.poll_due(Utc::now()).await.unwrap();
        assert_eq!(report.sources_due, 0);
        assert!(h.fetcher.requests().await.is_empty());
    }
}
