//! Ingestion lifecycle integration tests.
//!
//! These tests drive the scheduler end to end with mock daemon, AI and feed
//! fetcher against a file-backed SQLite store:
//! - New feed items become downloads exactly once
//! - Completion organizes and hardlinks files into the library
//! - Daemon errors, retries and `.torrent` enclosures

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use bangumi_core::{
    config::{ClassifierConfig, HardlinkConfig, SchedulerConfig},
    feed::magnet_from_torrent,
    store::{
        DownloadStatus, FileStore, HardlinkStatus, MediaType, NewSource, Source, SourceStore,
        TorrentFilter, TorrentStore,
    },
    testing::{fixtures, MockBrain, MockFeedFetcher, MockTorrentClient},
    DownloadOrchestrator, EpisodeExtractor, FeedPoller, FeedReader, HardlinkOrganizer,
    MajorityClassifier, RetryOutcome, Scheduler, SqliteStore,
};

const SINGLE_FILE_TORRENT: &[u8] = b"d8:announce23:http://tracker/announce4:infod6:lengthi4e4:name11:Show 01.mkv12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";

/// Test helper wiring the full pipeline with mocks.
struct TestHarness {
    scheduler: Scheduler,
    orchestrator: Arc<DownloadOrchestrator>,
    store: Arc<SqliteStore>,
    client: Arc<MockTorrentClient>,
    brain: Arc<MockBrain>,
    fetcher: Arc<MockFeedFetcher>,
    downloads: TempDir,
    library: TempDir,
    _db_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let db_dir = TempDir::new().expect("Failed to create db dir");
        let downloads = TempDir::new().expect("Failed to create downloads dir");
        let library = TempDir::new().expect("Failed to create library dir");

        let store = Arc::new(
            SqliteStore::new(&db_dir.path().join("bangumi.db")).expect("Failed to open store"),
        );
        let client = Arc::new(MockTorrentClient::with_save_path(
            downloads.path().to_string_lossy(),
        ));
        let brain = Arc::new(MockBrain::new());
        let fetcher = Arc::new(MockFeedFetcher::new());

        let orchestrator = Arc::new(DownloadOrchestrator::new(
            store.clone(),
            client.clone(),
            Arc::new(MajorityClassifier::new(
                brain.clone(),
                &ClassifierConfig::default(),
            )),
            EpisodeExtractor::new(brain.clone()),
            HardlinkOrganizer::new(HardlinkConfig {
                enabled: true,
                output_base: Some(library.path().to_path_buf()),
            }),
        ));
        let poller = Arc::new(FeedPoller::new(
            store.clone(),
            FeedReader::new(fetcher.clone()),
            orchestrator.clone(),
        ));
        let scheduler = Scheduler::new(SchedulerConfig::default(), poller, orchestrator.clone());

        Self {
            scheduler,
            orchestrator,
            store,
            client,
            brain,
            fetcher,
            downloads,
            library,
            _db_dir: db_dir,
        }
    }

    fn add_source(&self, source: NewSource) -> Source {
        self.store.create_source(source).expect("Failed to create source")
    }

    /// Write a payload file under the download directory.
    fn write_download(&self, name: &str) {
        let path = self.downloads.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"payload").unwrap();
    }

    fn save_path(&self) -> String {
        self.downloads.path().to_string_lossy().to_string()
    }

    fn library_path(&self, relative: &str) -> std::path::PathBuf {
        self.library.path().join(relative)
    }
}

fn same_inode(a: &Path, b: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let (ma, mb) = (a.metadata().unwrap(), b.metadata().unwrap());
        ma.ino() == mb.ino() && ma.dev() == mb.dev()
    }
    #[cfg(not(unix))]
    {
        a.exists() && b.exists()
    }
}

#[tokio::test]
async fn test_tv_release_from_feed_to_library() {
    let h = TestHarness::new();
    let source = h.add_source(
        NewSource::rss("https://feeds.example/frieren", "Frieren", MediaType::Tv)
            .with_season(2)
            .with_episode_regex(r"\[(\d+)\]")
            .with_episode_offset(-12),
    );

    let hash = fixtures::hash(0xf1);
    h.fetcher
        .set_feed(
            &source.url,
            &fixtures::rss_feed("Frieren", &[("[Group] Frieren [13][1080p]", &hash)]),
        )
        .await;

    // First sweep: queued and transferring
    let report = h.scheduler.trigger_now().await.expect("sweep should run");
    assert_eq!(report.poll.created, 1);
    assert_eq!(report.reconcile.downloading, 1);

    // Second sweep: the feed is not due again, the transfer completes
    let name = "[Group] Frieren/[Group] Frieren [13][1080p].mkv";
    let extra = "[Group] Frieren/[Group] Frieren [13] sample.mkv";
    h.write_download(name);
    h.write_download(extra);
    h.client.set_state(&hash, "stalledUP", 1.0).await;
    h.client
        .set_files(
            &hash,
            vec![
                fixtures::file_entry(&h.save_path(), name, 7),
                fixtures::file_entry(&h.save_path(), extra, 7),
            ],
        )
        .await;

    let report = h.scheduler.trigger_now().await.expect("sweep should run");
    assert_eq!(report.poll.sources_due, 0);
    assert_eq!(report.reconcile.completed, 1);

    let torrent = h.store.get_torrent_by_hash(&hash).unwrap().unwrap();
    assert_eq!(torrent.status, DownloadStatus::Downloaded);
    assert!(torrent.completed_at.is_some());

    let files = h.store.list_files(torrent.id).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extracted_episode, Some(13));
    assert_eq!(files[0].final_episode, Some(1));
    assert_eq!(files[0].hardlink_status, HardlinkStatus::Completed);

    let linked = h.library_path("Frieren/Season 2/Frieren S02E01.mkv");
    assert!(same_inode(&h.downloads.path().join(name), &linked));

    // Downloaded torrents are no longer reconciled
    let report = h.scheduler.trigger_now().await.expect("sweep should run");
    assert_eq!(report.reconcile.checked, 0);
}

#[tokio::test]
async fn test_ai_episode_extraction_with_offset() {
    let h = TestHarness::new();
    let source = h.add_source(
        NewSource::rss("https://feeds.example/show", "Show", MediaType::Tv)
            .with_ai_episode(true)
            .with_episode_offset(5),
    );
    let torrent = h
        .orchestrator
        .create_download(source.id, &fixtures::magnet(&fixtures::hash(2)), &fixtures::hash(2))
        .await
        .unwrap();

    h.write_download("Show Twelve.mkv");
    h.brain.set_episode("Show Twelve.mkv", 12).await;
    h.client.set_state(&torrent.hash, "uploading", 1.0).await;
    h.client
        .set_files(
            &torrent.hash,
            vec![fixtures::file_entry(&h.save_path(), "Show Twelve.mkv", 7)],
        )
        .await;

    let report = h.orchestrator.reconcile_pending().await.unwrap();
    assert_eq!(report.completed, 1);

    let files = h.store.list_files(torrent.id).unwrap();
    assert_eq!(files[0].final_episode, Some(17));
    assert!(h.library_path("Show/Season 1/Show S01E17.mkv").exists());
}

#[tokio::test]
async fn test_movie_release_linked_without_episode() {
    let h = TestHarness::new();
    let source = h.add_source(NewSource::rss(
        "https://feeds.example/movie",
        "Perfect Blue",
        MediaType::Movie,
    ));
    let hash = fixtures::hash(3);
    h.fetcher
        .set_feed(&source.url, &fixtures::rss_feed("Movies", &[("Perfect Blue 1997", &hash)]))
        .await;
    h.scheduler.trigger_now().await.unwrap();

    h.write_download("Perfect.Blue.1997.mkv");
    h.write_download("Perfect.Blue.1997.zh-CN.ass");
    h.client.set_state(&hash, "pausedUP", 1.0).await;
    h.client
        .set_files(
            &hash,
            vec![
                fixtures::file_entry(&h.save_path(), "Perfect.Blue.1997.mkv", 7),
                fixtures::file_entry(&h.save_path(), "Perfect.Blue.1997.zh-CN.ass", 7),
            ],
        )
        .await;
    h.scheduler.trigger_now().await.unwrap();

    assert!(h.library_path("Perfect Blue/Perfect Blue.mkv").exists());
    assert!(h.library_path("Perfect Blue/Perfect Blue.zh-CN.ass").exists());
}

#[tokio::test]
async fn test_torrent_enclosure_resolved_to_magnet() {
    let h = TestHarness::new();
    let source = h.add_source(NewSource::rss(
        "https://feeds.example/enclosures",
        "Show",
        MediaType::Tv,
    ));
    let torrent_url = "https://tracker.example/dl/show-01.torrent";
    let feed = format!(
        r#"<?xml version="1.0"?><rss><channel><title>Show</title>
<item><title>Show 01</title><enclosure url="{}" type="application/x-bittorrent"/></item>
</channel></rss>"#,
        torrent_url
    );
    h.fetcher.set_feed(&source.url, &feed).await;
    h.fetcher
        .set_bytes(torrent_url, SINGLE_FILE_TORRENT.to_vec())
        .await;

    let report = h.scheduler.trigger_now().await.unwrap();
    assert_eq!(report.poll.created, 1);

    let (magnet, hash) = magnet_from_torrent(SINGLE_FILE_TORRENT).unwrap();
    let torrent = h.store.get_torrent_by_hash(&hash).unwrap().unwrap();
    assert_eq!(torrent.url, magnet);
    assert_eq!(h.client.added_torrents().await[0].request.uri, magnet);
}

#[tokio::test]
async fn test_error_state_then_retry_recovers() {
    let h = TestHarness::new();
    let source = h.add_source(NewSource::rss(
        "https://feeds.example/show",
        "Show",
        MediaType::Tv,
    ));
    let hash = fixtures::hash(4);
    h.fetcher
        .set_feed(&source.url, &fixtures::rss_feed("Show", &[("Show 01", &hash)]))
        .await;
    h.scheduler.trigger_now().await.unwrap();

    h.client.set_state(&hash, "error", 0.2).await;
    let report = h.scheduler.trigger_now().await.unwrap();
    assert_eq!(report.reconcile.failed, 1);

    let failed = h
        .store
        .list_torrents(&TorrentFilter::new().with_status(DownloadStatus::Failed))
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error_message.as_deref().unwrap().contains("error"));

    let outcome = h.orchestrator.retry_download(failed[0].id).await.unwrap();
    assert!(matches!(outcome, RetryOutcome::Retried(_)));

    let report = h.scheduler.trigger_now().await.unwrap();
    assert_eq!(report.reconcile.downloading, 1);
    let torrent = h.store.get_torrent(failed[0].id).unwrap().unwrap();
    assert_eq!(torrent.status, DownloadStatus::Downloading);
    assert!(torrent.error_message.is_none());
}

#[tokio::test]
async fn test_deleting_source_cascades() {
    let h = TestHarness::new();
    let source = h.add_source(NewSource::rss(
        "https://feeds.example/show",
        "Show",
        MediaType::Movie,
    ));
    let hash = fixtures::hash(5);
    let torrent = h
        .orchestrator
        .create_download(source.id, &fixtures::magnet(&hash), &hash)
        .await
        .unwrap();
    h.client
        .set_files(&hash, vec![fixtures::file_entry(&h.save_path(), "a.mkv", 1)])
        .await;
    h.orchestrator.refresh_files(torrent.id).await.unwrap();
    assert_eq!(h.store.list_files(torrent.id).unwrap().len(), 1);

    assert!(h.store.delete_source(source.id).unwrap());
    assert!(h.store.get_torrent(torrent.id).unwrap().is_none());
    assert!(h.store.list_files(torrent.id).unwrap().is_empty());
}
