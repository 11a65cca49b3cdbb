//! Download lifecycle: creation, reconciliation against the daemon, file
//! organization, retry and removal.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::classifier::ContentClassifier;
use crate::episode::EpisodeExtractor;
use crate::linker::HardlinkOrganizer;
use crate::metrics::{
    DOWNLOADS_COMPLETED, DOWNLOADS_CREATED, DOWNLOADS_FAILED, FILES_ORGANIZED, HARDLINKS_TOTAL,
    RETRY_ATTEMPTS,
};
use crate::store::{
    DownloadStatus, FileStore, HardlinkOutcome, MediaStore, MediaType, NewMediaFile, NewTorrent,
    Source, SourceKind, SourceStore, StoreError, Torrent, TorrentStore,
};
use crate::torrent_client::{
    extract_hash_from_magnet, normalize_info_hash, AddTorrentRequest, TorrentClient,
    TorrentClientError, TorrentInfo,
};

use super::types::{
    OrchestratorError, OrganizeReport, ReconcileOutcome, ReconcileReport, RetryOutcome,
};

pub(crate) const INFO_UNAVAILABLE: &str = "torrent info unavailable";
pub(crate) const FILE_LIST_EMPTY: &str = "file list empty";

/// Drives torrents from creation to an organized library entry.
pub struct DownloadOrchestrator {
    store: Arc<dyn MediaStore>,
    client: Arc<dyn TorrentClient>,
    classifier: Arc<dyn ContentClassifier>,
    extractor: EpisodeExtractor,
    linker: HardlinkOrganizer,
    download_path: Option<String>,
}

impl DownloadOrchestrator {
    pub fn new(
        store: Arc<dyn MediaStore>,
        client: Arc<dyn TorrentClient>,
        classifier: Arc<dyn ContentClassifier>,
        extractor: EpisodeExtractor,
        linker: HardlinkOrganizer,
    ) -> Self {
        Self {
            store,
            client,
            classifier,
            extractor,
            linker,
            download_path: None,
        }
    }

    /// Override the daemon's save path for new transfers.
    pub fn with_download_path(mut self, path: impl Into<String>) -> Self {
        self.download_path = Some(path.into());
        self
    }

    pub fn store(&self) -> &Arc<dyn MediaStore> {
        &self.store
    }

    fn add_request(&self, uri: &str) -> AddTorrentRequest {
        let request = AddTorrentRequest::magnet(uri);
        match &self.download_path {
            Some(path) => request.with_download_path(path.clone()),
            None => request,
        }
    }

    /// Whether a torrent with this hash is already tracked.
    pub fn is_downloaded(&self, hash: &str) -> Result<bool, OrchestratorError> {
        Ok(self.store.torrent_exists(&canonical_hash(hash))?)
    }

    /// Record a new torrent and hand it to the daemon.
    ///
    /// If the daemon rejects it, the torrent stays persisted as `failed` with
    /// the daemon's error and that error is returned.
    pub async fn create_download(
        &self,
        source_id: i64,
        url: &str,
        hash: &str,
    ) -> Result<Torrent, OrchestratorError> {
        let hash = canonical_hash(hash);

        let mut torrent = self
            .store
            .create_torrent(NewTorrent {
                hash: hash.clone(),
                source_id,
                url: url.to_string(),
                status: DownloadStatus::Downloading,
                started_at: Some(Utc::now()),
            })
            .map_err(|e| match e {
                StoreError::Conflict(_) => OrchestratorError::AlreadyTracked(hash.clone()),
                other => other.into(),
            })?;

        if let Err(e) = self.client.add_torrent(self.add_request(url)).await {
            warn!(torrent_id = torrent.id, hash = %hash, error = %e, "Daemon rejected torrent");
            torrent.status = DownloadStatus::Failed;
            torrent.error_message = Some(e.to_string());
            self.store.update_torrent(&torrent)?;
            DOWNLOADS_FAILED.inc();
            return Err(e.into());
        }

        DOWNLOADS_CREATED.inc();
        info!(torrent_id = torrent.id, source_id, hash = %hash, "Download created");
        Ok(torrent)
    }

    /// Fold a daemon snapshot into the persisted torrent.
    ///
    /// A torrent that is already `downloaded` only has its progress updated;
    /// organization runs once, on the transition.
    pub async fn reconcile(
        &self,
        torrent: &Torrent,
        snapshot: Option<&TorrentInfo>,
    ) -> Result<ReconcileOutcome, OrchestratorError> {
        let mut updated = torrent.clone();

        let Some(info) = snapshot else {
            self.mark_failed(&mut updated, INFO_UNAVAILABLE)?;
            return Ok(ReconcileOutcome::Failed {
                message: INFO_UNAVAILABLE.to_string(),
            });
        };

        updated.download_progress = info.progress * 100.0;

        if torrent.status == DownloadStatus::Downloaded {
            if updated.download_progress != torrent.download_progress {
                self.store.update_torrent(&updated)?;
            }
            return Ok(ReconcileOutcome::AlreadyDownloaded);
        }

        if info.is_complete() {
            updated.status = DownloadStatus::Downloaded;
            updated.completed_at = Some(Utc::now());
            updated.error_message = None;
            self.store.update_torrent(&updated)?;
            DOWNLOADS_COMPLETED.inc();
            info!(torrent_id = updated.id, hash = %updated.hash, state = %info.state, "Download completed");

            let report = self.organize_files(&updated, info).await?;
            if report.total == 0 {
                return Ok(ReconcileOutcome::Failed {
                    message: FILE_LIST_EMPTY.to_string(),
                });
            }
            return Ok(ReconcileOutcome::Completed { report });
        }

        if info.is_errored() {
            let message = format!("daemon state: {}", info.state);
            self.mark_failed(&mut updated, &message)?;
            return Ok(ReconcileOutcome::Failed { message });
        }

        if updated.status != DownloadStatus::Downloading {
            info!(torrent_id = updated.id, state = %info.state, "Torrent transferring again");
        }
        updated.status = DownloadStatus::Downloading;
        updated.error_message = None;
        self.store.update_torrent(&updated)?;
        debug!(
            torrent_id = updated.id,
            state = %info.state,
            progress = updated.download_progress,
            "Torrent reconciled"
        );

        Ok(ReconcileOutcome::Downloading {
            progress: updated.download_progress,
        })
    }

    /// Reconcile every torrent that is not yet downloaded.
    ///
    /// Daemon and store failures are isolated to the torrent they concern.
    pub async fn reconcile_pending(&self) -> Result<ReconcileReport, OrchestratorError> {
        let torrents = self.store.list_unfinished_torrents()?;
        let mut report = ReconcileReport::default();

        for torrent in torrents {
            report.checked += 1;
            let snapshot = self.snapshot(&torrent.hash).await;

            match self.reconcile(&torrent, snapshot.as_ref()).await {
                Ok(ReconcileOutcome::Downloading { .. }) => report.downloading += 1,
                Ok(ReconcileOutcome::Completed { .. }) => report.completed += 1,
                Ok(ReconcileOutcome::Failed { .. }) => report.failed += 1,
                Ok(ReconcileOutcome::AlreadyDownloaded) => {}
                Err(e) => {
                    error!(torrent_id = torrent.id, error = %e, "Reconciliation failed");
                    report.errors += 1;
                }
            }
        }

        if report.checked > 0 {
            info!(
                checked = report.checked,
                downloading = report.downloading,
                completed = report.completed,
                failed = report.failed,
                errors = report.errors,
                "Reconciliation pass finished"
            );
        }
        Ok(report)
    }

    /// Ask the daemon for a snapshot; any failure reads as "no snapshot".
    async fn snapshot(&self, hash: &str) -> Option<TorrentInfo> {
        match self.client.get_torrent(hash).await {
            Ok(info) => Some(info),
            Err(TorrentClientError::TorrentNotFound(_)) => {
                debug!(hash, "Daemon does not know torrent");
                None
            }
            Err(e) => {
                warn!(hash, error = %e, "Failed to query daemon");
                None
            }
        }
    }

    /// Replace the torrent's file rows with the main-content subset of the
    /// daemon's file list, then link each kept file into the library.
    pub async fn organize_files(
        &self,
        torrent: &Torrent,
        snapshot: &TorrentInfo,
    ) -> Result<OrganizeReport, OrchestratorError> {
        let source = self.source_of(torrent)?;
        let mut report = OrganizeReport {
            total: snapshot.files.len(),
            ..Default::default()
        };

        if snapshot.files.is_empty() {
            let mut failed = torrent.clone();
            failed.completed_at = None;
            self.mark_failed(&mut failed, FILE_LIST_EMPTY)?;
            let purged = self.store.delete_files(torrent.id)?;
            debug!(torrent_id = torrent.id, purged, "Purged stale file rows");
            return Ok(report);
        }

        let mut kept = Vec::new();
        for entry in &snapshot.files {
            if !self.classifier.is_main_content(&entry.name).await {
                debug!(torrent_id = torrent.id, file = %entry.name, "Skipping non-main content");
                FILES_ORGANIZED.with_label_values(&["not_main_content"]).inc();
                report.skipped_not_main += 1;
                continue;
            }

            let episode = if source.wants_episode() {
                let matched = self
                    .extractor
                    .extract(base_name(&entry.name), &source)
                    .await;
                if matched.is_none() && source.media_type == MediaType::Tv {
                    info!(
                        torrent_id = torrent.id,
                        file = %entry.name,
                        "Skipping file: no episode number found"
                    );
                    FILES_ORGANIZED.with_label_values(&["no_episode"]).inc();
                    report.skipped_no_episode += 1;
                    continue;
                }
                matched
            } else {
                None
            };

            FILES_ORGANIZED.with_label_values(&["kept"]).inc();
            kept.push(NewMediaFile {
                name: entry.name.clone(),
                path: entry.path.clone(),
                size: entry.size,
                is_valid_episode: episode.is_some(),
                extracted_episode: episode.map(|m| m.extracted),
                final_episode: episode.map(|m| m.final_episode),
            });
        }

        let files = self.store.replace_files(torrent.id, kept)?;
        report.kept = files.len();

        for file in &files {
            let outcome = match self.linker.link(file, &source).await {
                Ok(path) => {
                    HARDLINKS_TOTAL.with_label_values(&["completed"]).inc();
                    report.linked += 1;
                    HardlinkOutcome::completed(path.display().to_string())
                }
                Err(e) => {
                    warn!(file_id = file.id, file = %file.name, error = %e, "Hardlink failed");
                    HARDLINKS_TOTAL.with_label_values(&["failed"]).inc();
                    report.link_failed += 1;
                    HardlinkOutcome::failed(e.to_string())
                }
            };
            self.store.record_hardlink(file.id, &outcome)?;
        }

        info!(
            torrent_id = torrent.id,
            total = report.total,
            kept = report.kept,
            linked = report.linked,
            "Files organized"
        );
        Ok(report)
    }

    /// Reset a torrent and submit it to the daemon again.
    pub async fn retry_download(&self, torrent_id: i64) -> Result<RetryOutcome, OrchestratorError> {
        let Some(mut torrent) = self.store.get_torrent(torrent_id)? else {
            return Ok(RetryOutcome::NotFound);
        };

        torrent.status = DownloadStatus::Downloading;
        torrent.download_progress = 0.0;
        torrent.error_message = None;
        torrent.started_at = Some(Utc::now());
        torrent.completed_at = None;
        self.store.update_torrent(&torrent)?;

        match self.client.add_torrent(self.add_request(&torrent.url)).await {
            Ok(_) => {
                RETRY_ATTEMPTS.with_label_values(&["retried"]).inc();
                info!(torrent_id, hash = %torrent.hash, "Download retried");
                Ok(RetryOutcome::Retried(torrent))
            }
            Err(e) => {
                RETRY_ATTEMPTS.with_label_values(&["failed"]).inc();
                warn!(torrent_id, error = %e, "Retry rejected by daemon");
                self.mark_failed(&mut torrent, &format!("retry failed: {}", e))?;
                Ok(RetryOutcome::Failed(torrent))
            }
        }
    }

    /// Re-read the daemon's file list and organize again. Status is left
    /// alone unless the snapshot is missing or has no files.
    pub async fn refresh_files(&self, torrent_id: i64) -> Result<Option<Torrent>, OrchestratorError> {
        let Some(mut torrent) = self.store.get_torrent(torrent_id)? else {
            return Ok(None);
        };

        match self.snapshot(&torrent.hash).await {
            Some(info) => {
                self.organize_files(&torrent, &info).await?;
            }
            None => self.mark_failed(&mut torrent, INFO_UNAVAILABLE)?,
        }

        Ok(self.store.get_torrent(torrent_id)?)
    }

    /// Remove the daemon task (best effort) and the record.
    pub async fn delete_torrent(
        &self,
        torrent_id: i64,
        delete_files: bool,
    ) -> Result<bool, OrchestratorError> {
        let Some(torrent) = self.store.get_torrent(torrent_id)? else {
            return Ok(false);
        };

        if let Err(e) = self.client.remove_torrent(&torrent.hash, delete_files).await {
            warn!(torrent_id, hash = %torrent.hash, error = %e, "Failed to remove daemon task");
        }

        let deleted = self.store.delete_torrent(torrent_id)?;
        info!(torrent_id, delete_files, "Torrent deleted");
        Ok(deleted)
    }

    /// Start the single download behind a magnet source.
    ///
    /// Returns `None` when the magnet's hash is already tracked.
    pub async fn enqueue_magnet_source(
        &self,
        source: &Source,
    ) -> Result<Option<Torrent>, OrchestratorError> {
        if source.kind != SourceKind::Magnet {
            return Err(OrchestratorError::WrongSourceKind {
                id: source.id,
                expected: SourceKind::Magnet.as_str().to_string(),
            });
        }

        let hash = extract_hash_from_magnet(&source.url)
            .ok_or_else(|| OrchestratorError::MissingHash(source.url.clone()))?;

        if self.is_downloaded(&hash)? {
            debug!(source_id = source.id, hash = %hash, "Magnet already tracked");
            return Ok(None);
        }

        self.create_download(source.id, &source.url, &hash)
            .await
            .map(Some)
    }

    fn source_of(&self, torrent: &Torrent) -> Result<Source, OrchestratorError> {
        match self.store.get_source(torrent.source_id)? {
            Some(source) => Ok(source),
            None => {
                error!(
                    torrent_id = torrent.id,
                    source_id = torrent.source_id,
                    "Torrent references a missing source"
                );
                Err(StoreError::Integrity(format!(
                    "torrent {} references missing source {}",
                    torrent.id, torrent.source_id
                ))
                .into())
            }
        }
    }

    fn mark_failed(&self, torrent: &mut Torrent, message: &str) -> Result<(), OrchestratorError> {
        if torrent.status != DownloadStatus::Failed {
            DOWNLOADS_FAILED.inc();
            warn!(torrent_id = torrent.id, hash = %torrent.hash, reason = message, "Torrent failed");
        }
        torrent.status = DownloadStatus::Failed;
        torrent.error_message = Some(message.to_string());
        self.store.update_torrent(torrent)?;
        Ok(())
    }
}

fn canonical_hash(hash: &str) -> String {
    normalize_info_hash(hash).unwrap_or_else(|| hash.to_lowercase())
}

fn base_name(name: &str) -> &str {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
}
