//! Filesystem side of the linker.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::config::HardlinkConfig;
use crate::store::{MediaFile, Source};

use super::{compute_destination, file_suffix, LinkError};

/// Creates hardlinks from downloaded files into the library layout.
pub struct HardlinkOrganizer {
    config: HardlinkConfig,
}

impl HardlinkOrganizer {
    pub fn new(config: HardlinkConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Where `file` would be linked, without touching the filesystem.
    pub fn destination_for(&self, file: &MediaFile, source: &Source) -> Result<PathBuf, LinkError> {
        if !self.config.enabled {
            return Err(LinkError::Disabled);
        }
        let base = self
            .config
            .output_base
            .as_deref()
            .ok_or(LinkError::OutputBaseMissing)?;

        compute_destination(base, source, file.final_episode, &file_suffix(&file.name))
    }

    /// Link `file` into the library. An existing destination is replaced.
    pub async fn link(&self, file: &MediaFile, source: &Source) -> Result<PathBuf, LinkError> {
        let destination = self.destination_for(file, source)?;
        let source_path = Path::new(&file.path);

        if !fs::try_exists(source_path).await.unwrap_or(false) {
            return Err(LinkError::SourceFileMissing {
                path: source_path.to_path_buf(),
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| LinkError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        if fs::symlink_metadata(&destination).await.is_ok() {
            debug!(destination = %destination.display(), "Replacing existing library entry");
            fs::remove_file(&destination).await?;
        }

        fs::hard_link(source_path, &destination)
            .await
            .map_err(|e| LinkError::LinkFailed {
                source_path: source_path.to_path_buf(),
                destination: destination.clone(),
                error: e,
            })?;

        info!(
            source = %source_path.display(),
            destination = %destination.display(),
            "Hardlink created"
        );
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{HardlinkStatus, MediaType};
    use crate::testing::fixtures;
    use tempfile::TempDir;

    fn organizer(base: Option<&Path>) -> HardlinkOrganizer {
        HardlinkOrganizer::new(HardlinkConfig {
            enabled: true,
            output_base: base.map(Path::to_path_buf),
        })
    }

    fn media_file(path: &Path, name: &str, episode: Option<i32>) -> MediaFile {
        MediaFile {
            id: 1,
            torrent_id: 1,
            name: name.to_string(),
            path: path.to_string_lossy().into_owned(),
            size: 4,
            is_valid_episode: episode.is_some(),
            extracted_episode: episode.map(|e| e as u32),
            final_episode: episode,
            hardlink_path: None,
            hardlink_status: HardlinkStatus::Pending,
            hardlink_error: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_link_creates_directories() {
        let downloads = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        let src = downloads.path().join("Show - 03.mkv");
        std::fs::write(&src, b"data").unwrap();

        let source = fixtures::source(1, "Show", MediaType::Tv);
        let file = media_file(&src, "Show - 03.mkv", Some(3));
        let dest = organizer(Some(library.path()))
            .link(&file, &source)
            .await
            .unwrap();

        assert_eq!(
            dest,
            library.path().join("Show/Season 1/Show S01E03.mkv")
        );
        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_link_replaces_existing_destination() {
        let downloads = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        let src = downloads.path().join("new.mkv");
        std::fs::write(&src, b"new").unwrap();

        let source = fixtures::source(1, "Show", MediaType::Tv);
        let file = media_file(&src, "new.mkv", Some(1));
        let organizer = organizer(Some(library.path()));

        let dest = organizer.destination_for(&file, &source).unwrap();
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"old").unwrap();

        organizer.link(&file, &source).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");

        // Linking again is a no-op in effect.
        organizer.link(&file, &source).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_link_disabled() {
        let source = fixtures::source(1, "Show", MediaType::Tv);
        let file = media_file(Path::new("/nowhere.mkv"), "nowhere.mkv", Some(1));
        let organizer = HardlinkOrganizer::new(HardlinkConfig::default());
        assert!(matches!(
            organizer.link(&file, &source).await,
            Err(LinkError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_link_without_output_base() {
        let source = fixtures::source(1, "Show", MediaType::Tv);
        let file = media_file(Path::new("/nowhere.mkv"), "nowhere.mkv", Some(1));
        assert!(matches!(
            organizer(None).link(&file, &source).await,
            Err(LinkError::OutputBaseMissing)
        ));
    }

    #[tokio::test]
    async fn test_link_missing_source_file() {
        let library = TempDir::new().unwrap();
        let source = fixtures::source(1, "Show", MediaType::Tv);
        let file = media_file(&library.path().join("gone.mkv"), "gone.mkv", Some(1));
        assert!(matches!(
            organizer(Some(library.path())).link(&file, &source).await,
            Err(LinkError::SourceFileMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_link_tv_without_episode() {
        let library = TempDir::new().unwrap();
        let src = library.path().join("extra.mkv");
        std::fs::write(&src, b"x").unwrap();
        let source = fixtures::source(1, "Show", MediaType::Tv);
        let file = media_file(&src, "extra.mkv", None);
        assert!(matches!(
            organizer(Some(library.path())).link(&file, &source).await,
            Err(LinkError::MissingEpisode)
        ));
    }
}
