//! Records persisted by the store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// How a source delivers releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// RSS feed polled on `check_interval`.
    Rss,
    /// A single magnet link enqueued once.
    Magnet,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rss => "rss",
            SourceKind::Magnet => "magnet",
        }
    }
}

/// Library layout used for a source's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

/// Lifecycle of a tracked transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Downloading,
    Downloaded,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::Failed => "failed",
        }
    }
}

/// Outcome of linking one file into the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardlinkStatus {
    Pending,
    Completed,
    Failed,
}

impl HardlinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HardlinkStatus::Pending => "pending",
            HardlinkStatus::Completed => "completed",
            HardlinkStatus::Failed => "failed",
        }
    }
}

/// Error returned when a stored enum column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value: {}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! impl_from_str {
    ($ty:ty { $($s:literal => $v:expr),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($v),)+
                    other => Err(UnknownVariant(other.to_string())),
                }
            }
        }
    };
}

impl_from_str!(SourceKind { "rss" => SourceKind::Rss, "magnet" => SourceKind::Magnet });
impl_from_str!(MediaType { "movie" => MediaType::Movie, "tv" => MediaType::Tv });
impl_from_str!(DownloadStatus {
    "downloading" => DownloadStatus::Downloading,
    "downloaded" => DownloadStatus::Downloaded,
    "failed" => DownloadStatus::Failed,
});
impl_from_str!(HardlinkStatus {
    "pending" => HardlinkStatus::Pending,
    "completed" => HardlinkStatus::Completed,
    "failed" => HardlinkStatus::Failed,
});

/// An ingestion source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub kind: SourceKind,
    pub media_type: MediaType,
    /// Title used for library folder and file names.
    pub title: String,
    pub season: Option<u32>,
    pub use_ai_episode: bool,
    /// Pattern whose first capture group is the episode number.
    pub episode_regex: Option<String>,
    /// Added to every extracted episode number.
    pub episode_offset: i32,
    pub enable_sr: bool,
    /// Polling period in seconds.
    pub check_interval: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Source {
    /// Whether the poller should fetch this source at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_check {
            None => true,
            Some(last) => i64::try_from(self.check_interval)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .is_some_and(|interval| now.signed_duration_since(last) >= interval),
        }
    }

    /// Whether any episode extraction strategy is configured.
    pub fn wants_episode(&self) -> bool {
        self.use_ai_episode || self.episode_regex.is_some()
    }
}

/// Request to register a new source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSource {
    pub url: String,
    #[serde(default = "default_kind")]
    pub kind: SourceKind,
    pub media_type: MediaType,
    pub title: String,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub use_ai_episode: bool,
    #[serde(default)]
    pub episode_regex: Option<String>,
    #[serde(default)]
    pub episode_offset: i32,
    #[serde(default)]
    pub enable_sr: bool,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
}

fn default_kind() -> SourceKind {
    SourceKind::Rss
}

fn default_check_interval() -> u64 {
    3600
}

impl NewSource {
    /// An RSS source with default polling and no episode extraction.
    pub fn rss(url: impl Into<String>, title: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            url: url.into(),
            kind: SourceKind::Rss,
            media_type,
            title: title.into(),
            season: None,
            use_ai_episode: false,
            episode_regex: None,
            episode_offset: 0,
            enable_sr: false,
            check_interval: default_check_interval(),
        }
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_season(mut self, season: u32) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_episode_regex(mut self, regex: impl Into<String>) -> Self {
        self.episode_regex = Some(regex.into());
        self
    }

    pub fn with_ai_episode(mut self, enabled: bool) -> Self {
        self.use_ai_episode = enabled;
        self
    }

    pub fn with_episode_offset(mut self, offset: i32) -> Self {
        self.episode_offset = offset;
        self
    }

    pub fn with_check_interval(mut self, secs: u64) -> Self {
        self.check_interval = secs;
        self
    }
}

/// Partial update of a source. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceUpdate {
    #[serde(default)]
    pub title: Option<String>,
    /// `Some(None)` clears the season.
    #[serde(default, deserialize_with = "double_option")]
    pub season: Option<Option<u32>>,
    #[serde(default)]
    pub use_ai_episode: Option<bool>,
    /// `Some(None)` clears the pattern.
    #[serde(default, deserialize_with = "double_option")]
    pub episode_regex: Option<Option<String>>,
    #[serde(default)]
    pub episode_offset: Option<i32>,
    #[serde(default)]
    pub enable_sr: Option<bool>,
    #[serde(default)]
    pub check_interval: Option<u64>,
}

/// Distinguishes an explicit `null` from an absent field.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// One tracked transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Torrent {
    pub id: i64,
    /// Info hash (lowercase hex), globally unique.
    pub hash: String,
    pub source_id: i64,
    /// Magnet URI handed to the daemon.
    pub url: String,
    pub status: DownloadStatus,
    /// Percent complete (0.0 - 100.0).
    pub download_progress: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Request to record a new transfer.
#[derive(Debug, Clone)]
pub struct NewTorrent {
    pub hash: String,
    pub source_id: i64,
    pub url: String,
    pub status: DownloadStatus,
    pub started_at: Option<DateTime<Utc>>,
}

/// Filter for listing torrents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TorrentFilter {
    #[serde(default)]
    pub status: Option<DownloadStatus>,
    #[serde(default)]
    pub source_id: Option<i64>,
}

impl TorrentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: DownloadStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source(mut self, source_id: i64) -> Self {
        self.source_id = Some(source_id);
        self
    }
}

/// A main-content file of a completed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: i64,
    pub torrent_id: i64,
    /// Path relative to the torrent root.
    pub name: String,
    /// Absolute path on the daemon's filesystem.
    pub path: String,
    pub size: u64,
    pub is_valid_episode: bool,
    pub extracted_episode: Option<u32>,
    pub final_episode: Option<i32>,
    pub hardlink_path: Option<String>,
    pub hardlink_status: HardlinkStatus,
    pub hardlink_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A file row about to be written by a full replace.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaFile {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub is_valid_episode: bool,
    pub extracted_episode: Option<u32>,
    pub final_episode: Option<i32>,
}

/// Result of a hardlink attempt recorded on a file row.
#[derive(Debug, Clone, PartialEq)]
pub struct HardlinkOutcome {
    pub status: HardlinkStatus,
    pub path: Option<String>,
    pub error: Option<String>,
}

impl HardlinkOutcome {
    pub fn completed(path: impl Into<String>) -> Self {
        Self {
            status: HardlinkStatus::Completed,
            path: Some(path.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: HardlinkStatus::Failed,
            path: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(last_check: Option<DateTime<Utc>>, interval: u64) -> Source {
        Source {
            id: 1,
            url: "https://example.org/rss".to_string(),
            kind: SourceKind::Rss,
            media_type: MediaType::Tv,
            title: "Show".to_string(),
            season: Some(1),
            use_ai_episode: false,
            episode_regex: None,
            episode_offset: 0,
            enable_sr: false,
            check_interval: interval,
            last_check,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_never_checked_source_is_due() {
        assert!(source(None, 3600).is_due(Utc::now()));
    }

    #[test]
    fn test_recently_checked_source_is_not_due() {
        let now = Utc::now();
        let s = source(Some(now - TimeDelta::seconds(60)), 3600);
        assert!(!s.is_due(now));
    }

    #[test]
    fn test_source_due_once_interval_elapsed() {
        let now = Utc::now();
        let s = source(Some(now - TimeDelta::seconds(3600)), 3600);
        assert!(s.is_due(now));
    }

    #[test]
    fn test_unrepresentable_interval_is_never_due() {
        let now = Utc::now();
        let s = source(Some(now - TimeDelta::days(365)), i64::MAX as u64);
        assert!(!s.is_due(now));
        assert!(!source(Some(now), u64::MAX).is_due(now));
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [
            DownloadStatus::Downloading,
            DownloadStatus::Downloaded,
            DownloadStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<DownloadStatus>().unwrap(), status);
        }
        assert!("seeding".parse::<DownloadStatus>().is_err());
    }

    #[test]
    fn test_new_source_deserialize_defaults() {
        let json = r#"{"url":"https://x/rss","media_type":"tv","title":"X"}"#;
        let new: NewSource = serde_json::from_str(json).unwrap();
        assert_eq!(new.kind, SourceKind::Rss);
        assert_eq!(new.check_interval, 3600);
        assert_eq!(new.episode_offset, 0);
    }

    #[test]
    fn test_source_update_null_clears_field() {
        let update: SourceUpdate = serde_json::from_str(r#"{"episode_regex":null}"#).unwrap();
        assert_eq!(update.episode_regex, Some(None));
        assert_eq!(update.season, None);
    }
}
