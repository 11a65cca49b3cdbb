pub mod ai;
pub mod classifier;
pub mod config;
pub mod episode;
pub mod feed;
pub mod linker;
pub mod metrics;
pub mod orchestrator;
pub mod scheduler;
pub mod store;
pub mod testing;
pub mod torrent_client;

pub use ai::{AiError, LlmBrain, MediaBrain};
pub use classifier::{ContentClassifier, ExtensionClassifier, MajorityClassifier, VoteTally};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use episode::{EpisodeExtractor, EpisodeMatch, EpisodeStrategy};
pub use feed::{
    Feed, FeedError, FeedFetcher, FeedItem, FeedReader, HttpFeedFetcher, SourceAnalysis,
    SourceAnalyzer,
};
pub use linker::{HardlinkOrganizer, LinkError};
pub use orchestrator::{
    DownloadOrchestrator, OrchestratorError, OrganizeReport, ReconcileOutcome, ReconcileReport,
    RetryOutcome,
};
pub use scheduler::{FeedPoller, PollReport, Scheduler, SchedulerStatus, SweepReport};
pub use store::{MediaStore, SqliteStore, StoreError};
pub use torrent_client::{QBittorrentClient, TorrentClient, TorrentClientError};
