use super::{types::Config, ConfigError, TorrentClientBackend};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Daemon backend has its section
/// - Hardlinking has somewhere to link to
/// - Classifier vote counts are coherent
/// - Scheduler intervals are positive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if let Some(tc) = &config.torrent_client {
        match tc.backend {
            TorrentClientBackend::QBittorrent => {
                let qb = tc.qbittorrent.as_ref().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "torrent_client.qbittorrent is required for the qbittorrent backend"
                            .to_string(),
                    )
                })?;
                if qb.url.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "torrent_client.qbittorrent.url cannot be empty".to_string(),
                    ));
                }
            }
        }
    }

    if config.hardlink.enabled && config.hardlink.output_base.is_none() {
        return Err(ConfigError::ValidationError(
            "hardlink.output_base is required when hardlink.enabled = true".to_string(),
        ));
    }

    if config.llm.enabled && config.llm.model.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "llm.model cannot be empty when llm.enabled = true".to_string(),
        ));
    }

    let classifier = &config.classifier;
    if classifier.votes == 0 {
        return Err(ConfigError::ValidationError(
            "classifier.votes must be at least 1".to_string(),
        ));
    }
    if classifier.min_yes_votes == 0 || classifier.min_yes_votes > classifier.votes {
        return Err(ConfigError::ValidationError(format!(
            "classifier.min_yes_votes must be between 1 and {}",
            classifier.votes
        )));
    }

    if config.scheduler.tick_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.tick_interval_secs cannot be 0".to_string(),
        ));
    }
    if config.scheduler.max_sweep_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.max_sweep_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
