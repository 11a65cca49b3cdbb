use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub torrent_client: Option<TorrentClientConfig>,
    #[serde(default)]
    pub hardlink: HardlinkConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bangumi.db")
}

/// Download daemon configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentClientConfig {
    /// Daemon backend type
    pub backend: TorrentClientBackend,
    /// qBittorrent-specific configuration (required when backend = "qbittorrent")
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
}

/// Available download daemons
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TorrentClientBackend {
    #[serde(rename = "qbittorrent")]
    QBittorrent,
}

/// qBittorrent Web API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    #[serde(default = "default_qb_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Save path passed to the daemon for new transfers
    #[serde(default)]
    pub download_path: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_qb_username() -> String {
    "admin".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Hardlink organizer configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HardlinkConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Library root where links are created
    #[serde(default)]
    pub output_base: Option<PathBuf>,
}

/// LLM provider type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat completions endpoint.
    #[default]
    OpenAi,
    /// Local Ollama instance.
    Ollama,
    /// Anthropic Messages API.
    Anthropic,
}

/// LLM client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// When false every AI capability reports "not configured".
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name/identifier.
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL (for proxies or self-hosted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u32,
    /// Maximum tokens for completions.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: LlmProvider::default(),
            model: default_llm_model(),
            api_key: None,
            api_base: None,
            timeout_secs: default_llm_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_llm_timeout() -> u32 {
    60
}

fn default_max_tokens() -> u32 {
    512
}

/// Main-content classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Number of independent AI judgments per file.
    #[serde(default = "default_votes")]
    pub votes: usize,
    /// "yes" votes required to keep a file.
    #[serde(default = "default_min_yes_votes")]
    pub min_yes_votes: usize,
    /// Upper bound for a single judgment.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            votes: default_votes(),
            min_yes_votes: default_min_yes_votes(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

fn default_votes() -> usize {
    3
}

fn default_min_yes_votes() -> usize {
    2
}

fn default_call_timeout() -> u64 {
    60
}

/// Feed polling scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// When disabled, sweeps only run through the manual trigger.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// A sweep still running after this long is abandoned.
    #[serde(default = "default_max_sweep")]
    pub max_sweep_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval(),
            max_sweep_secs: default_max_sweep(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    60
}

fn default_max_sweep() -> u64 {
    900
}

/// Feed fetching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// HTTP proxy used for feeds and .torrent downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            proxy: None,
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_client: Option<SanitizedTorrentClientConfig>,
    pub hardlink: HardlinkConfig,
    pub llm: SanitizedLlmConfig,
    pub classifier: ClassifierConfig,
    pub scheduler: SchedulerConfig,
    pub feed: FeedConfig,
}

/// Sanitized daemon config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTorrentClientConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password_configured: bool,
}

/// Sanitized LLM config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            torrent_client: config.torrent_client.as_ref().map(|tc| {
                let qb = tc.qbittorrent.as_ref();
                SanitizedTorrentClientConfig {
                    backend: match tc.backend {
                        TorrentClientBackend::QBittorrent => "qbittorrent".to_string(),
                    },
                    url: qb.map(|q| q.url.clone()),
                    username: qb.map(|q| q.username.clone()),
                    password_configured: qb.map(|q| !q.password.is_empty()).unwrap_or(false),
                }
            }),
            hardlink: config.hardlink.clone(),
            llm: SanitizedLlmConfig {
                enabled: config.llm.enabled,
                provider: config.llm.provider.clone(),
                model: config.llm.model.clone(),
                api_base: config.llm.api_base.clone(),
                api_key_configured: config
                    .llm
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
            },
            classifier: config.classifier.clone(),
            scheduler: config.scheduler.clone(),
            feed: config.feed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "bangumi.db");
        assert!(config.torrent_client.is_none());
        assert!(!config.hardlink.enabled);
        assert!(!config.llm.enabled);
        assert_eq!(config.classifier.votes, 3);
        assert_eq!(config.classifier.min_yes_votes, 2);
        assert_eq!(config.scheduler.tick_interval_secs, 60);
        assert_eq!(config.feed.timeout_secs, 30);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[torrent_client]
backend = "qbittorrent"

[torrent_client.qbittorrent]
url = "http://localhost:8081"
username = "admin"
password = "adminadmin"
download_path = "/downloads"

[hardlink]
enabled = true
output_base = "/media/library"

[llm]
enabled = true
provider = "ollama"
model = "qwen2.5"
api_base = "http://localhost:11434"

[scheduler]
tick_interval_secs = 30
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);

        let tc = config.torrent_client.as_ref().unwrap();
        assert_eq!(tc.backend, TorrentClientBackend::QBittorrent);
        let qb = tc.qbittorrent.as_ref().unwrap();
        assert_eq!(qb.url, "http://localhost:8081");
        assert_eq!(qb.download_path.as_deref(), Some("/downloads"));
        assert_eq!(qb.timeout_secs, 30);

        assert!(config.hardlink.enabled);
        assert_eq!(
            config.hardlink.output_base,
            Some(PathBuf::from("/media/library"))
        );
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.scheduler.tick_interval_secs, 30);
        assert_eq!(config.scheduler.max_sweep_secs, 900);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let config = Config {
            torrent_client: Some(TorrentClientConfig {
                backend: TorrentClientBackend::QBittorrent,
                qbittorrent: Some(QBittorrentConfig {
                    url: "http://qb:8080".to_string(),
                    username: "admin".to_string(),
                    password: "secret".to_string(),
                    download_path: None,
                    timeout_secs: 30,
                }),
            }),
            llm: LlmConfig {
                enabled: true,
                api_key: Some("sk-secret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let sanitized = SanitizedConfig::from(&config);
        let tc = sanitized.torrent_client.as_ref().unwrap();
        assert_eq!(tc.backend, "qbittorrent");
        assert!(tc.password_configured);
        assert!(sanitized.llm.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
