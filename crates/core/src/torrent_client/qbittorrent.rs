//! qBittorrent Web API v2 client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;

use super::{
    extract_hash_from_magnet, AddTorrentRequest, AddTorrentResult, TorrentClient,
    TorrentClientError, TorrentFileEntry, TorrentInfo,
};

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Set once logged in; cleared when the daemon answers 403.
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(self.endpoint("/api/v2/auth/login"))
            .form(&params)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.session.write().await = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if self.session.read().await.is_some() {
            return Ok(());
        }
        self.login().await
    }

    /// Send an authenticated request, logging in again once on 403.
    ///
    /// `build` is called per attempt since request bodies are not reusable.
    async fn send<F>(&self, build: F) -> Result<String, TorrentClientError>
    where
        F: Fn() -> RequestBuilder,
    {
        self.ensure_authenticated().await?;

        let mut response = build().send().await.map_err(map_transport_error)?;

        if response.status().as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            *self.session.write().await = None;
            self.login().await?;
            response = build().send().await.map_err(map_transport_error)?;
        }

        Self::read_body(response).await
    }

    async fn read_body(response: Response) -> Result<String, TorrentClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }

    async fn fetch_files(
        &self,
        hash: &str,
        save_path: Option<&str>,
    ) -> Result<Vec<TorrentFileEntry>, TorrentClientError> {
        let url = self.endpoint(&format!("/api/v2/torrents/files?hash={}", hash));
        let body = self.send(|| self.client.get(&url)).await?;

        let files: Vec<QBTorrentFile> = serde_json::from_str(&body).map_err(|e| {
            TorrentClientError::ApiError(format!("Failed to parse file list: {}", e))
        })?;

        Ok(files
            .into_iter()
            .map(|f| f.into_entry(save_path))
            .collect())
    }
}

fn map_transport_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    content_path: String,
}

/// qBittorrent file list entry.
#[derive(Debug, Deserialize)]
struct QBTorrentFile {
    name: String,
    size: i64,
}

impl QBTorrentFile {
    fn into_entry(self, save_path: Option<&str>) -> TorrentFileEntry {
        let path = match save_path {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), self.name),
            None => self.name.clone(),
        };
        TorrentFileEntry {
            name: self.name,
            size: self.size.max(0) as u64,
            path,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let url = self.endpoint("/api/v2/torrents/add");
        let save_path = request
            .download_path
            .clone()
            .or_else(|| self.config.download_path.clone());

        let body = self
            .send(|| {
                let mut form = multipart::Form::new().text("urls", request.uri.clone());
                if let Some(path) = &save_path {
                    form = form.text("savepath", path.clone());
                }
                self.client.post(&url).multipart(form)
            })
            .await?;

        if body.contains("Fails.") {
            return Err(TorrentClientError::InvalidTorrent(format!(
                "daemon rejected {}",
                request.uri
            )));
        }

        Ok(AddTorrentResult {
            hash: extract_hash_from_magnet(&request.uri).unwrap_or_default(),
        })
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let url = self.endpoint(&format!("/api/v2/torrents/info?hashes={}", hash_lower));
        let body = self.send(|| self.client.get(&url)).await?;

        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&body)
            .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))?;

        let torrent = torrents
            .into_iter()
            .next()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;

        let save_path = non_empty(torrent.save_path);
        let files = self.fetch_files(&hash_lower, save_path.as_deref()).await?;

        Ok(TorrentInfo {
            hash: torrent.hash.to_lowercase(),
            name: torrent.name,
            state: torrent.state,
            progress: torrent.progress.clamp(0.0, 1.0),
            save_path,
            content_path: non_empty(torrent.content_path),
            files,
        })
    }

    async fn remove_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        let url = self.endpoint("/api/v2/torrents/delete");
        let hash_lower = hash.to_lowercase();
        let delete_str = if delete_files { "true" } else { "false" };

        self.send(|| {
            self.client
                .post(&url)
                .form(&[("hashes", hash_lower.as_str()), ("deleteFiles", delete_str)])
        })
        .await?;

        Ok(())
    }
}
