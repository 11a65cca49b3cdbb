//! HTTP access for feeds and .torrent files.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use tracing::{debug, warn};

use crate::config::FeedConfig;

use super::FeedError;

/// Fetches remote feed documents. Any failure is reported as `None`.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch a document as text.
    async fn fetch(&self, url: &str) -> Option<String>;

    /// Fetch a binary payload (a .torrent file).
    async fn fetch_bytes(&self, url: &str) -> Option<Vec<u8>>;
}

/// `FeedFetcher` over reqwest.
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs as u64));

        if let Some(proxy) = &config.proxy {
            let proxy = Proxy::all(proxy.as_str())
                .map_err(|e| FeedError::Config(format!("invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FeedError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Option<reqwest::Response> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url, error = %e, "Feed request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(url, status = %response.status(), "Feed request returned error status");
            return None;
        }

        Some(response)
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        let response = self.get(url).await?;
        match response.text().await {
            Ok(text) => {
                debug!(url, bytes = text.len(), "Fetched feed");
                Some(text)
            }
            Err(e) => {
                warn!(url, error = %e, "Failed to read feed body");
                None
            }
        }
    }

    async fn fetch_bytes(&self, url: &str) -> Option<Vec<u8>> {
        let response = self.get(url).await?;
        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!(url, error = %e, "Failed to read torrent body");
                None
            }
        }
    }
}
