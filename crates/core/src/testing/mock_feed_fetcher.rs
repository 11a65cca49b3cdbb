//! Mock feed fetcher for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::feed::FeedFetcher;

/// Serves canned documents by URL. Unknown URLs behave like failed requests.
#[derive(Debug, Default)]
pub struct MockFeedFetcher {
    feeds: Arc<RwLock<HashMap<String, String>>>,
    bytes: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    requests: Arc<RwLock<Vec<String>>>,
    hanging: Arc<RwLock<HashSet<String>>>,
}

impl MockFeedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_feed(&self, url: &str, content: &str) {
        self.feeds
            .write()
            .await
            .insert(url.to_string(), content.to_string());
    }

    pub async fn set_bytes(&self, url: &str, content: Vec<u8>) {
        self.bytes.write().await.insert(url.to_string(), content);
    }

    /// Make `url` fail from now on.
    pub async fn remove(&self, url: &str) {
        self.feeds.write().await.remove(url);
        self.bytes.write().await.remove(url);
    }

    /// Make requests for `url` never complete (or complete again).
    pub async fn set_hang(&self, url: &str, hang: bool) {
        let mut hanging = self.hanging.write().await;
        if hang {
            hanging.insert(url.to_string());
        } else {
            hanging.remove(url);
        }
    }

    async fn wait_if_hanging(&self, url: &str) {
        if self.hanging.read().await.contains(url) {
            std::future::pending::<()>().await;
        }
    }

    /// URLs requested so far, in order.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl FeedFetcher for MockFeedFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        self.requests.write().await.push(url.to_string());
        self.wait_if_hanging(url).await;
        self.feeds.read().await.get(url).cloned()
    }

    async fn fetch_bytes(&self, url: &str) -> Option<Vec<u8>> {
        self.requests.write().await.push(url.to_string());
        self.wait_if_hanging(url).await;
        self.bytes.read().await.get(url).cloned()
    }
}
