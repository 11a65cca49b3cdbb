//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, so the whole HTTP surface can be
//! exercised without a download daemon, feed hosts or an LLM.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use bangumi_core::config::{ClassifierConfig, DatabaseConfig, HardlinkConfig, ServerConfig};
use bangumi_core::testing::{MockBrain, MockFeedFetcher, MockTorrentClient};
use bangumi_core::{
    Config, DownloadOrchestrator, EpisodeExtractor, FeedPoller, FeedReader, HardlinkOrganizer,
    MajorityClassifier, MediaStore, Scheduler, SourceAnalyzer, SqliteStore,
};
use bangumi_server::state::AppState;

/// Re-export fixtures for test convenience
pub use bangumi_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_source_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/sources", json!({
///         "url": "https://feeds.example/show",
///         "media_type": "tv",
///         "title": "Show"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Direct store access for seeding and assertions
    pub store: Arc<SqliteStore>,
    /// Mock download daemon
    pub torrent_client: Arc<MockTorrentClient>,
    /// Mock feed host
    pub feeds: Arc<MockFeedFetcher>,
    /// Mock AI brain
    pub brain: Arc<MockBrain>,
    /// Temporary directory for the test database and library
    pub temp_dir: TempDir,
    /// Library root when hardlinking is enabled
    pub library_dir: Option<PathBuf>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Wire in the orchestrator and scheduler (a daemon is configured)
    pub with_daemon: bool,
    /// Enable hardlinking into a temp library
    pub enable_hardlinks: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            with_daemon: true,
            enable_hardlinks: false,
        }
    }
}

impl TestConfig {
    /// No daemon: ingestion routes answer 503.
    pub fn without_daemon() -> Self {
        Self {
            with_daemon: false,
            enable_hardlinks: false,
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let library_dir = if test_config.enable_hardlinks {
            let dir = temp_dir.path().join("library");
            std::fs::create_dir_all(&dir).expect("Failed to create library dir");
            Some(dir)
        } else {
            None
        };

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            hardlink: HardlinkConfig {
                enabled: test_config.enable_hardlinks,
                output_base: library_dir.clone(),
            },
            ..Config::default()
        };

        let store = Arc::new(SqliteStore::new(&db_path).expect("Failed to create store"));
        let torrent_client = Arc::new(MockTorrentClient::new());
        let feeds = Arc::new(MockFeedFetcher::new());
        let brain = Arc::new(MockBrain::new());

        let analyzer = Arc::new(SourceAnalyzer::new(
            FeedReader::new(feeds.clone()),
            brain.clone(),
        ));

        let (orchestrator, scheduler) = if test_config.with_daemon {
            let dyn_store: Arc<dyn MediaStore> = store.clone();
            let orchestrator = Arc::new(DownloadOrchestrator::new(
                dyn_store.clone(),
                torrent_client.clone(),
                Arc::new(MajorityClassifier::new(
                    brain.clone(),
                    &ClassifierConfig::default(),
                )),
                EpisodeExtractor::new(brain.clone()),
                HardlinkOrganizer::new(config.hardlink.clone()),
            ));
            let poller = Arc::new(FeedPoller::new(
                dyn_store,
                FeedReader::new(feeds.clone()),
                orchestrator.clone(),
            ));
            // Never started: sweeps only run through the trigger endpoint.
            let scheduler = Arc::new(Scheduler::new(
                config.scheduler.clone(),
                poller,
                orchestrator.clone(),
            ));
            (Some(orchestrator), Some(scheduler))
        } else {
            (None, None)
        };

        let state = Arc::new(AppState::new(
            config,
            store.clone(),
            analyzer,
            orchestrator,
            scheduler,
        ));
        let router = bangumi_server::api::create_router(state);

        Self {
            router,
            store,
            torrent_client,
            feeds,
            brain,
            temp_dir,
            library_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PATCH request with JSON body.
    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Fetch a non-JSON endpoint and return status and text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
