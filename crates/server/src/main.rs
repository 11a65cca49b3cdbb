use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bangumi_core::ai::build_llm_client;
use bangumi_core::config::TorrentClientBackend;
use bangumi_core::{
    load_config, validate_config, ContentClassifier, DownloadOrchestrator, EpisodeExtractor,
    ExtensionClassifier, FeedFetcher, FeedPoller, FeedReader, HardlinkOrganizer, HttpFeedFetcher,
    LlmBrain, MajorityClassifier, MediaBrain, MediaStore, QBittorrentClient, Scheduler,
    SourceAnalyzer, SqliteStore, TorrentClient,
};
use bangumi_server::api::create_router;
use bangumi_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("BANGUMI_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        database = ?config.database.path,
        "Configuration loaded"
    );

    let store: Arc<dyn MediaStore> = Arc::new(
        SqliteStore::new(&config.database.path).context("Failed to open database")?,
    );
    info!("Store initialized");

    // Download daemon
    let torrent_client: Option<(Arc<dyn TorrentClient>, Option<String>)> =
        match &config.torrent_client {
            Some(tc_config) => match tc_config.backend {
                TorrentClientBackend::QBittorrent => match &tc_config.qbittorrent {
                    Some(qbit_config) => {
                        info!("Initializing qBittorrent client at {}", qbit_config.url);
                        let client = QBittorrentClient::new(qbit_config.clone())
                            .context("Failed to create qBittorrent client")?;
                        Some((Arc::new(client), qbit_config.download_path.clone()))
                    }
                    None => {
                        error!("qBittorrent backend selected but no qbittorrent config provided");
                        None
                    }
                },
            },
            None => {
                warn!("No torrent client configured, ingestion disabled");
                None
            }
        };

    // AI brain and classifier
    let llm = build_llm_client(&config.llm).context("Failed to create LLM client")?;
    let has_llm = llm.is_some();
    let brain: Arc<dyn MediaBrain> = Arc::new(LlmBrain::new(llm));
    let classifier: Arc<dyn ContentClassifier> = if has_llm {
        info!(model = %config.llm.model, "Using LLM majority classifier");
        Arc::new(MajorityClassifier::new(Arc::clone(&brain), &config.classifier))
    } else {
        info!("LLM disabled, classifying by file extension");
        Arc::new(ExtensionClassifier)
    };

    let fetcher: Arc<dyn FeedFetcher> = Arc::new(
        HttpFeedFetcher::new(&config.feed).context("Failed to create feed fetcher")?,
    );
    let analyzer = Arc::new(SourceAnalyzer::new(
        FeedReader::new(Arc::clone(&fetcher)),
        Arc::clone(&brain),
    ));

    let (orchestrator, scheduler) = match torrent_client {
        Some((client, download_path)) => {
            let mut orch = DownloadOrchestrator::new(
                Arc::clone(&store),
                client,
                classifier,
                EpisodeExtractor::new(Arc::clone(&brain)),
                HardlinkOrganizer::new(config.hardlink.clone()),
            );
            if let Some(path) = download_path {
                orch = orch.with_download_path(path);
            }
            let orch = Arc::new(orch);

            let poller = Arc::new(FeedPoller::new(
                Arc::clone(&store),
                FeedReader::new(fetcher),
                Arc::clone(&orch),
            ));
            let scheduler = Arc::new(Scheduler::new(
                config.scheduler.clone(),
                poller,
                Arc::clone(&orch),
            ));

            if config.scheduler.enabled {
                scheduler.start().await;
            } else {
                info!("Scheduler disabled in config, sweeps run on demand only");
            }
            (Some(orch), Some(scheduler))
        }
        None => (None, None),
    };

    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        analyzer,
        orchestrator,
        scheduler.clone(),
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(scheduler) = scheduler {
        if scheduler.status().await.running {
            info!("Stopping scheduler...");
            scheduler.stop().await;
        }
    }

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
