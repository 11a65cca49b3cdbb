use std::sync::Arc;

use bangumi_core::{
    Config, DownloadOrchestrator, MediaStore, SanitizedConfig, Scheduler, SourceAnalyzer,
};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn MediaStore>,
    analyzer: Arc<SourceAnalyzer>,
    /// Absent when no download daemon is configured.
    orchestrator: Option<Arc<DownloadOrchestrator>>,
    scheduler: Option<Arc<Scheduler>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn MediaStore>,
        analyzer: Arc<SourceAnalyzer>,
        orchestrator: Option<Arc<DownloadOrchestrator>>,
        scheduler: Option<Arc<Scheduler>>,
    ) -> Self {
        Self {
            config,
            store,
            analyzer,
            orchestrator,
            scheduler,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn MediaStore {
        self.store.as_ref()
    }

    pub fn analyzer(&self) -> &SourceAnalyzer {
        self.analyzer.as_ref()
    }

    pub fn orchestrator(&self) -> Option<&Arc<DownloadOrchestrator>> {
        self.orchestrator.as_ref()
    }

    pub fn scheduler(&self) -> Option<&Arc<Scheduler>> {
        self.scheduler.as_ref()
    }
}
