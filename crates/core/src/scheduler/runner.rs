//! Periodic sweep loop with a single-flight guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::metrics::{SWEEPS_TOTAL, SWEEP_DURATION};
use crate::orchestrator::DownloadOrchestrator;

use super::poller::FeedPoller;
use super::types::{SchedulerStatus, SweepReport};

/// Releases the in-flight flag when a sweep ends, however it ends.
struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One sweep: RSS pass then reconciliation. Shared with the tick loop.
struct Sweeper {
    poller: Arc<FeedPoller>,
    orchestrator: Arc<DownloadOrchestrator>,
    max_sweep: Duration,
    sweeping: AtomicBool,
    last_sweep: RwLock<Option<SweepReport>>,
}

impl Sweeper {
    /// Run a sweep unless one is already in flight.
    async fn try_sweep(&self) -> Option<SweepReport> {
        if self.sweeping.swap(true, Ordering::SeqCst) {
            debug!("Sweep already in progress, skipping");
            SWEEPS_TOTAL.with_label_values(&["skipped"]).inc();
            return None;
        }
        let _guard = FlagGuard(&self.sweeping);
        let timer = SWEEP_DURATION.with_label_values(&[]).start_timer();

        match tokio::time::timeout(self.max_sweep, self.sweep()).await {
            Ok(report) => {
                timer.observe_duration();
                SWEEPS_TOTAL.with_label_values(&["completed"]).inc();
                *self.last_sweep.write().await = Some(report.clone());
                Some(report)
            }
            Err(_) => {
                timer.stop_and_discard();
                SWEEPS_TOTAL.with_label_values(&["timed_out"]).inc();
                warn!(
                    max_sweep_secs = self.max_sweep.as_secs(),
                    "Sweep exceeded its time limit and was abandoned"
                );
                None
            }
        }
    }

    async fn sweep(&self) -> SweepReport {
        let started_at = Utc::now();

        let poll = match self.poller.poll_due(started_at).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Feed poll pass failed");
                Default::default()
            }
        };

        let reconcile = match self.orchestrator.reconcile_pending().await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Reconciliation pass failed");
                Default::default()
            }
        };

        SweepReport {
            started_at,
            finished_at: Utc::now(),
            poll,
            reconcile,
        }
    }

    async fn wait_idle(&self) {
        while self.sweeping.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Runs a sweep every tick and on demand.
pub struct Scheduler {
    config: SchedulerConfig,
    sweeper: Arc<Sweeper>,
    /// Whether the tick loop is running.
    running: Arc<AtomicBool>,
    /// Ticks are ignored while a manual sweep runs.
    paused: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        poller: Arc<FeedPoller>,
        orchestrator: Arc<DownloadOrchestrator>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let sweeper = Sweeper {
            poller,
            orchestrator,
            max_sweep: Duration::from_secs(config.max_sweep_secs),
            sweeping: AtomicBool::new(false),
            last_sweep: RwLock::new(None),
        };

        Self {
            config,
            sweeper: Arc::new(sweeper),
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the tick loop.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        info!(
            tick_interval_secs = self.config.tick_interval_secs,
            "Starting scheduler"
        );
        self.spawn_tick_loop();
    }

    /// Stop the tick loop. A sweep in flight finishes in the background.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }

        info!("Stopping scheduler");
        let _ = self.shutdown_tx.send(());

        // Give the loop a moment to observe the signal
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    /// Pause ticks, wait for any in-flight sweep, run one sweep, resume.
    ///
    /// Returns `None` if another manual sweep got there first or the sweep
    /// timed out.
    pub async fn trigger_now(&self) -> Option<SweepReport> {
        let was_paused = self.paused.swap(true, Ordering::SeqCst);
        info!("Manual sweep requested");

        self.sweeper.wait_idle().await;
        let report = self.sweeper.try_sweep().await;

        if !was_paused {
            self.paused.store(false, Ordering::SeqCst);
        }
        report
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.running.load(Ordering::Relaxed),
            paused: self.paused.load(Ordering::Relaxed),
            sweeping: self.sweeper.sweeping.load(Ordering::Relaxed),
            tick_interval_secs: self.config.tick_interval_secs,
            last_sweep: self.sweeper.last_sweep.read().await.clone(),
        }
    }

    fn spawn_tick_loop(&self) {
        let running = Arc::clone(&self.running);
        let paused = Arc::clone(&self.paused);
        let sweeper = Arc::clone(&self.sweeper);
        let interval = Duration::from_secs(self.config.tick_interval_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Tick loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Tick loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if paused.load(Ordering::Relaxed) {
                            debug!("Scheduler paused, skipping tick");
                            continue;
                        }
                        // Overlapping ticks are dropped by the in-flight flag.
                        let sweeper = Arc::clone(&sweeper);
                        tokio::spawn(async move {
                            sweeper.try_sweep().await;
                        });
                    }
                }
            }
            info!("Tick loop stopped");
        });
    }
}
