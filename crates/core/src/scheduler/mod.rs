//! Periodic ingestion.
//!
//! Every tick runs one sweep: poll each due RSS source for new releases,
//! then reconcile every unfinished torrent against the daemon. At most one
//! sweep runs at a time and each is bounded by `max_sweep_secs`.

mod poller;
mod runner;
mod types;

pub use poller::{FeedPoller, PollReport, SourcePoll};
pub use runner::Scheduler;
pub use types::{SchedulerStatus, SweepReport};
