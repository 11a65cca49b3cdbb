//! Download daemon abstraction.
//!
//! This module provides a `TorrentClient` trait for driving an external
//! download daemon. State strings are passed through verbatim; interpreting
//! them is the orchestrator's job.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
