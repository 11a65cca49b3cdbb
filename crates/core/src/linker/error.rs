//! Error types for the linker module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while linking a file into the library.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Hardlinking is turned off in configuration.
    #[error("Hardlinking is disabled")]
    Disabled,

    /// Hardlinking is on but no library root is configured.
    #[error("Hardlink output base is not configured")]
    OutputBaseMissing,

    /// A tv file has no episode number.
    #[error("Episode number is required for tv sources")]
    MissingEpisode,

    /// The offset-adjusted episode is not positive.
    #[error("Invalid episode number: {0}")]
    InvalidEpisode(i32),

    /// Downloaded file is not on disk.
    #[error("Source file not found: {path}")]
    SourceFileMissing { path: PathBuf },

    /// Failed to create destination directory.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create the link itself.
    #[error("Failed to link {source_path} to {destination}: {error}")]
    LinkFailed {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
