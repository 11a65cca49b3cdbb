//! Library organization by hardlink.
//!
//! Destination paths are computed from the owning source alone, so
//! re-running organization for the same file always targets the same path.
//!
//! Layout:
//! - tv: `{base}/{title}/Season {season}/{title} S{season:02}E{episode:02}{ext}`
//! - movie: `{base}/{title}/{title}{ext}`

mod error;
mod organizer;
mod path;

pub use error::LinkError;
pub use organizer::HardlinkOrganizer;
pub use path::{compute_destination, file_suffix};
