//! Persistence for sources, torrents and their files.
//!
//! Sources own torrents and torrents own files; deleting a parent cascades.

mod sqlite;
mod traits;
mod types;

pub use sqlite::SqliteStore;
pub use traits::{FileStore, MediaStore, SourceStore, StoreError, TorrentStore};
pub use types::*;
