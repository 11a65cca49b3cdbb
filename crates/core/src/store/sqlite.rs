//! SQLite-backed store implementation.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, types::Type, Connection, OptionalExtension};

use super::traits::{FileStore, SourceStore, StoreError, TorrentStore};
use super::types::{
    DownloadStatus, HardlinkOutcome, HardlinkStatus, MediaFile, NewMediaFile, NewSource,
    NewTorrent, Source, SourceKind, SourceUpdate, Torrent, TorrentFilter,
};

const SOURCE_COLUMNS: &str = "id, url, kind, media_type, title, season, use_ai_episode, \
     episode_regex, episode_offset, enable_sr, check_interval, last_check, created_at";

const TORRENT_COLUMNS: &str = "id, hash, source_id, url, status, download_progress, \
     created_at, started_at, completed_at, error_message";

const FILE_COLUMNS: &str = "id, torrent_id, name, path, size, is_valid_episode, \
     extracted_episode, final_episode, hardlink_path, hardlink_status, hardlink_error, created_at";

/// Longest accepted polling interval (ten years).
const MAX_CHECK_INTERVAL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Largest accepted episode offset in either direction.
const MAX_EPISODE_OFFSET: i32 = 10_000;

/// SQLite-backed store for sources, torrents and files.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                media_type TEXT NOT NULL,
                title TEXT NOT NULL,
                season INTEGER,
                use_ai_episode INTEGER NOT NULL DEFAULT 0,
                episode_regex TEXT,
                episode_offset INTEGER NOT NULL DEFAULT 0,
                enable_sr INTEGER NOT NULL DEFAULT 0,
                check_interval INTEGER NOT NULL DEFAULT 3600 CHECK (check_interval > 0),
                last_check TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS torrents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL UNIQUE,
                source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
                url TEXT NOT NULL,
                status TEXT NOT NULL,
                download_progress REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                error_message TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_torrents_source ON torrents(source_id);
            CREATE INDEX IF NOT EXISTS idx_torrents_status ON torrents(status);

            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                torrent_id INTEGER NOT NULL REFERENCES torrents(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                path TEXT NOT NULL,
                size INTEGER NOT NULL DEFAULT 0,
                is_valid_episode INTEGER NOT NULL DEFAULT 0,
                extracted_episode INTEGER,
                final_episode INTEGER,
                hardlink_path TEXT,
                hardlink_status TEXT NOT NULL DEFAULT 'pending',
                hardlink_error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_torrent ON files(torrent_id);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    fn validate_new_source(source: &NewSource) -> Result<(), StoreError> {
        if source.url.trim().is_empty() {
            return Err(StoreError::Validation("url cannot be empty".to_string()));
        }
        if source.title.trim().is_empty() {
            return Err(StoreError::Validation("title cannot be empty".to_string()));
        }
        if source.kind == SourceKind::Magnet && !source.url.starts_with("magnet:") {
            return Err(StoreError::Validation(
                "magnet sources need a magnet: url".to_string(),
            ));
        }
        Self::validate_check_interval(source.check_interval)?;
        Self::validate_episode_offset(source.episode_offset)?;
        if let Some(pattern) = &source.episode_regex {
            Self::validate_episode_regex(pattern)?;
        }
        Ok(())
    }

    fn validate_check_interval(secs: u64) -> Result<(), StoreError> {
        if secs == 0 || secs > MAX_CHECK_INTERVAL_SECS {
            return Err(StoreError::Validation(format!(
                "check_interval must be between 1 and {} seconds",
                MAX_CHECK_INTERVAL_SECS
            )));
        }
        Ok(())
    }

    fn validate_episode_offset(offset: i32) -> Result<(), StoreError> {
        if offset.unsigned_abs() > MAX_EPISODE_OFFSET as u32 {
            return Err(StoreError::Validation(format!(
                "episode_offset must be within +/-{}",
                MAX_EPISODE_OFFSET
            )));
        }
        Ok(())
    }

    fn validate_episode_regex(pattern: &str) -> Result<(), StoreError> {
        let regex = regex_lite::Regex::new(pattern)
            .map_err(|e| StoreError::Validation(format!("invalid episode_regex: {}", e)))?;
        if regex.captures_len() < 2 {
            return Err(StoreError::Validation(
                "episode_regex needs a capture group for the episode number".to_string(),
            ));
        }
        Ok(())
    }

    fn fetch_source(conn: &Connection, id: i64) -> Result<Option<Source>, StoreError> {
        conn.query_row(
            &format!("SELECT {} FROM sources WHERE id = ?", SOURCE_COLUMNS),
            params![id],
            Self::row_to_source,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn fetch_torrent(conn: &Connection, id: i64) -> Result<Option<Torrent>, StoreError> {
        conn.query_row(
            &format!("SELECT {} FROM torrents WHERE id = ?", TORRENT_COLUMNS),
            params![id],
            Self::row_to_torrent,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn build_where_clause(filter: &TorrentFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(source_id) = filter.source_id {
            conditions.push("source_id = ?");
            params.push(Box::new(source_id));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<Source> {
        let kind: String = row.get(2)?;
        let media_type: String = row.get(3)?;
        let check_interval: i64 = row.get(10)?;
        let last_check: Option<String> = row.get(11)?;
        let created_at: String = row.get(12)?;

        Ok(Source {
            id: row.get(0)?,
            url: row.get(1)?,
            kind: parse_column(2, &kind)?,
            media_type: parse_column(3, &media_type)?,
            title: row.get(4)?,
            season: row.get(5)?,
            use_ai_episode: row.get(6)?,
            episode_regex: row.get(7)?,
            episode_offset: row.get(8)?,
            enable_sr: row.get(9)?,
            check_interval: check_interval.max(1) as u64,
            last_check: last_check
                .as_deref()
                .map(|v| parse_timestamp(11, v))
                .transpose()?,
            created_at: parse_timestamp(12, &created_at)?,
        })
    }

    fn row_to_torrent(row: &rusqlite::Row) -> rusqlite::Result<Torrent> {
        let status: String = row.get(4)?;
        let created_at: String = row.get(6)?;
        let started_at: Option<String> = row.get(7)?;
        let completed_at: Option<String> = row.get(8)?;

        Ok(Torrent {
            id: row.get(0)?,
            hash: row.get(1)?,
            source_id: row.get(2)?,
            url: row.get(3)?,
            status: parse_column(4, &status)?,
            download_progress: row.get(5)?,
            created_at: parse_timestamp(6, &created_at)?,
            started_at: started_at
                .as_deref()
                .map(|v| parse_timestamp(7, v))
                .transpose()?,
            completed_at: completed_at
                .as_deref()
                .map(|v| parse_timestamp(8, v))
                .transpose()?,
            error_message: row.get(9)?,
        })
    }

    fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<MediaFile> {
        let size: i64 = row.get(4)?;
        let hardlink_status: String = row.get(9)?;
        let created_at: String = row.get(11)?;

        Ok(MediaFile {
            id: row.get(0)?,
            torrent_id: row.get(1)?,
            name: row.get(2)?,
            path: row.get(3)?,
            size: size.max(0) as u64,
            is_valid_episode: row.get(5)?,
            extracted_episode: row.get(6)?,
            final_episode: row.get(7)?,
            hardlink_path: row.get(8)?,
            hardlink_status: parse_column(9, &hardlink_status)?,
            hardlink_error: row.get(10)?,
            created_at: parse_timestamp(11, &created_at)?,
        })
    }
}

/// Parse an enum column, surfacing unknown values as conversion failures.
fn parse_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map constraint failures on writes to conflict/integrity errors.
fn map_write_error(e: rusqlite::Error, context: &str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        match err.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return StoreError::Conflict(context.to_string());
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return StoreError::Integrity(context.to_string());
            }
            ffi::SQLITE_CONSTRAINT_CHECK => {
                return StoreError::Validation(context.to_string());
            }
            _ => {}
        }
    }
    StoreError::Database(e.to_string())
}

impl SourceStore for SqliteStore {
    fn create_source(&self, source: NewSource) -> Result<Source, StoreError> {
        Self::validate_new_source(&source)?;

        let conn = self.conn()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO sources (url, kind, media_type, title, season, use_ai_episode, episode_regex, episode_offset, enable_sr, check_interval, last_check, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)",
            params![
                source.url,
                source.kind.as_str(),
                source.media_type.as_str(),
                source.title,
                source.season,
                source.use_ai_episode,
                source.episode_regex,
                source.episode_offset,
                source.enable_sr,
                source.check_interval as i64,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| map_write_error(e, &format!("source url already registered: {}", source.url)))?;

        Ok(Source {
            id: conn.last_insert_rowid(),
            url: source.url,
            kind: source.kind,
            media_type: source.media_type,
            title: source.title,
            season: source.season,
            use_ai_episode: source.use_ai_episode,
            episode_regex: source.episode_regex,
            episode_offset: source.episode_offset,
            enable_sr: source.enable_sr,
            check_interval: source.check_interval,
            last_check: None,
            created_at: now,
        })
    }

    fn get_source(&self, id: i64) -> Result<Option<Source>, StoreError> {
        let conn = self.conn()?;
        Self::fetch_source(&conn, id)
    }

    fn list_sources(&self, kind: Option<SourceKind>) -> Result<Vec<Source>, StoreError> {
        let conn = self.conn()?;

        let mut sql = format!("SELECT {} FROM sources", SOURCE_COLUMNS);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(kind) = kind {
            sql.push_str(" WHERE kind = ?");
            params.push(Box::new(kind.as_str()));
        }
        sql.push_str(" ORDER BY id ASC");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_source)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn update_source(&self, id: i64, update: SourceUpdate) -> Result<Option<Source>, StoreError> {
        let conn = self.conn()?;

        let Some(mut source) = Self::fetch_source(&conn, id)? else {
            return Ok(None);
        };

        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(StoreError::Validation("title cannot be empty".to_string()));
            }
            source.title = title;
        }
        if let Some(season) = update.season {
            source.season = season;
        }
        if let Some(use_ai) = update.use_ai_episode {
            source.use_ai_episode = use_ai;
        }
        if let Some(regex) = update.episode_regex {
            if let Some(pattern) = &regex {
                Self::validate_episode_regex(pattern)?;
            }
            source.episode_regex = regex;
        }
        if let Some(offset) = update.episode_offset {
            Self::validate_episode_offset(offset)?;
            source.episode_offset = offset;
        }
        if let Some(enable_sr) = update.enable_sr {
            source.enable_sr = enable_sr;
        }
        if let Some(interval) = update.check_interval {
            Self::validate_check_interval(interval)?;
            source.check_interval = interval;
        }

        conn.execute(
            "UPDATE sources SET title = ?, season = ?, use_ai_episode = ?, episode_regex = ?, episode_offset = ?, enable_sr = ?, check_interval = ? WHERE id = ?",
            params![
                source.title,
                source.season,
                source.use_ai_episode,
                source.episode_regex,
                source.episode_offset,
                source.enable_sr,
                source.check_interval as i64,
                id,
            ],
        )
        .map_err(|e| map_write_error(e, "source update rejected"))?;

        Ok(Some(source))
    }

    fn set_last_check(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE sources SET last_check = ? WHERE id = ?",
                params![at.to_rfc3339(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::Integrity(format!("source {} does not exist", id)));
        }
        Ok(())
    }

    fn reset_last_check(&self, id: i64) -> Result<Option<Source>, StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE sources SET last_check = NULL WHERE id = ?",
                params![id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Ok(None);
        }
        Self::fetch_source(&conn, id)
    }

    fn delete_source(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM sources WHERE id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(deleted > 0)
    }
}

impl TorrentStore for SqliteStore {
    fn create_torrent(&self, torrent: NewTorrent) -> Result<Torrent, StoreError> {
        let hash = torrent.hash.to_lowercase();
        if hash.is_empty() {
            return Err(StoreError::Validation("hash cannot be empty".to_string()));
        }

        let conn = self.conn()?;
        let now = Utc::now();

        let source_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sources WHERE id = ?)",
                params![torrent.source_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if !source_exists {
            return Err(StoreError::Integrity(format!(
                "torrent {} references missing source {}",
                hash, torrent.source_id
            )));
        }

        conn.execute(
            "INSERT INTO torrents (hash, source_id, url, status, download_progress, created_at, started_at, completed_at, error_message) VALUES (?, ?, ?, ?, 0, ?, ?, NULL, NULL)",
            params![
                hash,
                torrent.source_id,
                torrent.url,
                torrent.status.as_str(),
                now.to_rfc3339(),
                torrent.started_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(|e| map_write_error(e, &format!("torrent already exists: {}", hash)))?;

        Ok(Torrent {
            id: conn.last_insert_rowid(),
            hash,
            source_id: torrent.source_id,
            url: torrent.url,
            status: torrent.status,
            download_progress: 0.0,
            created_at: now,
            started_at: torrent.started_at,
            completed_at: None,
            error_message: None,
        })
    }

    fn get_torrent(&self, id: i64) -> Result<Option<Torrent>, StoreError> {
        let conn = self.conn()?;
        Self::fetch_torrent(&conn, id)
    }

    fn get_torrent_by_hash(&self, hash: &str) -> Result<Option<Torrent>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM torrents WHERE hash = ?", TORRENT_COLUMNS),
            params![hash.to_lowercase()],
            Self::row_to_torrent,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn torrent_exists(&self, hash: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM torrents WHERE hash = ?)",
            params![hash.to_lowercase()],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_torrents(&self, filter: &TorrentFilter) -> Result<Vec<Torrent>, StoreError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM torrents {} ORDER BY created_at DESC, id DESC",
            TORRENT_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_torrent)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_unfinished_torrents(&self) -> Result<Vec<Torrent>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM torrents WHERE status != ? ORDER BY id ASC",
                TORRENT_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![DownloadStatus::Downloaded.as_str()],
                Self::row_to_torrent,
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn update_torrent(&self, torrent: &Torrent) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE torrents SET status = ?, download_progress = ?, started_at = ?, completed_at = ?, error_message = ? WHERE id = ?",
                params![
                    torrent.status.as_str(),
                    torrent.download_progress,
                    torrent.started_at.map(|t| t.to_rfc3339()),
                    torrent.completed_at.map(|t| t.to_rfc3339()),
                    torrent.error_message,
                    torrent.id,
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::Integrity(format!(
                "torrent {} does not exist",
                torrent.id
            )));
        }
        Ok(())
    }

    fn delete_torrent(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM torrents WHERE id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(deleted > 0)
    }
}

impl FileStore for SqliteStore {
    fn replace_files(
        &self,
        torrent_id: i64,
        files: Vec<NewMediaFile>,
    ) -> Result<Vec<MediaFile>, StoreError> {
        let mut conn = self.conn()?;

        if Self::fetch_torrent(&conn, torrent_id)?.is_none() {
            return Err(StoreError::Integrity(format!(
                "files reference missing torrent {}",
                torrent_id
            )));
        }

        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.execute("DELETE FROM files WHERE torrent_id = ?", params![torrent_id])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let now = Utc::now();
        let mut stored = Vec::with_capacity(files.len());

        for file in files {
            tx.execute(
                "INSERT INTO files (torrent_id, name, path, size, is_valid_episode, extracted_episode, final_episode, hardlink_path, hardlink_status, hardlink_error, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, NULL, ?)",
                params![
                    torrent_id,
                    file.name,
                    file.path,
                    file.size.min(i64::MAX as u64) as i64,
                    file.is_valid_episode,
                    file.extracted_episode,
                    file.final_episode,
                    HardlinkStatus::Pending.as_str(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| map_write_error(e, &format!("file {} rejected", file.name)))?;

            stored.push(MediaFile {
                id: tx.last_insert_rowid(),
                torrent_id,
                name: file.name,
                path: file.path,
                size: file.size,
                is_valid_episode: file.is_valid_episode,
                extracted_episode: file.extracted_episode,
                final_episode: file.final_episode,
                hardlink_path: None,
                hardlink_status: HardlinkStatus::Pending,
                hardlink_error: None,
                created_at: now,
            });
        }

        tx.commit()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(stored)
    }

    fn list_files(&self, torrent_id: i64) -> Result<Vec<MediaFile>, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM files WHERE torrent_id = ? ORDER BY id ASC",
                FILE_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![torrent_id], Self::row_to_file)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn record_hardlink(&self, file_id: i64, outcome: &HardlinkOutcome) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE files SET hardlink_path = ?, hardlink_status = ?, hardlink_error = ? WHERE id = ?",
                params![
                    outcome.path,
                    outcome.status.as_str(),
                    outcome.error,
                    file_id,
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::Integrity(format!("file {} does not exist", file_id)));
        }
        Ok(())
    }

    fn delete_files(&self, torrent_id: i64) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM files WHERE torrent_id = ?", params![torrent_id])
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}
