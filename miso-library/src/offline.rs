//! Versioned offline store for fetched clips
//!
//! Keeps the raw bytes of every clip fetched so the player keeps working
//! without a connection. Each release bumps `CACHE_VERSION`; opening the store
//! drops everything stored under an older version.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetch::ClipFetcher;
use crate::format::CLIP_FORMATS;
use crate::loader::ClipError;
use crate::noise::NoiseType;

/// Prefix shared by every version of the store
pub const CACHE_PREFIX: &str = "miso-clips-v";
/// Current store version
pub const CACHE_VERSION: u32 = 101;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Clip bytes stored in SQLite, partitioned by cache version
pub struct OfflineStore {
    conn: Connection,
    cache_name: String,
}

impl OfflineStore {
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS assets (
            cache_name TEXT NOT NULL,
            path TEXT NOT NULL,
            body BLOB NOT NULL,
            stored_at INTEGER NOT NULL,
            PRIMARY KEY (cache_name, path)
        );
    "#;

    /// Open or create the store at `db_path`, purging older versions
    pub fn open(db_path: &Path, version: u32) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn, version)
    }

    /// Open an in-memory store (for testing)
    #[cfg(test)]
    pub fn in_memory(version: u32) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, version)
    }

    fn with_connection(conn: Connection, version: u32) -> Result<Self, StoreError> {
        conn.execute_batch(Self::SCHEMA)?;
        let store = Self {
            conn,
            cache_name: format!("{CACHE_PREFIX}{version}"),
        };
        store.purge_stale()?;
        Ok(store)
    }

    /// Default database location
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("miso")
            .join("clips.db")
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Delete entries written by other versions of the store
    fn purge_stale(&self) -> Result<usize, StoreError> {
        let removed = self.conn.execute(
            "DELETE FROM assets WHERE cache_name LIKE ?1 AND cache_name != ?2",
            params![format!("{CACHE_PREFIX}%"), self.cache_name],
        )?;
        if removed > 0 {
            info!(removed, current = %self.cache_name, "purged stale offline clips");
        }
        Ok(removed)
    }

    /// Stored body for `path`, if any
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.conn
            .query_row(
                "SELECT body FROM assets WHERE cache_name = ?1 AND path = ?2",
                params![self.cache_name, path],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or_else(|e| {
                warn!(%path, error = %e, "offline store read failed");
                None
            })
    }

    /// Store a body, replacing any previous one for `path`
    pub fn put(&self, path: &str, body: &[u8]) -> Result<(), StoreError> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        self.conn.execute(
            "INSERT OR REPLACE INTO assets (cache_name, path, body, stored_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.cache_name, path, body, now],
        )?;
        Ok(())
    }

    /// Number of entries in the current version
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM assets WHERE cache_name = ?1",
            params![self.cache_name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// Serves stored clips first, falling back to `upstream` and storing what
/// it returns
pub struct OfflineFetcher<F> {
    store: OfflineStore,
    upstream: F,
}

impl<F: ClipFetcher> OfflineFetcher<F> {
    pub fn new(store: OfflineStore, upstream: F) -> Self {
        Self { store, upstream }
    }

    pub fn store(&self) -> &OfflineStore {
        &self.store
    }

    /// Every clip path, in every supported format
    pub fn asset_paths() -> Vec<String> {
        NoiseType::clip_types()
            .flat_map(|noise| {
                CLIP_FORMATS
                    .iter()
                    .filter_map(move |format| noise.clip_path(*format))
            })
            .collect()
    }

    /// Fetch and store each path not stored yet. Returns how many were added.
    pub fn precache(&self, paths: &[String]) -> usize {
        let mut added = 0;
        for path in paths {
            if self.store.get(path).is_some() {
                continue;
            }
            match self.upstream.fetch(path) {
                Ok(body) => match self.store.put(path, &body) {
                    Ok(()) => added += 1,
                    Err(e) => warn!(%path, error = %e, "offline store write failed"),
                },
                Err(e) => debug!(%path, error = %e, "precache skipped"),
            }
        }
        info!(added, "offline clips precached");
        added
    }
}

impl<F: ClipFetcher> ClipFetcher for OfflineFetcher<F> {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, ClipError> {
        if let Some(body) = self.store.get(path) {
            debug!(%path, "serving clip from offline store");
            return Ok(body);
        }

        let body = self.upstream.fetch(path)?;
        if let Err(e) = self.store.put(path, &body) {
            warn!(%path, error = %e, "offline store write failed");
        }
        Ok(body)
    }
}
