//! SQLite-backed artifact store

use crate::{validate_key, StoreError};
use quarry_domain::traits::ArtifactStore;
use quarry_domain::ArtifactKey;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Artifact store keeping every artifact in one SQLite table
///
/// # Thread Safety
///
/// The connection sits behind a mutex, so a single store can be shared by
/// concurrently running sheets. Writes are serialized.
pub struct SqliteArtifactStore {
    conn: Mutex<Connection>,
}

impl SqliteArtifactStore {
    /// Open a store at `path`
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quarry_store::SqliteArtifactStore;
    ///
    /// let store = SqliteArtifactStore::new("artifacts.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored artifacts
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM artifacts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Key columns: kind, sheet ('' when absent), range bounds (-1 when absent)
    fn key_columns(key: &ArtifactKey) -> (&'static str, String, i64, i64) {
        let (start, end) = key
            .range
            .map(|r| (r.start as i64, r.end as i64))
            .unwrap_or((-1, -1));
        (
            key.kind.as_str(),
            key.sheet.clone().unwrap_or_default(),
            start,
            end,
        )
    }

    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

impl ArtifactStore for SqliteArtifactStore {
    type Error = StoreError;

    fn save<T: Serialize>(&self, key: &ArtifactKey, record: &T) -> Result<(), Self::Error> {
        validate_key(key)?;
        let body = serde_json::to_string(record)?;
        let (kind, sheet, start, end) = Self::key_columns(key);

        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        conn.execute(
            "INSERT INTO artifacts (kind, sheet, range_start, range_end, body, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(kind, sheet, range_start, range_end)
             DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![kind, sheet, start, end, body, Self::now_millis()],
        )?;
        Ok(())
    }

    fn load<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<Option<T>, Self::Error> {
        validate_key(key)?;
        let (kind, sheet, start, end) = Self::key_columns(key);

        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM artifacts
                 WHERE kind = ?1 AND sheet = ?2 AND range_start = ?3 AND range_end = ?4",
                params![kind, sheet, start, end],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn exists(&self, key: &ArtifactKey) -> Result<bool, Self::Error> {
        validate_key(key)?;
        let (kind, sheet, start, end) = Self::key_columns(key);

        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM artifacts
                 WHERE kind = ?1 AND sheet = ?2 AND range_start = ?3 AND range_end = ?4",
                params![kind, sheet, start, end],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
