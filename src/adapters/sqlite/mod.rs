//! SQLite adapter: Implementation of KeyValueStore.
//!
//! Provides local persistence for compressed template blobs, one row per
//! user id.
//!
//! # Concurrency
//!
//! The connection is guarded by a `Mutex`. Separate processes opening the
//! same database file are serialized by SQLite's file locking; writers wait
//! up to [`BUSY_TIMEOUT`] for the lock before failing with `Database`.
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::ports::KeyValueStore;

/// How long a writer waits for another process to release the database.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// SQLite storage adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS templates (
                user_id TEXT PRIMARY KEY,
                template BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(())
    }
}

impl KeyValueStore for SqliteStorage {
    type Error = StorageError;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let conn = self.lock()?;

        let blob = conn
            .query_row(
                "SELECT template FROM templates WHERE user_id = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;

        Ok(blob)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339();

        conn.execute(
            r"
            INSERT INTO templates (user_id, template, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                template = excluded.template,
                updated_at = excluded.updated_at
            ",
            params![key, value, now],
        )?;

        tracing::debug!("Stored template blob ({} bytes)", value.len());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, Self::Error> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT user_id FROM templates ORDER BY user_id")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys)
    }
}
