//! SQLite storage engine with WAL mode and performance pragmas.
//!
//! The [`SqliteStorage`] struct wraps a `rusqlite::Connection` behind an
//! `Arc<Mutex<>>` and runs every statement on the blocking pool via
//! `tokio::task::spawn_blocking` so the async runtime is never stalled.
//!
//! # Schema
//!
//! A single table holds every record:
//!
//! ```text
//! entries(key TEXT PRIMARY KEY, value BLOB NOT NULL, updated_at INTEGER NOT NULL)
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::storage::{Storage, StorageEntry, validate_key};

/// Durable [`Storage`] backed by a SQLite database file.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) a database at `path`, apply pragmas and create the
    /// schema.
    ///
    /// This call blocks briefly (file I/O), so call it during startup or
    /// through [`SqliteStorage::open_async`].
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening storage database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;
        Self::create_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open the database from async code without blocking the runtime.
    pub async fn open_async(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || Self::open(&path)).await?
    }

    /// Create an in-memory database — useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory storage database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;
        Self::create_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn execute<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await?
    }

    // ── setup ────────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        // WAL: readers never block the single writer.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        // Other processes sharing the file wait instead of failing.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        debug!("storage pragmas applied");
        Ok(())
    }

    fn create_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entries (
                key        TEXT PRIMARY KEY,
                value      BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<StorageEntry>> {
        validate_key(key)?;
        let key = key.to_string();
        self.execute(move |conn| {
            let value: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM entries WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.map(|value| StorageEntry { key, value }))
        })
        .await
    }

    async fn put(&self, entry: StorageEntry) -> StoreResult<()> {
        validate_key(&entry.key)?;
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![entry.key, entry.value, Utc::now().timestamp()],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        let key = key.to_string();
        // A single DELETE statement is atomic in SQLite, also across
        // processes sharing the file.
        self.execute(move |conn| {
            let rows = conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
            Ok(rows > 0)
        })
        .await
    }

    async fn create(&self, entry: StorageEntry) -> StoreResult<bool> {
        validate_key(&entry.key)?;
        self.execute(move |conn| {
            let rows = conn.execute(
                "INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO NOTHING",
                params![entry.key, entry.value, Utc::now().timestamp()],
            )?;
            Ok(rows > 0)
        })
        .await
    }
}

// ── tests ────────────────────────────────────────────────────────────
