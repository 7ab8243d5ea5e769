//! SQLite backend
//!
//! Keeps keys in a single `kv` table. The connection is guarded by a mutex;
//! the store's writes are small and infrequent.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::{ChangeFeed, InstanceId, KeyChange, StorageBackend, FEED_CAPACITY};
use crate::store::error::{StoreError, StoreResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

/// Key-value table in a SQLite database
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    feed: ChangeFeed,
}

impl SqliteBackend {
    /// Open or create a database file
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
            feed: ChangeFeed::new(FEED_CAPACITY),
        })
    }
}

impl StorageBackend for SqliteBackend {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::poisoned("sqlite connection"))?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, origin: Option<InstanceId>) -> StoreResult<()> {
        {
            let conn = self
                .conn
                .lock()
                .map_err(|_| StoreError::poisoned("sqlite connection"))?;
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, chrono::Utc::now().timestamp_millis()],
            )?;
        }

        self.feed.emit(key, Some(value), origin);
        Ok(())
    }

    fn remove(&self, key: &str, origin: Option<InstanceId>) -> StoreResult<()> {
        let deleted = {
            let conn = self
                .conn
                .lock()
                .map_err(|_| StoreError::poisoned("sqlite connection"))?;
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?
        };

        if deleted > 0 {
            self.feed.emit(key, None, origin);
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<KeyChange> {
        self.feed.subscribe()
    }
}
