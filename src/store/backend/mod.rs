//! Storage backends
//!
//! The record store persists each collection as one JSON string under a fixed
//! key. Backends only have to provide string get/set/remove plus a change feed:
//!
//! - **memory**: shared in-process map, optional byte quota
//! - **file**: one `<key>.json` file per key in a data directory
//! - **sqlite**: a `kv` table in a SQLite database
//!
//! Every successful write emits a [`KeyChange`] on the backend's feed. Store
//! instances sharing a backend use the feed to learn about each other's writes.

mod file;
mod memory;
mod sqlite;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::error::StoreResult;

/// Identifies the store instance that performed a write
pub type InstanceId = Uuid;

/// Notification that a key was written or removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChange {
    /// Key that changed
    pub key: String,
    /// Instance that wrote it, `None` for writes outside any store instance
    pub origin: Option<InstanceId>,
    /// CRC32 of the new value, 0 when the key was removed
    pub checksum: u32,
}

/// Key-value storage the record store persists through
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs and health output
    fn kind(&self) -> &'static str;

    /// Read a key. `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the value of a key
    fn set(&self, key: &str, value: &str, origin: Option<InstanceId>) -> StoreResult<()>;

    /// Delete a key. Removing a missing key is not an error.
    fn remove(&self, key: &str, origin: Option<InstanceId>) -> StoreResult<()>;

    /// Subscribe to the backend's change feed
    fn watch(&self) -> broadcast::Receiver<KeyChange>;
}

/// CRC32 of a stored value, 0 for a missing key
pub fn checksum(value: Option<&str>) -> u32 {
    value.map(|v| crc32fast::hash(v.as_bytes())).unwrap_or(0)
}

/// Broadcast sender shared by the backend implementations
#[derive(Debug)]
pub(crate) struct ChangeFeed {
    tx: broadcast::Sender<KeyChange>,
}

impl ChangeFeed {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn emit(&self, key: &str, value: Option<&str>, origin: Option<InstanceId>) {
        // No receivers is fine: nobody is watching yet
        let _ = self.tx.send(KeyChange {
            key: key.to_string(),
            origin,
            checksum: checksum(value),
        });
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<KeyChange> {
        self.tx.subscribe()
    }
}

/// Default capacity of backend change feeds
pub(crate) const FEED_CAPACITY: usize = 256;

/// Which backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    File,
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::File => write!(f, "file"),
            BackendKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "file" | "json" => Ok(BackendKind::File),
            "sqlite" => Ok(BackendKind::Sqlite),
            _ => Err(format!(
                "Invalid backend: {}. Use memory, file, or sqlite",
                s
            )),
        }
    }
}

/// Open a backend of the given kind rooted at `data_dir`
pub fn open_backend(
    kind: BackendKind,
    data_dir: &Path,
    quota_bytes: Option<usize>,
) -> StoreResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match kind {
        BackendKind::Memory => Arc::new(match quota_bytes {
            Some(quota) => MemoryBackend::with_quota(quota),
            None => MemoryBackend::new(),
        }),
        BackendKind::File => Arc::new(FileBackend::open(data_dir)?),
        BackendKind::Sqlite => Arc::new(SqliteBackend::open(data_dir.join("citypulse.db"))?),
    };

    tracing::info!(backend = backend.kind(), data_dir = ?data_dir, "Opened storage backend");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("memory".parse::<BackendKind>(), Ok(BackendKind::Memory));
        assert_eq!("JSON".parse::<BackendKind>(), Ok(BackendKind::File));
        assert_eq!("sqlite".parse::<BackendKind>(), Ok(BackendKind::Sqlite));
        assert!("redis".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_checksum_missing_is_zero() {
        assert_eq!(checksum(None), 0);
        assert_ne!(checksum(Some("[]")), 0);
        assert_eq!(checksum(Some("[]")), checksum(Some("[]")));
    }

    #[test]
    fn test_open_each_backend() {
        let dir = tempdir().unwrap();
        for kind in [BackendKind::Memory, BackendKind::File, BackendKind::Sqlite] {
            let backend = open_backend(kind, dir.path(), None).unwrap();
            assert_eq!(backend.kind(), kind.to_string());

            backend.set("k", "v", None).unwrap();
            assert_eq!(backend.get("k").unwrap().as_deref(), Some("v"));
            backend.remove("k", None).unwrap();
            assert_eq!(backend.get("k").unwrap(), None);
        }
    }

    #[test]
    fn test_feed_reports_origin_and_checksum() {
        let backend = MemoryBackend::new();
        let mut rx = backend.watch();
        let origin = Uuid::new_v4();

        backend.set("citypulse_alerts", "[]", Some(origin)).unwrap();

        let change = rx.try_recv().unwrap();
        assert_eq!(change.key, "citypulse_alerts");
        assert_eq!(change.origin, Some(origin));
        assert_eq!(change.checksum, checksum(Some("[]")));
    }
}
