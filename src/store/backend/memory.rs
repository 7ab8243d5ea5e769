//! In-memory backend
//!
//! A map shared by every store instance holding the same `Arc`. It behaves
//! like browser local storage: an optional quota on the total number of bytes
//! (keys plus values), and an availability switch for exercising failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tokio::sync::broadcast;

use super::{ChangeFeed, InstanceId, KeyChange, StorageBackend, FEED_CAPACITY};
use crate::store::error::{StoreError, StoreResult};

/// Shared in-process key-value map
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    available: AtomicBool,
    feed: ChangeFeed,
}

impl MemoryBackend {
    /// Create an unbounded backend
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota_bytes: None,
            available: AtomicBool::new(true),
            feed: ChangeFeed::new(FEED_CAPACITY),
        }
    }

    /// Create a backend that rejects writes beyond `quota_bytes` in total
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new()
        }
    }

    /// Mark the backend (un)available. While unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Total bytes currently stored (keys plus values)
    pub fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.iter().map(|(k, v)| k.len() + v.len()).sum())
            .unwrap_or(0)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "memory backend is switched off".to_string(),
            ))
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::poisoned("memory backend"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, origin: Option<InstanceId>) -> StoreResult<()> {
        self.check_available()?;
        {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| StoreError::poisoned("memory backend"))?;

            if let Some(quota) = self.quota_bytes {
                let others: usize = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                let required = others + key.len() + value.len();
                if required > quota {
                    return Err(StoreError::QuotaExceeded {
                        key: key.to_string(),
                        required,
                        quota,
                    });
                }
            }

            entries.insert(key.to_string(), value.to_string());
        }

        self.feed.emit(key, Some(value), origin);
        Ok(())
    }

    fn remove(&self, key: &str, origin: Option<InstanceId>) -> StoreResult<()> {
        self.check_available()?;
        let removed = self
            .entries
            .write()
            .map_err(|_| StoreError::poisoned("memory backend"))?
            .remove(key);

        if removed.is_some() {
            self.feed.emit(key, None, origin);
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<KeyChange> {
        self.feed.subscribe()
    }
}
