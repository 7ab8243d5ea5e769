//! File backend
//!
//! Stores each key as `<data_dir>/<key>.json`. Writes go to a temporary file
//! first and are renamed into place, so readers never see a half-written blob.
//! Every write gets its own temporary file, so concurrent writers from several
//! instances or processes never clobber each other's partial output; the last
//! rename wins.
//! Other processes pointed at the same directory see each other's data; the
//! store's change relay picks their writes up by polling.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{ChangeFeed, InstanceId, KeyChange, StorageBackend, FEED_CAPACITY};
use crate::store::error::{StoreError, StoreResult};

/// Directory of JSON files, one per key
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    feed: ChangeFeed,
}

impl FileBackend {
    /// Open (and create if needed) a data directory
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            feed: ChangeFeed::new(FEED_CAPACITY),
        })
    }

    /// Directory holding the key files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing a key
    pub fn key_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("key '{}' is not a valid file name", key),
            )));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl StorageBackend for FileBackend {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.key_path(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str, origin: Option<InstanceId>) -> StoreResult<()> {
        let path = self.key_path(key)?;
        let tmp_path = self
            .dir
            .join(format!("{}.json.{}.tmp", key, Uuid::new_v4().simple()));

        let written = write_file(&tmp_path, value).and_then(|()| fs::rename(&tmp_path, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        self.feed.emit(key, Some(value), origin);
        Ok(())
    }

    fn remove(&self, key: &str, origin: Option<InstanceId>) -> StoreResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                self.feed.emit(key, None, origin);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn watch(&self) -> broadcast::Receiver<KeyChange> {
        self.feed.subscribe()
    }
}

fn write_file(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn leftover_temp_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[test]
    fn test_set_get_roundtrip() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.set("citypulse_reports", "[1,2,3]", None).unwrap();
        assert_eq!(
            backend.get("citypulse_reports").unwrap().as_deref(),
            Some("[1,2,3]")
        );
        assert!(dir.path().join("citypulse_reports.json").exists());
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn test_concurrent_writers_share_directory() {
        let dir = tempdir().unwrap();
        let path = Arc::new(dir.path().to_path_buf());

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    let backend = FileBackend::open(path.as_path()).unwrap();
                    for i in 0..100 {
                        let value = format!("[\"writer-{}-{}\"]", writer, i);
                        backend.set("citypulse_reports", &value, None).unwrap();
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        // Last write wins: the file holds one complete value from some writer
        let backend = FileBackend::open(dir.path()).unwrap();
        let value = backend.get("citypulse_reports").unwrap().unwrap();
        let parsed: Vec<String> = serde_json::from_str(&value).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].ends_with("-99"));
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn test_concurrent_record_stores_over_one_directory() {
        use crate::store::{NewReport, RecordStore, ReportKind};

        let dir = tempdir().unwrap();
        let path = Arc::new(dir.path().to_path_buf());

        let stores: Vec<_> = (0..4)
            .map(|n| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    let store =
                        RecordStore::new(Arc::new(FileBackend::open(path.as_path()).unwrap()));
                    for i in 0..50 {
                        store
                            .add_report(NewReport::new(
                                format!("user-{}", n),
                                ReportKind::Feedback,
                                format!("Report {}", i),
                                "Bins not collected",
                            ))
                            .unwrap();
                    }
                })
            })
            .collect();

        for store in stores {
            store.join().unwrap();
        }

        let store = RecordStore::new(Arc::new(FileBackend::open(dir.path()).unwrap()));
        assert!(!store.get_all_reports().is_empty());
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.set("citypulse_alerts", "[]", None).unwrap();
        }
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.get("citypulse_alerts").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert!(backend.set("../escape", "x", None).is_err());
        assert!(backend.get("a/b").is_err());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let backend = FileBackend::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(backend.dir(), nested.as_path());
    }
}
