//! Record store error types
//!
//! Defines all errors that can occur in the store and its backends.

use thiserror::Error;

/// Errors that can occur in the record store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The backend refused the write because it would exceed its quota
    #[error("Quota exceeded writing '{key}': {required} bytes needed, quota is {quota}")]
    QuotaExceeded {
        key: String,
        required: usize,
        quota: usize,
    },

    /// The backend cannot be reached at all
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// SQLite backend error
    #[error("SQLite error: {0}")]
    Sqlite(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err.to_string())
    }
}

impl StoreError {
    /// Lock poisoning is reported with the name of the guarded state
    pub(crate) fn poisoned(what: &str) -> Self {
        StoreError::Lock(format!("{} lock poisoned", what))
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::QuotaExceeded {
            key: "citypulse_reports".to_string(),
            required: 120,
            quota: 100,
        };
        assert_eq!(
            err.to_string(),
            "Quota exceeded writing 'citypulse_reports': 120 bytes needed, quota is 100"
        );

        let err = StoreError::Unavailable("backend offline".to_string());
        assert_eq!(err.to_string(), "Storage unavailable: backend offline");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<Vec<u32>>("not json").unwrap_err();
        let store_err: StoreError = json_err.into();
        assert!(matches!(store_err, StoreError::Serialization(_)));
    }
}
