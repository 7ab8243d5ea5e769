//! CityPulse Record Store
//!
//! This module provides persistence for citizen reports and city alerts:
//!
//! - **types**: Records (Report, Alert), creation inputs, collections
//! - **backend**: Key-value storage backends (memory, file, SQLite)
//! - **events**: Change notifications and subscriptions
//! - **engine**: The record store orchestrating backend and notifications
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   NewReport → lock writer → read collection → prepend → write blob → notify (Local)
//!
//! Read Path:
//!   get_all_reports → read blob → parse (malformed ⇒ empty)
//!
//! Other instances:
//!   backend change feed / polling → change relay → notify (External)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use citypulse::store::{MemoryBackend, NewReport, RecordStore, ReportKind, ReportStatus};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RecordStore::new(Arc::new(MemoryBackend::new()));
//!
//!     let _subscription = store.on_store_update(|event| {
//!         println!("{} changed", event.collection);
//!     });
//!
//!     let report = store.add_report(
//!         NewReport::new("citizen-1", ReportKind::Suggestion, "More benches", "Along the riverside")
//!             .location("Riverside park"),
//!     )?;
//!
//!     store.update_report_status(&report.id, ReportStatus::InProgress)?;
//!     println!("{} reports", store.get_all_reports().len());
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod engine;
pub mod error;
pub mod events;
pub mod types;

// Re-export commonly used types
pub use backend::{
    open_backend, BackendKind, FileBackend, InstanceId, KeyChange, MemoryBackend, SqliteBackend,
    StorageBackend,
};
pub use engine::{RecordStore, StoreOptions, StoreStats};
pub use error::{StoreError, StoreResult};
pub use events::{ChangeOrigin, Notifier, StoreEvent, Subscription};
pub use types::{
    Alert, Audience, Collection, NewAlert, NewReport, Report, ReportKind, ReportStatus,
    UpdateOutcome, ALERTS_KEY, REPORTS_KEY,
};
