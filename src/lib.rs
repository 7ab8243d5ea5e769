//! # CityPulse
//!
//! Citizen engagement backend: citizens submit reports (suggestions and
//! feedback), authorities triage them and broadcast city alerts, and every
//! connected view is told when either collection changes.
//!
//! ## Features
//!
//! - **Record store**: Reports and alerts persisted as whole JSON collections
//!   over a pluggable key-value backend (memory, files, SQLite)
//! - **Change notification**: Synchronous callbacks for local writes, a change
//!   relay for writes by other instances or processes
//! - **Real-time**: WebSocket push of store updates
//! - **City map data**: Overpass proxy, predefined queries, GeoJSON conversion
//!
//! ## Modules
//!
//! - [`store`]: Record store, backends and notifications
//! - [`auth`]: Mock sessions and role capabilities
//! - [`osm`]: OpenStreetMap / Overpass access
//! - [`websocket`]: Live update hub
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use citypulse::store::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = open_backend(BackendKind::File, "./citypulse_data".as_ref(), None)?;
//!     let store = RecordStore::new(backend);
//!
//!     let _updates = store.on_store_update(|event| {
//!         println!("{} changed ({:?})", event.collection, event.origin);
//!     });
//!
//!     store.add_alert(NewAlert::new("authority-1", "Water supply", "Interrupted 10:00-14:00"))?;
//!     println!("{}", store.stats());
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod osm;
pub mod store;
pub mod websocket;

// Re-export top-level types for convenience
pub use store::{
    Alert, BackendKind, ChangeOrigin, Collection, NewAlert, NewReport, RecordStore, Report,
    ReportKind, ReportStatus, StorageBackend, StoreError, StoreEvent, StoreResult, StoreStats,
    Subscription, UpdateOutcome,
};

pub use auth::{AuthError, Session, SessionManager, User, UserRole};

pub use osm::{BoundingBox, CityDataProvider, OsmClient, OsmConfig, OsmError, OverpassQuery};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use websocket::{ClientMessage, ConnectionHub, HubConfig, HubError, ServerMessage, WsEvent};

pub use config::{Config, ConfigError, LoggingConfig};
