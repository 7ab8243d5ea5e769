//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::SessionManager;
use crate::osm::{CityDataProvider, OsmConfig};
use crate::store::RecordStore;
use crate::websocket::{ConnectionHub, HubConfig};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Reports and alerts
    pub store: Arc<RecordStore>,
    /// Signed-in users
    pub sessions: Arc<SessionManager>,
    /// Overpass / OSM access
    pub city_data: Arc<dyn CityDataProvider>,
    /// Map endpoints configuration (tiles, tokens)
    pub osm: Arc<OsmConfig>,
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// WebSocket connection hub for live store updates
    pub ws_hub: Arc<ConnectionHub>,
}

impl AppState {
    pub fn new(
        store: Arc<RecordStore>,
        sessions: Arc<SessionManager>,
        city_data: Arc<dyn CityDataProvider>,
        osm: OsmConfig,
        config: ApiConfig,
    ) -> Self {
        let hub_config = HubConfig {
            max_connections: config.max_ws_connections,
        };

        Self {
            store,
            sessions,
            city_data,
            osm: Arc::new(osm),
            config: Arc::new(config),
            start_time: Instant::now(),
            ws_hub: Arc::new(ConnectionHub::new(hub_config)),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn ws_connection_count(&self) -> usize {
        self.ws_hub.connection_count().await
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Maximum concurrent WebSocket connections
    pub max_ws_connections: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 1024 * 1024, // 1MB
            max_ws_connections: 1000,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
