//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api;
use crate::osm::OsmConfig;
use crate::store::{BackendKind, StoreOptions};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub osm: OsmSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Poll the backend for writes of other processes; 0 disables polling
    #[serde(default = "default_watch_interval")]
    pub watch_interval_ms: u64,

    /// Byte quota of the memory backend
    #[serde(default)]
    pub quota_bytes: Option<usize>,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_backend() -> BackendKind {
    BackendKind::File
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("citypulse").to_string_lossy().to_string())
        .unwrap_or_else(|| "./citypulse_data".to_string())
}

fn default_watch_interval() -> u64 {
    1000
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
            watch_interval_ms: default_watch_interval(),
            quota_bytes: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl StoreConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Polling period of the change relay, `None` when disabled
    pub fn watch_interval(&self) -> Option<Duration> {
        (self.watch_interval_ms > 0).then(|| Duration::from_millis(self.watch_interval_ms))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            event_capacity: self.event_capacity,
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    #[serde(default = "default_max_ws_connections")]
    pub max_ws_connections: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_max_ws_connections() -> usize {
    1000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
            max_ws_connections: default_max_ws_connections(),
        }
    }
}

impl ApiConfig {
    pub fn to_server_config(&self) -> api::ApiConfig {
        api::ApiConfig {
            host: self.host.clone(),
            port: self.port,
            max_body_size: self.max_body_size,
            max_ws_connections: self.max_ws_connections,
        }
    }
}

/// OpenStreetMap and maps SDK settings
#[derive(Debug, Clone, Deserialize)]
pub struct OsmSettings {
    #[serde(default = "default_overpass_url")]
    pub overpass_url: String,

    #[serde(default = "default_capabilities_url")]
    pub capabilities_url: String,

    #[serde(default = "default_tile_url")]
    pub tile_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub mappls_key: Option<String>,
}

fn default_overpass_url() -> String {
    OsmConfig::default().overpass_url
}

fn default_capabilities_url() -> String {
    OsmConfig::default().capabilities_url
}

fn default_tile_url() -> String {
    OsmConfig::default().tile_url
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for OsmSettings {
    fn default() -> Self {
        Self {
            overpass_url: default_overpass_url(),
            capabilities_url: default_capabilities_url(),
            tile_url: default_tile_url(),
            request_timeout_ms: default_request_timeout(),
            max_retries: default_max_retries(),
            mappls_key: None,
        }
    }
}

impl OsmSettings {
    pub fn to_osm_config(&self) -> OsmConfig {
        OsmConfig {
            overpass_url: self.overpass_url.clone(),
            capabilities_url: self.capabilities_url.clone(),
            tile_url: self.tile_url.clone(),
            request_timeout_ms: self.request_timeout_ms,
            max_retries: self.max_retries,
            mappls_key: self.mappls_key.clone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("citypulse").join("config.toml")),
            Some(PathBuf::from("/etc/citypulse/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Store overrides
        if let Some(backend) = var("CITYPULSE_BACKEND") {
            match backend.parse() {
                Ok(kind) => self.store.backend = kind,
                Err(e) => tracing::warn!("Ignoring CITYPULSE_BACKEND: {}", e),
            }
        }
        if let Some(data_dir) = var("CITYPULSE_DATA_DIR") {
            self.store.data_dir = data_dir;
        }

        // API overrides
        if let Some(host) = var("CITYPULSE_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("CITYPULSE_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // City data overrides
        if let Some(url) = var("CITYPULSE_OVERPASS_URL") {
            self.osm.overpass_url = url;
        }
        if let Some(key) = var("MAPPLS_MAP_KEY").filter(|k| !k.is_empty()) {
            self.osm.mappls_key = Some(key);
        }

        // Logging overrides
        if let Some(level) = var("CITYPULSE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("CITYPULSE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# CityPulse Configuration
#
# Environment variables override these settings:
# - CITYPULSE_BACKEND
# - CITYPULSE_DATA_DIR
# - CITYPULSE_API_HOST
# - CITYPULSE_API_PORT
# - CITYPULSE_OVERPASS_URL
# - MAPPLS_MAP_KEY
# - CITYPULSE_LOG_LEVEL
# - CITYPULSE_LOG_FORMAT

[store]
# Storage backend: memory, file, or sqlite
backend = "file"

# Directory for citypulse_*.json files or citypulse.db
data_dir = "~/.local/share/citypulse"

# How often to check for writes by other processes (ms, 0 = never)
watch_interval_ms = 1000

# Byte quota for the memory backend
# quota_bytes = 5242880

# Buffered store events per subscriber channel
event_capacity = 1024

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8080

# Maximum request body size (bytes)
max_body_size = 1048576

# Maximum concurrent WebSocket connections
max_ws_connections = 1000

[osm]
# Overpass interpreter endpoint
overpass_url = "https://overpass-api.de/api/interpreter"

# OSM API capabilities endpoint
capabilities_url = "https://api.openstreetmap.org/api/0.6/capabilities"

# Tile URL template for map clients
tile_url = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"

# Upstream request timeout (ms)
request_timeout_ms = 30000

# Attempts when Overpass rate-limits
max_retries = 3

# Maps SDK key (a mock token is served when unset)
# mappls_key = ""

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.backend, BackendKind::File);
        assert_eq!(config.store.watch_interval(), Some(Duration::from_millis(1000)));
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.logging.format, "pretty");
        assert!(config.osm.mappls_key.is_none());
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.store.backend, BackendKind::File);
        assert_eq!(config.store.data_dir, "~/.local/share/citypulse");
        assert_eq!(config.api.max_ws_connections, 1000);
        assert_eq!(
            config.osm.overpass_url,
            "https://overpass-api.de/api/interpreter"
        );
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [store]
            backend = "sqlite"
            watch_interval_ms = 0

            [osm]
            mappls_key = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, BackendKind::Sqlite);
        assert_eq!(config.store.watch_interval(), None);
        assert_eq!(config.store.event_capacity, 1024);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.osm.to_osm_config().map_token().access_token, "abc");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CITYPULSE_BACKEND", "memory"),
            ("CITYPULSE_API_PORT", "9000"),
            ("CITYPULSE_OVERPASS_URL", "http://localhost:12345/api/interpreter"),
            ("MAPPLS_MAP_KEY", "key-1"),
            ("CITYPULSE_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.store.backend, BackendKind::Memory);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.osm.overpass_url, "http://localhost:12345/api/interpreter");
        assert_eq!(config.osm.mappls_key.as_deref(), Some("key-1"));
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            "CITYPULSE_BACKEND" => Some("redis".to_string()),
            "CITYPULSE_API_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(config.store.backend, BackendKind::File);
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/citypulse.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
