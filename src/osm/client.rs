//! OpenStreetMap / Overpass HTTP client
//!
//! Forwards Overpass QL queries and returns the JSON answer verbatim.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::OsmError;

/// City data source consumed by the API
#[async_trait]
pub trait CityDataProvider: Send + Sync {
    /// OSM API capabilities document (XML)
    async fn capabilities(&self) -> Result<String, OsmError>;

    /// Run an Overpass QL query and return its JSON response
    async fn overpass(&self, query: &str) -> Result<Value, OsmError>;
}

/// Configuration for the OSM client and the map endpoints
#[derive(Debug, Clone)]
pub struct OsmConfig {
    /// Overpass interpreter endpoint
    pub overpass_url: String,
    /// OSM API capabilities endpoint
    pub capabilities_url: String,
    /// Tile URL template handed to map clients
    pub tile_url: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum attempts when Overpass answers 429
    pub max_retries: u32,
    /// Key for the commercial maps SDK, if configured
    pub mappls_key: Option<String>,
}

impl Default for OsmConfig {
    fn default() -> Self {
        Self {
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            capabilities_url: "https://api.openstreetmap.org/api/0.6/capabilities".to_string(),
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            request_timeout_ms: 30_000,
            max_retries: 3,
            mappls_key: None,
        }
    }
}

impl OsmConfig {
    /// Tile configuration for map clients
    pub fn tile_config(&self) -> TileConfig {
        TileConfig {
            tile_url: self.tile_url.clone(),
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors".to_string(),
            max_zoom: 19,
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        }
    }

    /// Access token for the maps SDK. Falls back to a mock token.
    pub fn map_token(&self) -> MapToken {
        MapToken {
            access_token: self
                .mappls_key
                .clone()
                .unwrap_or_else(|| "mock_token".to_string()),
            expires_in: 3600,
            token_type: "Bearer".to_string(),
        }
    }
}

/// Tile layer settings
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TileConfig {
    #[serde(rename = "tile_url")]
    pub tile_url: String,
    pub attribution: String,
    pub max_zoom: u8,
    pub subdomains: Vec<String>,
}

/// Maps SDK token
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MapToken {
    pub access_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

/// reqwest-backed [`CityDataProvider`]
pub struct OsmClient {
    client: Client,
    config: OsmConfig,
}

impl OsmClient {
    /// Create a client with the given configuration
    pub fn new(config: OsmConfig) -> Result<Self, OsmError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("citypulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OsmConfig {
        &self.config
    }
}

fn classify(e: reqwest::Error) -> OsmError {
    if e.is_timeout() {
        OsmError::Timeout
    } else if e.is_connect() {
        OsmError::Unavailable
    } else {
        OsmError::Request(e)
    }
}

#[async_trait]
impl CityDataProvider for OsmClient {
    async fn capabilities(&self) -> Result<String, OsmError> {
        let response = self
            .client
            .get(&self.config.capabilities_url)
            .header("Content-Type", "application/xml")
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(OsmError::Upstream {
                status: status.as_u16(),
                message: text,
            });
        }

        response.text().await.map_err(classify)
    }

    async fn overpass(&self, query: &str) -> Result<Value, OsmError> {
        let body = format!("data={}", urlencoding::encode(query));
        let mut last_error = OsmError::Unavailable;

        for attempt in 0..self.config.max_retries.max(1) {
            if attempt > 0 {
                // Backoff: 1s, 4s, 9s...
                let delay = Duration::from_secs((attempt as u64).pow(2));
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(&self.config.overpass_url)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.clone())
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    last_error = classify(e);
                    tracing::debug!(attempt, error = %last_error, "Overpass request failed");
                    continue;
                }
            };

            match response.status() {
                status if status.is_success() => {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| OsmError::Parse(e.to_string()));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    tracing::warn!(attempt, "Overpass rate limited");
                    last_error = OsmError::RateLimited;
                }
                status => {
                    let text = response.text().await.unwrap_or_default();
                    return Err(OsmError::Upstream {
                        status: status.as_u16(),
                        message: text,
                    });
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OsmConfig::default();
        assert_eq!(config.overpass_url, "https://overpass-api.de/api/interpreter");
        assert_eq!(config.max_retries, 3);
        assert!(config.mappls_key.is_none());
    }

    #[test]
    fn test_tile_config_shape() {
        let json = serde_json::to_value(OsmConfig::default().tile_config()).unwrap();
        assert_eq!(json["tile_url"], "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png");
        assert_eq!(json["maxZoom"], 19);
        assert_eq!(json["subdomains"], serde_json::json!(["a", "b", "c"]));
    }

    #[test]
    fn test_map_token_fallback() {
        let mut config = OsmConfig::default();
        assert_eq!(config.map_token().access_token, "mock_token");

        config.mappls_key = Some("real-key".to_string());
        let token = config.map_token();
        assert_eq!(token.access_token, "real-key");
        assert_eq!(token.expires_in, 3600);
        assert_eq!(token.token_type, "Bearer");
    }

    #[test]
    fn test_client_creation() {
        let client = OsmClient::new(OsmConfig::default()).unwrap();
        assert_eq!(client.config().request_timeout_ms, 30_000);
    }

    #[tokio::test]
    async fn test_unreachable_overpass() {
        let config = OsmConfig {
            overpass_url: "http://127.0.0.1:9/api/interpreter".to_string(),
            request_timeout_ms: 500,
            max_retries: 1,
            ..Default::default()
        };
        let client = OsmClient::new(config).unwrap();
        assert!(client.overpass("[out:json];node(1);out;").await.is_err());
    }
}
