//! City Map Data
//!
//! Thin layer over OpenStreetMap services for the map views:
//! - **client**: Overpass proxy and OSM capabilities (`CityDataProvider`)
//! - **queries**: Bounding boxes and predefined Overpass QL queries
//! - **geojson**: Overpass JSON → GeoJSON features
//!
//! Nothing here touches the record store.

mod client;
mod geojson;
mod queries;

pub use client::{CityDataProvider, MapToken, OsmClient, OsmConfig, TileConfig};
pub use geojson::{osm_to_geojson, Feature, FeatureCollection, Geometry, OsmData, OsmElement};
pub use queries::{BoundingBox, OverpassQuery};

use thiserror::Error;

/// Errors from the city data layer
#[derive(Error, Debug)]
pub enum OsmError {
    #[error("City data service unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid response: {0}")]
    Parse(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("Unknown query: {0}. Use roads, buildings, traffic_signals, public_transport, or road_closures")]
    UnknownQuery(String),
}
