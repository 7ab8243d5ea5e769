//! Overpass QL query builders
//!
//! Ready-made queries for the city data the dashboards display, scoped to a
//! bounding box.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use super::OsmError;

/// Geographic bounding box in Overpass order (south, west, north, east)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Create a validated bounding box
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, OsmError> {
        let bbox = Self {
            south,
            west,
            north,
            east,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    fn validate(&self) -> Result<(), OsmError> {
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);

        if !lat_ok(self.south) || !lat_ok(self.north) {
            return Err(OsmError::InvalidBoundingBox(
                "latitude must be within [-90, 90]".to_string(),
            ));
        }
        if !lon_ok(self.west) || !lon_ok(self.east) {
            return Err(OsmError::InvalidBoundingBox(
                "longitude must be within [-180, 180]".to_string(),
            ));
        }
        if self.south > self.north {
            return Err(OsmError::InvalidBoundingBox(
                "south must not be greater than north".to_string(),
            ));
        }
        if self.west > self.east {
            return Err(OsmError::InvalidBoundingBox(
                "west must not be greater than east".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

impl FromStr for BoundingBox {
    type Err = OsmError;

    /// Parse `south,west,north,east`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| OsmError::InvalidBoundingBox(format!("{}: {}", s, e)))?;

        match parts.as_slice() {
            [south, west, north, east] => Self::new(*south, *west, *north, *east),
            _ => Err(OsmError::InvalidBoundingBox(format!(
                "expected 4 comma-separated numbers, got '{}'",
                s
            ))),
        }
    }
}

/// Predefined city-data queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpassQuery {
    /// Drivable roads
    Roads,
    /// Building outlines
    Buildings,
    /// Traffic signals and signs
    TrafficSignals,
    /// Bus and public transport stops
    PublicTransport,
    /// Closed, blocked or under-construction roads
    RoadClosures,
}

impl OverpassQuery {
    pub fn all() -> &'static [OverpassQuery] {
        &[
            OverpassQuery::Roads,
            OverpassQuery::Buildings,
            OverpassQuery::TrafficSignals,
            OverpassQuery::PublicTransport,
            OverpassQuery::RoadClosures,
        ]
    }

    /// Overpass QL script for the bounding box
    pub fn build(&self, bbox: &BoundingBox) -> String {
        match self {
            OverpassQuery::Roads => format!(
                "[out:json][timeout:25];\n(\n  way[\"highway\"~\"^(motorway|trunk|primary|secondary|tertiary|residential|service)$\"]({bbox});\n);\nout body;\n>;\nout skel qt;"
            ),
            OverpassQuery::Buildings => format!(
                "[out:json][timeout:25];\n(\n  way[\"building\"]({bbox});\n);\nout body;\n>;\nout skel qt;"
            ),
            OverpassQuery::TrafficSignals => format!(
                "[out:json][timeout:25];\n(\n  node[\"highway\"=\"traffic_signals\"]({bbox});\n  node[\"traffic_sign\"]({bbox});\n);\nout body;"
            ),
            OverpassQuery::PublicTransport => format!(
                "[out:json][timeout:25];\n(\n  node[\"public_transport\"]({bbox});\n  node[\"highway\"=\"bus_stop\"]({bbox});\n);\nout body;"
            ),
            OverpassQuery::RoadClosures => format!(
                "[out:json][timeout:25];\n(\n  way[\"highway\"][\"access\"=\"no\"]({bbox});\n  way[\"highway\"][\"construction\"]({bbox});\n  way[\"highway\"][\"barrier\"]({bbox});\n);\nout body;\n>;\nout skel qt;"
            ),
        }
    }
}

impl FromStr for OverpassQuery {
    type Err = OsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "roads" => Ok(OverpassQuery::Roads),
            "buildings" => Ok(OverpassQuery::Buildings),
            "traffic_signals" => Ok(OverpassQuery::TrafficSignals),
            "public_transport" => Ok(OverpassQuery::PublicTransport),
            "road_closures" => Ok(OverpassQuery::RoadClosures),
            _ => Err(OsmError::UnknownQuery(s.to_string())),
        }
    }
}
