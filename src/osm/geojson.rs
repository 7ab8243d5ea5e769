//! Overpass JSON to GeoJSON conversion
//!
//! Nodes become `Point` features. Ways become `LineString` features whose
//! coordinates are resolved from the nodes present in the same response;
//! `>; out skel qt;` queries include them. Relations are skipped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Overpass `[out:json]` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsmData {
    #[serde(default)]
    pub elements: Vec<OsmElement>,
}

/// One element of an Overpass response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OsmElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<RelationMember>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    /// Element types this module does not render (areas, derived counts)
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationMember {
    #[serde(rename = "type")]
    pub member_type: String,
    #[serde(rename = "ref")]
    pub reference: i64,
    #[serde(default)]
    pub role: String,
}

/// GeoJSON geometry subset produced here
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: &'static str,
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: &'static str,
    pub features: Vec<Feature>,
}

fn properties(id: i64, kind: &str, tags: &HashMap<String, String>) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("id".to_string(), Value::from(id));
    props.insert("type".to_string(), Value::from(kind));
    for (k, v) in tags {
        // Element identity wins over a tag of the same name
        props
            .entry(k.clone())
            .or_insert_with(|| Value::from(v.clone()));
    }
    props
}

/// Convert an Overpass response to a GeoJSON feature collection
pub fn osm_to_geojson(data: &OsmData) -> FeatureCollection {
    let positions: HashMap<i64, [f64; 2]> = data
        .elements
        .iter()
        .filter_map(|e| match e {
            OsmElement::Node { id, lat, lon, .. } => Some((*id, [*lon, *lat])),
            _ => None,
        })
        .collect();

    let features = data
        .elements
        .iter()
        .filter_map(|element| match element {
            OsmElement::Node { id, lat, lon, tags } => Some(Feature {
                feature_type: "Feature",
                geometry: Geometry::Point {
                    coordinates: [*lon, *lat],
                },
                properties: properties(*id, "node", tags),
            }),
            OsmElement::Way { id, nodes, tags } => Some(Feature {
                feature_type: "Feature",
                geometry: Geometry::LineString {
                    coordinates: nodes
                        .iter()
                        .filter_map(|n| positions.get(n).copied())
                        .collect(),
                },
                properties: properties(*id, "way", tags),
            }),
            OsmElement::Relation { .. } | OsmElement::Other => None,
        })
        .collect();

    FeatureCollection {
        collection_type: "FeatureCollection",
        features,
    }
}
