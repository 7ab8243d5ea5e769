//! City Map Routes
//!
//! - GET /api/v1/osm?type=tiles|capabilities|overpass - Map configuration
//! - POST /api/v1/osm?type=overpass - Raw Overpass QL body, JSON answer verbatim
//! - GET /api/v1/osm/features?kind=..&bbox=s,w,n,e - Predefined query as GeoJSON
//! - GET /api/v1/mappls/token - Maps SDK token

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::{CapabilitiesResponse, FeaturesQuery, OsmParams, OverpassInfoResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::osm::{osm_to_geojson, BoundingBox, FeatureCollection, MapToken, OsmData, OverpassQuery};

/// GET /api/v1/osm
///
/// `type` defaults to `tiles`.
pub async fn osm_info(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OsmParams>,
) -> ApiResult<Response> {
    match params.kind.as_deref().unwrap_or("tiles") {
        "tiles" => Ok(Json(state.osm.tile_config()).into_response()),
        "capabilities" => {
            let capabilities = state.city_data.capabilities().await?;
            Ok(Json(CapabilitiesResponse { capabilities }).into_response())
        }
        "overpass" => Ok(Json(OverpassInfoResponse {
            overpass_url: state.osm.overpass_url.clone(),
            note: "Use POST requests with Overpass QL queries to this endpoint".to_string(),
        })
        .into_response()),
        other => Err(ApiError::Validation(format!(
            "Invalid type parameter '{}'. Use: tiles, capabilities, or overpass",
            other
        ))),
    }
}

/// POST /api/v1/osm?type=overpass
pub async fn overpass_proxy(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OsmParams>,
    body: String,
) -> ApiResult<Json<Value>> {
    if params.kind.as_deref() != Some("overpass") {
        return Err(ApiError::Validation(
            "POST requests only supported for overpass queries".to_string(),
        ));
    }
    if body.trim().is_empty() {
        return Err(ApiError::Validation("empty Overpass query".to_string()));
    }

    let data = state.city_data.overpass(&body).await?;
    Ok(Json(data))
}

/// GET /api/v1/osm/features
pub async fn features(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeaturesQuery>,
) -> ApiResult<Json<FeatureCollection>> {
    let query: OverpassQuery = params.kind.parse()?;
    let bbox: BoundingBox = params.bbox.parse()?;

    let raw = state.city_data.overpass(&query.build(&bbox)).await?;
    let data: OsmData = serde_json::from_value(raw)
        .map_err(|e| ApiError::CityData(crate::osm::OsmError::Parse(e.to_string())))?;

    let collection = osm_to_geojson(&data);
    tracing::debug!(kind = ?query, bbox = %bbox, features = collection.features.len(), "City features fetched");
    Ok(Json(collection))
}

/// GET /api/v1/mappls/token
pub async fn mappls_token(State(state): State<Arc<AppState>>) -> Json<MapToken> {
    Json(state.osm.map_token())
}
