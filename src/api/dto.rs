//! Data Transfer Objects
//!
//! Request and response types for the API endpoints. Records themselves
//! (`Report`, `Alert`, `User`) are returned in their stored JSON shape.

use serde::{Deserialize, Serialize};

use crate::auth::{User, UserRole};
use crate::store::{Alert, Report, ReportKind};

// ============================================
// AUTH DTOs
// ============================================

/// Mock sign-in request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// `citizen` or `authority`
    #[serde(rename = "type", alias = "role")]
    pub role: UserRole,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

// ============================================
// REPORT DTOs
// ============================================

/// New report from the signed-in citizen
#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    /// `Suggestion` or `Feedback`
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Filters for listing reports (authorities only)
#[derive(Debug, Default, Deserialize)]
pub struct ReportListQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    /// `Pending`, `In Progress` / `in_progress`, or `Resolved`
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportListResponse {
    pub total: usize,
    pub reports: Vec<Report>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// ============================================
// ALERT DTOs
// ============================================

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertListResponse {
    pub total: usize,
    pub alerts: Vec<Alert>,
}

// ============================================
// CITY DATA DTOs
// ============================================

/// `?type=` selector of `/osm`
#[derive(Debug, Default, Deserialize)]
pub struct OsmParams {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// `GET /osm?type=capabilities`
#[derive(Debug, Serialize)]
pub struct CapabilitiesResponse {
    pub capabilities: String,
}

/// `GET /osm?type=overpass`
#[derive(Debug, Serialize)]
pub struct OverpassInfoResponse {
    pub overpass_url: String,
    pub note: String,
}

/// `GET /osm/features`
#[derive(Debug, Deserialize)]
pub struct FeaturesQuery {
    /// One of the predefined queries, e.g. `traffic_signals`
    pub kind: String,
    /// `south,west,north,east`
    pub bbox: String,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,
    /// "ok" or "error"
    pub store: String,
    pub backend: String,
    pub ws_connections: usize,
    pub sessions: usize,
    pub uptime_seconds: u64,
    pub version: String,
}
