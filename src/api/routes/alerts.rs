//! Alert Routes
//!
//! - GET /api/v1/alerts - All alerts, newest first (public)
//! - POST /api/v1/alerts - Publish an alert (authorities)

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{AlertListResponse, CreateAlertRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::CurrentUser;
use crate::api::state::AppState;
use crate::store::{Alert, NewAlert};

/// GET /api/v1/alerts
pub async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<AlertListResponse> {
    let alerts = state.store.get_all_alerts();
    Json(AlertListResponse {
        total: alerts.len(),
        alerts,
    })
}

/// POST /api/v1/alerts
pub async fn create_alert(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateAlertRequest>,
) -> ApiResult<(StatusCode, Json<Alert>)> {
    if !user.can_publish_alerts() {
        return Err(ApiError::Forbidden("only authorities publish alerts".to_string()));
    }
    if req.title.trim().is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::Validation(
            "title and message must not be empty".to_string(),
        ));
    }

    let alert = state
        .store
        .add_alert(NewAlert::new(&user.id, req.title.trim(), req.message.trim()))?;
    Ok((StatusCode::CREATED, Json(alert)))
}
