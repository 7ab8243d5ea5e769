//! Report Routes
//!
//! - GET /api/v1/reports - Authorities: all reports (filterable); citizens: their own
//! - POST /api/v1/reports - Submit a report (citizens)
//! - GET /api/v1/reports/:id - One report
//! - PUT /api/v1/reports/:id/status - Change status (authorities)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CreateReportRequest, ReportListQuery, ReportListResponse, UpdateStatusRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::CurrentUser;
use crate::api::state::AppState;
use crate::store::{NewReport, Report, ReportStatus, UpdateOutcome};

fn parse_status(raw: &str) -> ApiResult<ReportStatus> {
    raw.parse::<ReportStatus>().map_err(ApiError::Validation)
}

/// GET /api/v1/reports
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ReportListQuery>,
) -> ApiResult<Json<ReportListResponse>> {
    let status = params.status.as_deref().map(parse_status).transpose()?;

    let mut reports = if user.can_update_status() {
        match &params.user_id {
            Some(user_id) => state.store.get_reports_by_user(user_id),
            None => state.store.get_all_reports(),
        }
    } else {
        state.store.get_reports_by_user(&user.id)
    };

    if let Some(status) = status {
        reports.retain(|r| r.status == status);
    }

    Ok(Json(ReportListResponse {
        total: reports.len(),
        reports,
    }))
}

/// POST /api/v1/reports
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    if !user.can_submit_reports() {
        return Err(ApiError::Forbidden("only citizens submit reports".to_string()));
    }
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".to_string()));
    }
    if req.description.trim().is_empty() {
        return Err(ApiError::Validation("description must not be empty".to_string()));
    }

    let mut new_report = NewReport::new(&user.id, req.kind, req.title.trim(), req.description.trim());
    if let Some(location) = req.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        new_report = new_report.location(location);
    }

    let report = state.store.add_report(new_report)?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/v1/reports/:id
///
/// Citizens get 404 for reports of other users.
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Report>> {
    state
        .store
        .get_report(&id)
        .filter(|r| user.can_view_report_of(&r.user_id))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Report {} not found", id)))
}

/// PUT /api/v1/reports/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Report>> {
    if !user.can_update_status() {
        return Err(ApiError::Forbidden(
            "only authorities change report status".to_string(),
        ));
    }
    let status = parse_status(&req.status)?;

    match state.store.update_report_status(&id, status)? {
        UpdateOutcome::Updated(report) => Ok(Json(report)),
        UpdateOutcome::NotFound => Err(ApiError::NotFound(format!("Report {} not found", id))),
    }
}
