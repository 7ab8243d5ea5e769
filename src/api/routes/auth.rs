//! Session Routes
//!
//! - POST /api/v1/auth/login - Mock sign-in, returns a bearer token
//! - POST /api/v1/auth/logout - Revoke the current token
//! - GET /api/v1/auth/me - Current user

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{LoginRequest, LoginResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{BearerToken, CurrentUser};
use crate::api::state::AppState;
use crate::auth::User;

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let session = state.sessions.login(&req.email, &req.password, req.role)?;

    Ok(Json(LoginResponse {
        token: session.token,
        user: session.user,
    }))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> ApiResult<StatusCode> {
    if state.sessions.logout(&token)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Unauthorized("unknown or expired session".to_string()))
    }
}

/// GET /api/v1/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
