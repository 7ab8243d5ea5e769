//! GET /api/v1/stats - Record counts by status

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::extract::CurrentUser;
use crate::api::state::AppState;
use crate::store::StoreStats;

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
) -> Json<StoreStats> {
    Json(state.store.stats())
}
