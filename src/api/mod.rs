//! CityPulse REST API
//!
//! HTTP API layer for CityPulse, built with Axum. Authenticated routes take
//! `Authorization: Bearer <token>` with a token from `/auth/login`.
//!
//! # Endpoints
//!
//! ## Auth
//! - `POST /api/v1/auth/login` - Mock sign-in
//! - `POST /api/v1/auth/logout` - Sign out
//! - `GET /api/v1/auth/me` - Current user
//!
//! ## Reports
//! - `GET /api/v1/reports` - List (authorities: all, citizens: own)
//! - `POST /api/v1/reports` - Submit (citizens)
//! - `GET /api/v1/reports/:id` - Get one
//! - `PUT /api/v1/reports/:id/status` - Change status (authorities)
//!
//! ## Alerts
//! - `GET /api/v1/alerts` - List
//! - `POST /api/v1/alerts` - Publish (authorities)
//!
//! ## City data
//! - `GET /api/v1/osm?type=tiles|capabilities|overpass`
//! - `POST /api/v1/osm?type=overpass` - Overpass proxy
//! - `GET /api/v1/osm/features?kind=roads&bbox=s,w,n,e` - GeoJSON
//! - `GET /api/v1/mappls/token`
//!
//! ## Misc
//! - `GET /api/v1/stats` - Record counts
//! - `GET /api/v1/ws` - Live store updates
//! - `GET /health/live`, `GET /health/ready`, `GET /health`
//!
//! # Example
//!
//! ```rust,ignore
//! use citypulse::api::{serve, ApiConfig, AppState};
//! use citypulse::auth::SessionManager;
//! use citypulse::osm::{OsmClient, OsmConfig};
//! use citypulse::store::{MemoryBackend, RecordStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(MemoryBackend::new());
//!     let store = Arc::new(RecordStore::new(backend.clone()));
//!     let sessions = Arc::new(SessionManager::new(backend));
//!     let osm = OsmConfig::default();
//!     let city_data = Arc::new(OsmClient::new(osm.clone())?);
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(store, sessions, city_data, osm, config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;

    let api_routes = Router::new()
        // Sessions
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        // Reports
        .route(
            "/reports",
            get(routes::reports::list_reports).post(routes::reports::create_report),
        )
        .route("/reports/:id", get(routes::reports::get_report))
        .route("/reports/:id/status", put(routes::reports::update_status))
        // Alerts
        .route(
            "/alerts",
            get(routes::alerts::list_alerts).post(routes::alerts::create_alert),
        )
        .route("/stats", get(routes::stats::get_stats))
        // City data
        .route(
            "/osm",
            get(routes::osm::osm_info).post(routes::osm::overpass_proxy),
        )
        .route("/osm/features", get(routes::osm::features))
        .route("/mappls/token", get(routes::osm::mappls_token))
        .layer(DefaultBodyLimit::max(body_limit))
        // WebSocket route
        .route("/ws", get(websocket_handler));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server.
///
/// Store events are forwarded to WebSocket subscribers while it runs.
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let forwarding = state
        .ws_hub
        .forward_store_events(state.store.subscribe_channel());
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("CityPulse API listening on {}", addr);

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)));

    forwarding.abort();
    result?;

    tracing::info!("CityPulse API shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
