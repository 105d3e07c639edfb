//! Read-only status API for the access point
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with client count
//! - `GET /v1/clients` - List registered clients
//! - `GET /v1/clients/{id}` - One client's chain position and idle time
//! - `DELETE /v1/clients/{id}` - Explicit deregistration

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use handlers::StatusState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub hash_algorithm: String,
    pub client_count: usize,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// GET /ready
pub async fn ready(State(state): State<Arc<StatusState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: true,
        hash_algorithm: state.algorithm.identifier().to_string(),
        client_count: state.registry.len(),
    })
}

/// Create the status router
pub fn create_router(state: Arc<StatusState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/v1/clients", get(handlers::list_clients))
        .route(
            "/v1/clients/{id}",
            get(handlers::get_client).delete(handlers::deregister_client),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
