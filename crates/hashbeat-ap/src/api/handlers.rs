//! Client status handlers

use axum::{
    extract::{Path, State},
    Json,
};
use hashbeat_core::HashAlgorithm;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;
use crate::registry::{ClientRegistry, ClientSummary};
use crate::storage::KeyStore;

/// Shared state for the status API
#[derive(Debug, Clone)]
pub struct StatusState {
    pub registry: Arc<ClientRegistry>,
    pub store: Arc<dyn KeyStore>,
    pub algorithm: HashAlgorithm,
}

/// Registered clients
#[derive(Debug, Serialize)]
pub struct ClientList {
    pub clients: Vec<ClientSummary>,
    pub count: usize,
}

/// Outcome of an explicit deregistration
#[derive(Debug, Serialize)]
pub struct DeregisterResponse {
    pub id: String,
    pub deregistered: bool,
    pub key_deleted: bool,
}

/// GET /v1/clients
pub async fn list_clients(State(state): State<Arc<StatusState>>) -> Json<ClientList> {
    let clients = state.registry.snapshot();
    Json(ClientList {
        count: clients.len(),
        clients,
    })
}

/// GET /v1/clients/{id}
pub async fn get_client(
    State(state): State<Arc<StatusState>>,
    Path(id): Path<String>,
) -> Result<Json<ClientSummary>, ApiError> {
    state
        .registry
        .summary(&id)
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

/// DELETE /v1/clients/{id}
///
/// Removes the client from the registry and its key from the store. The
/// client must register again before its heartbeats are accepted.
pub async fn deregister_client(
    State(state): State<Arc<StatusState>>,
    Path(id): Path<String>,
) -> Result<Json<DeregisterResponse>, ApiError> {
    let deregistered = state.registry.deregister(&id);
    let key_deleted = state.store.delete(&id).await?;

    if !deregistered && !key_deleted {
        return Err(ApiError::NotFound(id));
    }

    info!(client_id = %id, deregistered, key_deleted, "Client deregistered via API");
    Ok(Json(DeregisterResponse {
        id,
        deregistered,
        key_deleted,
    }))
}
