//! HTTP handlers for storing and fetching a contract's merkle tree.
//!
//! - `GET /api/merkle/{contractAddress}` → `{ "merkleTree": ... }`
//! - `POST /api/merkle` with `{ contractAddress, merkleTree }`

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::store::{validate_save, ContractDocument, TreeStore};
use crate::tree::{MerkleTree, TreeDump};

#[derive(Clone)]
struct ApiState {
    store: Arc<dyn TreeStore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistRequest {
    contract_address: Option<String>,
    merkle_tree: Option<TreeDump>,
}

/// Builds the router over `store`.
pub fn router(store: Arc<dyn TreeStore>) -> Router {
    Router::new()
        .route("/api/merkle", get(missing_address).post(save_tree))
        .route("/api/merkle/", get(missing_address))
        .route("/api/merkle/:contract_address", get(get_tree))
        .with_state(ApiState { store })
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

async fn missing_address() -> Response {
    message(StatusCode::BAD_REQUEST, "Missing contract address")
}

async fn get_tree(
    State(state): State<ApiState>,
    Path(contract_address): Path<String>,
) -> Response {
    if contract_address.trim().is_empty() {
        return missing_address().await;
    }

    let store = state.store.clone();
    let identifier = contract_address.clone();
    match tokio::task::spawn_blocking(move || store.load(&identifier)).await {
        Ok(Ok(merkle_tree)) => {
            debug!(contract = %contract_address, "Served merkle tree");
            (StatusCode::OK, Json(ContractDocument { merkle_tree })).into_response()
        }
        Ok(Err(StoreError::NotFound(_))) => message(StatusCode::NOT_FOUND, "Contract not found"),
        Ok(Err(StoreError::MissingIdentifier)) => missing_address().await,
        Ok(Err(e)) => {
            error!(contract = %contract_address, error = %e, "Failed to load merkle tree");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        Err(e) => {
            error!(contract = %contract_address, error = %e, "Load task failed");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

async fn save_tree(State(state): State<ApiState>, body: Bytes) -> Response {
    let request: PersistRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected request body");
            return (StatusCode::BAD_REQUEST, "Invalid request body").into_response();
        }
    };

    let (identifier, tree) = match validate_save(
        request.contract_address.as_deref(),
        request.merkle_tree.as_ref(),
    ) {
        Ok((identifier, tree)) => (identifier.to_string(), tree.clone()),
        Err(_) => return (StatusCode::BAD_REQUEST, "Missing required fields").into_response(),
    };
    if let Err(e) = MerkleTree::from_dump(&tree) {
        debug!(contract = %identifier, error = %e, "Rejected merkle tree");
        return (StatusCode::BAD_REQUEST, "Invalid merkle tree").into_response();
    }

    let store = state.store.clone();
    let id = identifier.clone();
    match tokio::task::spawn_blocking(move || store.save(&id, &tree)).await {
        Ok(Ok(())) => {
            info!(contract = %identifier, "Merkle tree saved");
            (StatusCode::OK, "Merkle tree saved").into_response()
        }
        Ok(Err(e)) => {
            error!(contract = %identifier, error = %e, "Failed to save merkle tree");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
        Err(e) => {
            error!(contract = %identifier, error = %e, "Save task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
