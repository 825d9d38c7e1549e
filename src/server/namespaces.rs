//! Namespace endpoints

use crate::auth::{visible_namespaces, Principal};
use crate::namespaces::Namespace;
use crate::server::error::ApiError;
use crate::server::middleware::ApiJson;
use crate::server::{data, AppState, Data};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CreateNamespace {
    #[serde(default)]
    pub name: String,
}

/// Namespaces the caller can see, in creation order
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Data<Vec<Namespace>>>, ApiError> {
    let all = state.store.list_namespaces().await?;
    Ok(data(visible_namespaces(&principal, all)))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateNamespace>,
) -> Result<Json<Data<Namespace>>, ApiError> {
    let namespace = state.store.create_namespace(&req.name).await?;
    info!(namespace = %namespace.name, "Namespace created");
    Ok(data(namespace))
}

pub async fn get(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Data<Namespace>>, ApiError> {
    Ok(data(state.store.get_namespace(&namespace).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_namespace(&namespace).await?;
    info!(namespace = %namespace, "Namespace deleted");
    Ok(StatusCode::OK)
}
