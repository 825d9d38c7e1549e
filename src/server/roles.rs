//! Role endpoints

use crate::auth::permissions::{validate_permissions, Permission, PermissionInput, ValidationErrors};
use crate::auth::roles::{validate_oidc_groups, Role, RoleSpec};
use crate::namespaces::validate_name;
use crate::server::error::ApiError;
use crate::server::middleware::ApiJson;
use crate::server::{data, AppState, Data};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Body of create and update
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub oidc_groups: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Vec<PermissionInput>>,
}

impl RoleRequest {
    fn into_spec(self) -> Result<RoleSpec, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_name(&self.name) {
            errors.add("name", e.to_string());
        }
        if let Err(e) = validate_oidc_groups(self.oidc_groups.as_deref()) {
            errors.merge(e);
        }
        let permissions = validate_permissions(self.permissions.as_deref())
            .map_err(|e| errors.merge(e))
            .ok()
            .flatten();

        errors.into_result()?;

        Ok(RoleSpec {
            name: self.name,
            description: self.description,
            oidc_groups: self.oidc_groups,
            permissions,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    pub name: String,
    pub description: String,
    pub oidc_groups: Option<Vec<String>>,
    pub permissions: Option<Vec<Permission>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Role> for RoleView {
    fn from(role: Role) -> Self {
        Self {
            name: role.name,
            description: role.description,
            oidc_groups: role.oidc_groups,
            permissions: role.permissions,
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Data<Vec<RoleView>>>, ApiError> {
    let roles = state.store.list_roles(&namespace).await?;
    Ok(data(roles.into_iter().map(RoleView::from).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    ApiJson(req): ApiJson<RoleRequest>,
) -> Result<Json<Data<RoleView>>, ApiError> {
    let role = state.store.create_role(&namespace, req.into_spec()?).await?;
    info!(namespace = %namespace, role = %role.name, "Role created");
    Ok(data(role.into()))
}

pub async fn get(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Data<RoleView>>, ApiError> {
    Ok(data(state.store.get_role(&namespace, &name).await?.into()))
}

pub async fn update(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    ApiJson(req): ApiJson<RoleRequest>,
) -> Result<Json<Data<RoleView>>, ApiError> {
    let role = state
        .store
        .update_role(&namespace, &name, req.into_spec()?)
        .await?;
    info!(namespace = %namespace, role = %role.name, "Role updated");
    Ok(data(role.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_role(&namespace, &name).await?;
    info!(namespace = %namespace, role = %name, "Role deleted");
    Ok(StatusCode::OK)
}
