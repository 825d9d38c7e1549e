//! API token endpoints
//!
//! The plaintext secret appears only in the create response. Every other
//! response uses [`TokenView`], which carries neither secret nor digest.

use crate::auth::permissions::{validate_permissions, Permission, PermissionInput, ValidationErrors};
use crate::auth::tokens::{ApiToken, NewApiToken, TokenSecret};
use crate::auth::IsoDuration;
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

#[derive(Debug, Deserialize)]
pub struct CreateToken {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Option<Vec<PermissionInput>>,
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenView {
    pub name: String,
    pub description: String,
    pub prefix: String,
    pub permissions: Option<Vec<Permission>>,
    pub expired_at: DateTime<Utc>,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TokenView {
    pub fn at(token: ApiToken, now: DateTime<Utc>) -> Self {
        Self {
            is_expired: token.is_expired_at(now),
            name: token.name,
            description: token.description,
            prefix: token.prefix,
            permissions: token.permissions,
            expired_at: token.expires_at,
            created_at: token.created_at,
            updated_at: token.updated_at,
        }
    }
}

impl From<ApiToken> for TokenView {
    fn from(token: ApiToken) -> Self {
        Self::at(token, Utc::now())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedToken {
    pub api_token: TokenView,
    pub secret: String,
}

/// Validate the request and turn it into a storable token
fn prepare(
    req: CreateToken,
    secret: &TokenSecret,
    state: &AppState,
    now: DateTime<Utc>,
) -> Result<NewApiToken, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e.to_string());
    }

    let permissions = validate_permissions(req.permissions.as_deref())
        .map_err(|e| errors.merge(e))
        .ok()
        .flatten();

    let expires_at = IsoDuration::parse(&req.duration)
        .and_then(|d| d.to_time_delta())
        .map_err(|e| e.to_string())
        .and_then(|delta| {
            now.checked_add_signed(delta)
                .ok_or_else(|| "duration out of range".to_string())
        })
        .map_err(|message| errors.add("duration", format!("invalid iso8601 duration: {}", message)));

    let (Ok(expires_at), true) = (expires_at, errors.is_empty()) else {
        return Err(errors);
    };

    Ok(NewApiToken {
        name: req.name,
        description: req.description,
        digest: state.hasher().digest(secret),
        permissions,
        expires_at,
    })
}

pub async fn list(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Data<Vec<TokenView>>>, ApiError> {
    let now = Utc::now();
    let tokens = state.store.list_tokens(&namespace).await?;
    Ok(data(tokens.into_iter().map(|t| TokenView::at(t, now)).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    ApiJson(req): ApiJson<CreateToken>,
) -> Result<Json<Data<CreatedToken>>, ApiError> {
    let secret = TokenSecret::generate();
    let token = prepare(req, &secret, &state, Utc::now())?;

    let created = state.store.create_token(&namespace, token).await?;
    info!(namespace = %namespace, token = %created.name, prefix = %created.prefix, "API token created");

    Ok(data(CreatedToken {
        api_token: created.into(),
        secret: secret.expose().to_string(),
    }))
}

pub async fn get(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Data<TokenView>>, ApiError> {
    let token = state.store.get_token(&namespace, &name).await?;
    Ok(data(token.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_token(&namespace, &name).await?;
    info!(namespace = %namespace, token = %name, "API token deleted");
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::TokenDigest;

    #[test]
    fn test_view_hides_digest() {
        let now = Utc::now();
        let token = ApiToken {
            namespace: "p1".into(),
            name: "t".into(),
            description: String::new(),
            digest: TokenDigest::from_encoded("super-secret-digest"),
            prefix: "super-se".into(),
            permissions: None,
            expires_at: now,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(TokenView::at(token, now)).unwrap();
        assert!(!json.to_string().contains("super-secret-digest"));
        assert_eq!(json["isExpired"], true);
        assert_eq!(json["permissions"], serde_json::Value::Null);
        assert!(json.get("expiredAt").is_some());
    }
}
