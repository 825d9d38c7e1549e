//! Authorization layer and request extractors
//!
//! Credentials are resolved before the method is looked at, so anonymous
//! and unauthenticated callers get the same 403/401 for every method.
//! Only an identified caller learns that a method is unsupported (405).

use crate::auth::permissions::Verb;
use crate::auth::principal::{Credentials, Principal};
use crate::auth::Verdict;
use crate::server::error::ApiError;
use crate::server::AppState;
use axum::extract::{FromRequest, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde::de::DeserializeOwned;
use tracing::debug;

pub const ADMIN_KEY_HEADER: &str = "x-api-key";
pub const TOKEN_HEADER: &str = "x-api-token";
pub const GROUPS_HEADER: &str = "x-oidc-groups";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Collect credentials from request headers. Unreadable or blank headers
/// count as absent.
pub fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    let mut credentials = Credentials::anonymous();
    if let Some(key) = header(headers, ADMIN_KEY_HEADER) {
        credentials = credentials.with_admin_key(key);
    }
    if let Some(secret) = header(headers, TOKEN_HEADER) {
        credentials = credentials.with_token(secret);
    }
    if let Some(groups) = header(headers, GROUPS_HEADER) {
        credentials = credentials.with_groups(groups);
    }
    credentials
}

/// Resolve the caller and decide before any handler runs. On `Allow` the
/// principal is stored in the request extensions.
pub async fn authorize(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = credentials_from_headers(req.headers());

    let Ok(verb) = req.method().as_str().parse::<Verb>() else {
        return Err(match state.gate.principal(&credentials).await {
            Err(e) => ApiError::internal(&e),
            Ok(None) => ApiError::unauthenticated(),
            Ok(Some(Principal::Anonymous)) => ApiError::forbidden(),
            Ok(Some(_)) => ApiError::method_not_allowed(),
        });
    };

    let path = req.uri().path().to_string();

    match state.gate.check_path(&credentials, verb, &path).await {
        Ok(Verdict::Allow(principal)) => {
            debug!(principal = %principal, method = %verb, path = %path, "Access allowed");
            req.extensions_mut().insert(principal);
            Ok(next.run(req).await)
        }
        Ok(Verdict::Deny) => Err(ApiError::forbidden()),
        Ok(Verdict::Unauthenticated) => Err(ApiError::unauthenticated()),
        Err(e) => Err(ApiError::internal(&e)),
    }
}

/// JSON body extractor answering in the API error format
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}
