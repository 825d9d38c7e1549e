//! Gatehouse HTTP server
//!
//! Every route except `/health` sits behind the authorization layer.
//! Routes without a handler are still authorized first, then answered
//! with 404, so a denial never reveals whether something exists.

mod error;
pub mod middleware;
mod namespaces;
mod roles;
mod tokens;

pub use error::{ApiError, ErrorBody};
pub use middleware::{credentials_from_headers, ADMIN_KEY_HEADER, GROUPS_HEADER, TOKEN_HEADER};
pub use roles::RoleView;
pub use tokens::TokenView;

use crate::auth::principal::{AuthConfig, PrincipalResolver};
use crate::auth::tokens::TokenHasher;
use crate::auth::Gatekeeper;
use crate::storage::Store;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

pub(crate) fn data<T>(data: T) -> Json<Data<T>> {
    Json(Data { data })
}

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gate: Gatekeeper,
}

impl AppState {
    pub fn new(auth: AuthConfig, store: Arc<dyn Store>) -> Self {
        let resolver = PrincipalResolver::new(auth, store.clone());
        Self {
            store,
            gate: Gatekeeper::new(resolver),
        }
    }

    pub fn hasher(&self) -> &TokenHasher {
        &self.gate.resolver().config().hasher
    }
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v2/namespaces",
            get(namespaces::list).post(namespaces::create),
        )
        .route(
            "/api/v2/namespaces/{namespace}",
            get(namespaces::get).delete(namespaces::delete),
        )
        .route(
            "/api/v2/namespaces/{namespace}/api_tokens",
            get(tokens::list).post(tokens::create),
        )
        .route(
            "/api/v2/namespaces/{namespace}/api_tokens/{name}",
            get(tokens::get).delete(tokens::delete),
        )
        .route(
            "/api/v2/namespaces/{namespace}/roles",
            get(roles::list).post(roles::create),
        )
        .route(
            "/api/v2/namespaces/{namespace}/roles/{name}",
            get(roles::get).put(roles::update).delete(roles::delete),
        )
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(path_not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authorize,
        ))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn path_not_found() -> ApiError {
    ApiError::path_not_found()
}

async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

/// Server configuration
pub struct GatehouseServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Admin key, admin group and token digest key
    pub auth: AuthConfig,
}

/// The Gatehouse HTTP server
pub struct GatehouseServer {
    bind_addr: SocketAddr,
    state: AppState,
}

impl GatehouseServer {
    pub fn new(config: GatehouseServerConfig, store: Arc<dyn Store>) -> Self {
        Self {
            bind_addr: config.bind_addr,
            state: AppState::new(config.auth, store),
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Serve until `shutdown` completes
    pub async fn run(&self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "Gatehouse server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
