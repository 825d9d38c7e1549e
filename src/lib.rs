//! Gatehouse - namespace-scoped authorization for API tokens and OIDC roles
//!
//! Callers present an admin key, an API token or a set of OIDC groups. The
//! credentials resolve to a principal, and every `(namespace, method, topic)`
//! request is allowed or denied against that principal's grants.

pub mod auth;
pub mod config;
pub mod namespaces;
pub mod server;
pub mod storage;

pub use auth::{
    authorize, AccessRequest, AdminKey, AuthConfig, Credentials, Decision, Gatekeeper, Method,
    Permission, PermissionSet, Principal, PrincipalResolver, Topic, Verb, Verdict,
};
pub use namespaces::Namespace;
pub use server::{create_router, AppState, GatehouseServer};
pub use storage::{MemoryStore, Store};
