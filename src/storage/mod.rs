//! Storage backends for Gatehouse
//!
//! - Memory: process-local store for development and tests
//! - Postgres: durable storage for namespaces, tokens and roles
//!
//! Both guarantee read-your-write for the creating caller. Deleting a
//! namespace deletes every token and role it owns.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresStore};

use crate::auth::permissions::ValidationErrors;
use crate::auth::roles::{Role, RoleSpec};
use crate::auth::tokens::{ApiToken, NewApiToken, TokenDigest};
use crate::namespaces::Namespace;
pub use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<ValidationErrors> for StorageError {
    fn from(errors: ValidationErrors) -> Self {
        StorageError::Validation(errors)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Namespace storage
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    /// Create a namespace; `Conflict` if the name is taken
    async fn create_namespace(&self, name: &str) -> StorageResult<Namespace>;

    async fn get_namespace(&self, name: &str) -> StorageResult<Namespace>;

    /// All namespaces in creation order
    async fn list_namespaces(&self) -> StorageResult<Vec<Namespace>>;

    /// Delete a namespace and everything it owns
    async fn delete_namespace(&self, name: &str) -> StorageResult<()>;
}

/// API token storage
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create_token(&self, namespace: &str, token: NewApiToken) -> StorageResult<ApiToken>;

    async fn get_token(&self, namespace: &str, name: &str) -> StorageResult<ApiToken>;

    /// Tokens of one namespace in creation order
    async fn list_tokens(&self, namespace: &str) -> StorageResult<Vec<ApiToken>>;

    async fn delete_token(&self, namespace: &str, name: &str) -> StorageResult<()>;

    /// Look up a token by secret digest. Expired tokens are returned as
    /// well; the caller decides what expiry means.
    async fn find_token_by_digest(&self, digest: &TokenDigest) -> StorageResult<Option<ApiToken>>;
}

/// Role storage
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn create_role(&self, namespace: &str, role: RoleSpec) -> StorageResult<Role>;

    async fn get_role(&self, namespace: &str, name: &str) -> StorageResult<Role>;

    /// Roles of one namespace in creation order
    async fn list_roles(&self, namespace: &str) -> StorageResult<Vec<Role>>;

    /// Replace a role's fields. Renaming onto an existing role is a `Conflict`.
    async fn update_role(&self, namespace: &str, name: &str, role: RoleSpec)
        -> StorageResult<Role>;

    async fn delete_role(&self, namespace: &str, name: &str) -> StorageResult<()>;

    /// Roles in any namespace sharing at least one group with `groups`
    async fn find_roles_by_groups(&self, groups: &BTreeSet<String>) -> StorageResult<Vec<Role>>;
}

/// Everything the server needs from a backend
pub trait Store: NamespaceStore + TokenStore + RoleStore {}

impl<T: NamespaceStore + TokenStore + RoleStore> Store for T {}

/// Shared validation for token input
pub(crate) fn validate_new_token(token: &NewApiToken) -> StorageResult<()> {
    let mut errors = ValidationErrors::new();
    if let Err(e) = crate::namespaces::validate_name(&token.name) {
        errors.add("name", e.to_string());
    }
    if token.digest.as_str().is_empty() {
        errors.add("digest", "is required");
    }
    errors.into_result().map_err(StorageError::from)
}

/// Shared validation for role input
pub(crate) fn validate_role_spec(role: &RoleSpec) -> StorageResult<()> {
    let mut errors = ValidationErrors::new();
    if let Err(e) = crate::namespaces::validate_name(&role.name) {
        errors.add("name", e.to_string());
    }
    if let Err(e) = crate::auth::roles::validate_oidc_groups(role.oidc_groups.as_deref()) {
        errors.merge(e);
    }
    errors.into_result().map_err(StorageError::from)
}
