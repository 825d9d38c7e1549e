//! In-memory store
//!
//! Not durable. All state sits behind one `RwLock`, so every write is
//! visible to the next read, including the creating caller's.

use crate::auth::permissions::ValidationErrors;
use crate::auth::roles::{Role, RoleSpec};
use crate::auth::tokens::{ApiToken, NewApiToken, TokenDigest};
use crate::namespaces::{validate_name, Namespace};
use crate::storage::{
    validate_new_token, validate_role_spec, NamespaceStore, RoleStore, StorageError,
    StorageResult, TokenStore,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Default)]
struct State {
    /// Creation order is vector order
    namespaces: Vec<Namespace>,
    tokens: Vec<ApiToken>,
    roles: Vec<Role>,
}

impl State {
    fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.iter().any(|ns| ns.name == name)
    }

    fn require_namespace(&self, name: &str) -> StorageResult<()> {
        if self.has_namespace(name) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("namespace not found: {}", name)))
        }
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NamespaceStore for MemoryStore {
    async fn create_namespace(&self, name: &str) -> StorageResult<Namespace> {
        validate_name(name).map_err(|e| ValidationErrors::single("name", e.to_string()))?;

        let mut state = self.state.write();
        if state.has_namespace(name) {
            return Err(StorageError::Conflict(format!("namespace already exists: {}", name)));
        }

        let now = Utc::now();
        let namespace = Namespace {
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.namespaces.push(namespace.clone());

        debug!(namespace = %name, "Created namespace");
        Ok(namespace)
    }

    async fn get_namespace(&self, name: &str) -> StorageResult<Namespace> {
        self.state
            .read()
            .namespaces
            .iter()
            .find(|ns| ns.name == name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("namespace not found: {}", name)))
    }

    async fn list_namespaces(&self) -> StorageResult<Vec<Namespace>> {
        Ok(self.state.read().namespaces.clone())
    }

    async fn delete_namespace(&self, name: &str) -> StorageResult<()> {
        let mut state = self.state.write();
        state.require_namespace(name)?;

        state.namespaces.retain(|ns| ns.name != name);
        state.tokens.retain(|t| t.namespace != name);
        state.roles.retain(|r| r.namespace != name);

        debug!(namespace = %name, "Deleted namespace");
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn create_token(&self, namespace: &str, token: NewApiToken) -> StorageResult<ApiToken> {
        validate_new_token(&token)?;

        let mut state = self.state.write();
        state.require_namespace(namespace)?;

        if state
            .tokens
            .iter()
            .any(|t| t.namespace == namespace && t.name == token.name)
        {
            return Err(StorageError::Conflict(format!(
                "api token already exists: {}",
                token.name
            )));
        }
        if state.tokens.iter().any(|t| t.digest == token.digest) {
            return Err(StorageError::Conflict("api token digest already exists".into()));
        }

        let now = Utc::now();
        let record = ApiToken {
            namespace: namespace.to_string(),
            prefix: token.digest.public_prefix(),
            name: token.name,
            description: token.description,
            digest: token.digest,
            permissions: token.permissions,
            expires_at: token.expires_at,
            created_at: now,
            updated_at: now,
        };
        state.tokens.push(record.clone());

        debug!(namespace = %namespace, token = %record.name, "Created api token");
        Ok(record)
    }

    async fn get_token(&self, namespace: &str, name: &str) -> StorageResult<ApiToken> {
        self.state
            .read()
            .tokens
            .iter()
            .find(|t| t.namespace == namespace && t.name == name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("api token not found: {}", name)))
    }

    async fn list_tokens(&self, namespace: &str) -> StorageResult<Vec<ApiToken>> {
        Ok(self
            .state
            .read()
            .tokens
            .iter()
            .filter(|t| t.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn delete_token(&self, namespace: &str, name: &str) -> StorageResult<()> {
        let mut state = self.state.write();
        let before = state.tokens.len();
        state
            .tokens
            .retain(|t| !(t.namespace == namespace && t.name == name));

        if state.tokens.len() == before {
            return Err(StorageError::NotFound(format!("api token not found: {}", name)));
        }

        debug!(namespace = %namespace, token = %name, "Deleted api token");
        Ok(())
    }

    async fn find_token_by_digest(&self, digest: &TokenDigest) -> StorageResult<Option<ApiToken>> {
        let state = self.state.read();

        // Compare against every entry so the scan length does not depend
        // on where (or whether) the match is.
        let mut found = None;
        for token in &state.tokens {
            if token.digest.ct_eq(digest) && found.is_none() {
                found = Some(token.clone());
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn create_role(&self, namespace: &str, role: RoleSpec) -> StorageResult<Role> {
        validate_role_spec(&role)?;

        let mut state = self.state.write();
        state.require_namespace(namespace)?;

        if state
            .roles
            .iter()
            .any(|r| r.namespace == namespace && r.name == role.name)
        {
            return Err(StorageError::Conflict(format!("role already exists: {}", role.name)));
        }

        let now = Utc::now();
        let record = Role {
            namespace: namespace.to_string(),
            name: role.name,
            description: role.description,
            oidc_groups: role.oidc_groups,
            permissions: role.permissions,
            created_at: now,
            updated_at: now,
        };
        state.roles.push(record.clone());

        debug!(namespace = %namespace, role = %record.name, "Created role");
        Ok(record)
    }

    async fn get_role(&self, namespace: &str, name: &str) -> StorageResult<Role> {
        self.state
            .read()
            .roles
            .iter()
            .find(|r| r.namespace == namespace && r.name == name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("role not found: {}", name)))
    }

    async fn list_roles(&self, namespace: &str) -> StorageResult<Vec<Role>> {
        Ok(self
            .state
            .read()
            .roles
            .iter()
            .filter(|r| r.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn update_role(
        &self,
        namespace: &str,
        name: &str,
        role: RoleSpec,
    ) -> StorageResult<Role> {
        validate_role_spec(&role)?;

        let mut state = self.state.write();

        if role.name != name
            && state
                .roles
                .iter()
                .any(|r| r.namespace == namespace && r.name == role.name)
        {
            return Err(StorageError::Conflict(format!("role already exists: {}", role.name)));
        }

        let existing = state
            .roles
            .iter_mut()
            .find(|r| r.namespace == namespace && r.name == name)
            .ok_or_else(|| StorageError::NotFound(format!("role not found: {}", name)))?;

        existing.name = role.name;
        existing.description = role.description;
        existing.oidc_groups = role.oidc_groups;
        existing.permissions = role.permissions;
        existing.updated_at = Utc::now();

        debug!(namespace = %namespace, role = %existing.name, "Updated role");
        Ok(existing.clone())
    }

    async fn delete_role(&self, namespace: &str, name: &str) -> StorageResult<()> {
        let mut state = self.state.write();
        let before = state.roles.len();
        state
            .roles
            .retain(|r| !(r.namespace == namespace && r.name == name));

        if state.roles.len() == before {
            return Err(StorageError::NotFound(format!("role not found: {}", name)));
        }

        debug!(namespace = %namespace, role = %name, "Deleted role");
        Ok(())
    }

    async fn find_roles_by_groups(&self, groups: &BTreeSet<String>) -> StorageResult<Vec<Role>> {
        Ok(self
            .state
            .read()
            .roles
            .iter()
            .filter(|r| r.matches_any_group(groups))
            .cloned()
            .collect())
    }
}
