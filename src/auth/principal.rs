//! Principal resolution
//!
//! Credentials are tried in a fixed order, first match wins:
//!
//! 1. admin key -> `FullAdmin`
//! 2. token secret -> `NamespaceToken`, or `Unauthenticated` if unknown/expired
//! 3. OIDC groups -> `GroupRole` (or `FullAdmin` for the configured admin group)
//! 4. nothing -> `Anonymous`
//!
//! An admin key that does not match is ignored and resolution continues.

use crate::auth::permissions::PermissionSet;
use crate::auth::roles::parse_group_list;
use crate::auth::tokens::{AdminKey, TokenHasher, TokenSecret};
use crate::storage::{StorageError, Store};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Credentials presented with a request
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub admin_key: Option<String>,
    pub token_secret: Option<TokenSecret>,
    pub oidc_groups: Option<BTreeSet<String>>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.admin_key = Some(key.into());
        self
    }

    pub fn with_token(mut self, secret: impl Into<String>) -> Self {
        self.token_secret = Some(TokenSecret::from_presented(secret));
        self
    }

    /// Set groups from a comma-separated list. Blank lists count as absent.
    pub fn with_groups(mut self, raw: &str) -> Self {
        self.oidc_groups = parse_group_list(raw);
        self
    }
}

/// The resolved identity a request is evaluated as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Unscoped operator access
    FullAdmin,

    /// An API token, bound to a single namespace
    NamespaceToken {
        namespace: String,
        permissions: PermissionSet,
    },

    /// Union of the roles matching the caller's OIDC groups, by namespace.
    /// Only namespaces with at least one grant are present.
    GroupRole {
        grants: BTreeMap<String, PermissionSet>,
    },

    Anonymous,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::FullAdmin)
    }

    /// Grants held in `namespace`. `None` for `FullAdmin`, which needs none,
    /// and for namespaces the principal has no footing in.
    pub fn grants_in(&self, namespace: &str) -> Option<&PermissionSet> {
        match self {
            Principal::NamespaceToken {
                namespace: ns,
                permissions,
            } if ns == namespace => Some(permissions),
            Principal::GroupRole { grants } => grants.get(namespace),
            _ => None,
        }
    }

    /// Every namespace the principal has grants in
    pub fn scoped_grants(&self) -> Box<dyn Iterator<Item = (&str, &PermissionSet)> + '_> {
        match self {
            Principal::NamespaceToken {
                namespace,
                permissions,
            } => Box::new(std::iter::once((namespace.as_str(), permissions))),
            Principal::GroupRole { grants } => {
                Box::new(grants.iter().map(|(ns, set)| (ns.as_str(), set)))
            }
            Principal::FullAdmin | Principal::Anonymous => Box::new(std::iter::empty()),
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Principal::FullAdmin => "admin",
            Principal::NamespaceToken { .. } => "token",
            Principal::GroupRole { .. } => "group",
            Principal::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::NamespaceToken { namespace, .. } => write!(f, "token@{}", namespace),
            Principal::GroupRole { grants } => {
                let namespaces: Vec<&str> = grants.keys().map(String::as_str).collect();
                write!(f, "group@[{}]", namespaces.join(","))
            }
            other => f.write_str(other.kind()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Token secret unknown or expired. The two are not distinguished.
    #[error("unauthenticated")]
    Unauthenticated,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Immutable auth settings, fixed at startup
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub admin_key: Option<AdminKey>,
    pub admin_group: Option<String>,
    pub hasher: TokenHasher,
}

impl AuthConfig {
    pub fn new(token_key: impl Into<Vec<u8>>) -> Self {
        Self {
            admin_key: None,
            admin_group: None,
            hasher: TokenHasher::new(token_key),
        }
    }

    pub fn with_admin_key(mut self, key: impl AsRef<str>) -> Self {
        self.admin_key = Some(AdminKey::new(key));
        self
    }

    pub fn with_admin_group(mut self, group: impl Into<String>) -> Self {
        self.admin_group = Some(group.into()).filter(|g: &String| !g.trim().is_empty());
        self
    }
}

/// Turns credentials into a [`Principal`]
#[derive(Clone)]
pub struct PrincipalResolver {
    config: Arc<AuthConfig>,
    store: Arc<dyn Store>,
}

impl PrincipalResolver {
    pub fn new(config: AuthConfig, store: Arc<dyn Store>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub async fn resolve(&self, credentials: &Credentials) -> Result<Principal, ResolveError> {
        self.resolve_at(credentials, Utc::now()).await
    }

    /// Resolve, judging token expiry at `now`
    pub async fn resolve_at(
        &self,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<Principal, ResolveError> {
        if let (Some(expected), Some(presented)) = (&self.config.admin_key, &credentials.admin_key)
        {
            if expected.matches(presented) {
                return Ok(Principal::FullAdmin);
            }
            debug!("Admin key mismatch, trying other credentials");
        }

        if let Some(secret) = &credentials.token_secret {
            return self.resolve_token(secret, now).await;
        }

        if let Some(groups) = credentials.oidc_groups.as_ref().filter(|g| !g.is_empty()) {
            return self.resolve_groups(groups).await;
        }

        Ok(Principal::Anonymous)
    }

    async fn resolve_token(
        &self,
        secret: &TokenSecret,
        now: DateTime<Utc>,
    ) -> Result<Principal, ResolveError> {
        let digest = self.config.hasher.digest(secret);

        let token = match self.store.find_token_by_digest(&digest).await? {
            Some(token) if token.digest.ct_eq(&digest) => token,
            _ => {
                debug!(reason = "unknown_token", "Token rejected");
                return Err(ResolveError::Unauthenticated);
            }
        };

        if token.is_expired_at(now) {
            debug!(
                reason = "expired_token",
                namespace = %token.namespace,
                token = %token.name,
                "Token rejected"
            );
            return Err(ResolveError::Unauthenticated);
        }

        Ok(Principal::NamespaceToken {
            permissions: token.grants(),
            namespace: token.namespace,
        })
    }

    async fn resolve_groups(&self, groups: &BTreeSet<String>) -> Result<Principal, ResolveError> {
        if let Some(admin_group) = &self.config.admin_group {
            if groups.contains(admin_group) {
                return Ok(Principal::FullAdmin);
            }
        }

        let roles = self.store.find_roles_by_groups(groups).await?;

        let mut grants: BTreeMap<String, PermissionSet> = BTreeMap::new();
        for role in roles {
            let role_grants = role.grants();
            if role_grants.is_empty() {
                continue;
            }
            grants
                .entry(role.namespace)
                .or_default()
                .add_all(role_grants.grants().iter().cloned());
        }

        debug!(namespaces = grants.len(), "Resolved OIDC groups");
        Ok(Principal::GroupRole { grants })
    }
}
