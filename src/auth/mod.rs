//! Authentication and authorization
//!
//! Principals:
//! - `FullAdmin`: operator admin key, or the configured admin OIDC group
//! - `NamespaceToken`: API token (`gth_` prefix), scoped to one namespace
//! - `GroupRole`: roles matched by OIDC group, possibly across namespaces
//! - `Anonymous`: no usable credential, no grants
//!
//! Grant methods:
//! - `GET`, `POST`, `PUT`, `PATCH`, `DELETE`: exactly that verb
//! - `read`: `GET` only
//! - `manage`: every verb

pub mod duration;
pub mod engine;
pub mod gate;
pub mod permissions;
pub mod principal;
pub mod request;
pub mod roles;
pub mod tokens;
pub mod visibility;

pub use duration::{DurationError, IsoDuration};
pub use engine::{authorize, Decision};
pub use gate::{Gatekeeper, Verdict};
pub use permissions::{
    method_matches, Method, Permission, PermissionError, PermissionInput, PermissionSet, Topic,
    ValidationErrors, Verb,
};
pub use principal::{AuthConfig, Credentials, Principal, PrincipalResolver, ResolveError};
pub use request::AccessRequest;
pub use roles::{Role, RoleSpec};
pub use tokens::{AdminKey, ApiToken, NewApiToken, TokenDigest, TokenHasher, TokenSecret};
pub use visibility::{is_visible, visible_namespaces};
