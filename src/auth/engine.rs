//! Authorization decisions
//!
//! Pure functions over an already resolved [`Principal`]. Method aliasing
//! lives only in [`method_matches`](crate::auth::permissions::method_matches);
//! every check here goes through [`PermissionSet::allows`].

use crate::auth::permissions::PermissionSet;
use crate::auth::principal::Principal;
use crate::auth::request::AccessRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

/// Decide whether `principal` may perform `request`.
///
/// A namespaced request needs a matching grant in that namespace. A
/// namespace-less request is allowed when any namespace's grants match,
/// except namespace creation, which is reserved for `FullAdmin`.
pub fn authorize(principal: &Principal, request: &AccessRequest) -> Decision {
    match principal {
        Principal::FullAdmin => Decision::Allow,
        Principal::Anonymous => Decision::Deny,
        Principal::NamespaceToken { .. } | Principal::GroupRole { .. } => {
            match &request.namespace {
                Some(namespace) => principal
                    .grants_in(namespace)
                    .is_some_and(|set| set_allows(set, request))
                    .into(),
                None if request.is_namespace_creation() => Decision::Deny,
                None => principal
                    .scoped_grants()
                    .any(|(_, set)| set_allows(set, request))
                    .into(),
            }
        }
    }
}

fn set_allows(set: &PermissionSet, request: &AccessRequest) -> bool {
    set.allows(request.verb, &request.topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::{Permission, Topic, Verb};
    use std::collections::BTreeMap;

    fn token(namespace: &str, grants: &[(&str, &str)]) -> Principal {
        Principal::NamespaceToken {
            namespace: namespace.into(),
            permissions: grants
                .iter()
                .map(|(t, m)| Permission::parse(t, m).unwrap())
                .collect(),
        }
    }

    fn req(namespace: Option<&str>, verb: Verb, topic: &str) -> AccessRequest {
        AccessRequest::new(namespace, verb, Topic::parse(topic).unwrap())
    }

    #[test]
    fn test_admin_and_anonymous() {
        for verb in Verb::ALL {
            assert_eq!(
                authorize(&Principal::FullAdmin, &req(Some("any"), verb, "secrets")),
                Decision::Allow
            );
            assert_eq!(
                authorize(&Principal::Anonymous, &req(Some("any"), verb, "secrets")),
                Decision::Deny
            );
        }
        assert!(authorize(&Principal::FullAdmin, &req(None, Verb::Post, "namespaces")).is_allowed());
    }

    #[test]
    fn test_token_scoped_to_namespace() {
        let principal = token("p1", &[("secrets", "read")]);

        assert!(authorize(&principal, &req(Some("p1"), Verb::Get, "secrets")).is_allowed());
        assert!(!authorize(&principal, &req(Some("p1"), Verb::Post, "secrets")).is_allowed());
        assert!(!authorize(&principal, &req(Some("p2"), Verb::Get, "secrets")).is_allowed());
        assert!(!authorize(&principal, &req(Some("p1"), Verb::Get, "variables")).is_allowed());
    }

    #[test]
    fn test_namespace_less_request() {
        let principal = token("p1", &[("namespaces", "read")]);

        assert!(authorize(&principal, &req(None, Verb::Get, "namespaces")).is_allowed());
        assert!(!authorize(&principal, &req(None, Verb::Delete, "namespaces")).is_allowed());

        let manager = token("p1", &[("namespaces", "manage")]);
        assert!(!authorize(&manager, &req(None, Verb::Post, "namespaces")).is_allowed());
        assert!(authorize(&manager, &req(None, Verb::Put, "namespaces")).is_allowed());
    }

    #[test]
    fn test_group_role_union() {
        let mut grants = BTreeMap::new();
        grants.insert(
            "n1".to_string(),
            [
                Permission::parse("secrets", "read").unwrap(),
                Permission::parse("secrets", "DELETE").unwrap(),
            ]
            .into_iter()
            .collect(),
        );
        let principal = Principal::GroupRole { grants };

        assert!(authorize(&principal, &req(Some("n1"), Verb::Get, "secrets")).is_allowed());
        assert!(authorize(&principal, &req(Some("n1"), Verb::Delete, "secrets")).is_allowed());
        assert!(!authorize(&principal, &req(Some("n1"), Verb::Put, "secrets")).is_allowed());
        assert!(!authorize(&principal, &req(Some("n2"), Verb::Get, "secrets")).is_allowed());
    }

    #[test]
    fn test_empty_group_role_denies() {
        let principal = Principal::GroupRole {
            grants: BTreeMap::new(),
        };
        assert!(!authorize(&principal, &req(None, Verb::Get, "namespaces")).is_allowed());
        assert!(!authorize(&principal, &req(Some("n1"), Verb::Get, "secrets")).is_allowed());
    }
}
