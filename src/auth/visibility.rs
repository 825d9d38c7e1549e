//! Namespace listing filter

use crate::auth::principal::Principal;
use crate::namespaces::Namespace;

/// Whether `namespace` shows up in the principal's namespace listing
pub fn is_visible(principal: &Principal, namespace: &str) -> bool {
    match principal {
        Principal::FullAdmin => true,
        Principal::Anonymous => false,
        _ => principal
            .grants_in(namespace)
            .is_some_and(|set| !set.is_empty()),
    }
}

/// Keep the namespaces visible to `principal`, in their original order
pub fn visible_namespaces(principal: &Principal, namespaces: Vec<Namespace>) -> Vec<Namespace> {
    if principal.is_admin() {
        return namespaces;
    }

    namespaces
        .into_iter()
        .filter(|ns| is_visible(principal, &ns.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::{Permission, PermissionSet};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn namespaces(names: &[&str]) -> Vec<Namespace> {
        let now = Utc::now();
        names
            .iter()
            .map(|name| Namespace {
                name: name.to_string(),
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    fn names(list: Vec<Namespace>) -> Vec<String> {
        list.into_iter().map(|ns| ns.name).collect()
    }

    fn grant() -> PermissionSet {
        [Permission::parse("secrets", "read").unwrap()].into_iter().collect()
    }

    #[test]
    fn test_admin_sees_everything() {
        let all = namespaces(&["c", "a", "b"]);
        assert_eq!(
            names(visible_namespaces(&Principal::FullAdmin, all)),
            vec!["c", "a", "b"]
        );
    }

    #[test]
    fn test_anonymous_sees_nothing() {
        assert!(visible_namespaces(&Principal::Anonymous, namespaces(&["a"])).is_empty());
    }

    #[test]
    fn test_group_role_keeps_order() {
        let mut grants = BTreeMap::new();
        grants.insert("a".to_string(), grant());
        grants.insert("c".to_string(), grant());
        grants.insert("b".to_string(), PermissionSet::new());
        let principal = Principal::GroupRole { grants };

        assert_eq!(
            names(visible_namespaces(&principal, namespaces(&["c", "b", "a", "d"]))),
            vec!["c", "a"]
        );
    }

    #[test]
    fn test_token_without_grants_sees_nothing() {
        let principal = Principal::NamespaceToken {
            namespace: "a".into(),
            permissions: PermissionSet::new(),
        };
        assert!(visible_namespaces(&principal, namespaces(&["a", "b"])).is_empty());
    }
}
