//! Roles bind external OIDC groups to permissions within one namespace

use crate::auth::permissions::{Permission, PermissionSet, ValidationErrors};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// A stored role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub namespace: String,
    pub name: String,
    pub description: String,
    pub oidc_groups: Option<Vec<String>>,
    pub permissions: Option<Vec<Permission>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Whether any of the role's groups is in `groups`
    pub fn matches_any_group(&self, groups: &BTreeSet<String>) -> bool {
        self.oidc_groups
            .iter()
            .flatten()
            .any(|group| groups.contains(group))
    }

    pub fn grants(&self) -> PermissionSet {
        self.permissions.iter().flatten().cloned().collect()
    }
}

/// Fields supplied on create and on update. A role keeps its namespace;
/// update may rename it within that namespace.
#[derive(Debug, Clone, Default)]
pub struct RoleSpec {
    pub name: String,
    pub description: String,
    pub oidc_groups: Option<Vec<String>>,
    pub permissions: Option<Vec<Permission>>,
}

/// Every group identifier must be non-empty
pub fn validate_oidc_groups(groups: Option<&[String]>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for (i, group) in groups.into_iter().flatten().enumerate() {
        if group.trim().is_empty() {
            errors.add(format!("oidcGroups[{}]", i), "empty oidc group");
        }
    }
    errors.into_result()
}

/// Parse the comma-separated group header into a set. Blank entries are
/// dropped; `None` when nothing remains.
pub fn parse_group_list(raw: &str) -> Option<BTreeSet<String>> {
    let groups: BTreeSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect();

    if groups.is_empty() {
        None
    } else {
        Some(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(groups: Option<Vec<&str>>) -> Role {
        let now = Utc::now();
        Role {
            namespace: "n1".into(),
            name: "r".into(),
            description: String::new(),
            oidc_groups: groups.map(|g| g.into_iter().map(String::from).collect()),
            permissions: Some(vec![Permission::parse("secrets", "read").unwrap()]),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_matches_any_group() {
        let groups: BTreeSet<String> = ["g1".to_string()].into();

        assert!(role(Some(vec!["g1", "g9"])).matches_any_group(&groups));
        assert!(!role(Some(vec!["g2"])).matches_any_group(&groups));
        assert!(!role(Some(vec![])).matches_any_group(&groups));
        assert!(!role(None).matches_any_group(&groups));
    }

    #[test]
    fn test_validate_oidc_groups() {
        assert!(validate_oidc_groups(None).is_ok());
        assert!(validate_oidc_groups(Some(&["g1".to_string()])).is_ok());

        let errors =
            validate_oidc_groups(Some(&["g1".to_string(), " ".to_string()])).unwrap_err();
        assert!(errors.get("oidcGroups[1]").is_some());
    }

    #[test]
    fn test_parse_group_list() {
        let groups = parse_group_list(" g1, g2 ,,g1").unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.contains("g1"));
        assert!(groups.contains("g2"));

        assert_eq!(parse_group_list(""), None);
        assert_eq!(parse_group_list(" , "), None);
    }
}
