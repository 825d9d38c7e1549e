//! Namespace naming
//!
//! Namespaces are the isolation boundary: every token, role and protected
//! resource belongs to exactly one. The same naming rules apply to token
//! and role names.
//!
//! Names must match `[a-zA-Z0-9_.-]+`, may not start with `.` and are at
//! most 64 characters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub const MAX_NAME_LEN: usize = 64;

/// Valid characters for a name
fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name is longer than 64 characters")]
    TooLong,

    #[error("invalid name '{0}': must match [a-zA-Z0-9_.-]+")]
    InvalidChars(String),

    #[error("name cannot start with '.'")]
    LeadingDot,
}

/// Validate a namespace, token or role name
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }

    if name.starts_with('.') {
        return Err(NameError::LeadingDot);
    }

    if !name.chars().all(is_valid_name_char) {
        return Err(NameError::InvalidChars(name.to_string()));
    }

    Ok(())
}

/// A namespace record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
