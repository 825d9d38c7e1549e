//! Permission grants
//!
//! A grant pairs a topic with a method. Requestable methods are the HTTP
//! verbs; `read` and `manage` exist only on the grant side and alias onto
//! verbs through [`method_matches`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Topics the API ships with. Topics are an open set; these are documented
/// so callers and tests share spellings.
pub const WELL_KNOWN_TOPICS: &[&str] = &[
    "namespaces",
    "instances",
    "syncs",
    "secrets",
    "variables",
    "files",
    "services",
    "registries",
    "logs",
    "notifications",
    "metrics",
    "events",
    "roles",
    "api_tokens",
];

const MAX_TOPIC_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("invalid permission method: '{0}'")]
    InvalidMethod(String),

    #[error("invalid request method: '{0}'")]
    InvalidVerb(String),

    #[error("invalid permission topic: '{0}'")]
    InvalidTopic(String),
}

/// An HTTP-style action a caller may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Patch, Verb::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "PATCH" => Ok(Verb::Patch),
            "DELETE" => Ok(Verb::Delete),
            other => Err(PermissionError::InvalidVerb(other.to_string())),
        }
    }
}

/// A grantable method: any verb, or one of the aliases `read` / `manage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Verb(Verb),
    /// Implies `GET` only
    Read,
    /// Implies every verb
    Manage,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Verb(verb) => verb.as_str(),
            Method::Read => "read",
            Method::Manage => "manage",
        }
    }
}

impl From<Verb> for Method {
    fn from(verb: Verb) -> Self {
        Method::Verb(verb)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Method::Read),
            "manage" => Ok(Method::Manage),
            other => other
                .parse::<Verb>()
                .map(Method::Verb)
                .map_err(|_| PermissionError::InvalidMethod(other.to_string())),
        }
    }
}

/// Whether a granted method covers a requested verb.
///
/// This is the only place method aliasing is decided.
pub fn method_matches(granted: Method, requested: Verb) -> bool {
    match granted {
        Method::Manage => true,
        Method::Read => requested == Verb::Get,
        Method::Verb(verb) => verb == requested,
    }
}

/// A resource category such as `secrets` or `api_tokens`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub fn parse(s: &str) -> Result<Self, PermissionError> {
        let valid = !s.is_empty()
            && s.len() <= MAX_TOPIC_LEN
            && s
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if !valid {
            return Err(PermissionError::InvalidTopic(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_known(&self) -> bool {
        WELL_KNOWN_TOPICS.contains(&self.0.as_str())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Topic {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// A single grant: method + topic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    #[serde(with = "topic_serde")]
    pub topic: Topic,
    #[serde(with = "method_serde")]
    pub method: Method,
}

impl Permission {
    pub fn new(topic: Topic, method: Method) -> Self {
        Self { topic, method }
    }

    /// Parse from raw strings, as they arrive on the wire
    pub fn parse(topic: &str, method: &str) -> Result<Self, PermissionError> {
        Ok(Self::new(Topic::parse(topic)?, method.parse()?))
    }

    /// Check if this grant allows the given verb on the given topic.
    /// Topics compare exactly; there is no wildcard or hierarchy.
    pub fn allows(&self, verb: Verb, topic: &Topic) -> bool {
        &self.topic == topic && method_matches(self.method, verb)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.topic)
    }
}

/// Permission as submitted by a client, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionInput {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub method: String,
}

/// Field-keyed validation failures, e.g. `permissions[1].method`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("validation errors:")?;
        for (i, (field, message)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " field '{}': {}", field, message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a submitted permission list. `None` stays `None` (no grants).
pub fn validate_permissions(
    inputs: Option<&[PermissionInput]>,
) -> Result<Option<Vec<Permission>>, ValidationErrors> {
    let Some(inputs) = inputs else {
        return Ok(None);
    };

    let mut errors = ValidationErrors::new();
    let mut permissions = Vec::with_capacity(inputs.len());

    for (i, input) in inputs.iter().enumerate() {
        let topic = Topic::parse(&input.topic)
            .map_err(|e| errors.add(format!("permissions[{}].topic", i), e.to_string()));
        let method = input
            .method
            .parse::<Method>()
            .map_err(|e| errors.add(format!("permissions[{}].method", i), e.to_string()));

        if let (Ok(topic), Ok(method)) = (topic, method) {
            permissions.push(Permission::new(topic, method));
        }
    }

    errors.into_result().map(|()| Some(permissions))
}

/// The union of a principal's grants within one namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    grants: Vec<Permission>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self { grants: Vec::new() }
    }

    /// Add a grant to the set
    pub fn add(&mut self, grant: Permission) {
        // Avoid duplicates
        if !self.grants.iter().any(|g| g == &grant) {
            self.grants.push(grant);
        }
    }

    /// Add multiple grants
    pub fn add_all(&mut self, grants: impl IntoIterator<Item = Permission>) {
        for grant in grants {
            self.add(grant);
        }
    }

    /// Check if any grant allows the given verb on the given topic
    pub fn allows(&self, verb: Verb, topic: &Topic) -> bool {
        self.grants.iter().any(|g| g.allows(verb, topic))
    }

    /// Get all grants
    pub fn grants(&self) -> &[Permission] {
        &self.grants
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        let mut set = PermissionSet::new();
        set.add_all(iter);
        set
    }
}

mod topic_serde {
    use super::*;

    pub fn serialize<S>(topic: &Topic, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(topic.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Topic, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Topic::parse(&s).map_err(serde::de::Error::custom)
    }
}

mod method_serde {
    use super::*;

    pub fn serialize<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Method, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
