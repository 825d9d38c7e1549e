//! The action a caller asks to perform

use crate::auth::permissions::{PermissionError, Topic, Verb};
use std::fmt;

const NAMESPACES_TOPIC: &str = "namespaces";
const API_VERSIONS: [&str; 3] = ["v1", "v2", "v3"];

/// `(namespace?, verb, topic)`. A request without a namespace targets a
/// collection that sits above every namespace, such as the namespace list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub namespace: Option<String>,
    pub verb: Verb,
    pub topic: Topic,
}

impl AccessRequest {
    pub fn new(namespace: Option<&str>, verb: Verb, topic: Topic) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            verb,
            topic,
        }
    }

    /// Shorthand for a namespaced request
    pub fn in_namespace(namespace: &str, verb: Verb, topic: Topic) -> Self {
        Self::new(Some(namespace), verb, topic)
    }

    /// Derive the request from an HTTP path:
    ///
    /// - `/namespaces` -> `(None, namespaces)`
    /// - `/namespaces/{ns}` -> `(ns, namespaces)`
    /// - `/namespaces/{ns}/{topic}/...` -> `(ns, topic)`
    /// - `/{topic}/...` -> `(None, topic)`
    ///
    /// Repeated slashes collapse and an `/api/v1|v2|v3` prefix is ignored.
    pub fn from_path(verb: Verb, path: &str) -> Result<Self, PermissionError> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.len() >= 2 && segments[0] == "api" && API_VERSIONS.contains(&segments[1]) {
            segments.drain(..2);
        }

        let (namespace, topic) = match segments.as_slice() {
            [] => return Err(PermissionError::InvalidTopic(path.to_string())),
            [NAMESPACES_TOPIC] => (None, NAMESPACES_TOPIC),
            [NAMESPACES_TOPIC, ns] => (Some(*ns), NAMESPACES_TOPIC),
            [NAMESPACES_TOPIC, ns, topic, ..] => (Some(*ns), *topic),
            [topic, ..] => (None, *topic),
        };

        Ok(Self::new(namespace, verb, Topic::parse(topic)?))
    }

    /// Creating a namespace: `POST` on the namespace collection
    pub fn is_namespace_creation(&self) -> bool {
        self.namespace.is_none() && self.verb == Verb::Post && self.topic == *NAMESPACES_TOPIC
    }
}

impl fmt::Display for AccessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.verb, ns, self.topic),
            None => write!(f, "{} {}", self.verb, self.topic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(verb: Verb, path: &str) -> (Option<String>, String) {
        let req = AccessRequest::from_path(verb, path).unwrap();
        (req.namespace, req.topic.as_str().to_string())
    }

    #[test]
    fn test_from_path_namespace_collection() {
        assert_eq!(parse(Verb::Get, "/api/v2/namespaces"), (None, "namespaces".into()));
        assert_eq!(
            parse(Verb::Get, "/api/v2/namespaces/p1"),
            (Some("p1".into()), "namespaces".into())
        );
    }

    #[test]
    fn test_from_path_namespaced_topic() {
        assert_eq!(
            parse(Verb::Get, "/api/v2/namespaces/p1/secrets/x"),
            (Some("p1".into()), "secrets".into())
        );
        assert_eq!(
            parse(Verb::Delete, "/api/v1/namespaces/p1/api_tokens"),
            (Some("p1".into()), "api_tokens".into())
        );
    }

    #[test]
    fn test_from_path_normalises() {
        assert_eq!(
            parse(Verb::Get, "//api//v2///namespaces/p1//variables/"),
            (Some("p1".into()), "variables".into())
        );
        assert_eq!(
            parse(Verb::Get, "/namespaces/p1/roles"),
            (Some("p1".into()), "roles".into())
        );
        assert_eq!(parse(Verb::Get, "/api/v3/instances"), (None, "instances".into()));
    }

    #[test]
    fn test_from_path_unversioned_api_prefix_is_a_topic() {
        assert_eq!(parse(Verb::Get, "/api/v9/namespaces"), (None, "api".into()));
    }

    #[test]
    fn test_from_path_invalid() {
        assert!(AccessRequest::from_path(Verb::Get, "/").is_err());
        assert!(AccessRequest::from_path(Verb::Get, "/api/v2").is_err());
        assert!(AccessRequest::from_path(Verb::Get, "/namespaces/p1/Secrets").is_err());
    }

    #[test]
    fn test_is_namespace_creation() {
        let create = AccessRequest::from_path(Verb::Post, "/api/v2/namespaces").unwrap();
        assert!(create.is_namespace_creation());

        let list = AccessRequest::from_path(Verb::Get, "/api/v2/namespaces").unwrap();
        assert!(!list.is_namespace_creation());

        let scoped = AccessRequest::from_path(Verb::Post, "/api/v2/namespaces/p1").unwrap();
        assert!(!scoped.is_namespace_creation());
    }
}
