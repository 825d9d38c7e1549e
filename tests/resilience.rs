//! Resilience tests for Gatehouse
//!
//! These tests verify behavior under failure and load:
//! - Storage failing mid-request (must never turn into an allow)
//! - Many concurrent resolutions against one store
//! - Administrative changes racing with checks

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeDelta, Utc};
use gatehouse::auth::{
    AccessRequest, ApiToken, AuthConfig, Credentials, Gatekeeper, NewApiToken, Permission,
    PrincipalResolver, Role, RoleSpec, TokenDigest, TokenSecret, Topic, Verb, Verdict,
};
use gatehouse::namespaces::Namespace;
use gatehouse::server::{create_router, AppState, ADMIN_KEY_HEADER, GROUPS_HEADER, TOKEN_HEADER};
use gatehouse::storage::{
    MemoryStore, NamespaceStore, RoleStore, StorageError, StorageResult, TokenStore,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN_KEY: &[u8] = b"resilience-token-key";
const ADMIN_KEY: &str = "resilience-admin-key";

/// A store whose backend is down
struct BrokenStore {
    calls: AtomicUsize,
}

impl BrokenStore {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn fail<T>(&self) -> StorageResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Database("connection refused".into()))
    }
}

#[async_trait]
impl NamespaceStore for BrokenStore {
    async fn create_namespace(&self, _name: &str) -> StorageResult<Namespace> {
        self.fail()
    }

    async fn get_namespace(&self, _name: &str) -> StorageResult<Namespace> {
        self.fail()
    }

    async fn list_namespaces(&self) -> StorageResult<Vec<Namespace>> {
        self.fail()
    }

    async fn delete_namespace(&self, _name: &str) -> StorageResult<()> {
        self.fail()
    }
}

#[async_trait]
impl TokenStore for BrokenStore {
    async fn create_token(&self, _namespace: &str, _token: NewApiToken) -> StorageResult<ApiToken> {
        self.fail()
    }

    async fn get_token(&self, _namespace: &str, _name: &str) -> StorageResult<ApiToken> {
        self.fail()
    }

    async fn list_tokens(&self, _namespace: &str) -> StorageResult<Vec<ApiToken>> {
        self.fail()
    }

    async fn delete_token(&self, _namespace: &str, _name: &str) -> StorageResult<()> {
        self.fail()
    }

    async fn find_token_by_digest(&self, _digest: &TokenDigest) -> StorageResult<Option<ApiToken>> {
        self.fail()
    }
}

#[async_trait]
impl RoleStore for BrokenStore {
    async fn create_role(&self, _namespace: &str, _role: RoleSpec) -> StorageResult<Role> {
        self.fail()
    }

    async fn get_role(&self, _namespace: &str, _name: &str) -> StorageResult<Role> {
        self.fail()
    }

    async fn list_roles(&self, _namespace: &str) -> StorageResult<Vec<Role>> {
        self.fail()
    }

    async fn update_role(
        &self,
        _namespace: &str,
        _name: &str,
        _role: RoleSpec,
    ) -> StorageResult<Role> {
        self.fail()
    }

    async fn delete_role(&self, _namespace: &str, _name: &str) -> StorageResult<()> {
        self.fail()
    }

    async fn find_roles_by_groups(&self, _groups: &BTreeSet<String>) -> StorageResult<Vec<Role>> {
        self.fail()
    }
}

fn config() -> AuthConfig {
    AuthConfig::new(TOKEN_KEY.to_vec()).with_admin_key(ADMIN_KEY)
}

fn secrets_request(namespace: &str, verb: Verb) -> AccessRequest {
    AccessRequest::in_namespace(namespace, verb, Topic::parse("secrets").unwrap())
}

async fn seed_token(store: &MemoryStore, namespace: &str, name: &str, method: &str) -> String {
    let secret = TokenSecret::generate();
    store
        .create_token(
            namespace,
            NewApiToken {
                name: name.to_string(),
                description: String::new(),
                digest: config().hasher.digest(&secret),
                permissions: Some(vec![Permission::parse("secrets", method).unwrap()]),
                expires_at: Utc::now() + TimeDelta::hours(1),
            },
        )
        .await
        .unwrap();
    secret.expose().to_string()
}

#[tokio::test]
async fn test_store_failure_fails_closed() {
    let store = Arc::new(BrokenStore::new());
    let gate = Gatekeeper::new(PrincipalResolver::new(config(), store.clone()));
    let request = secrets_request("ns1", Verb::Get);

    let token = Credentials::anonymous().with_token("gth_anything");
    assert!(gate.check(&token, &request).await.is_err());

    let groups = Credentials::anonymous().with_groups("g1");
    assert!(gate.check(&groups, &request).await.is_err());

    // Admin key and anonymous need no lookup
    let admin = Credentials::anonymous().with_admin_key(ADMIN_KEY);
    assert!(gate.check(&admin, &request).await.unwrap().is_allowed());
    assert_eq!(
        gate.check(&Credentials::anonymous(), &request).await.unwrap(),
        Verdict::Deny
    );

    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_store_failure_is_500_over_http() {
    let app = create_router(AppState::new(config(), Arc::new(BrokenStore::new())));

    for (header, value) in [(TOKEN_HEADER, "gth_anything"), (GROUPS_HEADER, "g1")] {
        let req = Request::get("/api/v2/namespaces/ns1/secrets")
            .header(header, value)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "internal");
        assert!(!body.to_string().contains("connection refused"));
    }

    // Admin passes the gate, then the handler hits the broken store
    let req = Request::get("/api/v2/namespaces")
        .header(ADMIN_KEY_HEADER, ADMIN_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_concurrent_resolution() {
    let store = Arc::new(MemoryStore::new());
    store.create_namespace("ns1").await.unwrap();
    store.create_namespace("ns2").await.unwrap();

    let mut secrets = Vec::new();
    for i in 0..20 {
        let namespace = if i % 2 == 0 { "ns1" } else { "ns2" };
        let secret = seed_token(&store, namespace, &format!("t{}", i), "read").await;
        secrets.push((namespace, secret));
    }

    let gate = Gatekeeper::new(PrincipalResolver::new(config(), store.clone()));

    let mut handles = vec![];
    for round in 0..10 {
        for (namespace, secret) in secrets.clone() {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                let creds = Credentials::anonymous().with_token(secret);
                let other = if namespace == "ns1" { "ns2" } else { "ns1" };

                let own = gate.check(&creds, &secrets_request(namespace, Verb::Get)).await;
                let write = gate.check(&creds, &secrets_request(namespace, Verb::Put)).await;
                let cross = gate.check(&creds, &secrets_request(other, Verb::Get)).await;

                assert!(own.unwrap().is_allowed(), "round {}", round);
                assert_eq!(write.unwrap(), Verdict::Deny);
                assert_eq!(cross.unwrap(), Verdict::Deny);
            }));
        }
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_checks_racing_with_revocation() {
    let store = Arc::new(MemoryStore::new());
    store.create_namespace("ns1").await.unwrap();
    let secret = seed_token(&store, "ns1", "t", "manage").await;

    let gate = Gatekeeper::new(PrincipalResolver::new(config(), store.clone()));

    let mut handles = vec![];
    for _ in 0..50 {
        let gate = gate.clone();
        let secret = secret.clone();
        handles.push(tokio::spawn(async move {
            let creds = Credentials::anonymous().with_token(secret);
            gate.check(&creds, &secrets_request("ns1", Verb::Delete))
                .await
                .unwrap()
        }));
    }

    store.delete_token("ns1", "t").await.unwrap();

    // Each check saw the token either before or after the delete
    for handle in handles {
        let verdict = handle.await.unwrap();
        assert!(matches!(
            verdict,
            Verdict::Allow(_) | Verdict::Unauthenticated
        ));
    }

    let creds = Credentials::anonymous().with_token(secret);
    assert_eq!(
        gate.check(&creds, &secrets_request("ns1", Verb::Delete)).await.unwrap(),
        Verdict::Unauthenticated
    );
}

#[tokio::test]
async fn test_concurrent_namespace_creation_single_winner() {
    let store = Arc::new(MemoryStore::new());

    let mut handles = vec![];
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.create_namespace("shared").await }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(StorageError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 19);
    assert_eq!(store.list_namespaces().await.unwrap().len(), 1);
}
