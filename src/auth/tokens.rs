//! API token secrets, digests and records
//!
//! - The plaintext secret (`gth_` prefix) is handed out once, at creation.
//! - Only an HMAC-SHA256 digest of the secret is stored.
//! - The public `prefix` is derived from the digest, never from the secret.

use crate::auth::permissions::{Permission, PermissionSet};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Secret prefix, so leaked secrets are recognisable
pub const SECRET_PREFIX: &str = "gth_";

/// Length of the public prefix shown in listings
pub const PUBLIC_PREFIX_LEN: usize = 8;

const SECRET_BYTES: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Compare two byte strings without short-circuiting on the first
/// mismatching byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Operator key granting full access
#[derive(Clone)]
pub struct AdminKey {
    digest: [u8; 32],
}

impl AdminKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self {
            digest: Sha256::digest(key.as_ref().as_bytes()).into(),
        }
    }

    /// Both sides are hashed to a fixed width first, so timing depends
    /// neither on the candidate's length nor on where it diverges.
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        constant_time_eq(&candidate, &self.digest)
    }
}

impl fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdminKey([REDACTED])")
    }
}

/// A plaintext token secret
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);

impl TokenSecret {
    /// Generate a new unguessable secret
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let mut bytes = [0u8; SECRET_BYTES];
        rng.fill(&mut bytes);

        Self(format!("{}{}", SECRET_PREFIX, URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Wrap a secret presented by a caller. No format check: a malformed
    /// secret simply never matches a stored digest.
    pub fn from_presented(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSecret([REDACTED])")
    }
}

/// Keyed digest of a secret, the only form persisted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenDigest(String);

impl TokenDigest {
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-secret identifier shown to operators
    pub fn public_prefix(&self) -> String {
        self.0.chars().take(PUBLIC_PREFIX_LEN).collect()
    }

    pub fn ct_eq(&self, other: &TokenDigest) -> bool {
        constant_time_eq(self.0.as_bytes(), other.0.as_bytes())
    }
}

/// Derives digests from secrets with a process-wide key
#[derive(Clone)]
pub struct TokenHasher {
    key: Vec<u8>,
}

impl TokenHasher {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    pub fn digest(&self, secret: &TokenSecret) -> TokenDigest {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(secret.expose().as_bytes());
        TokenDigest(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for TokenHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenHasher([REDACTED])")
    }
}

/// A stored API token. Bound to one namespace for its whole life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiToken {
    pub namespace: String,
    pub name: String,
    pub description: String,
    pub digest: TokenDigest,
    pub prefix: String,
    pub permissions: Option<Vec<Permission>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Grants as a set; `null` permissions mean no grants
    pub fn grants(&self) -> PermissionSet {
        self.permissions.iter().flatten().cloned().collect()
    }
}

/// Input for creating a token; the store stamps the timestamps
#[derive(Debug, Clone)]
pub struct NewApiToken {
    pub name: String,
    pub description: String,
    pub digest: TokenDigest,
    pub permissions: Option<Vec<Permission>>,
    pub expires_at: DateTime<Utc>,
}
