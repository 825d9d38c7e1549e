//! Resolution plus decision in one call, the entry point for enforcement

use crate::auth::engine::{authorize, Decision};
use crate::auth::permissions::Verb;
use crate::auth::principal::{Credentials, Principal, PrincipalResolver, ResolveError};
use crate::auth::request::AccessRequest;
use crate::storage::StorageError;
use tracing::debug;

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow(Principal),
    Deny,
    Unauthenticated,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow(_))
    }
}

/// Combines the resolver with the authorization engine. Store failures
/// come back as `Err` and never as `Allow`.
#[derive(Clone)]
pub struct Gatekeeper {
    resolver: PrincipalResolver,
}

impl Gatekeeper {
    pub fn new(resolver: PrincipalResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PrincipalResolver {
        &self.resolver
    }

    /// Resolve credentials alone; `Ok(None)` means unauthenticated
    pub async fn principal(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<Principal>, StorageError> {
        match self.resolver.resolve(credentials).await {
            Ok(principal) => Ok(Some(principal)),
            Err(ResolveError::Unauthenticated) => Ok(None),
            Err(ResolveError::Storage(e)) => Err(e),
        }
    }

    pub async fn check(
        &self,
        credentials: &Credentials,
        request: &AccessRequest,
    ) -> Result<Verdict, StorageError> {
        let Some(principal) = self.principal(credentials).await? else {
            return Ok(Verdict::Unauthenticated);
        };

        match authorize(&principal, request) {
            Decision::Allow => Ok(Verdict::Allow(principal)),
            Decision::Deny => {
                debug!(
                    principal = principal.kind(),
                    namespace = request.namespace.as_deref().unwrap_or("-"),
                    topic = %request.topic,
                    method = %request.verb,
                    "Access denied"
                );
                Ok(Verdict::Deny)
            }
        }
    }

    /// Check a raw HTTP path. A path that names no valid topic can only be
    /// reached by `FullAdmin`.
    pub async fn check_path(
        &self,
        credentials: &Credentials,
        verb: Verb,
        path: &str,
    ) -> Result<Verdict, StorageError> {
        match AccessRequest::from_path(verb, path) {
            Ok(request) => self.check(credentials, &request).await,
            Err(e) => {
                debug!(path = %path, error = %e, "Unrecognised request path");
                Ok(match self.principal(credentials).await? {
                    None => Verdict::Unauthenticated,
                    Some(Principal::FullAdmin) => Verdict::Allow(Principal::FullAdmin),
                    Some(_) => Verdict::Deny,
                })
            }
        }
    }
}
