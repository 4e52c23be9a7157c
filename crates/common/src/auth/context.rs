//! The request-scoped authentication result.

use crate::error::{ErrorCode, ServiceError};
use crate::jwt::Claims;
use std::collections::BTreeSet;
use std::fmt;

/// Authenticated subject and its authority set.
///
/// Installed into request extensions by a verifier and read by handlers
/// through the [`Authenticated`](super::Authenticated) extractor. Never
/// persisted and never shared between requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    subject: String,
    authorities: BTreeSet<String>,
}

impl AuthContext {
    pub fn new<I, S>(subject: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject: subject.into(),
            authorities: authorities.into_iter().map(Into::into).collect(),
        }
    }

    /// Map token claims to a context. Role names are copied verbatim
    /// (case-sensitive, no prefixing); no roles means no authorities.
    #[must_use]
    pub fn from_claims(claims: &Claims) -> Self {
        Self::new(claims.sub.clone(), claims.roles.iter().cloned())
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    #[must_use]
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    /// # Errors
    ///
    /// Returns a 403 `AccessDenied` error when the authority is not held.
    pub fn require_authority(&self, authority: &str) -> Result<(), ServiceError> {
        if self.has_authority(authority) {
            Ok(())
        } else {
            tracing::debug!(
                target: "common.auth",
                required = authority,
                "Access denied: missing authority"
            );
            Err(ServiceError::with_args(ErrorCode::AccessDenied, [authority]))
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("subject", &"[REDACTED]")
            .field("authorities", &self.authorities)
            .finish()
    }
}
