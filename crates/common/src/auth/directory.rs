//! Subject lookup used by context resolution.

use super::context::AuthContext;
use crate::jwt::Claims;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("subject directory lookup failed: {0}")]
pub struct DirectoryError(pub String);

/// Resolves a verified token's subject to the identity the service trusts.
///
/// Lookups are synchronous: local verification runs on a blocking thread,
/// so implementations may block on I/O.
pub trait SubjectDirectory: Send + Sync {
    /// `Ok(None)` means the subject no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the lookup itself failed.
    fn resolve(&self, claims: &Claims) -> Result<Option<AuthContext>, DirectoryError>;
}

/// Trusts the signed claims: identity and authorities come straight from the
/// token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsDirectory;

impl SubjectDirectory for ClaimsDirectory {
    fn resolve(&self, claims: &Claims) -> Result<Option<AuthContext>, DirectoryError> {
        Ok(Some(AuthContext::from_claims(claims)))
    }
}
