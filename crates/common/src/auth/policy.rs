//! Declarative path → requirement mapping.
//!
//! Local verification installs a context when a valid token is present and
//! lets tokenless requests through. Whether a route needs a context at all
//! is decided here, after verification.

use super::context::AuthContext;
use crate::error::{ErrorCode, ServiceError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// No context needed.
    Permit,
    /// Any verified context.
    Authenticated,
    /// A verified context holding this authority.
    Authority(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    /// Matches the prefix itself and anything below it (`/auth/users`
    /// covers `/auth/users/alice`, not `/auth/usersx`).
    Prefix(String),
}

impl PathPattern {
    pub fn exact(path: impl Into<String>) -> Self {
        PathPattern::Exact(path.into())
    }

    pub fn prefix(path: impl Into<String>) -> Self {
        PathPattern::Prefix(path.into().trim_end_matches('/').to_string())
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => p == path,
            PathPattern::Prefix(p) => path
                .strip_prefix(p.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }
}

/// Ordered rules; the first match wins, unmatched paths need
/// [`Requirement::Authenticated`].
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<(PathPattern, Requirement)>,
    default: Requirement,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default: Requirement::Authenticated,
        }
    }
}

impl AccessPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rule(mut self, pattern: PathPattern, requirement: Requirement) -> Self {
        self.rules.push((pattern, requirement));
        self
    }

    #[must_use]
    pub fn requirement_for(&self, path: &str) -> &Requirement {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map_or(&self.default, |(_, requirement)| requirement)
    }

    /// # Errors
    ///
    /// - 401 `AUTH_010` when the path needs a context and there is none
    /// - 403 `AUTH_013` when the context lacks the required authority
    pub fn check(&self, path: &str, context: Option<&AuthContext>) -> Result<(), ServiceError> {
        match (self.requirement_for(path), context) {
            (Requirement::Permit, _) => Ok(()),
            (_, None) => Err(ServiceError::code(ErrorCode::TokenMissing)),
            (Requirement::Authenticated, Some(_)) => Ok(()),
            (Requirement::Authority(authority), Some(context)) => {
                context.require_authority(authority)
            }
        }
    }
}

/// Middleware enforcing an [`AccessPolicy`]. Installed inside
/// [`verify_locally`](super::verify_locally).
pub async fn enforce_access_policy(
    State(policy): State<Arc<AccessPolicy>>,
    req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    policy.check(req.uri().path(), req.extensions().get::<AuthContext>())?;
    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn policy() -> AccessPolicy {
        AccessPolicy::new()
            .rule(PathPattern::exact("/auth/login"), Requirement::Permit)
            .rule(PathPattern::exact("/auth/register"), Requirement::Permit)
            .rule(
                PathPattern::prefix("/auth/users/"),
                Requirement::Authority("ADMIN".into()),
            )
    }

    #[test]
    fn test_first_match_wins() {
        let policy = AccessPolicy::new()
            .rule(PathPattern::exact("/a/b"), Requirement::Permit)
            .rule(PathPattern::prefix("/a"), Requirement::Authority("X".into()));

        assert_eq!(policy.requirement_for("/a/b"), &Requirement::Permit);
        assert_eq!(
            policy.requirement_for("/a/c"),
            &Requirement::Authority("X".into())
        );
    }

    #[test]
    fn test_unmatched_path_needs_authentication() {
        assert_eq!(policy().requirement_for("/auth/me"), &Requirement::Authenticated);
    }

    #[test]
    fn test_prefix_respects_segment_boundary() {
        let pattern = PathPattern::prefix("/auth/users");
        assert!(pattern.matches("/auth/users"));
        assert!(pattern.matches("/auth/users/alice"));
        assert!(!pattern.matches("/auth/usersx"));
    }

    #[test]
    fn test_permit_needs_no_context() {
        assert!(policy().check("/auth/login", None).is_ok());
    }

    #[test]
    fn test_missing_context_is_unauthorized() {
        let err = policy().check("/auth/me", None).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::TokenMissing);
    }

    #[test]
    fn test_empty_authorities_still_pass_authenticated() {
        let bare = AuthContext::new("carol", Vec::<String>::new());
        assert!(policy().check("/auth/me", Some(&bare)).is_ok());
    }

    #[test]
    fn test_missing_authority_is_forbidden() {
        let user = AuthContext::new("bob", ["USER"]);
        let err = policy().check("/auth/users/alice", Some(&user)).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::AccessDenied);
    }

    #[test]
    fn test_authority_is_case_sensitive() {
        let lower = AuthContext::new("bob", ["admin"]);
        assert!(policy().check("/auth/users/alice", Some(&lower)).is_err());

        let admin = AuthContext::new("alice", ["ADMIN"]);
        assert!(policy().check("/auth/users/alice", Some(&admin)).is_ok());
    }
}
