//! The built-in verification stages.
//!
//! Gateway chain: [`PublicPathBypass`] → [`BearerAuthentication`]
//! (required) → [`ContextResolution`] over the claims.
//!
//! Service chain: [`PublicPathBypass`] → [`BearerAuthentication`]
//! (optional) → [`ContextResolution`] over the service's directory →
//! [`SubjectConsistency`].

use super::chain::{Exchange, Rejection, StageOutcome, VerificationStage};
use super::directory::SubjectDirectory;
use super::public_paths::PublicPaths;
use crate::jwt::{verify_token_at, SigningSecret, TokenRejection};
use crate::observability::hash_for_correlation;
use std::sync::Arc;
use std::time::Duration;

/// Skip every later stage for allow-listed paths.
#[derive(Debug, Clone)]
pub struct PublicPathBypass {
    paths: PublicPaths,
}

impl PublicPathBypass {
    #[must_use]
    pub fn new(paths: PublicPaths) -> Self {
        Self { paths }
    }
}

impl VerificationStage for PublicPathBypass {
    fn name(&self) -> &'static str {
        "public_path_bypass"
    }

    fn apply(&self, exchange: &mut Exchange) -> StageOutcome {
        if self.paths.contains(exchange.head().path()) {
            tracing::trace!(target: "common.auth", path = exchange.head().path(), "Public path");
            StageOutcome::Skip
        } else {
            StageOutcome::Continue
        }
    }
}

/// Whether a request without a bearer token may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequirement {
    /// No bearer token is a rejection.
    Required,
    /// No bearer token (or another scheme) proceeds without a context and is
    /// left to the access policy.
    Optional,
}

/// Verify the bearer token's signature and lifetime and record its claims.
#[derive(Debug, Clone)]
pub struct BearerAuthentication {
    secret: Arc<SigningSecret>,
    clock_skew: Duration,
    requirement: TokenRequirement,
}

impl BearerAuthentication {
    #[must_use]
    pub fn new(
        secret: Arc<SigningSecret>,
        clock_skew: Duration,
        requirement: TokenRequirement,
    ) -> Self {
        Self {
            secret,
            clock_skew,
            requirement,
        }
    }
}

impl VerificationStage for BearerAuthentication {
    fn name(&self) -> &'static str {
        "bearer_authentication"
    }

    fn apply(&self, exchange: &mut Exchange) -> StageOutcome {
        let token = match (exchange.head().bearer_token(), self.requirement) {
            (Ok(Some(token)), _) => token,
            (Ok(None), TokenRequirement::Required) => {
                return StageOutcome::Reject(TokenRejection::Missing.into())
            }
            // Another scheme belongs to someone else; a presented bearer token
            // that cannot be read is still rejected below.
            (Err(TokenRejection::MalformedHeader) | Ok(None), TokenRequirement::Optional) => {
                return StageOutcome::Skip
            }
            (Err(reason), _) => return StageOutcome::Reject(reason.into()),
        };

        match verify_token_at(token, &self.secret, self.clock_skew, exchange.now()) {
            Ok(claims) => {
                exchange.set_claims(claims);
                StageOutcome::Continue
            }
            Err(reason) => StageOutcome::Reject(reason.into()),
        }
    }
}

/// Install an [`AuthContext`](super::AuthContext) for the verified subject,
/// unless one is already present.
#[derive(Clone)]
pub struct ContextResolution {
    directory: Arc<dyn SubjectDirectory>,
}

impl ContextResolution {
    #[must_use]
    pub fn new(directory: Arc<dyn SubjectDirectory>) -> Self {
        Self { directory }
    }
}

impl VerificationStage for ContextResolution {
    fn name(&self) -> &'static str {
        "context_resolution"
    }

    fn apply(&self, exchange: &mut Exchange) -> StageOutcome {
        if exchange.context().is_some() {
            return StageOutcome::Continue;
        }
        let Some(claims) = exchange.claims() else {
            return StageOutcome::Continue;
        };

        match self.directory.resolve(claims) {
            Ok(Some(context)) => {
                exchange.set_context(context);
                StageOutcome::Continue
            }
            Ok(None) => {
                tracing::debug!(
                    target: "common.auth",
                    subject_hash = %hash_for_correlation(&claims.sub),
                    "Token subject not found"
                );
                StageOutcome::Reject(Rejection::UnknownSubject)
            }
            Err(e) => {
                tracing::error!(target: "common.auth", error = %e, "Subject lookup failed");
                StageOutcome::Reject(Rejection::DirectoryUnavailable)
            }
        }
    }
}

/// Reject when the installed identity is not the token's subject.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectConsistency;

impl VerificationStage for SubjectConsistency {
    fn name(&self) -> &'static str {
        "subject_consistency"
    }

    fn apply(&self, exchange: &mut Exchange) -> StageOutcome {
        match (exchange.claims(), exchange.context()) {
            (Some(claims), Some(context)) if claims.sub != context.subject() => {
                tracing::debug!(
                    target: "common.auth",
                    subject_hash = %hash_for_correlation(&claims.sub),
                    "Token subject does not match resolved identity"
                );
                StageOutcome::Reject(Rejection::SubjectMismatch)
            }
            _ => StageOutcome::Continue,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::chain::{VerificationChain, Verdict};
    use crate::error::ErrorCode;
    use crate::auth::context::AuthContext;
    use crate::auth::directory::{ClaimsDirectory, DirectoryError};
    use crate::auth::request::RequestHead;
    use crate::jwt::{Claims, TokenIssuer, DEFAULT_CLOCK_SKEW};
    use axum::http::HeaderValue;

    const NOW: i64 = 1_700_000_000;

    fn secret() -> Arc<SigningSecret> {
        Arc::new(SigningSecret::from_bytes(vec![9u8; 32]).unwrap())
    }

    fn token_for(subject: &str, roles: &[&str], secret: Arc<SigningSecret>) -> String {
        TokenIssuer::new(secret, Duration::from_secs(3600))
            .issue_at(subject, roles.iter().map(ToString::to_string).collect(), NOW)
            .unwrap()
            .token
    }

    fn head(path: &str, token: Option<&str>) -> RequestHead {
        RequestHead::new(
            path,
            token.map(|t| HeaderValue::from_str(&format!("Bearer {t}")).unwrap()),
        )
    }

    fn raw_head(path: &str, authorization: &'static str) -> RequestHead {
        RequestHead::new(path, Some(HeaderValue::from_static(authorization)))
    }

    fn edge_chain(secret: Arc<SigningSecret>) -> VerificationChain {
        VerificationChain::new("edge")
            .stage(PublicPathBypass::new(PublicPaths::new(["/auth/login"])))
            .stage(BearerAuthentication::new(
                secret,
                DEFAULT_CLOCK_SKEW,
                TokenRequirement::Required,
            ))
            .stage(ContextResolution::new(Arc::new(ClaimsDirectory)))
    }

    fn local_chain(
        secret: Arc<SigningSecret>,
        directory: Arc<dyn SubjectDirectory>,
    ) -> VerificationChain {
        VerificationChain::new("local")
            .stage(PublicPathBypass::new(PublicPaths::new(["/actuator/health"])))
            .stage(BearerAuthentication::new(
                secret,
                DEFAULT_CLOCK_SKEW,
                TokenRequirement::Optional,
            ))
            .stage(ContextResolution::new(directory))
            .stage(SubjectConsistency)
    }

    /// Directory with a fixed answer, standing in for a store lookup.
    struct Answer(Result<Option<AuthContext>, String>);

    impl SubjectDirectory for Answer {
        fn resolve(&self, _claims: &Claims) -> Result<Option<AuthContext>, DirectoryError> {
            self.0.clone().map_err(DirectoryError)
        }
    }

    // -------------------------------------------------------------------------
    // Edge chain
    // -------------------------------------------------------------------------

    #[test]
    fn test_edge_public_path_needs_no_header() {
        let verdict = edge_chain(secret()).run_at(head("/auth/login", None), NOW);
        assert_eq!(verdict, Verdict::Anonymous);
    }

    #[test]
    fn test_edge_public_path_ignores_garbage_token() {
        let verdict = edge_chain(secret()).run_at(head("/auth/login", Some("garbage")), NOW);
        assert_eq!(verdict, Verdict::Anonymous);
    }

    #[test]
    fn test_edge_missing_header_is_rejected() {
        let verdict = edge_chain(secret()).run_at(head("/users/me", None), NOW);
        assert_eq!(verdict, Verdict::Rejected(TokenRejection::Missing.into()));
    }

    #[test]
    fn test_edge_wrong_scheme_is_rejected() {
        let verdict = edge_chain(secret()).run_at(raw_head("/users/me", "Basic YTpi"), NOW);
        assert_eq!(verdict, Verdict::Rejected(TokenRejection::MalformedHeader.into()));
    }

    #[test]
    fn test_edge_valid_token_yields_claims_context() {
        let token = token_for("alice", &["USER", "ADMIN"], secret());
        let verdict = edge_chain(secret()).run_at(head("/users/me", Some(&token)), NOW + 5);

        assert_eq!(
            verdict,
            Verdict::Authenticated(AuthContext::new("alice", ["ADMIN", "USER"]))
        );
    }

    #[test]
    fn test_edge_expired_token_is_rejected() {
        let token = token_for("alice", &[], secret());
        let verdict = edge_chain(secret()).run_at(head("/users/me", Some(&token)), NOW + 3600);
        assert_eq!(verdict, Verdict::Rejected(TokenRejection::Expired.into()));
    }

    #[test]
    fn test_edge_foreign_secret_is_rejected() {
        let foreign = Arc::new(SigningSecret::from_bytes(vec![1u8; 32]).unwrap());
        let token = token_for("alice", &["USER"], foreign);
        let verdict = edge_chain(secret()).run_at(head("/users/me", Some(&token)), NOW);
        assert_eq!(verdict, Verdict::Rejected(TokenRejection::BadSignature.into()));
    }

    // -------------------------------------------------------------------------
    // Local chain
    // -------------------------------------------------------------------------

    #[test]
    fn test_local_no_token_proceeds_without_context() {
        let chain = local_chain(secret(), Arc::new(ClaimsDirectory));
        assert_eq!(chain.run_at(head("/me", None), NOW), Verdict::Anonymous);
    }

    #[test]
    fn test_local_other_scheme_proceeds_without_context() {
        let chain = local_chain(secret(), Arc::new(ClaimsDirectory));
        assert_eq!(chain.run_at(raw_head("/me", "Basic YTpi"), NOW), Verdict::Anonymous);
    }

    #[test]
    fn test_local_empty_bearer_is_rejected() {
        let chain = local_chain(secret(), Arc::new(ClaimsDirectory));
        assert_eq!(
            chain.run_at(raw_head("/me", "Bearer "), NOW),
            Verdict::Rejected(TokenRejection::Malformed.into())
        );
    }

    #[test]
    fn test_local_unreadable_bearer_is_invalid_token() {
        let chain = local_chain(secret(), Arc::new(ClaimsDirectory));
        let value = HeaderValue::from_bytes(b"Bearer \xe9t\xe9.token").unwrap();
        let verdict = chain.run_at(RequestHead::new("/me", Some(value)), NOW);

        let rejection = Rejection::from(TokenRejection::Malformed);
        assert_eq!(verdict, Verdict::Rejected(rejection));
        assert_eq!(rejection.error_code(), ErrorCode::TokenInvalid);
    }

    #[test]
    fn test_local_invalid_token_is_rejected() {
        let chain = local_chain(secret(), Arc::new(ClaimsDirectory));
        assert_eq!(
            chain.run_at(head("/me", Some("a.b.c")), NOW),
            Verdict::Rejected(TokenRejection::Malformed.into())
        );
    }

    #[test]
    fn test_local_public_path_skips_even_invalid_token() {
        let chain = local_chain(secret(), Arc::new(ClaimsDirectory));
        assert_eq!(
            chain.run_at(head("/actuator/health", Some("a.b.c")), NOW),
            Verdict::Anonymous
        );
    }

    #[test]
    fn test_local_deleted_subject_is_rejected() {
        let token = token_for("alice", &["USER"], secret());
        let chain = local_chain(secret(), Arc::new(Answer(Ok(None))));
        assert_eq!(
            chain.run_at(head("/me", Some(&token)), NOW),
            Verdict::Rejected(Rejection::UnknownSubject)
        );
    }

    #[test]
    fn test_local_renamed_subject_is_rejected() {
        let token = token_for("alice", &["USER"], secret());
        let renamed = AuthContext::new("alice2", ["USER"]);
        let chain = local_chain(secret(), Arc::new(Answer(Ok(Some(renamed)))));
        assert_eq!(
            chain.run_at(head("/me", Some(&token)), NOW),
            Verdict::Rejected(Rejection::SubjectMismatch)
        );
    }

    #[test]
    fn test_local_directory_failure_is_rejected() {
        let token = token_for("alice", &["USER"], secret());
        let chain = local_chain(secret(), Arc::new(Answer(Err("pool timed out".into()))));
        assert_eq!(
            chain.run_at(head("/me", Some(&token)), NOW),
            Verdict::Rejected(Rejection::DirectoryUnavailable)
        );
    }

    #[test]
    fn test_local_directory_authorities_win_over_claims() {
        let token = token_for("alice", &["USER"], secret());
        let stored = AuthContext::new("alice", ["USER", "ADMIN"]);
        let chain = local_chain(secret(), Arc::new(Answer(Ok(Some(stored.clone())))));
        assert_eq!(
            chain.run_at(head("/me", Some(&token)), NOW),
            Verdict::Authenticated(stored)
        );
    }

    #[test]
    fn test_context_resolution_keeps_existing_context() {
        let mut exchange = crate::auth::chain::Exchange::new(head("/me", None), NOW);
        exchange.set_claims(Claims {
            sub: "alice".into(),
            roles: vec![],
            iat: NOW,
            exp: NOW + 1,
        });
        exchange.set_context(AuthContext::new("alice", ["PRESET"]));

        let stage = ContextResolution::new(Arc::new(Answer(Err("must not be called".into()))));
        assert_eq!(stage.apply(&mut exchange), StageOutcome::Continue);
        assert!(exchange.context().unwrap().has_authority("PRESET"));
    }

    #[test]
    fn test_same_token_same_verdict() {
        let token = token_for("alice", &["USER"], secret());
        let chain = local_chain(secret(), Arc::new(ClaimsDirectory));

        let first = chain.run_at(head("/me", Some(&token)), NOW + 1);
        let second = chain.run_at(head("/me", Some(&token)), NOW + 1);
        assert_eq!(first, second);
    }
}
