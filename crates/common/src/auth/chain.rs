//! Ordered verification stages, composed once at startup.
//!
//! A [`VerificationChain`] runs its stages in order over an [`Exchange`].
//! Each stage either continues, stops the chain and lets the request
//! through, or rejects it. The chain never awaits: the gateway runs it
//! inline on the async runtime, downstream services run it on a blocking
//! thread.

use super::context::AuthContext;
use super::request::RequestHead;
use crate::error::{ErrorCode, ServiceError};
use crate::jwt::{Claims, TokenRejection};
use crate::observability::metrics::record_verification;
use thiserror::Error;

/// Why a chain rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error(transparent)]
    Token(#[from] TokenRejection),

    /// The token verified but its subject no longer exists.
    #[error("subject no longer resolves to an account")]
    UnknownSubject,

    /// The resolved identity is not the one the token names.
    #[error("resolved identity does not match token subject")]
    SubjectMismatch,

    /// The directory lookup failed.
    #[error("subject directory unavailable")]
    DirectoryUnavailable,
}

impl Rejection {
    #[must_use]
    pub fn error_code(self) -> ErrorCode {
        match self {
            Rejection::Token(TokenRejection::Missing) => ErrorCode::TokenMissing,
            Rejection::Token(TokenRejection::Expired) => ErrorCode::TokenExpired,
            Rejection::Token(_) | Rejection::UnknownSubject | Rejection::SubjectMismatch => {
                ErrorCode::TokenInvalid
            }
            Rejection::DirectoryUnavailable => ErrorCode::InternalError,
        }
    }

    #[must_use]
    pub fn as_label(self) -> &'static str {
        match self {
            Rejection::Token(reason) => reason.as_label(),
            Rejection::UnknownSubject => "unknown_subject",
            Rejection::SubjectMismatch => "subject_mismatch",
            Rejection::DirectoryUnavailable => "directory_unavailable",
        }
    }
}

impl From<Rejection> for ServiceError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::DirectoryUnavailable => ServiceError::internal(rejection.to_string()),
            other => ServiceError::code(other.error_code()),
        }
    }
}

/// Mutable state threaded through the stages of one chain run.
#[derive(Debug)]
pub struct Exchange {
    head: RequestHead,
    now: i64,
    claims: Option<Claims>,
    context: Option<AuthContext>,
}

impl Exchange {
    #[must_use]
    pub fn new(head: RequestHead, now: i64) -> Self {
        Self {
            head,
            now,
            claims: None,
            context: None,
        }
    }

    #[must_use]
    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// Verification time (Unix seconds), fixed for the whole run.
    #[must_use]
    pub fn now(&self) -> i64 {
        self.now
    }

    #[must_use]
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    pub fn set_claims(&mut self, claims: Claims) {
        self.claims = Some(claims);
    }

    #[must_use]
    pub fn context(&self) -> Option<&AuthContext> {
        self.context.as_ref()
    }

    pub fn set_context(&mut self, context: AuthContext) {
        self.context = Some(context);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Run the next stage.
    Continue,
    /// Stop the chain and let the request through as it stands.
    Skip,
    /// Stop the chain and reject the request.
    Reject(Rejection),
}

pub trait VerificationStage: Send + Sync {
    /// Stable name for logs.
    fn name(&self) -> &'static str;

    fn apply(&self, exchange: &mut Exchange) -> StageOutcome;
}

/// Result of a full chain run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Let the request through without an authentication context.
    Anonymous,
    /// Let the request through with this context installed.
    Authenticated(AuthContext),
    Rejected(Rejection),
}

impl Verdict {
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Verdict::Anonymous => "anonymous",
            Verdict::Authenticated(_) => "authenticated",
            Verdict::Rejected(rejection) => rejection.as_label(),
        }
    }
}

pub struct VerificationChain {
    point: &'static str,
    stages: Vec<Box<dyn VerificationStage>>,
}

impl VerificationChain {
    /// `point` names the enforcement point in logs and metrics (`edge`,
    /// `local`).
    #[must_use]
    pub fn new(point: &'static str) -> Self {
        Self {
            point,
            stages: Vec::new(),
        }
    }

    /// Append a stage. Stages run in insertion order.
    #[must_use]
    pub fn stage(mut self, stage: impl VerificationStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    #[must_use]
    pub fn point(&self) -> &'static str {
        self.point
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|s| s.name())
    }

    #[must_use]
    pub fn run(&self, head: RequestHead) -> Verdict {
        self.run_at(head, chrono::Utc::now().timestamp())
    }

    /// Deterministic run against an explicit `now` (Unix seconds).
    #[must_use]
    pub fn run_at(&self, head: RequestHead, now: i64) -> Verdict {
        let mut exchange = Exchange::new(head, now);
        let mut rejected = None;

        for stage in &self.stages {
            match stage.apply(&mut exchange) {
                StageOutcome::Continue => {}
                StageOutcome::Skip => break,
                StageOutcome::Reject(rejection) => {
                    tracing::debug!(
                        target: "common.auth",
                        point = self.point,
                        stage = stage.name(),
                        path = exchange.head().path(),
                        reason = %rejection,
                        "Request rejected"
                    );
                    rejected = Some(rejection);
                    break;
                }
            }
        }

        let verdict = match (rejected, exchange.context) {
            (Some(rejection), _) => Verdict::Rejected(rejection),
            (None, Some(context)) => Verdict::Authenticated(context),
            (None, None) => Verdict::Anonymous,
        };

        record_verification(self.point, verdict.as_label());
        verdict
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed(StageOutcome, Arc<AtomicUsize>);

    impl VerificationStage for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn apply(&self, _exchange: &mut Exchange) -> StageOutcome {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.clone()
        }
    }

    struct Install;

    impl VerificationStage for Install {
        fn name(&self) -> &'static str {
            "install"
        }

        fn apply(&self, exchange: &mut Exchange) -> StageOutcome {
            exchange.set_context(AuthContext::new("alice", ["USER"]));
            StageOutcome::Continue
        }
    }

    fn head() -> RequestHead {
        RequestHead::new("/me", None)
    }

    #[test]
    fn test_empty_chain_is_anonymous() {
        assert_eq!(VerificationChain::new("local").run_at(head(), 0), Verdict::Anonymous);
    }

    #[test]
    fn test_rejection_stops_the_chain() {
        let after = Arc::new(AtomicUsize::new(0));
        let chain = VerificationChain::new("edge")
            .stage(Fixed(
                StageOutcome::Reject(Rejection::Token(TokenRejection::Expired)),
                Arc::new(AtomicUsize::new(0)),
            ))
            .stage(Fixed(StageOutcome::Continue, after.clone()));

        assert_eq!(
            chain.run_at(head(), 0),
            Verdict::Rejected(Rejection::Token(TokenRejection::Expired))
        );
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_skip_stops_the_chain_without_rejecting() {
        let after = Arc::new(AtomicUsize::new(0));
        let chain = VerificationChain::new("local")
            .stage(Fixed(StageOutcome::Skip, Arc::new(AtomicUsize::new(0))))
            .stage(Fixed(
                StageOutcome::Reject(Rejection::UnknownSubject),
                after.clone(),
            ));

        assert_eq!(chain.run_at(head(), 0), Verdict::Anonymous);
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_installed_context_is_returned() {
        let chain = VerificationChain::new("local").stage(Install);

        assert_eq!(
            chain.run_at(head(), 0),
            Verdict::Authenticated(AuthContext::new("alice", ["USER"]))
        );
    }

    #[test]
    fn test_stage_order_is_insertion_order() {
        let chain = VerificationChain::new("local")
            .stage(Install)
            .stage(Fixed(StageOutcome::Continue, Arc::new(AtomicUsize::new(0))));

        assert_eq!(chain.stage_names().collect::<Vec<_>>(), vec!["install", "fixed"]);
    }

    #[test]
    fn test_rejection_codes() {
        assert_eq!(
            Rejection::Token(TokenRejection::Missing).error_code(),
            ErrorCode::TokenMissing
        );
        assert_eq!(
            Rejection::Token(TokenRejection::Expired).error_code(),
            ErrorCode::TokenExpired
        );
        assert_eq!(
            Rejection::Token(TokenRejection::BadSignature).error_code(),
            ErrorCode::TokenInvalid
        );
        assert_eq!(Rejection::SubjectMismatch.error_code(), ErrorCode::TokenInvalid);
        assert_eq!(
            ServiceError::from(Rejection::DirectoryUnavailable).error_code(),
            ErrorCode::InternalError
        );
    }
}
