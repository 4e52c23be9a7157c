//! Edge verification at the gateway.
//!
//! Every request entering the platform passes through [`verify_at_edge`]
//! before it is proxied. The chain trusts the signed claims and never
//! touches a store, so it runs inline on the async runtime.

use crate::config::Config;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use common::auth::{
    AuthContext, BearerAuthentication, ClaimsDirectory, ContextResolution, PublicPathBypass,
    RequestHead, TokenRequirement, Verdict, VerificationChain,
};
use common::error::ServiceError;
use common::observability::hash_for_correlation;
use std::sync::Arc;
use tracing::instrument;

/// Verified subject, added to forwarded requests when identity forwarding
/// is on.
pub const X_AUTH_SUBJECT: &str = "x-auth-subject";

/// Comma separated authorities of the verified subject.
pub const X_AUTH_ROLES: &str = "x-auth-roles";

pub struct EdgeVerifier {
    chain: VerificationChain,
    forward_identity: bool,
}

impl EdgeVerifier {
    #[must_use]
    pub fn new(chain: VerificationChain, forward_identity: bool) -> Self {
        Self {
            chain,
            forward_identity,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(edge_chain(config), config.forward_identity)
    }
}

/// Public path → required bearer token → claims as the identity.
#[must_use]
pub fn edge_chain(config: &Config) -> VerificationChain {
    VerificationChain::new("edge")
        .stage(PublicPathBypass::new(config.public_paths.clone()))
        .stage(BearerAuthentication::new(
            config.jwt.secret.clone(),
            config.jwt.clock_skew,
            TokenRequirement::Required,
        ))
        .stage(ContextResolution::new(Arc::new(ClaimsDirectory)))
}

fn strip_identity_headers(headers: &mut HeaderMap) {
    headers.remove(X_AUTH_SUBJECT);
    headers.remove(X_AUTH_ROLES);
}

fn insert_identity_headers(headers: &mut HeaderMap, context: &AuthContext) {
    let roles = context
        .authorities()
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",");

    match (
        HeaderValue::from_str(context.subject()),
        HeaderValue::from_str(&roles),
    ) {
        (Ok(subject), Ok(roles)) => {
            headers.insert(X_AUTH_SUBJECT, subject);
            headers.insert(X_AUTH_ROLES, roles);
        }
        _ => {
            tracing::warn!(
                target: "gateway.edge",
                subject_hash = %hash_for_correlation(context.subject()),
                "Identity not representable as header values, not forwarded"
            );
        }
    }
}

/// Reject unauthenticated requests before they reach an upstream.
///
/// Client-supplied identity headers are always removed, so an upstream only
/// ever sees the ones this gateway sets.
///
/// # Response
///
/// - 401 (`AUTH_010`, `AUTH_011`, `AUTH_012`) when the chain rejects
/// - otherwise the proxied response
#[instrument(skip_all, name = "gateway.edge")]
pub async fn verify_at_edge(
    State(edge): State<Arc<EdgeVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    strip_identity_headers(req.headers_mut());

    match edge.chain.run(RequestHead::from_request(&req)) {
        Verdict::Anonymous => {}
        Verdict::Authenticated(context) => {
            if edge.forward_identity {
                insert_identity_headers(req.headers_mut(), &context);
            }
            req.extensions_mut().insert(context);
        }
        Verdict::Rejected(rejection) => {
            tracing::debug!(
                target: "gateway.edge",
                path = req.uri().path(),
                reason = rejection.as_label(),
                "Rejected at edge"
            );
            return Err(rejection.into());
        }
    }

    Ok(next.run(req).await)
}
