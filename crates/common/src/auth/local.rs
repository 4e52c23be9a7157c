//! Service-local verification middleware.
//!
//! Every downstream service re-verifies the bearer token itself, so a
//! request that reaches it around the gateway is held to the same rules.

use super::chain::{VerificationChain, Verdict};
use super::request::RequestHead;
use crate::error::ServiceError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// Run the service's verification chain and install the resulting
/// [`AuthContext`](super::AuthContext) in the request extensions.
///
/// The chain runs on a blocking thread because its directory lookup may
/// block on the service's store.
///
/// # Response
///
/// - 401 (`AUTH_010`, `AUTH_011`, `AUTH_012`) when the chain rejects
/// - 500 when the directory lookup failed
/// - otherwise the inner service's response, with or without a context
#[instrument(skip_all, name = "common.auth.local")]
pub async fn verify_locally(
    State(chain): State<Arc<VerificationChain>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let head = RequestHead::from_request(&req);

    let verdict = tokio::task::spawn_blocking(move || chain.run(head))
        .await
        .map_err(|e| ServiceError::internal(format!("verification task failed: {e}")))?;

    match verdict {
        Verdict::Anonymous => {}
        Verdict::Authenticated(context) => {
            req.extensions_mut().insert(context);
        }
        Verdict::Rejected(rejection) => return Err(rejection.into()),
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::context::AuthContext;
    use crate::auth::directory::ClaimsDirectory;
    use crate::auth::public_paths::PublicPaths;
    use crate::auth::stages::{
        BearerAuthentication, ContextResolution, PublicPathBypass, SubjectConsistency,
        TokenRequirement,
    };
    use crate::error::error_boundary;
    use crate::jwt::{SigningSecret, TokenIssuer, DEFAULT_CLOCK_SKEW};
    use axum::{
        body::Body,
        http::{header, StatusCode},
        middleware::{from_fn, from_fn_with_state},
        routing::get,
        Extension, Router,
    };
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn secret() -> Arc<SigningSecret> {
        Arc::new(SigningSecret::from_bytes(vec![4u8; 32]).unwrap())
    }

    async fn whoami(context: Option<Extension<AuthContext>>) -> String {
        context.map_or_else(|| "nobody".to_string(), |Extension(c)| c.subject().to_string())
    }

    fn app() -> Router {
        let chain = VerificationChain::new("local")
            .stage(PublicPathBypass::new(PublicPaths::new(["/open"])))
            .stage(BearerAuthentication::new(
                secret(),
                DEFAULT_CLOCK_SKEW,
                TokenRequirement::Optional,
            ))
            .stage(ContextResolution::new(Arc::new(ClaimsDirectory)))
            .stage(SubjectConsistency);

        Router::new()
            .route("/me", get(whoami))
            .route("/open", get(whoami))
            .layer(from_fn_with_state(Arc::new(chain), verify_locally))
            .layer(from_fn(error_boundary))
    }

    async fn call(uri: &str, authorization: Option<String>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_valid_token_installs_context() {
        let token = TokenIssuer::new(secret(), Duration::from_secs(60))
            .issue("alice", vec!["USER".into()])
            .unwrap()
            .token;

        let (status, body) = call("/me", Some(format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice");
    }

    #[tokio::test]
    async fn test_no_token_reaches_handler_without_context() {
        let (status, body) = call("/me", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "nobody");
    }

    #[tokio::test]
    async fn test_invalid_token_is_rendered_as_error_contract() {
        let (status, body) = call("/me", Some("Bearer not-a-jwt".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["code"], "AUTH_011");
        assert_eq!(json["error"], "Invalid Token");
        assert_eq!(json["path"], "/me");
    }

    #[tokio::test]
    async fn test_public_path_ignores_invalid_token() {
        let (status, body) = call("/open", Some("Bearer not-a-jwt".into())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "nobody");
    }
}
