//! Boundary translator: the single place where failures become HTTP bodies.
//!
//! [`error_boundary`] is installed as the outermost layer of every service.
//! It renders two kinds of responses into the uniform [`ErrorResponse`]:
//!
//! - responses carrying a [`PendingError`] extension (every `ServiceError`
//!   and every verifier rejection), rendered with the request path
//! - bare framework error responses (unknown route, wrong method, timeout,
//!   caught panic, extractor rejections) that have no JSON body
//!
//! JSON error bodies produced elsewhere (for example relayed by the gateway
//! from an upstream service) pass through untouched.

use super::code::ErrorCode;
use super::response::ErrorResponse;
use super::service::{ServiceError, StorageError};
use axum::{
    body::Body,
    extract::Request,
    http::{header, response::Parts, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

const BEARER_CHALLENGE: &str = "Bearer realm=\"next-episode\"";
const BEARER_INVALID_TOKEN: &str = "Bearer realm=\"next-episode\", error=\"invalid_token\"";

/// An error that has been classified but not yet rendered.
#[derive(Debug, Clone)]
pub struct PendingError {
    status: StatusCode,
    code: Option<ErrorCode>,
    title: String,
    message: String,
    field_errors: Option<BTreeMap<String, String>>,
    trace_id: Option<String>,
}

impl PendingError {
    #[must_use]
    pub fn from_code<S: AsRef<str>>(code: ErrorCode, args: &[S]) -> Self {
        Self {
            status: code.status(),
            code: Some(code),
            title: code.title().to_string(),
            message: code.message(args),
            field_errors: None,
            trace_id: None,
        }
    }

    /// Log `detail` under a fresh trace id and hide it from the client.
    fn unhandled(code: ErrorCode, detail: &str) -> Self {
        let trace_id = Uuid::new_v4().to_string();
        tracing::error!(
            target: "common.error",
            trace_id = %trace_id,
            code = code.code(),
            error = %detail,
            "Unhandled failure"
        );
        Self {
            trace_id: Some(trace_id),
            ..Self::from_code::<&str>(code, &[])
        }
    }

    /// Classification for a framework response that carries no JSON body.
    fn for_bare_status(status: StatusCode, path: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::from_code(ErrorCode::RouteNotFound, &[path]),
            StatusCode::INTERNAL_SERVER_ERROR => Self::unhandled(
                ErrorCode::InternalError,
                "handler produced a 500 without an error body",
            ),
            _ => {
                let reason = status.canonical_reason().unwrap_or("Error");
                Self {
                    status,
                    code: None,
                    title: reason.to_string(),
                    message: reason.to_string(),
                    field_errors: None,
                    trace_id: None,
                }
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    #[must_use]
    pub fn render(&self, path: &str) -> ErrorResponse {
        ErrorResponse {
            timestamp: Utc::now(),
            status: self.status.as_u16(),
            error: self.title.clone(),
            message: self.message.clone(),
            path: path.to_string(),
            code: self.code.map(|c| c.code().to_string()),
            field_errors: self.field_errors.clone(),
            trace_id: self.trace_id.clone(),
        }
    }

    fn challenge(&self) -> Option<&'static str> {
        match self.code {
            _ if self.status != StatusCode::UNAUTHORIZED => None,
            Some(ErrorCode::TokenInvalid | ErrorCode::TokenExpired) => Some(BEARER_INVALID_TOKEN),
            _ => Some(BEARER_CHALLENGE),
        }
    }

    /// Replace the body of `parts` with the rendered error.
    fn respond(self, path: &str, mut parts: Parts) -> Response {
        let body = match serde_json::to_vec(&self.render(path)) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(target: "common.error", error = %e, "Failed to serialize error body");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        parts.status = self.status;
        parts.headers.remove(header::CONTENT_LENGTH);
        parts.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(challenge) = self.challenge() {
            parts
                .headers
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }

        Response::from_parts(parts, Body::from(body))
    }
}

impl From<ServiceError> for PendingError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain { code, args } => Self::from_code(code, args.as_slice()),
            ServiceError::Validation { field_errors } => Self {
                field_errors: Some(field_errors),
                ..Self::from_code::<&str>(ErrorCode::ValidationFailed, &[])
            },
            ServiceError::Storage(StorageError::UniqueViolation {
                constraint,
                message,
            }) => {
                tracing::warn!(
                    target: "common.error",
                    constraint = constraint.as_deref().unwrap_or("unknown"),
                    error = %message,
                    "Unclassified constraint violation"
                );
                Self::from_code::<&str>(ErrorCode::DataIntegrityViolation, &[])
            }
            ServiceError::Storage(StorageError::Backend(detail)) => {
                Self::unhandled(ErrorCode::DatabaseError, &detail)
            }
            ServiceError::Internal(detail) => Self::unhandled(ErrorCode::InternalError, &detail),
        }
    }
}

impl IntoResponse for PendingError {
    /// Renders without a path. The boundary re-renders it with the request
    /// path, so this body is only seen when the boundary is not installed.
    fn into_response(self) -> Response {
        let (parts, ()) = Response::new(()).into_parts();
        let mut response = self.clone().respond("", parts);
        response.extensions_mut().insert(self);
        response
    }
}

fn has_json_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json") || ct.contains("+json"))
}

/// Render any error response into the uniform JSON contract.
pub async fn error_boundary(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    finalize(response, &path)
}

fn finalize(response: Response, path: &str) -> Response {
    let (mut parts, body) = response.into_parts();

    if let Some(pending) = parts.extensions.remove::<PendingError>() {
        return pending.respond(path, parts);
    }

    let is_error = parts.status.is_client_error() || parts.status.is_server_error();
    if is_error && !has_json_body(&parts.headers) {
        return PendingError::for_bare_status(parts.status, path).respond(path, parts);
    }

    Response::from_parts(parts, body)
}

/// Router fallback for paths no route matches.
pub async fn route_not_found(uri: Uri) -> ServiceError {
    ServiceError::with_args(ErrorCode::RouteNotFound, [uri.path()])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn body_of(response: Response) -> ErrorResponse {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn expired() -> ServiceError {
        ServiceError::code(ErrorCode::TokenExpired)
    }

    async fn duplicate() -> ServiceError {
        ServiceError::with_args(ErrorCode::UsernameAlreadyExists, ["alice"])
    }

    async fn database_down() -> ServiceError {
        ServiceError::Storage(StorageError::Backend("connection refused to 10.0.0.5".into()))
    }

    async fn bare_teapot() -> StatusCode {
        StatusCode::IM_A_TEAPOT
    }

    async fn relayed_json() -> Response {
        (
            StatusCode::CONFLICT,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"upstream":true}"#,
        )
            .into_response()
    }

    fn app() -> Router {
        Router::new()
            .route("/expired", get(expired))
            .route("/duplicate", get(duplicate))
            .route("/db", get(database_down))
            .route("/teapot", get(bare_teapot))
            .route("/relayed", get(relayed_json))
            .route("/ok", get(|| async { "fine" }))
            .fallback(route_not_found)
            .layer(middleware::from_fn(error_boundary))
    }

    async fn call(method: &str, uri: &str) -> Response {
        app()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_domain_error_is_rendered_with_path() {
        let response = call("GET", "/duplicate").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_of(response).await;
        assert_eq!(body.status, 409);
        assert_eq!(body.error, "Conflict");
        assert_eq!(body.message, "Username already exists: alice");
        assert_eq!(body.path, "/duplicate");
        assert_eq!(body.code.as_deref(), Some("AUTH_003"));
    }

    #[tokio::test]
    async fn test_expired_token_carries_challenge() {
        let response = call("GET", "/expired").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(challenge.contains("invalid_token"));

        let body = body_of(response).await;
        assert_eq!(body.error, "Token Expired");
    }

    #[tokio::test]
    async fn test_backend_failure_hides_detail_and_has_trace_id() {
        let response = call("GET", "/db").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(response).await;
        assert_eq!(body.code.as_deref(), Some("DB_001"));
        assert!(!body.message.contains("10.0.0.5"));
        let trace_id = body.trace_id.expect("trace id");
        assert!(Uuid::parse_str(&trace_id).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_route_is_structured() {
        let body = body_of(call("GET", "/nowhere").await).await;
        assert_eq!(body.status, 404);
        assert_eq!(body.code.as_deref(), Some("RES_002"));
        assert_eq!(body.message, "No handler for path: /nowhere");
    }

    #[tokio::test]
    async fn test_wrong_method_is_structured() {
        let response = call("POST", "/ok").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let body = body_of(response).await;
        assert_eq!(body.error, "Method Not Allowed");
        assert_eq!(body.path, "/ok");
        assert!(body.code.is_none());
    }

    #[tokio::test]
    async fn test_bare_status_is_structured() {
        let body = body_of(call("GET", "/teapot").await).await;
        assert_eq!(body.status, 418);
        assert_eq!(body.error, "I'm a teapot");
    }

    #[tokio::test]
    async fn test_json_error_bodies_pass_through() {
        let response = call("GET", "/relayed").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), br#"{"upstream":true}"#);
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let response = call("GET", "/ok").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_validation_error_keeps_field_errors() {
        let pending = PendingError::from(ServiceError::Validation {
            field_errors: BTreeMap::from([("email".to_string(), "bad".to_string())]),
        });
        let body = pending.render("/me");

        assert_eq!(body.status, 400);
        assert_eq!(body.code.as_deref(), Some("VAL_001"));
        assert_eq!(body.field_errors.unwrap().get("email").unwrap(), "bad");
    }
}
