//! HTTP routes for the auth service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::directory::StoreDirectory;
use crate::handlers;
use crate::repositories::CredentialStore;
use crate::services::password::PasswordHasher;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use common::auth::{
    enforce_access_policy, verify_locally, AccessPolicy, BearerAuthentication, ContextResolution,
    PathPattern, PublicPathBypass, PublicPaths, Requirement, SubjectConsistency, TokenRequirement,
    VerificationChain,
};
use common::error::{error_boundary, route_not_found, ServiceError};
use common::jwt::TokenIssuer;
use common::observability::health::health_check;
use common::observability::metrics::{http_metrics, metrics_handler};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Service label for HTTP metrics.
pub const SERVICE_NAME: &str = "auth";

/// Authority required by the account lookup route.
pub const ADMIN_AUTHORITY: &str = "ADMIN";

/// Paths reachable without a token.
pub const PUBLIC_PATHS: [&str; 4] = [
    "/auth/register",
    "/auth/login",
    "/actuator/health",
    "/metrics",
];

/// Application state shared across all handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn CredentialStore>,
    pub issuer: TokenIssuer,
    pub passwords: PasswordHasher,
}

impl AppState {
    /// Derives the token issuer and the password hasher from `config`. The
    /// hasher's dummy hash is computed here, once, at the configured cost.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the dummy hash cannot be computed.
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self, ServiceError> {
        let issuer = config.jwt.issuer();
        let passwords = PasswordHasher::new(config.bcrypt_cost)?;
        Ok(Self {
            config,
            store,
            issuer,
            passwords,
        })
    }
}

/// Local verifier: tokens are re-checked against the credential store so
/// that deleted or renamed accounts lose access at once.
#[must_use]
pub fn verification_chain(state: &AppState) -> VerificationChain {
    VerificationChain::new("local")
        .stage(PublicPathBypass::new(PublicPaths::new(PUBLIC_PATHS)))
        .stage(BearerAuthentication::new(
            state.config.jwt.secret.clone(),
            state.config.jwt.clock_skew,
            TokenRequirement::Optional,
        ))
        .stage(ContextResolution::new(Arc::new(StoreDirectory::new(
            state.store.clone(),
        ))))
        .stage(SubjectConsistency)
}

#[must_use]
pub fn access_policy() -> AccessPolicy {
    PUBLIC_PATHS
        .iter()
        .fold(AccessPolicy::new(), |policy, path| {
            policy.rule(PathPattern::exact(*path), Requirement::Permit)
        })
        .rule(
            PathPattern::prefix("/auth/users"),
            Requirement::Authority(ADMIN_AUTHORITY.to_string()),
        )
}

/// Build the application routes.
///
/// - `POST /auth/register`, `POST /auth/login` - public
/// - `GET /auth/me` - authenticated
/// - `GET /auth/users/:username` - authority `ADMIN`
/// - `GET /actuator/health`, `GET /metrics` - public
///
/// Layer order (outermost first): HTTP metrics, error boundary, panic
/// catcher, 30 second timeout, tracing, local verification, access policy.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let chain = Arc::new(verification_chain(&state));
    let policy = Arc::new(access_policy());

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .route("/auth/register", post(handlers::handle_register))
        .route("/auth/login", post(handlers::handle_login))
        .route("/auth/me", get(handlers::handle_me))
        .route("/auth/users/:username", get(handlers::handle_get_user))
        .route("/actuator/health", get(health_check))
        .with_state(state)
        .merge(metrics_routes)
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(policy, enforce_access_policy))
        .layer(middleware::from_fn_with_state(chain, verify_locally))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn(error_boundary))
        .layer(middleware::from_fn_with_state(SERVICE_NAME, http_metrics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryCredentialStore;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use common::auth::AuthContext;
    use common::observability::metrics::detached_metrics_handle;
    use http_body_util::BodyExt;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn app() -> Router {
        let vars = HashMap::from([(
            "JWT_SECRET".to_string(),
            "auth-routes-test-secret-long-enough-0001".to_string(),
        )]);
        let config = Config::from_vars(&vars).unwrap();
        let state = Arc::new(
            AppState::new(config, Arc::new(InMemoryCredentialStore::new())).unwrap(),
        );
        build_routes(state, detached_metrics_handle())
    }

    #[test]
    fn test_public_paths_are_permitted() {
        let policy = access_policy();
        for path in PUBLIC_PATHS {
            assert!(policy.check(path, None).is_ok(), "{path}");
        }
    }

    #[test]
    fn test_user_lookup_requires_admin() {
        let policy = access_policy();
        let user = AuthContext::new("bob", ["USER"]);
        let admin = AuthContext::new("alice", ["ADMIN"]);

        assert!(policy.check("/auth/users/alice", Some(&user)).is_err());
        assert!(policy.check("/auth/users/alice", Some(&admin)).is_ok());
    }

    #[test]
    fn test_me_requires_authentication() {
        assert!(access_policy().check("/auth/me", None).is_err());
    }

    #[tokio::test]
    async fn test_missing_token_carries_bearer_challenge() {
        let request = Request::builder()
            .uri("/auth/me")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(challenge.starts_with("Bearer"));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "AUTH_010");
        assert_eq!(body["path"], "/auth/me");
    }
}
