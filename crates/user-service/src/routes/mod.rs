//! HTTP routes for the user service.

use crate::config::Config;
use crate::handlers;
use crate::repositories::ProfileStore;
use axum::{middleware, routing::get, Router};
use common::auth::{
    enforce_access_policy, verify_locally, AccessPolicy, BearerAuthentication, ClaimsDirectory,
    ContextResolution, PathPattern, PublicPathBypass, PublicPaths, Requirement,
    SubjectConsistency, TokenRequirement, VerificationChain,
};
use common::error::{error_boundary, route_not_found};
use common::observability::health::health_check;
use common::observability::metrics::{http_metrics, metrics_handler};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub const SERVICE_NAME: &str = "user";

pub const PUBLIC_PATHS: [&str; 2] = ["/actuator/health", "/metrics"];

/// Application state shared across all handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProfileStore>,
}

/// Local verifier. This service holds no credentials, so the identity and
/// authorities come from the verified claims.
#[must_use]
pub fn verification_chain(config: &Config) -> VerificationChain {
    VerificationChain::new("local")
        .stage(PublicPathBypass::new(PublicPaths::new(PUBLIC_PATHS)))
        .stage(BearerAuthentication::new(
            config.jwt.secret.clone(),
            config.jwt.clock_skew,
            TokenRequirement::Optional,
        ))
        .stage(ContextResolution::new(Arc::new(ClaimsDirectory)))
        .stage(SubjectConsistency)
}

#[must_use]
pub fn access_policy() -> AccessPolicy {
    PUBLIC_PATHS.iter().fold(AccessPolicy::new(), |policy, path| {
        policy.rule(PathPattern::exact(*path), Requirement::Permit)
    })
}

/// Build the application routes.
///
/// - `GET /me`, `POST /me` - authenticated
/// - `GET /actuator/health`, `GET /metrics` - public
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let chain = Arc::new(verification_chain(&state.config));
    let policy = Arc::new(access_policy());

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .route(
            "/me",
            get(handlers::handle_get_me).post(handlers::handle_save_me),
        )
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
