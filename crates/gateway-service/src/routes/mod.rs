//! HTTP routes for the gateway.

use crate::config::Config;
use crate::edge::{verify_at_edge, EdgeVerifier};
use crate::proxy::{self, Proxy};
use crate::upstream::RouteTable;
use axum::{middleware, routing::get, Router};
use common::error::error_boundary;
use common::observability::health::health_check;
use common::observability::metrics::{http_metrics, metrics_handler};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Service label for HTTP metrics.
pub const SERVICE_NAME: &str = "gateway";

/// Headroom on top of the upstream timeout, so that a slow upstream is
/// reported as `GW_001` before the whole request times out.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Build the gateway router.
///
/// - `GET /actuator/health`, `GET /metrics` - served by the gateway
/// - everything else - edge-verified, then proxied by prefix
///
/// Layer order (outermost first): HTTP metrics, error boundary, panic
/// catcher, request timeout, tracing, edge verification.
///
/// # Errors
///
/// Returns an error if the upstream HTTP client cannot be built.
pub fn build_routes(
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<Router, reqwest::Error> {
    let edge = Arc::new(EdgeVerifier::from_config(config));
    let proxy = Arc::new(Proxy::new(
        RouteTable::from_config(config),
        config.upstream_timeout,
    )?);

    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let router = Router::new()
        .route("/actuator/health", get(health_check))
        .fallback(proxy::forward)
        .with_state(proxy)
        .merge(metrics_routes)
        .layer(middleware::from_fn_with_state(edge, verify_at_edge))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(
            config.upstream_timeout + REQUEST_TIMEOUT_MARGIN,
        ))
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn(error_boundary))
        .layer(middleware::from_fn_with_state(SERVICE_NAME, http_metrics));

    Ok(router)
}
