//! Metrics shared by every service.
//!
//! All metrics follow Prometheus naming conventions (`_total` suffix for
//! counters, `_seconds` for duration histograms) and carry a `service`
//! label instead of a per-service prefix, since the recording code lives
//! here.
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `service`: gateway, auth, user
//! - `point`: edge, local
//! - `outcome`: authenticated, anonymous, or a rejection label
//! - `flow`: login, register
//! - `status`: the numeric status code on `http_requests_total`, and
//!   success, error or timeout on the duration histogram (request paths are
//!   never labels)

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};

/// Install the global Prometheus recorder and return its handle.
///
/// # Errors
///
/// Returns an error if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )?
        .install_recorder()
}

/// Build a recorder that is not installed globally.
///
/// Used when a process hosts several services (E2E tests) and the global
/// recorder is already taken.
#[must_use]
pub fn detached_metrics_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// `GET /metrics` in Prometheus text format.
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

// ============================================================================
// Verification Metrics
// ============================================================================

/// Record one pass through a verification chain.
///
/// Metric: `auth_verifications_total`
/// Labels: `point`, `outcome`
pub fn record_verification(point: &'static str, outcome: &'static str) {
    counter!("auth_verifications_total", "point" => point, "outcome" => outcome).increment(1);
}

/// Record a token issued by the auth service.
///
/// Metric: `auth_tokens_issued_total`
/// Labels: `flow`
pub fn record_token_issued(flow: &'static str) {
    counter!("auth_tokens_issued_total", "flow" => flow).increment(1);
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Metric: `http_request_duration_seconds`, `http_requests_total`
/// Labels: `service`, `method`, `status` (category on the histogram, code
/// on the counter)
pub fn record_http_request(service: &'static str, method: &str, status_code: u16, duration: Duration) {
    histogram!("http_request_duration_seconds",
        "service" => service,
        "method" => method.to_string(),
        "status" => categorize_status_code(status_code)
    )
    .record(duration.as_secs_f64());

    counter!("http_requests_total",
        "service" => service,
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=399 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Middleware recording every response, including the ones produced by the
/// framework before a handler runs. Installed outermost.
pub async fn http_metrics(State(service): State<&'static str>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;

    record_http_request(service, &method, response.status().as_u16(), start.elapsed());
    response
}
