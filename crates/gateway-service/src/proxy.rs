//! Reverse proxy to the upstream services.
//!
//! Requests that passed the edge are forwarded with their path rewritten by
//! the [`RouteTable`]. Hop-by-hop headers are dropped in both directions;
//! everything else, the `Authorization` header included, is passed through
//! so that each service can verify the token again.

use crate::upstream::RouteTable;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use common::error::{ErrorCode, ServiceError};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Largest request body the gateway buffers and forwards (2 MiB).
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [&str; 11] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

pub struct Proxy {
    client: Client,
    routes: RouteTable,
}

impl Proxy {
    /// # Errors
    ///
    /// Returns the client builder error if the TLS backend cannot be
    /// initialised.
    pub fn new(routes: RouteTable, upstream_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(upstream_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!(target: "gateway.proxy", error = %e, "Failed to build HTTP client");
                e
            })?;

        Ok(Self { client, routes })
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

/// Copy `from` without hop-by-hop headers, including any listed in its own
/// `Connection` header.
fn end_to_end_headers(from: &HeaderMap) -> HeaderMap {
    let listed: Vec<HeaderName> = from
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    let mut headers = HeaderMap::with_capacity(from.len());
    for (name, value) in from {
        if HOP_BY_HOP.contains(&name.as_str()) || listed.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Router fallback: forward everything the gateway does not serve itself.
///
/// # Response
///
/// - 404 `RES_002` when no upstream prefix matches
/// - 413 when the body exceeds [`MAX_BODY_BYTES`]
/// - 502 `GW_001` when the upstream cannot be reached or times out
/// - otherwise the upstream's status, headers and body
#[instrument(skip_all, name = "gateway.proxy", fields(upstream))]
pub async fn forward(
    State(proxy): State<Arc<Proxy>>,
    req: Request,
) -> Result<Response, ServiceError> {
    let path = req.uri().path().to_string();
    let Some(target) = proxy.routes.resolve(&path, req.uri().query()) else {
        return Err(ServiceError::with_args(ErrorCode::RouteNotFound, [path]));
    };
    tracing::Span::current().record("upstream", target.upstream);

    let (parts, body) = req.into_parts();
    let Ok(body) = to_bytes(body, MAX_BODY_BYTES).await else {
        tracing::debug!(target: "gateway.proxy", path = %path, "Request body over limit");
        return Ok(StatusCode::PAYLOAD_TOO_LARGE.into_response());
    };

    let upstream_response = proxy
        .client
        .request(parts.method, target.url)
        .headers(end_to_end_headers(&parts.headers))
        .body(body)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(
                target: "gateway.proxy",
                upstream = target.upstream,
                timeout = e.is_timeout(),
                error = %e,
                "Upstream request failed"
            );
            ServiceError::with_args(ErrorCode::UpstreamUnavailable, [target.upstream])
        })?;

    let status = upstream_response.status();
    let headers = end_to_end_headers(upstream_response.headers());
    let bytes = upstream_response.bytes().await.map_err(|e| {
        tracing::warn!(
            target: "gateway.proxy",
            upstream = target.upstream,
            error = %e,
            "Upstream response body failed"
        );
        ServiceError::with_args(ErrorCode::UpstreamUnavailable, [target.upstream])
    })?;

    tracing::debug!(
        target: "gateway.proxy",
        upstream = target.upstream,
        status = status.as_u16(),
        "Proxied"
    );

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
