//! The owned slice of a request that verification looks at.

use crate::jwt::TokenRejection;
use axum::http::{header::AUTHORIZATION, HeaderValue, Request};
use std::fmt;

const BEARER_PREFIX: &str = "Bearer ";

/// Path and `Authorization` header, copied out of the request so that
/// verification can run on another thread without borrowing the request.
#[derive(Clone)]
pub struct RequestHead {
    path: String,
    authorization: Option<HeaderValue>,
}

impl RequestHead {
    #[must_use]
    pub fn new(path: impl Into<String>, authorization: Option<HeaderValue>) -> Self {
        Self {
            path: path.into(),
            authorization,
        }
    }

    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::new(req.uri().path(), req.headers().get(AUTHORIZATION).cloned())
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn has_authorization(&self) -> bool {
        self.authorization.is_some()
    }

    /// Extract the bearer token.
    ///
    /// The scheme must be exactly `Bearer ` (case-sensitive, one space).
    ///
    /// # Errors
    ///
    /// - [`TokenRejection::MalformedHeader`] for another scheme, or for a
    ///   header that is not visible ASCII and does not start with `Bearer `
    /// - [`TokenRejection::Malformed`] for `Bearer ` followed by nothing or
    ///   by bytes that are not visible ASCII
    pub fn bearer_token(&self) -> Result<Option<&str>, TokenRejection> {
        let Some(value) = &self.authorization else {
            return Ok(None);
        };

        let value = value.to_str().map_err(|_| {
            tracing::debug!(target: "common.auth", "Authorization header is not valid ASCII");
            if value.as_bytes().starts_with(BEARER_PREFIX.as_bytes()) {
                TokenRejection::Malformed
            } else {
                TokenRejection::MalformedHeader
            }
        })?;

        let token = value.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
            tracing::debug!(target: "common.auth", "Invalid Authorization header format");
            TokenRejection::MalformedHeader
        })?;

        if token.trim().is_empty() {
            tracing::debug!(target: "common.auth", "Empty bearer token");
            return Err(TokenRejection::Malformed);
        }

        Ok(Some(token))
    }
}

impl fmt::Debug for RequestHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHead")
            .field("path", &self.path)
            .field("authorization", &self.authorization.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
