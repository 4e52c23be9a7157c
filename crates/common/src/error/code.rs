//! Closed catalog of client-facing error codes.
//!
//! Each variant carries a stable wire code, a short title (the `error` field
//! of the response body), a message template with positional `{0}`, `{1}`
//! placeholders, and the HTTP status it maps to.

use axum::http::StatusCode;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Authentication and account errors
    UserNotFound,
    InvalidCredentials,
    UsernameAlreadyExists,
    EmailAlreadyExists,
    InvalidEmailFormat,
    WeakPassword,
    TokenMissing,
    TokenInvalid,
    TokenExpired,
    AccessDenied,

    // Request validation errors
    ValidationFailed,
    FieldRequired,
    MalformedRequest,

    // Resource errors
    ResourceNotFound,
    RouteNotFound,

    // Storage errors
    DataIntegrityViolation,
    DatabaseError,

    // Gateway errors
    UpstreamUnavailable,

    // Catch-all
    InternalError,
}

impl ErrorCode {
    /// Stable machine-readable code, e.g. `AUTH_003`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UserNotFound => "AUTH_001",
            Self::InvalidCredentials => "AUTH_002",
            Self::UsernameAlreadyExists => "AUTH_003",
            Self::EmailAlreadyExists => "AUTH_004",
            Self::InvalidEmailFormat => "AUTH_005",
            Self::WeakPassword => "AUTH_006",
            Self::TokenMissing => "AUTH_010",
            Self::TokenInvalid => "AUTH_011",
            Self::TokenExpired => "AUTH_012",
            Self::AccessDenied => "AUTH_013",
            Self::ValidationFailed => "VAL_001",
            Self::FieldRequired => "VAL_002",
            Self::MalformedRequest => "VAL_003",
            Self::ResourceNotFound => "RES_001",
            Self::RouteNotFound => "RES_002",
            Self::DataIntegrityViolation => "DB_002",
            Self::DatabaseError => "DB_001",
            Self::UpstreamUnavailable => "GW_001",
            Self::InternalError => "SYS_001",
        }
    }

    /// Short title rendered into the `error` field.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::UserNotFound | Self::ResourceNotFound | Self::RouteNotFound => "Not Found",
            Self::InvalidCredentials | Self::TokenMissing => "Unauthorized",
            Self::TokenInvalid => "Invalid Token",
            Self::TokenExpired => "Token Expired",
            Self::AccessDenied => "Forbidden",
            Self::UsernameAlreadyExists
            | Self::EmailAlreadyExists
            | Self::DataIntegrityViolation => "Conflict",
            Self::InvalidEmailFormat
            | Self::WeakPassword
            | Self::ValidationFailed
            | Self::FieldRequired => "Validation Failed",
            Self::MalformedRequest => "Bad Request",
            Self::UpstreamUnavailable => "Bad Gateway",
            Self::DatabaseError | Self::InternalError => "Internal Server Error",
        }
    }

    /// Message template with positional placeholders.
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::UserNotFound => "User not found with username: {0}",
            Self::InvalidCredentials => "Invalid username or password",
            Self::UsernameAlreadyExists => "Username already exists: {0}",
            Self::EmailAlreadyExists => "Email already registered: {0}",
            Self::InvalidEmailFormat => "Invalid email format: {0}",
            Self::WeakPassword => "Password does not meet security requirements",
            Self::TokenMissing => "Full authentication is required to access this resource",
            Self::TokenInvalid => "The provided token is invalid or malformed.",
            Self::TokenExpired => "Your authentication token has expired. Please log in again.",
            Self::AccessDenied => "Access denied: requires authority {0}",
            Self::ValidationFailed => "Invalid input parameters",
            Self::FieldRequired => "Required field is missing: {0}",
            Self::MalformedRequest => "Malformed request: {0}",
            Self::ResourceNotFound => "{0} not found with {1}: '{2}'",
            Self::RouteNotFound => "No handler for path: {0}",
            Self::DataIntegrityViolation => "A database constraint was violated",
            Self::DatabaseError => "Database operation failed",
            Self::UpstreamUnavailable => "Upstream service unavailable: {0}",
            Self::InternalError => "An unexpected error occurred",
        }
    }

    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::UserNotFound | Self::ResourceNotFound | Self::RouteNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidCredentials
            | Self::TokenMissing
            | Self::TokenInvalid
            | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::UsernameAlreadyExists
            | Self::EmailAlreadyExists
            | Self::DataIntegrityViolation => StatusCode::CONFLICT,
            Self::InvalidEmailFormat
            | Self::WeakPassword
            | Self::ValidationFailed
            | Self::FieldRequired
            | Self::MalformedRequest => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::DatabaseError | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the template, substituting `{i}` with `args[i]`.
    ///
    /// Single pass over the template: substituted text is never re-scanned,
    /// and placeholders without a matching argument are left as-is.
    #[must_use]
    pub fn message<S: AsRef<str>>(self, args: &[S]) -> String {
        let template = self.template();
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let (before, from_open) = rest.split_at(open);
            out.push_str(before);

            let arg = from_open.find('}').and_then(|close| {
                from_open
                    .get(1..close)
                    .and_then(|index| index.parse::<usize>().ok())
                    .and_then(|index| args.get(index))
                    .map(|arg| (arg, close))
            });

            match arg {
                Some((arg, close)) => {
                    out.push_str(arg.as_ref());
                    rest = from_open.get(close + 1..).unwrap_or_default();
                }
                None => {
                    out.push('{');
                    rest = from_open.get(1..).unwrap_or_default();
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}
