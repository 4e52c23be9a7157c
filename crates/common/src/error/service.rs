//! Domain errors raised by handlers and services.
//!
//! Handlers return `Result<_, ServiceError>`. Converting a `ServiceError`
//! into a response does not pick the final body on its own: it attaches a
//! [`PendingError`] that the boundary middleware renders with the request
//! path. Internal details are logged here and never reach the client.

use super::boundary::PendingError;
use super::code::ErrorCode;
use axum::response::{IntoResponse, Response};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failures surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A uniqueness constraint rejected the write.
    ///
    /// `constraint` is the structured constraint name when the backend
    /// reports one. `message` is the backend's raw text.
    #[error("unique constraint violated: {message}")]
    UniqueViolation {
        constraint: Option<String>,
        message: String,
    },

    /// Any other backend failure (connection, query, decoding).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StorageError::UniqueViolation {
                    constraint: db.constraint().map(ToString::to_string),
                    message: db.message().to_string(),
                };
            }
        }
        StorageError::Backend(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A catalogued failure with its positional message arguments.
    #[error("{}: {}", .code, .code.message(.args.as_slice()))]
    Domain { code: ErrorCode, args: Vec<String> },

    /// Request body failed field validation.
    #[error("validation failed on {} field(s)", .field_errors.len())]
    Validation {
        field_errors: BTreeMap<String, String>,
    },

    /// Unclassified storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Anything unexpected. The detail is logged, never rendered.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    #[must_use]
    pub fn code(code: ErrorCode) -> Self {
        ServiceError::Domain { code, args: vec![] }
    }

    pub fn with_args<I, S>(code: ErrorCode, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ServiceError::Domain {
            code,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ServiceError::Internal(detail.into())
    }

    /// The catalog entry this error renders as.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ServiceError::Domain { code, .. } => *code,
            ServiceError::Validation { .. } => ErrorCode::ValidationFailed,
            ServiceError::Storage(StorageError::UniqueViolation { .. }) => {
                ErrorCode::DataIntegrityViolation
            }
            ServiceError::Storage(StorageError::Backend(_)) => ErrorCode::DatabaseError,
            ServiceError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        PendingError::from(self).into_response()
    }
}

/// Maps structured constraint names to catalog codes for one service.
///
/// Classification prefers the constraint name reported by the storage
/// layer. Only when none is reported does it fall back to scanning the raw
/// message for `username` or `email`.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintCatalog {
    entries: &'static [(&'static str, ErrorCode)],
}

impl ConstraintCatalog {
    #[must_use]
    pub const fn new(entries: &'static [(&'static str, ErrorCode)]) -> Self {
        Self { entries }
    }

    /// Pick the catalog code for a unique violation.
    #[must_use]
    pub fn classify(&self, constraint: Option<&str>, message: &str) -> ErrorCode {
        if let Some(name) = constraint {
            return self
                .entries
                .iter()
                .find(|(known, _)| *known == name)
                .map_or(ErrorCode::DataIntegrityViolation, |(_, code)| *code);
        }

        let lowered = message.to_lowercase();
        if lowered.contains("username") {
            ErrorCode::UsernameAlreadyExists
        } else if lowered.contains("email") {
            ErrorCode::EmailAlreadyExists
        } else {
            ErrorCode::DataIntegrityViolation
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const CATALOG: ConstraintCatalog = ConstraintCatalog::new(&[
        ("credentials_username_key", ErrorCode::UsernameAlreadyExists),
        ("credentials_email_key", ErrorCode::EmailAlreadyExists),
    ]);

    #[test]
    fn test_classify_by_constraint_name() {
        assert_eq!(
            CATALOG.classify(Some("credentials_email_key"), "duplicate key"),
            ErrorCode::EmailAlreadyExists
        );
        assert_eq!(
            CATALOG.classify(Some("credentials_username_key"), "duplicate key"),
            ErrorCode::UsernameAlreadyExists
        );
    }

    #[test]
    fn test_constraint_name_wins_over_message_text() {
        // The message mentions username but the constraint says email
        assert_eq!(
            CATALOG.classify(
                Some("credentials_email_key"),
                "Key (email)=(x) conflicts with username policy"
            ),
            ErrorCode::EmailAlreadyExists
        );
    }

    #[test]
    fn test_unknown_constraint_is_generic_conflict() {
        assert_eq!(
            CATALOG.classify(Some("profiles_pkey"), "username"),
            ErrorCode::DataIntegrityViolation
        );
    }

    #[test]
    fn test_message_heuristic_without_constraint() {
        assert_eq!(
            CATALOG.classify(None, "Duplicate entry for USERNAME"),
            ErrorCode::UsernameAlreadyExists
        );
        assert_eq!(
            CATALOG.classify(None, "duplicate email"),
            ErrorCode::EmailAlreadyExists
        );
        assert_eq!(
            CATALOG.classify(None, "duplicate key"),
            ErrorCode::DataIntegrityViolation
        );
    }

    #[test]
    fn test_error_codes_for_variants() {
        assert_eq!(
            ServiceError::code(ErrorCode::InvalidCredentials).error_code(),
            ErrorCode::InvalidCredentials
        );
        assert_eq!(
            ServiceError::Storage(StorageError::Backend("down".into())).error_code(),
            ErrorCode::DatabaseError
        );
        assert_eq!(
            ServiceError::internal("boom").error_code(),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn test_domain_display_renders_message() {
        let err = ServiceError::with_args(ErrorCode::UsernameAlreadyExists, ["alice"]);
        assert_eq!(err.to_string(), "AUTH_003: Username already exists: alice");
    }

    #[test]
    fn test_sqlx_non_database_error_is_backend() {
        let err = StorageError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::Backend(_)));
    }
}
