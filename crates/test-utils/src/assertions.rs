//! Custom test assertions for the uniform error body
//!
//! Every service renders failures as
//! `{timestamp, status, error, message, path, code?, fieldErrors?, traceId?}`.

use serde_json::Value;

/// Assertions over a parsed error body
///
/// # Example
/// ```rust,ignore
/// body.assert_error(401, "AUTH_012")
///     .assert_title("Token Expired")
///     .assert_path("/auth/me");
/// ```
pub trait ErrorBodyAssertions {
    /// Assert every contract field is present, with this status and code.
    fn assert_error(&self, status: u16, code: &str) -> &Self;

    /// Assert the `error` field (the catalog title).
    fn assert_title(&self, title: &str) -> &Self;

    fn assert_message(&self, message: &str) -> &Self;

    fn assert_path(&self, path: &str) -> &Self;

    /// Assert a field error is reported for `field`.
    fn assert_field_error(&self, field: &str) -> &Self;
}

impl ErrorBodyAssertions for Value {
    fn assert_error(&self, status: u16, code: &str) -> &Self {
        for field in ["timestamp", "status", "error", "message", "path"] {
            assert!(
                self.get(field).is_some(),
                "error body is missing `{field}`: {self}"
            );
        }
        assert_eq!(
            self["status"].as_u64(),
            Some(u64::from(status)),
            "unexpected status in {self}"
        );
        assert_eq!(self["code"], code, "unexpected code in {self}");
        self
    }

    fn assert_title(&self, title: &str) -> &Self {
        assert_eq!(self["error"], title, "unexpected title in {self}");
        self
    }

    fn assert_message(&self, message: &str) -> &Self {
        assert_eq!(self["message"], message, "unexpected message in {self}");
        self
    }

    fn assert_path(&self, path: &str) -> &Self {
        assert_eq!(self["path"], path, "unexpected path in {self}");
        self
    }

    fn assert_field_error(&self, field: &str) -> &Self {
        assert!(
            self["fieldErrors"].get(field).is_some(),
            "no field error for `{field}` in {self}"
        );
        self
    }
}
