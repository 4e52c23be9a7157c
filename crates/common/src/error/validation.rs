//! Field-level request validation.
//!
//! Handlers collect every failing field into [`FieldErrors`] and convert the
//! result into a single [`ServiceError::Validation`], which renders as a 400
//! with a `fieldErrors` map.

use super::ServiceError;
use std::collections::BTreeMap;

pub const MUST_NOT_BE_BLANK: &str = "must not be blank";
pub const MUST_BE_EMAIL: &str = "must be a well-formed email address";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`. The first message recorded for a field
    /// is kept.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    /// Record [`MUST_NOT_BE_BLANK`] when the value is absent or whitespace.
    /// Returns the trimmed value when present.
    pub fn require<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.add(field, MUST_NOT_BE_BLANK);
                None
            }
        }
    }

    /// Record `message` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.add(field, message);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing failed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] carrying every recorded failure.
    pub fn into_result(self) -> Result<(), ServiceError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation {
                field_errors: self.0,
            })
        }
    }
}

/// Basic structural email check: one `@`, non-empty local part, and a
/// dotted domain without empty labels.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
    }

    #[test]
    fn test_invalid_emails() {
        for email in [
            "",
            "alice",
            "@example.com",
            "alice@",
            "alice@example",
            "alice@example.",
            "alice@@example.com",
            "al ice@example.com",
            "a@b@c.com",
        ] {
            assert!(!is_valid_email(email), "{email:?} should be rejected");
        }
    }

    #[test]
    fn test_require_trims_and_flags_blank() {
        let mut errors = FieldErrors::new();

        assert_eq!(errors.require("firstName", Some("  Ann ")), Some("Ann"));
        assert_eq!(errors.require("lastName", Some("   ")), None);
        assert_eq!(errors.require("email", None), None);

        let Err(ServiceError::Validation { field_errors }) = errors.into_result() else {
            panic!("expected validation error");
        };
        assert_eq!(field_errors.len(), 2);
        assert_eq!(
            field_errors.get("lastName").map(String::as_str),
            Some(MUST_NOT_BE_BLANK)
        );
    }

    #[test]
    fn test_first_message_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.add("email", MUST_NOT_BE_BLANK);
        errors.check(false, "email", MUST_BE_EMAIL);

        let Err(ServiceError::Validation { field_errors }) = errors.into_result() else {
            panic!("expected validation error");
        };
        assert_eq!(
            field_errors.get("email").map(String::as_str),
            Some(MUST_NOT_BE_BLANK)
        );
    }

    #[test]
    fn test_empty_is_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
