//! Secret types for values that must never reach a log line.
//!
//! Passwords, bearer tokens and the token signing secret are wrapped in the
//! [`secrecy`] types re-exported here. Their `Debug` output is redacted, so a
//! struct that derives `Debug` stays safe to trace, and the inner value is
//! zeroized on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginAttempt {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let attempt = LoginAttempt {
//!     username: "alice".to_string(),
//!     password: SecretString::from("correct horse"),
//! };
//!
//! assert!(!format!("{attempt:?}").contains("correct horse"));
//! assert_eq!(attempt.password.expose_secret(), "correct horse");
//! ```
//!
//! Request bodies deserialize straight into `SecretString` (the `serde`
//! feature of `secrecy` is enabled at the workspace level).

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
