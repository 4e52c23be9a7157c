//! Builder for signed test tokens.
//!
//! Tokens are signed directly with `jsonwebtoken` rather than through the
//! service issuer, so tests can produce what the issuer never would:
//! expired tokens, tokens from the future, foreign signatures.

use crate::fixtures::{FOREIGN_SECRET, TEST_SECRET};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

/// Builder for HS256 test tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_roles(&["USER", "ADMIN"])
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestTokenBuilder {
    sub: String,
    roles: Vec<String>,
    exp: i64,
    iat: i64,
    secret: String,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults: subject `test-subject`,
    /// role `USER`, valid for one hour, signed with [`TEST_SECRET`].
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            roles: vec!["USER".to_string()],
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            secret: TEST_SECRET.to_string(),
        }
    }

    /// Set the subject (username)
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(ToString::to_string).collect();
        self
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Issued two hours ago, expired one hour ago.
    pub fn expired(mut self) -> Self {
        let now = Utc::now();
        self.iat = (now - Duration::seconds(7200)).timestamp();
        self.exp = (now - Duration::seconds(3600)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Sign with [`FOREIGN_SECRET`].
    pub fn foreign(self) -> Self {
        self.signed_with(FOREIGN_SECRET)
    }

    /// Build the claims as a JSON value
    pub fn claims(&self) -> serde_json::Value {
        json!({
            "sub": self.sub,
            "roles": self.roles,
            "exp": self.exp,
            "iat": self.iat,
        })
    }

    /// Sign and serialize the token.
    pub fn build(self) -> String {
        encode(
            &Header::default(),
            &self.claims(),
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("HS256 signing of test claims cannot fail")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::jwt::{verify_token, SigningSecret, TokenRejection, DEFAULT_CLOCK_SKEW};

    fn secret(raw: &str) -> SigningSecret {
        SigningSecret::from_bytes(raw.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_built_token_verifies_with_test_secret() {
        let token = TestTokenBuilder::new()
            .for_user("alice")
            .with_roles(&["USER", "ADMIN"])
            .build();

        let claims = verify_token(&token, &secret(TEST_SECRET), DEFAULT_CLOCK_SKEW).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, vec!["USER", "ADMIN"]);
    }

    #[test]
    fn test_expired_and_foreign_tokens_fail() {
        let expired = TestTokenBuilder::new().expired().build();
        assert_eq!(
            verify_token(&expired, &secret(TEST_SECRET), DEFAULT_CLOCK_SKEW),
            Err(TokenRejection::Expired)
        );

        let foreign = TestTokenBuilder::new().foreign().build();
        assert_eq!(
            verify_token(&foreign, &secret(TEST_SECRET), DEFAULT_CLOCK_SKEW),
            Err(TokenRejection::BadSignature)
        );
    }
}
