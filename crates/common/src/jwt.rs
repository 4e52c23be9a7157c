//! JWT issuance and verification shared by every service.
//!
//! Tokens are HS256-signed with a symmetric secret that is distributed
//! read-only to every verifier. There is no server-side session: a token is
//! valid until its `exp`, and the same pure function ([`verify_token`]) is
//! used by the gateway and by every downstream service.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS256 is accepted, the header `alg` cannot downgrade verification
//! - Rejection reasons are logged at debug level, never returned to clients
//! - The `sub` field in [`Claims`] is redacted in Debug output
//! - The signing secret must be at least 256 bits, shorter secrets are a
//!   startup error
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{verify_token, SigningSecret, TokenIssuer, DEFAULT_CLOCK_SKEW};
//!
//! let secret = Arc::new(SigningSecret::from_bytes(raw)?);
//! let issuer = TokenIssuer::new(secret.clone(), Duration::from_secs(3600));
//! let issued = issuer.issue("alice", vec!["USER".to_string()])?;
//!
//! let claims = verify_token(&issued.token, &secret, DEFAULT_CLOCK_SKEW)?;
//! assert_eq!(claims.sub, "alice");
//! ```

use crate::secret::{ExposeSecret, SecretBox};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Typical tokens issued here are 200-300 bytes. Anything larger than this
/// limit is rejected before base64 decoding or HMAC computation.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Minimum signing secret length in bytes (256 bits, the HS256 key size).
pub const MIN_SECRET_BYTES: usize = 32;

/// Default token lifetime (1 hour).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Default JWT clock skew tolerance for the `iat` claim (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while building a signing secret or issuing a token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtError {
    /// The configured secret is shorter than [`MIN_SECRET_BYTES`].
    #[error("Signing secret must be at least {MIN_SECRET_BYTES} bytes, got {actual}")]
    SecretTooShort {
        /// Length of the rejected secret in bytes.
        actual: usize,
    },

    /// Tokens cannot be issued for an empty subject.
    #[error("Token subject must not be empty")]
    EmptySubject,

    /// The JWT library failed to sign the claims.
    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Reasons a presented token is rejected.
///
/// The `Display` text is what operators see in logs. Clients only ever see
/// the catalog message chosen by the boundary translator.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// No `Authorization` header on a request that requires one.
    #[error("missing bearer token")]
    Missing,

    /// `Authorization` header present but not `Bearer <token>`.
    #[error("malformed authorization header")]
    MalformedHeader,

    /// Token exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("token exceeds maximum size")]
    TooLarge,

    /// Not a structurally valid JWT, or claims of the wrong shape.
    #[error("malformed token")]
    Malformed,

    /// Signature does not verify under the shared secret.
    #[error("signature verification failed")]
    BadSignature,

    /// `exp` is at or before the current time.
    #[error("token expired")]
    Expired,

    /// `iat` lies further in the future than the clock skew allows.
    #[error("token issued in the future")]
    IssuedInFuture,

    /// `sub` is empty.
    #[error("token has no subject")]
    MissingSubject,
}

impl TokenRejection {
    /// Bounded label used for metrics.
    #[must_use]
    pub fn as_label(self) -> &'static str {
        match self {
            TokenRejection::Missing => "missing",
            TokenRejection::MalformedHeader => "malformed_header",
            TokenRejection::TooLarge => "too_large",
            TokenRejection::Malformed => "malformed",
            TokenRejection::BadSignature => "bad_signature",
            TokenRejection::Expired => "expired",
            TokenRejection::IssuedInFuture => "iat_in_future",
            TokenRejection::MissingSubject => "missing_subject",
        }
    }
}

// =============================================================================
// Claims Types
// =============================================================================

/// Signed token payload shared by every verifier.
///
/// `roles` may be absent on the wire, in which case it deserializes to an
/// empty list and the bearer gets no authorities.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username) - redacted in Debug output.
    pub sub: String,

    /// Role names, copied verbatim into the authority set.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("roles", &self.roles)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

// =============================================================================
// Signing Secret
// =============================================================================

/// Symmetric HS256 secret, shared read-only by the issuer and all verifiers.
pub struct SigningSecret {
    bytes: SecretBox<Vec<u8>>,
}

impl SigningSecret {
    /// Wrap raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::SecretTooShort`] when fewer than
    /// [`MIN_SECRET_BYTES`] bytes are supplied.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, JwtError> {
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(JwtError::SecretTooShort {
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: SecretBox::new(Box::new(bytes)),
        })
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.bytes.expose_secret())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.bytes.expose_secret())
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Issuance
// =============================================================================

/// A freshly signed token together with its lifetime.
#[derive(Clone)]
pub struct IssuedToken {
    /// Compact JWS serialization.
    pub token: String,
    /// Seconds until `exp`.
    pub expires_in: u64,
    /// The claims that were signed.
    pub claims: Claims,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("claims", &self.claims)
            .finish()
    }
}

/// Creates signed tokens. Holds no per-token state.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    secret: Arc<SigningSecret>,
    ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: Arc<SigningSecret>, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Token lifetime applied to every issued token.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `subject` carrying `roles`, valid from now for the
    /// configured TTL.
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::issue_at`].
    pub fn issue(&self, subject: &str, roles: Vec<String>) -> Result<IssuedToken, JwtError> {
        self.issue_at(subject, roles, chrono::Utc::now().timestamp())
    }

    /// Deterministic issuance against an explicit `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// - [`JwtError::EmptySubject`] if `subject` is empty or whitespace
    /// - [`JwtError::Signing`] if the JWT library fails to sign
    pub fn issue_at(
        &self,
        subject: &str,
        roles: Vec<String>,
        now: i64,
    ) -> Result<IssuedToken, JwtError> {
        if subject.trim().is_empty() {
            return Err(JwtError::EmptySubject);
        }

        // TTL is bounded by configuration validation (at most one day)
        #[allow(clippy::cast_possible_wrap)]
        let ttl_secs = self.ttl.as_secs() as i64;

        let claims = Claims {
            sub: subject.to_string(),
            roles,
            iat: now,
            exp: now + ttl_secs,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.secret.encoding_key(),
        )
        .map_err(|e| {
            tracing::error!(target: "common.jwt", error = %e, "Failed to sign token");
            JwtError::Signing(e.to_string())
        })?;

        Ok(IssuedToken {
            token,
            expires_in: self.ttl.as_secs(),
            claims,
        })
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Verify a compact token against the shared secret at the current time.
///
/// # Errors
///
/// See [`verify_token_at`].
pub fn verify_token(
    token: &str,
    secret: &SigningSecret,
    clock_skew: Duration,
) -> Result<Claims, TokenRejection> {
    verify_token_at(token, secret, clock_skew, chrono::Utc::now().timestamp())
}

/// Deterministic verification against an explicit `now` (Unix seconds).
///
/// Checks run in a fixed order: size, signature and shape, expiry, `iat`
/// skew, subject. Expiry has no leeway: a token whose `exp` equals `now` is
/// already expired. The function is pure, so repeating it with the same
/// inputs always gives the same result.
///
/// # Errors
///
/// Returns the [`TokenRejection`] for the first check that fails.
pub fn verify_token_at(
    token: &str,
    secret: &SigningSecret,
    clock_skew: Duration,
    now: i64,
) -> Result<Claims, TokenRejection> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(TokenRejection::TooLarge);
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let claims = decode::<Claims>(token, &secret.decoding_key(), &validation)
        .map_err(|e| {
            let rejection = match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenRejection::BadSignature
                }
                _ => TokenRejection::Malformed,
            };
            tracing::debug!(target: "common.jwt", error = %e, "Token rejected: {}", rejection);
            rejection
        })?
        .claims;

    if claims.exp <= now {
        tracing::debug!(
            target: "common.jwt",
            exp = claims.exp,
            now = now,
            "Token rejected: expired"
        );
        return Err(TokenRejection::Expired);
    }

    validate_iat_at(claims.iat, clock_skew, now)?;

    if claims.sub.trim().is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty subject");
        return Err(TokenRejection::MissingSubject);
    }

    Ok(claims)
}

/// Reject `iat` values more than `clock_skew` ahead of `now`.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), TokenRejection> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds)
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(TokenRejection::IssuedInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::cast_possible_wrap
)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const NOW: i64 = 1_700_000_000;

    fn secret() -> Arc<SigningSecret> {
        Arc::new(SigningSecret::from_bytes(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap())
    }

    fn other_secret() -> Arc<SigningSecret> {
        Arc::new(SigningSecret::from_bytes(b"fedcba9876543210fedcba9876543210".to_vec()).unwrap())
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(secret(), DEFAULT_TOKEN_TTL)
    }

    fn sign_raw(payload: &serde_json::Value, secret: &SigningSecret) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            payload,
            &secret.encoding_key(),
        )
        .unwrap()
    }

    // -------------------------------------------------------------------------
    // Secret Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_secret_shorter_than_256_bits_is_rejected() {
        let result = SigningSecret::from_bytes(vec![7u8; 31]);
        assert_eq!(result.unwrap_err(), JwtError::SecretTooShort { actual: 31 });
    }

    #[test]
    fn test_secret_of_exactly_256_bits_is_accepted() {
        assert!(SigningSecret::from_bytes(vec![7u8; 32]).is_ok());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let debug = format!("{:?}", secret());
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("0123456789"));
    }

    // -------------------------------------------------------------------------
    // Issuance Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_issue_sets_expiry_from_ttl() {
        let issued = issuer().issue_at("alice", vec![], NOW).unwrap();

        assert_eq!(issued.claims.iat, NOW);
        assert_eq!(issued.claims.exp, NOW + 3600);
        assert_eq!(issued.expires_in, 3600);
    }

    #[test]
    fn test_issue_rejects_blank_subject() {
        let result = issuer().issue_at("   ", vec![], NOW);
        assert_eq!(result.unwrap_err(), JwtError::EmptySubject);
    }

    #[test]
    fn test_issued_token_header_is_hs256() {
        let issued = issuer().issue_at("alice", vec![], NOW).unwrap();
        let header_part = issued.token.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_part).unwrap()).unwrap();

        assert_eq!(header["alg"], "HS256");
    }

    #[test]
    fn test_issued_token_debug_hides_token_and_subject() {
        let issued = issuer().issue_at("alice", vec![], NOW).unwrap();
        let debug = format!("{issued:?}");

        assert!(!debug.contains(&issued.token));
        assert!(!debug.contains("alice"));
    }

    // -------------------------------------------------------------------------
    // Verification Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_round_trip_preserves_subject_and_roles() {
        let roles = vec!["USER".to_string(), "ADMIN".to_string()];
        let issued = issuer().issue_at("alice", roles.clone(), NOW).unwrap();

        let claims = verify_token_at(&issued.token, &secret(), DEFAULT_CLOCK_SKEW, NOW + 1).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, roles);
    }

    #[test]
    fn test_verification_is_idempotent() {
        let issued = issuer().issue_at("alice", vec!["USER".into()], NOW).unwrap();

        let first = verify_token_at(&issued.token, &secret(), DEFAULT_CLOCK_SKEW, NOW + 10);
        let second = verify_token_at(&issued.token, &secret(), DEFAULT_CLOCK_SKEW, NOW + 10);
        assert_eq!(first, second);

        let expired_first = verify_token_at(&issued.token, &secret(), DEFAULT_CLOCK_SKEW, NOW + 9999);
        let expired_second = verify_token_at(&issued.token, &secret(), DEFAULT_CLOCK_SKEW, NOW + 9999);
        assert_eq!(expired_first, Err(TokenRejection::Expired));
        assert_eq!(expired_first, expired_second);
    }

    #[test]
    fn test_expiry_boundary() {
        let issued = issuer().issue_at("alice", vec![], NOW).unwrap();
        let exp = issued.claims.exp;

        assert!(verify_token_at(&issued.token, &secret(), DEFAULT_CLOCK_SKEW, exp - 1).is_ok());
        assert_eq!(
            verify_token_at(&issued.token, &secret(), DEFAULT_CLOCK_SKEW, exp),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_foreign_secret_is_bad_signature() {
        let foreign = TokenIssuer::new(other_secret(), DEFAULT_TOKEN_TTL)
            .issue_at("alice", vec![], NOW)
            .unwrap();

        let result = verify_token_at(&foreign.token, &secret(), DEFAULT_CLOCK_SKEW, NOW);
        assert_eq!(result, Err(TokenRejection::BadSignature));
    }

    #[test]
    fn test_tampered_payload_is_bad_signature() {
        let issued = issuer().issue_at("alice", vec!["USER".into()], NOW).unwrap();
        let mut parts: Vec<String> = issued.token.split('.').map(String::from).collect();
        let forged = serde_json::json!({"sub":"alice","roles":["ADMIN"],"iat":NOW,"exp":NOW+3600});
        parts[1] = URL_SAFE_NO_PAD.encode(forged.to_string());
        let tampered = parts.join(".");

        let result = verify_token_at(&tampered, &secret(), DEFAULT_CLOCK_SKEW, NOW);
        assert_eq!(result, Err(TokenRejection::BadSignature));
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let claims = serde_json::json!({"sub":"alice","iat":NOW,"exp":NOW+60});
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &secret().encoding_key(),
        )
        .unwrap();

        let result = verify_token_at(&token, &secret(), DEFAULT_CLOCK_SKEW, NOW);
        assert_eq!(result, Err(TokenRejection::BadSignature));
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"sub":"alice","iat":{NOW},"exp":{}}}"#,
            NOW + 60
        ));
        let token = format!("{header}.{payload}.");

        assert!(verify_token_at(&token, &secret(), DEFAULT_CLOCK_SKEW, NOW).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        for token in ["", "not-a-jwt", "a.b", "a.b.c.d"] {
            assert_eq!(
                verify_token_at(token, &secret(), DEFAULT_CLOCK_SKEW, NOW),
                Err(TokenRejection::Malformed),
                "token {token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_oversized_token_is_rejected_before_parsing() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            verify_token_at(&oversized, &secret(), DEFAULT_CLOCK_SKEW, NOW),
            Err(TokenRejection::TooLarge)
        );
    }

    #[test]
    fn test_missing_roles_claim_defaults_to_empty() {
        let token = sign_raw(
            &serde_json::json!({"sub":"alice","iat":NOW,"exp":NOW+60}),
            &secret(),
        );

        let claims = verify_token_at(&token, &secret(), DEFAULT_CLOCK_SKEW, NOW).unwrap();
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn test_missing_exp_claim_is_malformed() {
        let token = sign_raw(&serde_json::json!({"sub":"alice","iat":NOW}), &secret());

        assert_eq!(
            verify_token_at(&token, &secret(), DEFAULT_CLOCK_SKEW, NOW),
            Err(TokenRejection::Malformed)
        );
    }

    #[test]
    fn test_empty_subject_is_rejected() {
        let token = sign_raw(
            &serde_json::json!({"sub":"","iat":NOW,"exp":NOW+60}),
            &secret(),
        );

        assert_eq!(
            verify_token_at(&token, &secret(), DEFAULT_CLOCK_SKEW, NOW),
            Err(TokenRejection::MissingSubject)
        );
    }

    // -------------------------------------------------------------------------
    // iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_iat_within_skew_is_accepted() {
        let skew = DEFAULT_CLOCK_SKEW.as_secs() as i64;
        assert!(validate_iat_at(NOW + skew, DEFAULT_CLOCK_SKEW, NOW).is_ok());
        assert!(validate_iat_at(NOW - 86_400, DEFAULT_CLOCK_SKEW, NOW).is_ok());
    }

    #[test]
    fn test_iat_beyond_skew_is_rejected() {
        let skew = DEFAULT_CLOCK_SKEW.as_secs() as i64;
        assert_eq!(
            validate_iat_at(NOW + skew + 1, DEFAULT_CLOCK_SKEW, NOW),
            Err(TokenRejection::IssuedInFuture)
        );
    }

    #[test]
    fn test_future_issued_token_is_rejected() {
        let issued = issuer().issue_at("alice", vec![], NOW + 3600).unwrap();
        assert_eq!(
            verify_token_at(&issued.token, &secret(), DEFAULT_CLOCK_SKEW, NOW),
            Err(TokenRejection::IssuedInFuture)
        );
    }

    // -------------------------------------------------------------------------
    // Claims Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_claims_debug_redacts_subject() {
        let claims = Claims {
            sub: "alice".to_string(),
            roles: vec!["USER".to_string()],
            iat: NOW,
            exp: NOW + 1,
        };
        let debug = format!("{claims:?}");

        assert!(!debug.contains("alice"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("USER"));
    }

    #[test]
    fn test_rejection_labels_are_distinct() {
        let all = [
            TokenRejection::Missing,
            TokenRejection::MalformedHeader,
            TokenRejection::TooLarge,
            TokenRejection::Malformed,
            TokenRejection::BadSignature,
            TokenRejection::Expired,
            TokenRejection::IssuedInFuture,
            TokenRejection::MissingSubject,
        ];
        let labels: HashSet<&str> = all.iter().map(|r| r.as_label()).collect();
        assert_eq!(labels.len(), all.len());
    }
}
