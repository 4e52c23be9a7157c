//! Configuration shared by every service.
//!
//! Each service loads its own `Config` from environment variables through
//! `Config::from_env()`, which delegates to a `from_vars(&HashMap)` variant
//! so tests never touch the process environment. The token settings below
//! are identical for every service and are parsed here once.

use crate::jwt::{
    SigningSecret, TokenIssuer, DEFAULT_CLOCK_SKEW, DEFAULT_TOKEN_TTL, MAX_CLOCK_SKEW,
    MIN_SECRET_BYTES,
};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Shortest accepted token lifetime.
pub const MIN_TOKEN_TTL: Duration = Duration::from_secs(60);

/// Longest accepted token lifetime (one day).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl ConfigError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Value of a required variable.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnvVar`] when `name` is absent or empty.
pub fn required<'a>(vars: &'a HashMap<String, String>, name: &str) -> Result<&'a str, ConfigError> {
    vars.get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Parse an optional variable, falling back to `default` when absent.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the value does not parse.
pub fn parsed_or<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(name, e.to_string())),
    }
}

/// Token settings: signing secret, lifetime and clock skew.
///
/// Read from:
/// - `JWT_SECRET` (required): raw UTF-8 bytes, at least 32 bytes
/// - `JWT_TTL_SECONDS` (default 3600, 60 to 86400)
/// - `JWT_CLOCK_SKEW_SECONDS` (default 300, 1 to 600)
#[derive(Clone)]
pub struct JwtSettings {
    pub secret: Arc<SigningSecret>,
    pub ttl: Duration,
    pub clock_skew: Duration,
}

impl JwtSettings {
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the secret is missing or shorter than
    /// 256 bits, or when a duration is out of range.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let raw_secret = required(vars, "JWT_SECRET")?;
        let secret = SigningSecret::from_bytes(raw_secret.as_bytes().to_vec()).map_err(|_| {
            ConfigError::invalid(
                "JWT_SECRET",
                format!(
                    "must be at least {MIN_SECRET_BYTES} bytes, got {}",
                    raw_secret.len()
                ),
            )
        })?;

        let ttl_secs = parsed_or(vars, "JWT_TTL_SECONDS", DEFAULT_TOKEN_TTL.as_secs())?;
        let ttl = Duration::from_secs(ttl_secs);
        if ttl < MIN_TOKEN_TTL || ttl > MAX_TOKEN_TTL {
            return Err(ConfigError::invalid(
                "JWT_TTL_SECONDS",
                format!(
                    "must be between {} and {} seconds, got {ttl_secs}",
                    MIN_TOKEN_TTL.as_secs(),
                    MAX_TOKEN_TTL.as_secs()
                ),
            ));
        }

        let skew_secs = parsed_or(vars, "JWT_CLOCK_SKEW_SECONDS", DEFAULT_CLOCK_SKEW.as_secs())?;
        if skew_secs == 0 || skew_secs > MAX_CLOCK_SKEW.as_secs() {
            return Err(ConfigError::invalid(
                "JWT_CLOCK_SKEW_SECONDS",
                format!(
                    "must be between 1 and {} seconds, got {skew_secs}",
                    MAX_CLOCK_SKEW.as_secs()
                ),
            ));
        }

        Ok(Self {
            secret: Arc::new(secret),
            ttl,
            clock_skew: Duration::from_secs(skew_secs),
        })
    }

    #[must_use]
    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer::new(self.secret.clone(), self.ttl)
    }
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}
