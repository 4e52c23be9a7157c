//! Auth service configuration.
//!
//! Loaded from environment variables. The database URL and signing secret
//! are redacted in Debug output.

use common::config::{parsed_or, ConfigError, JwtSettings};
use common::observability::LogFormat;
use std::collections::HashMap;
use std::env;
use std::fmt;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum bcrypt cost accepted at startup.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum bcrypt cost accepted at startup.
pub const MAX_BCRYPT_COST: u32 = 14;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8081";

#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL. `None` selects the in-memory store.
    pub database_url: Option<String>,

    pub bind_address: String,

    /// Signing secret, token lifetime and clock skew.
    pub jwt: JwtSettings,

    /// Bcrypt cost factor for password hashing (10 to 14).
    pub bcrypt_cost: u32,

    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("bind_address", &self.bind_address)
            .field("jwt", &self.jwt)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `JWT_SECRET` is missing or too short, or
    /// when a numeric setting is out of range.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .cloned();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwt = JwtSettings::from_vars(vars)?;

        let bcrypt_cost = parsed_or(vars, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::invalid(
                "BCRYPT_COST",
                format!("must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}, got {bcrypt_cost}"),
            ));
        }

        let log_format = parsed_or(vars, "LOG_FORMAT", LogFormat::default())?;

        Ok(Config {
            database_url,
            bind_address,
            jwt,
            bcrypt_cost,
            log_format,
        })
    }
}
