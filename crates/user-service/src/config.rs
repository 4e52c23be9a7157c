//! User service configuration.

use common::config::{parsed_or, ConfigError, JwtSettings};
use common::observability::LogFormat;
use std::collections::HashMap;
use std::env;
use std::fmt;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8082";

#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL. `None` selects the in-memory store.
    pub database_url: Option<String>,

    pub bind_address: String,

    /// Only the secret and clock skew are used: this service never issues
    /// tokens.
    pub jwt: JwtSettings,

    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("bind_address", &self.bind_address)
            .field("jwt", &self.jwt)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] when the token settings are invalid.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Config {
            database_url: vars
                .get("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .cloned(),
            bind_address: vars
                .get("BIND_ADDRESS")
                .cloned()
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            jwt: JwtSettings::from_vars(vars)?,
            log_format: parsed_or(vars, "LOG_FORMAT", LogFormat::default())?,
        })
    }
}
