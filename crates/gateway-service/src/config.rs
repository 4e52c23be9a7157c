//! Gateway configuration.
//!
//! Loaded from environment variables. The signing secret is redacted in
//! Debug output.

use common::auth::PublicPaths;
use common::config::{parsed_or, ConfigError, JwtSettings};
use common::observability::LogFormat;
use reqwest::Url;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_AUTH_SERVICE_URL: &str = "http://localhost:8081";
pub const DEFAULT_USER_SERVICE_URL: &str = "http://localhost:8082";
pub const DEFAULT_TMDB_SERVICE_URL: &str = "http://localhost:8083";

/// Paths the gateway lets through without a token.
pub const DEFAULT_PUBLIC_PATHS: &str = "/auth/login,/auth/register,/actuator/health,/metrics";

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for `UPSTREAM_TIMEOUT_SECONDS`.
pub const MAX_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct Config {
    pub bind_address: String,

    pub jwt: JwtSettings,

    pub auth_service_url: Url,
    pub user_service_url: Url,
    pub tmdb_service_url: Url,

    /// Literal allow-list checked before any token handling.
    pub public_paths: PublicPaths,

    /// Add `X-Auth-Subject` / `X-Auth-Roles` to forwarded requests. Off by
    /// default: downstream services verify the token themselves.
    pub forward_identity: bool,

    pub upstream_timeout: Duration,

    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("jwt", &self.jwt)
            .field("auth_service_url", &self.auth_service_url.as_str())
            .field("user_service_url", &self.user_service_url.as_str())
            .field("tmdb_service_url", &self.tmdb_service_url.as_str())
            .field("public_paths", &self.public_paths)
            .field("forward_identity", &self.forward_identity)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn url_or(vars: &HashMap<String, String>, name: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = vars.get(name).map_or(default, String::as_str);
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::invalid(name, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(name, "must be an http or https URL"));
    }
    Ok(url)
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
    /// Returns [`ConfigError`] for invalid token settings, an unparsable
    /// upstream URL, or an out-of-range timeout.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let timeout_secs = parsed_or(
            vars,
            "UPSTREAM_TIMEOUT_SECONDS",
            DEFAULT_UPSTREAM_TIMEOUT.as_secs(),
        )?;
        if timeout_secs == 0 || timeout_secs > MAX_UPSTREAM_TIMEOUT.as_secs() {
            return Err(ConfigError::invalid(
                "UPSTREAM_TIMEOUT_SECONDS",
                format!(
                    "must be between 1 and {} seconds, got {timeout_secs}",
                    MAX_UPSTREAM_TIMEOUT.as_secs()
                ),
            ));
        }

        Ok(Config {
            bind_address: vars
                .get("BIND_ADDRESS")
                .cloned()
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            jwt: JwtSettings::from_vars(vars)?,
            auth_service_url: url_or(vars, "AUTH_SERVICE_URL", DEFAULT_AUTH_SERVICE_URL)?,
            user_service_url: url_or(vars, "USER_SERVICE_URL", DEFAULT_USER_SERVICE_URL)?,
            tmdb_service_url: url_or(vars, "TMDB_SERVICE_URL", DEFAULT_TMDB_SERVICE_URL)?,
            public_paths: PublicPaths::parse(
                vars.get("GATEWAY_PUBLIC_PATHS")
                    .map_or(DEFAULT_PUBLIC_PATHS, String::as_str),
            ),
            forward_identity: parsed_or(vars, "GATEWAY_FORWARD_IDENTITY", false)?,
            upstream_timeout: Duration::from_secs(timeout_secs),
            log_format: parsed_or(vars, "LOG_FORMAT", LogFormat::default())?,
        })
    }
}
