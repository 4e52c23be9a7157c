//! Logging, metrics and correlation hashing shared by every service.
//!
//! # Privacy by Default
//!
//! Handlers and verification stages use `#[instrument(skip_all)]` and log
//! an explicit allow-list of fields:
//! - **SAFE**: plaintext (paths, outcomes, status codes)
//! - **HASHED**: subjects and usernames, through [`hash_for_correlation`]
//! - **NEVER**: passwords, tokens, the signing secret

pub mod health;
pub mod metrics;

use sha2::{Digest, Sha256};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for the fmt layer, from `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}', expected text or json")),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter` when set.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(
    default_filter: &str,
    format: LogFormat,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
}

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars).
///
/// This is a one-way digest for correlating log lines about the same
/// subject, not a protection for secrets.
#[must_use]
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.get(..4).unwrap_or_default())
}
