//! Shared authentication core for the Next Episode services.
//!
//! Every service (gateway, auth, user) links this crate so that token
//! issuance, token verification, authority mapping and error rendering
//! behave identically at every enforcement point.

#![warn(clippy::pedantic)]

/// Module for the request authentication pipeline (stages, chain, policy)
pub mod auth;

/// Module for the shared configuration settings
pub mod config;

/// Module for the error catalog and the uniform error contract
pub mod error;

/// Module for JWT issuance and verification
pub mod jwt;

/// Module for logging, metrics and correlation hashing
pub mod observability;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the graceful shutdown signal
pub mod shutdown;
