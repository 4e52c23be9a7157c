//! Auth service library.
//!
//! Owns the credential store and is the only issuer of tokens. Every other
//! service only verifies what this one signs.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `directory` - Subject lookup for the local verifier
//! - `handlers` - HTTP request handlers
//! - `models` - Credentials and request/response bodies
//! - `repositories` - Credential storage (PostgreSQL and in-memory)
//! - `routes` - Router, application state and middleware stack
//! - `services` - Registration, login and password hashing

pub mod config;
pub mod directory;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
