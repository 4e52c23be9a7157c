//! Gateway service library.
//!
//! The single public entry point. Verifies every non-public request at the
//! edge and proxies it to the auth, user or tmdb service by path prefix.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `edge` - Edge verification middleware
//! - `proxy` - Upstream forwarding
//! - `routes` - Router and middleware stack
//! - `upstream` - Prefix routing table

pub mod config;
pub mod edge;
pub mod proxy;
pub mod routes;
pub mod upstream;
