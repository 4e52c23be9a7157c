//! User service library.
//!
//! Stores one profile per account. Callers are identified only by the
//! subject of their verified token.

pub mod config;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
