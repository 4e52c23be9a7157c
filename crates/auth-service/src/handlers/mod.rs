//! HTTP request handlers for the auth service.

pub mod auth_handler;

pub use auth_handler::{handle_get_user, handle_login, handle_me, handle_register};
