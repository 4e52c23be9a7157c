//! HTTP request handlers for the user service.

pub mod profile_handler;

pub use profile_handler::{handle_get_me, handle_save_me};
