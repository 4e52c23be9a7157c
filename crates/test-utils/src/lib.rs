//! # Test Utilities
//!
//! Shared test utilities for the Next Episode services.
//!
//! This crate provides:
//! - Fixed secrets and configuration maps (`fixtures`)
//! - Signed test tokens, including expired and foreign-secret ones
//!   (`TestTokenBuilder`)
//! - Server harnesses that run the real routers on random ports
//!   (`TestAuthServer`, `TestUserServer`, `TestGateway`)
//! - Assertions over the uniform error body (`ErrorBodyAssertions`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let auth = TestAuthServer::spawn().await?;
//!     let token = TestTokenBuilder::new().for_user("alice").expired().build();
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/auth/me", auth.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     let body: serde_json::Value = response.json().await?;
//!     body.assert_error(401, "AUTH_012");
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod server_harness;
pub mod token_builders;

pub use assertions::*;
pub use fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
