//! Error taxonomy and the uniform error contract.
//!
//! - [`ErrorCode`] is the closed catalog (code, title, template, status)
//! - [`ServiceError`] is what handlers and services return
//! - [`ErrorResponse`] is the JSON body every service emits
//! - [`error_boundary`] is the single translator installed outermost in
//!   every router

mod boundary;
mod code;
mod json;
mod response;
mod service;
pub mod validation;

pub use boundary::{error_boundary, route_not_found, PendingError};
pub use code::ErrorCode;
pub use json::ValidatedJson;
pub use response::ErrorResponse;
pub use service::{ConstraintCatalog, ServiceError, StorageError};
pub use validation::FieldErrors;
