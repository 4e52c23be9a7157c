//! The uniform JSON error body returned by every service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error body shared by the gateway and every downstream service.
///
/// ```json
/// {
///   "timestamp": "2024-05-01T12:00:00Z",
///   "status": 401,
///   "error": "Token Expired",
///   "message": "Your authentication token has expired. Please log in again.",
///   "path": "/me",
///   "code": "AUTH_012"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}
