//! JSON body extractor whose rejections use the uniform error contract.

use super::code::ErrorCode;
use super::service::ServiceError;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;

/// Like [`axum::Json`], but a missing content type, a syntax error or a
/// shape mismatch becomes a 400 `MalformedRequest` instead of axum's plain
/// text rejection. A missing non-optional field is a 400 `FieldRequired`.
///
/// A body over the request limit keeps its 413 and is rendered by the
/// boundary like any other bare framework status.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidatedJson(value)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                tracing::debug!(target: "common.error", "JSON body over limit");
                Err(StatusCode::PAYLOAD_TOO_LARGE.into_response())
            }
            Err(rejection) => Err(malformed(&rejection).into_response()),
        }
    }
}

/// Field name from serde's "missing field `name`" data error.
fn missing_field(body_text: &str) -> Option<&str> {
    let (_, rest) = body_text.split_once("missing field `")?;
    let (field, _) = rest.split_once('`')?;
    Some(field)
}

fn malformed(rejection: &JsonRejection) -> ServiceError {
    let body_text = rejection.body_text();
    if matches!(rejection, JsonRejection::JsonDataError(_)) {
        if let Some(field) = missing_field(&body_text) {
            return ServiceError::with_args(ErrorCode::FieldRequired, [field]);
        }
    }

    let reason = match rejection {
        JsonRejection::MissingJsonContentType(_) => "expected Content-Type: application/json",
        JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
        JsonRejection::JsonDataError(_) => "request body does not match the expected shape",
        _ => "request body could not be read",
    };
    tracing::debug!(target: "common.error", rejection = %body_text, "JSON body rejected");
    ServiceError::with_args(ErrorCode::MalformedRequest, [reason])
}
