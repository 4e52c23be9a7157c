use super::context::AuthContext;
use crate::error::{ErrorCode, ServiceError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Handler argument for the request's [`AuthContext`].
///
/// Rejects with 401 `AUTH_010` when no verifier installed a context, so a
/// route missing from the access policy still cannot run anonymously.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(|| ServiceError::code(ErrorCode::TokenMissing))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_reads_installed_context() {
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();
        parts.extensions.insert(AuthContext::new("alice", ["USER"]));

        let Authenticated(context) = Authenticated::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(context.subject(), "alice");
    }

    #[tokio::test]
    async fn test_missing_context_is_token_missing() {
        let (mut parts, ()) = Request::builder().body(()).unwrap().into_parts();

        let err = Authenticated::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::TokenMissing);
    }
}
