//! Handlers for the `/auth` routes.

use crate::models::{AuthResponse, CredentialSummary, LoginRequest, MeResponse, RegisterRequest};
use crate::routes::AppState;
use crate::services::account_service;
use axum::{
    extract::{Path, State},
    Json,
};
use common::auth::Authenticated;
use common::error::{ErrorCode, ServiceError, ValidatedJson};
use std::sync::Arc;
use tracing::instrument;

/// `POST /auth/register`
///
/// Creates the account and returns a token for it (auto-login).
#[instrument(skip_all, name = "auth.handlers.register")]
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<Json<AuthResponse>, ServiceError> {
    let response = account_service::register(
        state.store.as_ref(),
        &state.issuer,
        &state.passwords,
        request,
    )
    .await?;

    Ok(Json(response))
}

/// `POST /auth/login`
#[instrument(skip_all, name = "auth.handlers.login")]
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ServiceError> {
    let response = account_service::login(
        state.store.as_ref(),
        &state.issuer,
        &state.passwords,
        request,
    )
    .await?;
    Ok(Json(response))
}

/// `GET /auth/me`
///
/// Returns the identity installed by the local verifier.
#[instrument(skip_all, name = "auth.handlers.me")]
pub async fn handle_me(Authenticated(context): Authenticated) -> Json<MeResponse> {
    Json(MeResponse {
        username: context.subject().to_string(),
        authorities: context.authorities().iter().cloned().collect(),
    })
}

/// `GET /auth/users/:username`
///
/// Requires the `ADMIN` authority (enforced by the access policy and
/// checked again here).
#[instrument(skip_all, name = "auth.handlers.get_user")]
pub async fn handle_get_user(
    State(state): State<Arc<AppState>>,
    Authenticated(context): Authenticated,
    Path(username): Path<String>,
) -> Result<Json<CredentialSummary>, ServiceError> {
    context.require_authority(crate::routes::ADMIN_AUTHORITY)?;

    let credential = state
        .store
        .find_by_username(&username)
        .await?
        .ok_or_else(|| ServiceError::with_args(ErrorCode::UserNotFound, [username.as_str()]))?;

    Ok(Json(credential.into()))
}
