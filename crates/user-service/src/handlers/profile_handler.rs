//! Handlers for `/me`.

use crate::models::{Profile, ProfileRequest};
use crate::routes::AppState;
use crate::services::profile_service;
use axum::{extract::State, Json};
use common::auth::Authenticated;
use common::error::{ServiceError, ValidatedJson};
use std::sync::Arc;
use tracing::instrument;

/// `GET /me`
///
/// Returns the caller's profile, or 404 `RES_001` when none exists yet.
#[instrument(skip_all, name = "user.handlers.get_me")]
pub async fn handle_get_me(
    State(state): State<Arc<AppState>>,
    Authenticated(context): Authenticated,
) -> Result<Json<Profile>, ServiceError> {
    let profile = profile_service::get_profile(state.store.as_ref(), context.subject()).await?;
    Ok(Json(profile))
}

/// `POST /me`
///
/// Creates or replaces the caller's profile. The owner is always the
/// authenticated subject, never a field of the body.
#[instrument(skip_all, name = "user.handlers.save_me")]
pub async fn handle_save_me(
    State(state): State<Arc<AppState>>,
    Authenticated(context): Authenticated,
    ValidatedJson(request): ValidatedJson<ProfileRequest>,
) -> Result<Json<Profile>, ServiceError> {
    let profile =
        profile_service::save_profile(state.store.as_ref(), context.subject(), request).await?;
    Ok(Json(profile))
}
