//! Profile reads and create-or-update writes for the authenticated user.

use crate::models::{Profile, ProfileFields, ProfileRequest, DEFAULT_VISIBILITY, VISIBILITIES};
use crate::repositories::{ProfileStore, PROFILE_CONSTRAINTS};
use common::error::validation::{is_valid_email, MUST_BE_EMAIL};
use common::error::{ErrorCode, FieldErrors, ServiceError, StorageError};
use common::observability::hash_for_correlation;
use tracing::instrument;

/// # Errors
///
/// `RES_001` when the user has not created a profile yet.
#[instrument(skip_all, name = "user.service.get_profile")]
pub async fn get_profile(store: &dyn ProfileStore, username: &str) -> Result<Profile, ServiceError> {
    store.find_by_username(username).await?.ok_or_else(|| {
        ServiceError::with_args(ErrorCode::ResourceNotFound, ["User", "username", username])
    })
}

/// Create the caller's profile, or replace it when it exists.
///
/// # Errors
///
/// - `VAL_001` with field errors for missing or invalid fields
/// - `AUTH_004` when the email belongs to another profile
#[instrument(skip_all, name = "user.service.save_profile")]
pub async fn save_profile(
    store: &dyn ProfileStore,
    username: &str,
    request: ProfileRequest,
) -> Result<Profile, ServiceError> {
    let fields = validate(request)?;
    let email = fields.email.clone();

    let profile = store
        .upsert(username, fields)
        .await
        .map_err(|e| match e {
            StorageError::UniqueViolation {
                constraint,
                message,
            } => match PROFILE_CONSTRAINTS.classify(constraint.as_deref(), &message) {
                ErrorCode::EmailAlreadyExists => {
                    ServiceError::with_args(ErrorCode::EmailAlreadyExists, [email.as_str()])
                }
                other => ServiceError::code(other),
            },
            other => other.into(),
        })?;

    tracing::info!(
        target: "user.service.save_profile",
        username_hash = %hash_for_correlation(username),
        created = profile.updated_at.is_none(),
        "Profile saved"
    );

    Ok(profile)
}

fn validate(request: ProfileRequest) -> Result<ProfileFields, ServiceError> {
    let mut errors = FieldErrors::new();
    let first_name = errors.require("firstName", request.first_name.as_deref());
    let last_name = errors.require("lastName", request.last_name.as_deref());
    let email = errors.require("email", request.email.as_deref());
    if let Some(email) = email {
        errors.check(is_valid_email(email), "email", MUST_BE_EMAIL);
    }

    let visibility = request
        .profile_visibility
        .as_deref()
        .map_or(DEFAULT_VISIBILITY, str::trim);
    errors.check(
        VISIBILITIES.contains(&visibility),
        "profileVisibility",
        format!("must be one of {}", VISIBILITIES.join(", ")),
    );

    let (Some(first_name), Some(last_name), Some(email), true) =
        (first_name, last_name, email, errors.is_empty())
    else {
        errors.into_result()?;
        return Err(ServiceError::code(ErrorCode::ValidationFailed));
    };

    Ok(ProfileFields {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        avatar: request.avatar,
        bio: request.bio,
        location: request.location,
        website: request.website,
        phone: request.phone,
        date_of_birth: request.date_of_birth,
        preferred_language: request.preferred_language,
        notifications_enabled: request.notifications_enabled.unwrap_or(true),
        profile_visibility: visibility.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryProfileStore;

    fn request(email: &str) -> ProfileRequest {
        ProfileRequest {
            first_name: Some("Alice".to_string()),
            last_name: Some("Liddell".to_string()),
            email: Some(email.to_string()),
            ..ProfileRequest::default()
        }
    }

    #[tokio::test]
    async fn test_missing_profile_is_resource_not_found() {
        let store = InMemoryProfileStore::new();
        let err = get_profile(&store, "alice").await.unwrap_err();

        assert_eq!(err.error_code(), ErrorCode::ResourceNotFound);
        assert!(err
            .to_string()
            .contains("User not found with username: 'alice'"));
    }

    #[tokio::test]
    async fn test_save_applies_defaults() {
        let store = InMemoryProfileStore::new();
        let profile = save_profile(&store, "alice", request("alice@example.com"))
            .await
            .unwrap();

        assert_eq!(profile.username, "alice");
        assert_eq!(profile.profile_visibility, "public");
        assert!(profile.notifications_enabled);
        assert_eq!(get_profile(&store, "alice").await.unwrap(), profile);
    }

    #[tokio::test]
    async fn test_validation_collects_every_field() {
        let store = InMemoryProfileStore::new();
        let err = save_profile(
            &store,
            "alice",
            ProfileRequest {
                email: Some("nope".to_string()),
                profile_visibility: Some("everyone".to_string()),
                ..ProfileRequest::default()
            },
        )
        .await
        .unwrap_err();

        let ServiceError::Validation { field_errors } = err else {
            unreachable!("expected validation error");
        };
        assert_eq!(
            field_errors.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["email", "firstName", "lastName", "profileVisibility"]
        );
        assert_eq!(field_errors.get("email").unwrap(), MUST_BE_EMAIL);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = InMemoryProfileStore::new();
        save_profile(&store, "alice", request("shared@example.com"))
            .await
            .unwrap();

        let err = save_profile(&store, "bob", request("shared@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::EmailAlreadyExists);
    }
}
