//! Profile storage, keyed by the authenticated username.

use crate::models::{Profile, ProfileFields};
use async_trait::async_trait;
use chrono::Utc;
use common::error::{ConstraintCatalog, ErrorCode, StorageError};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const EMAIL_CONSTRAINT: &str = "profiles_email_key";

pub const PROFILE_CONSTRAINTS: ConstraintCatalog =
    ConstraintCatalog::new(&[(EMAIL_CONSTRAINT, ErrorCode::EmailAlreadyExists)]);

const PROFILE_COLUMNS: &str = "profile_id, username, first_name, last_name, email, avatar, bio, \
     location, website, phone, date_of_birth, preferred_language, notifications_enabled, \
     profile_visibility, created_at, updated_at";

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, StorageError>;

    /// Create the profile for `username`, or replace every field of the
    /// existing one.
    ///
    /// An email already used by another profile fails with
    /// [`StorageError::UniqueViolation`].
    async fn upsert(&self, username: &str, fields: ProfileFields) -> Result<Profile, StorageError>;
}

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, StorageError> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE username = $1");
        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn upsert(&self, username: &str, fields: ProfileFields) -> Result<Profile, StorageError> {
        let query = format!(
            r#"
            INSERT INTO profiles (
                username, first_name, last_name, email, avatar, bio, location, website,
                phone, date_of_birth, preferred_language, notifications_enabled,
                profile_visibility
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (username) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                avatar = EXCLUDED.avatar,
                bio = EXCLUDED.bio,
                location = EXCLUDED.location,
                website = EXCLUDED.website,
                phone = EXCLUDED.phone,
                date_of_birth = EXCLUDED.date_of_birth,
                preferred_language = EXCLUDED.preferred_language,
                notifications_enabled = EXCLUDED.notifications_enabled,
                profile_visibility = EXCLUDED.profile_visibility,
                updated_at = NOW()
            RETURNING {PROFILE_COLUMNS}
            "#
        );

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(username)
            .bind(&fields.first_name)
            .bind(&fields.last_name)
            .bind(&fields.email)
            .bind(&fields.avatar)
            .bind(&fields.bio)
            .bind(&fields.location)
            .bind(&fields.website)
            .bind(&fields.phone)
            .bind(fields.date_of_birth)
            .bind(&fields.preferred_language)
            .bind(fields.notifications_enabled)
            .bind(&fields.profile_visibility)
            .fetch_one(&self.pool)
            .await?;

        Ok(profile)
    }
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<Vec<Profile>>,
}

impl InMemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Profile>, StorageError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.iter().find(|p| p.username == username).cloned())
    }

    async fn upsert(&self, username: &str, fields: ProfileFields) -> Result<Profile, StorageError> {
        let mut profiles = self.profiles.write().await;

        if profiles
            .iter()
            .any(|p| p.username != username && p.email == fields.email)
        {
            return Err(StorageError::UniqueViolation {
                constraint: Some(EMAIL_CONSTRAINT.to_string()),
                message: "duplicate key value violates unique constraint on email".to_string(),
            });
        }

        let existing = profiles.iter_mut().find(|p| p.username == username);
        let (profile_id, created_at, updated_at) = match &existing {
            Some(p) => (p.profile_id, p.created_at, Some(Utc::now())),
            None => (Uuid::new_v4(), Utc::now(), None),
        };

        let profile = Profile {
            profile_id,
            username: username.to_string(),
            first_name: fields.first_name,
            last_name: fields.last_name,
            email: fields.email,
            avatar: fields.avatar,
            bio: fields.bio,
            location: fields.location,
            website: fields.website,
            phone: fields.phone,
            date_of_birth: fields.date_of_birth,
            preferred_language: fields.preferred_language,
            notifications_enabled: fields.notifications_enabled,
            profile_visibility: fields.profile_visibility,
            created_at,
            updated_at,
        };

        match existing {
            Some(slot) => *slot = profile.clone(),
            None => profiles.push(profile.clone()),
        }
        Ok(profile)
    }
}
