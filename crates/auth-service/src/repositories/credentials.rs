//! Credential storage.
//!
//! [`PgCredentialStore`] backs production deployments. When no database is
//! configured the service runs on [`InMemoryCredentialStore`], which enforces
//! the same uniqueness constraints and reports the same constraint names.

use crate::models::{Credential, NewCredential};
use async_trait::async_trait;
use chrono::Utc;
use common::error::{ConstraintCatalog, ErrorCode, StorageError};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const USERNAME_CONSTRAINT: &str = "credentials_username_key";
pub const EMAIL_CONSTRAINT: &str = "credentials_email_key";

/// Unique constraints of the `credentials` table and the codes they map to.
pub const CREDENTIAL_CONSTRAINTS: ConstraintCatalog = ConstraintCatalog::new(&[
    (USERNAME_CONSTRAINT, ErrorCode::UsernameAlreadyExists),
    (EMAIL_CONSTRAINT, ErrorCode::EmailAlreadyExists),
]);

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact (case-sensitive) username lookup.
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, StorageError>;

    async fn username_exists(&self, username: &str) -> Result<bool, StorageError>;

    /// Insert a credential.
    ///
    /// A duplicate username or email fails with
    /// [`StorageError::UniqueViolation`] naming the violated constraint.
    async fn insert(&self, credential: NewCredential) -> Result<Credential, StorageError>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, StorageError> {
        let credential = sqlx::query_as::<_, Credential>(
            r#"
            SELECT credential_id, username, email, password_hash, role, created_at
            FROM credentials
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StorageError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM credentials WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn insert(&self, credential: NewCredential) -> Result<Credential, StorageError> {
        let created = sqlx::query_as::<_, Credential>(
            r#"
            INSERT INTO credentials (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING credential_id, username, email, password_hash, role, created_at
            "#,
        )
        .bind(&credential.username)
        .bind(&credential.email)
        .bind(&credential.password_hash)
        .bind(&credential.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<Vec<Credential>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate(constraint: &str, column: &str) -> StorageError {
    StorageError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        message: format!("duplicate key value violates unique constraint on {column}"),
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, StorageError> {
        let credentials = self.credentials.read().await;
        Ok(credentials.iter().find(|c| c.username == username).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StorageError> {
        let credentials = self.credentials.read().await;
        Ok(credentials.iter().any(|c| c.username == username))
    }

    async fn insert(&self, credential: NewCredential) -> Result<Credential, StorageError> {
        let mut credentials = self.credentials.write().await;

        if credentials.iter().any(|c| c.username == credential.username) {
            return Err(duplicate(USERNAME_CONSTRAINT, "username"));
        }
        if credentials.iter().any(|c| c.email == credential.email) {
            return Err(duplicate(EMAIL_CONSTRAINT, "email"));
        }

        let created = Credential {
            credential_id: Uuid::new_v4(),
            username: credential.username,
            email: credential.email,
            password_hash: credential.password_hash,
            role: credential.role,
            created_at: Utc::now(),
        };
        credentials.push(created.clone());
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_ROLE;

    fn new_credential(username: &str, email: &str) -> NewCredential {
        NewCredential {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: DEFAULT_ROLE.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = InMemoryCredentialStore::new();
        let created = store
            .insert(new_credential("alice", "alice@example.com"))
            .await
            .unwrap();

        let found = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.credential_id, created.credential_id);
        assert!(store.username_exists("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_is_case_sensitive() {
        let store = InMemoryCredentialStore::new();
        store
            .insert(new_credential("alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(store.find_by_username("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_names_constraint() {
        let store = InMemoryCredentialStore::new();
        store.insert(new_credential("alice", "a@example.com")).await.unwrap();

        let err = store
            .insert(new_credential("alice", "b@example.com"))
            .await
            .unwrap_err();
        match err {
            StorageError::UniqueViolation { constraint, message } => {
                assert_eq!(
                    CREDENTIAL_CONSTRAINTS.classify(constraint.as_deref(), &message),
                    ErrorCode::UsernameAlreadyExists
                );
            }
            StorageError::Backend(other) => unreachable!("unexpected backend error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_names_constraint() {
        let store = InMemoryCredentialStore::new();
        store.insert(new_credential("alice", "a@example.com")).await.unwrap();

        let err = store
            .insert(new_credential("bob", "a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::UniqueViolation { constraint: Some(ref c), .. } if c == EMAIL_CONSTRAINT
        ));
    }
}
