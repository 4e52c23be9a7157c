//! Resolve token subjects against the credential store.
//!
//! The auth service owns the credentials, so its local verifier does not
//! trust the roles embedded in a token: it reloads the account and uses the
//! stored role. A deleted account resolves to nothing and its tokens stop
//! working immediately.

use crate::repositories::CredentialStore;
use common::auth::{AuthContext, DirectoryError, SubjectDirectory};
use common::jwt::Claims;
use std::sync::Arc;
use tokio::runtime::Handle;

pub struct StoreDirectory {
    store: Arc<dyn CredentialStore>,
}

impl StoreDirectory {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

impl SubjectDirectory for StoreDirectory {
    /// Runs on the blocking pool, where it may wait on the async store.
    fn resolve(&self, claims: &Claims) -> Result<Option<AuthContext>, DirectoryError> {
        let handle = Handle::try_current()
            .map_err(|e| DirectoryError(format!("no runtime for store lookup: {e}")))?;

        let credential = handle
            .block_on(self.store.find_by_username(&claims.sub))
            .map_err(|e| DirectoryError(e.to_string()))?;

        Ok(credential.map(|c| AuthContext::new(c.username, [c.role])))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::NewCredential;
    use crate::repositories::InMemoryCredentialStore;

    fn claims(sub: &str, roles: &[&str]) -> Claims {
        Claims {
            sub: sub.to_string(),
            roles: roles.iter().map(ToString::to_string).collect(),
            iat: 0,
            exp: 1,
        }
    }

    async fn directory_with_admin() -> StoreDirectory {
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .insert(NewCredential {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: "ADMIN".to_string(),
            })
            .await
            .unwrap();
        StoreDirectory::new(store)
    }

    #[tokio::test]
    async fn test_stored_role_wins_over_token_roles() {
        let directory = directory_with_admin().await;

        let context = tokio::task::spawn_blocking(move || {
            directory.resolve(&claims("alice", &["USER"])).unwrap()
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(context.subject(), "alice");
        assert!(context.has_authority("ADMIN"));
        assert!(!context.has_authority("USER"));
    }

    #[tokio::test]
    async fn test_deleted_subject_resolves_to_none() {
        let directory = directory_with_admin().await;

        let resolved =
            tokio::task::spawn_blocking(move || directory.resolve(&claims("bob", &[])).unwrap())
                .await
                .unwrap();

        assert!(resolved.is_none());
    }

    #[test]
    fn test_outside_runtime_is_an_error() {
        let directory = StoreDirectory::new(Arc::new(InMemoryCredentialStore::new()));
        assert!(directory.resolve(&claims("alice", &[])).is_err());
    }
}
