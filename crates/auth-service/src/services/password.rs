//! Bcrypt hashing, run on the blocking pool so a slow hash never stalls the
//! async runtime.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use common::error::ServiceError;
use common::secret::{ExposeSecret, SecretString};
use tracing::instrument;

/// Password for the dummy hash. Never stored, never matched.
const DUMMY_PASSWORD: &str = "unknown-account-placeholder";

fn check_cost(cost: u32) -> Result<(), ServiceError> {
    if (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        Ok(())
    } else {
        Err(ServiceError::internal(format!(
            "invalid bcrypt cost {cost} (must be {MIN_BCRYPT_COST}-{MAX_BCRYPT_COST})"
        )))
    }
}

/// # Errors
///
/// Returns an internal error when the cost is out of range or hashing fails.
#[instrument(skip_all)]
pub async fn hash_password(password: SecretString, cost: u32) -> Result<String, ServiceError> {
    check_cost(cost)?;

    tokio::task::spawn_blocking(move || bcrypt::hash(password.expose_secret(), cost))
        .await
        .map_err(|e| ServiceError::internal(format!("hashing task failed: {e}")))?
        .map_err(|e| ServiceError::internal(format!("password hashing failed: {e}")))
}

/// Hashes and verifies passwords at one bcrypt cost.
///
/// Holds a dummy hash at that same cost, verified against when the username
/// is unknown, so an unknown user costs the same bcrypt work as a wrong
/// password.
pub struct PasswordHasher {
    cost: u32,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Hashes the dummy password once, synchronously. Call at startup.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the cost is out of range or hashing
    /// fails.
    pub fn new(cost: u32) -> Result<Self, ServiceError> {
        check_cost(cost)?;
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, cost)
            .map_err(|e| ServiceError::internal(format!("dummy hash failed: {e}")))?;
        Ok(Self { cost, dummy_hash })
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// # Errors
    ///
    /// See [`hash_password`].
    pub async fn hash(&self, password: SecretString) -> Result<String, ServiceError> {
        hash_password(password, self.cost).await
    }

    /// Verify `password` against `hash`, or against the dummy hash when
    /// there is no stored credential. Always `false` for the dummy.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the blocking task fails.
    #[instrument(skip_all)]
    pub async fn verify(
        &self,
        password: SecretString,
        hash: Option<String>,
    ) -> Result<bool, ServiceError> {
        let known = hash.is_some();
        let hash = hash.unwrap_or_else(|| self.dummy_hash.clone());

        let matched = tokio::task::spawn_blocking(move || {
            // A corrupt stored hash counts as a mismatch
            bcrypt::verify(password.expose_secret(), &hash).unwrap_or(false)
        })
        .await
        .map_err(|e| ServiceError::internal(format!("verification task failed: {e}")))?;

        Ok(known && matched)
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(MIN_BCRYPT_COST).unwrap()
    }

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hasher = hasher();
        let hash = hasher.hash(SecretString::from("correct horse")).await.unwrap();

        assert!(hash.starts_with("$2b$10$"));
        assert!(hasher
            .verify(SecretString::from("correct horse"), Some(hash.clone()))
            .await
            .unwrap());
        assert!(!hasher
            .verify(SecretString::from("wrong horse"), Some(hash))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_never_matches() {
        let hasher = hasher();
        assert!(!hasher.verify(SecretString::from("anything"), None).await.unwrap());
        assert!(!hasher
            .verify(SecretString::from(DUMMY_PASSWORD), None)
            .await
            .unwrap());
    }

    #[test]
    fn test_dummy_hash_uses_configured_cost() {
        for cost in [MIN_BCRYPT_COST, 11] {
            let hasher = PasswordHasher::new(cost).unwrap();
            assert_eq!(hasher.cost(), cost);
            assert!(hasher.dummy_hash.starts_with(&format!("$2b${cost}$")));
        }
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_mismatch() {
        assert!(!hasher()
            .verify(SecretString::from("pw"), Some("not-a-hash".into()))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_cost_out_of_range_is_rejected() {
        assert!(hash_password(SecretString::from("pw"), 4).await.is_err());
        assert!(PasswordHasher::new(4).is_err());
        assert!(PasswordHasher::new(MAX_BCRYPT_COST + 1).is_err());
    }
}
