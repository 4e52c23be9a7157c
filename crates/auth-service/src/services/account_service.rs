//! Registration and login.
//!
//! Both flows end by issuing a token carrying the account's stored role, so
//! a new account is logged in immediately.

use super::password::PasswordHasher;
use crate::models::{AuthResponse, Credential, LoginRequest, NewCredential, RegisterRequest, DEFAULT_ROLE};
use crate::repositories::{CredentialStore, CREDENTIAL_CONSTRAINTS};
use common::error::{validation::is_valid_email, ErrorCode, FieldErrors, ServiceError, StorageError};
use common::jwt::TokenIssuer;
use common::observability::hash_for_correlation;
use common::observability::metrics::record_token_issued;
use common::secret::SecretString;
use tracing::instrument;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 50;
const MIN_PASSWORD_LENGTH: usize = 8;

fn is_valid_username(username: &str) -> bool {
    (MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&username.chars().count())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Register a new account.
///
/// # Steps
///
/// 1. Field shape: every missing or malformed field is reported at once
/// 2. Email format (`AUTH_005`) and password strength (`AUTH_006`)
/// 3. Username pre-check (`AUTH_003`)
/// 4. Hash the password with bcrypt
/// 5. Insert; a uniqueness race is classified by constraint name
/// 6. Issue a token (auto-login)
///
/// # Errors
///
/// See the steps above. Storage failures other than uniqueness are 500.
#[instrument(skip_all, name = "auth.service.register")]
pub async fn register(
    store: &dyn CredentialStore,
    issuer: &TokenIssuer,
    passwords: &PasswordHasher,
    request: RegisterRequest,
) -> Result<AuthResponse, ServiceError> {
    let mut errors = FieldErrors::new();
    let username = errors.require("username", request.username.as_deref());
    // Presence is checked on the trimmed value, the password itself is used verbatim
    let password = errors
        .require("password", request.password.as_deref())
        .and(request.password.as_deref());
    let email = errors.require("email", request.email.as_deref());
    if let Some(username) = username {
        errors.check(
            is_valid_username(username),
            "username",
            format!(
                "must be {MIN_USERNAME_LENGTH}-{MAX_USERNAME_LENGTH} characters of letters, digits, '_', '.' or '-'"
            ),
        );
    }

    let (Some(username), Some(password), Some(email), true) =
        (username, password, email, errors.is_empty())
    else {
        errors.into_result()?;
        return Err(ServiceError::code(ErrorCode::ValidationFailed));
    };

    if !is_valid_email(email) {
        return Err(ServiceError::with_args(ErrorCode::InvalidEmailFormat, [email]));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::code(ErrorCode::WeakPassword));
    }

    if store.username_exists(username).await? {
        tracing::debug!(
            target: "auth.service.register",
            username_hash = %hash_for_correlation(username),
            "Username already taken"
        );
        return Err(ServiceError::with_args(ErrorCode::UsernameAlreadyExists, [username]));
    }

    let password_hash = passwords.hash(SecretString::from(password)).await?;

    let credential = store
        .insert(NewCredential {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role: DEFAULT_ROLE.to_string(),
        })
        .await
        .map_err(|e| classify_conflict(e, username, email))?;

    tracing::info!(
        target: "auth.service.register",
        username_hash = %hash_for_correlation(&credential.username),
        "Account registered"
    );

    issue_for(issuer, &credential, "register")
}

/// Authenticate a username and password.
///
/// Unknown usernames and wrong passwords are indistinguishable: both cost
/// one bcrypt verification and both fail with `AUTH_002`.
///
/// # Errors
///
/// `VAL_001` for missing fields, `AUTH_002` on any mismatch.
#[instrument(skip_all, name = "auth.service.login")]
pub async fn login(
    store: &dyn CredentialStore,
    issuer: &TokenIssuer,
    passwords: &PasswordHasher,
    request: LoginRequest,
) -> Result<AuthResponse, ServiceError> {
    let mut errors = FieldErrors::new();
    let username = errors.require("username", request.username.as_deref());
    let password = errors
        .require("password", request.password.as_deref())
        .and(request.password.as_deref());
    let (Some(username), Some(password)) = (username, password) else {
        errors.into_result()?;
        return Err(ServiceError::code(ErrorCode::ValidationFailed));
    };

    let credential = store.find_by_username(username).await?;
    let matched = passwords
        .verify(
            SecretString::from(password),
            credential.as_ref().map(|c| c.password_hash.clone()),
        )
        .await?;

    match credential {
        Some(credential) if matched => issue_for(issuer, &credential, "login"),
        _ => {
            tracing::debug!(
                target: "auth.service.login",
                username_hash = %hash_for_correlation(username),
                "Login failed"
            );
            Err(ServiceError::code(ErrorCode::InvalidCredentials))
        }
    }
}

fn issue_for(
    issuer: &TokenIssuer,
    credential: &Credential,
    flow: &'static str,
) -> Result<AuthResponse, ServiceError> {
    let issued = issuer
        .issue(&credential.username, vec![credential.role.clone()])
        .map_err(|e| ServiceError::internal(format!("token signing failed: {e}")))?;

    record_token_issued(flow);

    Ok(AuthResponse {
        token: issued.token,
        token_type: "Bearer".to_string(),
        expires_in: issued.expires_in,
    })
}

fn classify_conflict(err: StorageError, username: &str, email: &str) -> ServiceError {
    match err {
        StorageError::UniqueViolation {
            constraint,
            message,
        } => match CREDENTIAL_CONSTRAINTS.classify(constraint.as_deref(), &message) {
            ErrorCode::UsernameAlreadyExists => {
                ServiceError::with_args(ErrorCode::UsernameAlreadyExists, [username])
            }
            ErrorCode::EmailAlreadyExists => {
                ServiceError::with_args(ErrorCode::EmailAlreadyExists, [email])
            }
            other => {
                tracing::warn!(
                    target: "auth.service.register",
                    constraint = constraint.as_deref().unwrap_or("unknown"),
                    "Unexpected constraint violation"
                );
                ServiceError::code(other)
            }
        },
        other => other.into(),
    }
}
