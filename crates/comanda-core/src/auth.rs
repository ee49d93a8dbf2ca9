//! Accounts, password hashing, and session tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Session tokens are random
//! 32-byte values handed to the browser in a cookie; only their SHA-256
//! digest is persisted, so a leaked `sessions` table cannot be replayed.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A registered restaurant account. Every tenant-owned row hangs off `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub business_name: String,
    pub created_at: DateTime<Utc>,
}

/// A user row including the stored password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// DTO for creating a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub business_name: String,
}

/// Emails are compared case-insensitively; store and look them up in this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate registration input before hashing.
pub fn validate_registration(email: &str, password: &str, business_name: &str) -> Result<(), AppError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::ValidationError(format!("Invalid email: '{email}'")));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if business_name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Business name must not be empty".into(),
        ));
    }
    Ok(())
}

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Generic(format!("Failed to encode salt: {e}")))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Generic(format!("Failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// Returns `Ok(false)` for a wrong password and `Err` only when the stored
/// hash itself is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Generic(format!("Invalid password hash format: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Generic(format!(
            "Password verification failed: {e}"
        ))),
    }
}

/// Generate a random 64-character hex session token.
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

/// SHA-256 of a session token, returned as 64-char hex.
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The owner of a live session, with the moment the session stops being valid.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

/// A persisted login session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Owner@Bistro.COM "), "owner@bistro.com");
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let h1 = hash_password("password123").unwrap();
        let h2 = hash_password("password123").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_session_token_shape() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_session_token());
    }

    #[test]
    fn test_token_hash_is_stable() {
        let token = "abc";
        assert_eq!(hash_session_token(token), hash_session_token(token));
        assert_eq!(hash_session_token(token).len(), 64);
        assert_ne!(hash_session_token(token), token);
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration("chef@bistro.com", "longenough", "Bistro").is_ok());
        assert!(matches!(
            validate_registration("no-at-sign", "longenough", "Bistro"),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            validate_registration("chef@bistro.com", "short", "Bistro"),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            validate_registration("chef@bistro.com", "longenough", "  "),
            Err(AppError::ValidationError(_))
        ));
    }
}
