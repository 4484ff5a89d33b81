//! Credential hashing helpers shared by the service layer.

use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use crate::service::AuthError;

/// Hash a credential string with argon2id and a random salt, returning
/// the PHC-format string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a credential string against a stored PHC hash. Malformed
/// hashes verify as false rather than erroring.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Random per-user salt mixed into the credential before hashing.
pub fn generate_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Random opaque value for one-time tokens.
pub fn generate_token_value() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
