//! Credential handling
//!
//! Passwords are hashed with Argon2id into PHC strings stored on the user.
//! Plaintext passwords are only ever held in [`Zeroizing`] buffers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use zeroize::Zeroizing;

use crate::error::{EngineError, EngineResult};
use crate::models::Ledger;

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// A password held in memory that is wiped on drop
pub type Password = Zeroizing<String>;

/// Check the password policy: length, mixed case, and a digit
pub fn validate_password(password: &str) -> EngineResult<()> {
    let problem = if password.chars().count() < MIN_PASSWORD_LEN {
        Some(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ))
    } else if !password.chars().any(|c| c.is_ascii_uppercase()) {
        Some("Password must contain at least one uppercase letter".to_string())
    } else if !password.chars().any(|c| c.is_ascii_lowercase()) {
        Some("Password must contain at least one lowercase letter".to_string())
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        Some("Password must contain at least one number".to_string())
    } else {
        None
    };

    match problem {
        Some(message) => Err(EngineError::Validation(message)),
        None => Ok(()),
    }
}

/// Hash a password into an Argon2id PHC string
pub fn hash_password(password: &str) -> EngineResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| EngineError::Validation(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, credential_hash: &str) -> bool {
    match PasswordHash::new(credential_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Verify a user's credentials against the ledger.
///
/// Unknown users and wrong passwords fail identically.
pub fn authenticate(ledger: &Ledger, username: &str, password: &str) -> EngineResult<()> {
    let verified = ledger
        .user(username)
        .map(|user| verify_password(password, &user.credential_hash))
        .unwrap_or(false);

    if verified {
        Ok(())
    } else {
        Err(EngineError::InvalidCredentials(username.to_string()))
    }
}
