//! Password hashing
//!
//! Argon2id hashing and verification for student account passwords.
//! Each hash carries its own random salt in PHC string format.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2id with the crate's secure defaults.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored PHC-format hash.
///
/// Returns `Ok(false)` for a mismatch; errors only on malformed hashes.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_with_random_salt() {
        let hash1 = hash_password("hunter2").expect("Failed to hash");
        let hash2 = hash_password("hunter2").expect("Failed to hash");
        assert!(hash1.starts_with("$argon2id$"));
        assert_ne!(hash1, hash2, "salts must differ");
    }

    #[test]
    fn test_verify_matches_and_rejects() {
        let hash = hash_password("correct-horse").expect("Failed to hash");
        assert!(verify_password("correct-horse", &hash).unwrap());
        assert!(!verify_password("battery-staple", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash_format_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
