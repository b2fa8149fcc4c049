//! One-way hashing applied to secrets before they are persisted.
//!
//! Passwords and ephemeral tokens both go through [`hash_secret`] inside the
//! store's insert/update paths; callers only ever hand plaintext to the store.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

/// Hash with Argon2id and a fresh random salt (PHC string format).
pub fn hash_secret(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash secret: {}", e))
}

/// Returns `Ok(false)` on mismatch and `Err` only when the stored hash is not
/// a valid PHC string. Argon2 verification compares in constant time.
pub fn verify_secret(plaintext: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow!("Corrupt secret hash: {}", e))?;

    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Secret verification failed: {}", e)),
    }
}
