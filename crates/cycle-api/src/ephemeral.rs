//! Single-use verification and password-reset tokens.
//!
//! Per `(owner, purpose)` at most one token is live. The raw value only ever
//! leaves in the mailed link; the store keeps its Argon2 hash.

use rand::RngCore;
use thiserror::Error;
use uuid::Uuid;

use cycle_db::Database;
use cycle_db::models::TokenPurpose;
use cycle_db::secrets;

const TOKEN_BYTES: usize = 36;

#[derive(Debug, Error)]
pub enum EphemeralError {
    /// Never issued, already consumed, or expired.
    #[error("token not found")]
    NotFound,

    #[error("token does not match")]
    InvalidToken,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn generate_raw_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Replace any live token of this purpose with a fresh one and return its raw
/// value.
pub fn issue(db: &Database, purpose: TokenPurpose, owner_id: Uuid) -> Result<String, EphemeralError> {
    let raw = generate_raw_token();
    db.replace_ephemeral_token(&owner_id.to_string(), purpose, &raw, purpose.ttl_secs())?;
    Ok(raw)
}

/// Check `raw` against the live token. Has no side effects.
pub fn verify(db: &Database, purpose: TokenPurpose, owner_id: Uuid, raw: &str) -> Result<(), EphemeralError> {
    let stored = db
        .get_ephemeral_token(&owner_id.to_string(), purpose)?
        .ok_or(EphemeralError::NotFound)?;

    if secrets::verify_secret(raw, &stored.token_hash)? {
        Ok(())
    } else {
        Err(EphemeralError::InvalidToken)
    }
}

/// Drop the token once the action it authorised has been carried out.
pub fn consume(db: &Database, purpose: TokenPurpose, owner_id: Uuid) -> Result<(), EphemeralError> {
    if db.delete_ephemeral_token(&owner_id.to_string(), purpose)? {
        Ok(())
    } else {
        Err(EphemeralError::NotFound)
    }
}

/// `<base>?id=<owner>&token=<raw>`. Both values are URL-safe as-is.
pub fn link(base: &str, owner_id: Uuid, raw: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}id={owner_id}&token={raw}")
}
