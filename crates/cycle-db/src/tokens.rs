use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::models::{EphemeralTokenRow, TokenPurpose};
use crate::{Database, NOW, secrets};

impl Database {
    // -- Ephemeral tokens --

    /// Store a fresh token for `(owner, purpose)`, replacing any live one.
    ///
    /// The raw value is hashed before it is written; the row expires
    /// `ttl_secs` after creation.
    pub fn replace_ephemeral_token(
        &self,
        owner_id: &str,
        purpose: TokenPurpose,
        raw_token: &str,
        ttl_secs: i64,
    ) -> Result<()> {
        let token_hash = secrets::hash_secret(raw_token)?;
        let lifetime = format!("+{} seconds", ttl_secs);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM ephemeral_tokens WHERE owner_id = ?1 AND purpose = ?2",
                (owner_id, purpose.as_str()),
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO ephemeral_tokens (owner_id, purpose, token_hash, created_at, expires_at)
                     VALUES (?1, ?2, ?3, {NOW}, strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?4))"
                ),
                (owner_id, purpose.as_str(), &token_hash, &lifetime),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// The live token for `(owner, purpose)`. Expired rows are invisible here
    /// whether or not the purge loop has removed them yet.
    pub fn get_ephemeral_token(
        &self,
        owner_id: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<EphemeralTokenRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT owner_id, purpose, token_hash, created_at, expires_at
                         FROM ephemeral_tokens
                         WHERE owner_id = ?1 AND purpose = ?2 AND expires_at > {NOW}"
                    ),
                    (owner_id, purpose.as_str()),
                    |row| {
                        Ok(EphemeralTokenRow {
                            owner_id: row.get(0)?,
                            purpose: row.get(1)?,
                            token_hash: row.get(2)?,
                            created_at: row.get(3)?,
                            expires_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_ephemeral_token(&self, owner_id: &str, purpose: TokenPurpose) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM ephemeral_tokens WHERE owner_id = ?1 AND purpose = ?2",
                (owner_id, purpose.as_str()),
            )?;
            Ok(removed == 1)
        })
    }

    /// Physically remove expired rows. Returns how many were dropped.
    pub fn purge_expired_tokens(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let removed =
                conn.execute(&format!("DELETE FROM ephemeral_tokens WHERE expires_at <= {NOW}"), [])?;
            Ok(removed)
        })
    }
}
