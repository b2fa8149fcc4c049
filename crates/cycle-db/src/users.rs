use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::{NewUser, RotateOutcome, UserRow};
use crate::{Database, NOW, is_unique_violation, secrets};

const USER_COLUMNS: &str = "id, name, email, password, verified, avatar_url, avatar_id, created_at";

impl Database {
    // -- Users --

    /// Insert a user, hashing the plaintext password first.
    /// Returns `false` when the email is already registered.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<bool> {
        let password_hash = secrets::hash_secret(user.password)?;

        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (id, name, email, password) VALUES (?1, ?2, ?3, ?4)",
                (user.id, user.name, user.email, &password_hash),
            ) {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn mark_verified(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                &format!("UPDATE users SET verified = 1, updated_at = {NOW} WHERE id = ?1"),
                [id],
            )?;
            Ok(updated == 1)
        })
    }

    /// Replace the password, hashing the plaintext first.
    pub fn update_password(&self, id: &str, password: &str) -> Result<bool> {
        let password_hash = secrets::hash_secret(password)?;

        self.with_conn(|conn| {
            let updated = conn.execute(
                &format!("UPDATE users SET password = ?2, updated_at = {NOW} WHERE id = ?1"),
                (id, &password_hash),
            )?;
            Ok(updated == 1)
        })
    }

    pub fn update_name(&self, id: &str, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                &format!("UPDATE users SET name = ?2, updated_at = {NOW} WHERE id = ?1"),
                (id, name),
            )?;
            Ok(updated == 1)
        })
    }

    pub fn update_avatar(&self, id: &str, url: &str, image_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                &format!(
                    "UPDATE users SET avatar_url = ?2, avatar_id = ?3, updated_at = {NOW} WHERE id = ?1"
                ),
                (id, url, image_id),
            )?;
            Ok(updated == 1)
        })
    }

    // -- Refresh tokens --

    pub fn append_refresh_token(&self, user_id: &str, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (user_id, token) VALUES (?1, ?2)",
                (user_id, token),
            )?;
            Ok(())
        })
    }

    /// Remove exactly one entry holding `token`. Returns `false` if the user
    /// did not hold it.
    pub fn remove_refresh_token(&self, user_id: &str, token: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(delete_one_token(conn, user_id, token)? == 1))
    }

    /// Compare-and-swap `old` for `new` in the user's list.
    ///
    /// Runs in a single transaction: the new value is only appended when the
    /// old one was actually removed. When it was not, the user's whole list is
    /// cleared, so a replayed token logs out every session.
    pub fn rotate_refresh_token(&self, user_id: &str, old: &str, new: &str) -> Result<RotateOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let outcome = if delete_one_token(&tx, user_id, old)? == 1 {
                tx.execute(
                    "INSERT INTO refresh_tokens (user_id, token) VALUES (?1, ?2)",
                    (user_id, new),
                )?;
                RotateOutcome::Rotated
            } else if query_user(&tx, "id", user_id)?.is_some() {
                tx.execute("DELETE FROM refresh_tokens WHERE user_id = ?1", [user_id])?;
                RotateOutcome::Compromised
            } else {
                RotateOutcome::UnknownUser
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Tokens in issue order.
    pub fn get_refresh_tokens(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT token FROM refresh_tokens WHERE user_id = ?1 ORDER BY seq")?;
            let tokens = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(tokens)
        })
    }
}

fn delete_one_token(conn: &Connection, user_id: &str, token: &str) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM refresh_tokens WHERE seq = (
             SELECT seq FROM refresh_tokens WHERE user_id = ?1 AND token = ?2 LIMIT 1
         )",
        (user_id, token),
    )?;
    Ok(removed)
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        verified: row.get(4)?,
        avatar_url: row.get(5)?,
        avatar_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}
