/// Database row types — these map directly to SQLite rows.
/// Distinct from cycle-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub verified: bool,
    pub avatar_url: Option<String>,
    pub avatar_id: Option<String>,
    pub created_at: String,
}

/// Input for [`crate::Database::create_user`]. `password` is plaintext; the
/// store hashes it before it is written.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Verification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::PasswordReset => "password_reset",
        }
    }

    /// Absolute lifetime of a token of this purpose.
    pub fn ttl_secs(&self) -> i64 {
        match self {
            Self::Verification => 24 * 60 * 60,
            Self::PasswordReset => 60 * 60,
        }
    }
}

pub struct EphemeralTokenRow {
    pub owner_id: String,
    pub purpose: String,
    pub token_hash: String,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RotateOutcome {
    /// Old value removed, new value appended.
    Rotated,
    /// User exists but did not hold the token; every token was dropped.
    Compromised,
    /// No user with that id.
    UnknownUser,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductImageRow {
    pub image_id: String,
    pub url: String,
}

pub struct ProductRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub purchasing_date: String,
    pub thumbnail: Option<String>,
    pub created_at: String,
    pub images: Vec<ProductImageRow>,
}

pub struct NewProduct<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub price: f64,
    pub category: &'a str,
    pub purchasing_date: &'a str,
    pub images: &'a [ProductImageRow],
}

pub struct ProductChanges<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub price: f64,
    pub category: &'a str,
    pub purchasing_date: &'a str,
    pub new_images: &'a [ProductImageRow],
    /// Replaces the thumbnail when set; otherwise an empty thumbnail takes
    /// the first new image.
    pub thumbnail: Option<&'a str>,
}

pub struct ConversationRow {
    pub id: String,
    pub participants_id: String,
    pub participant_a: String,
    pub participant_b: String,
}

impl ConversationRow {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }

    /// The participant that is not `user_id`.
    pub fn peer_of(&self, user_id: &str) -> &str {
        if self.participant_a == user_id {
            &self.participant_b
        } else {
            &self.participant_a
        }
    }
}

pub struct ChatRow {
    pub id: String,
    pub conversation_id: String,
    pub sent_by: String,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub content: String,
    pub timestamp: String,
    pub viewed: bool,
}

pub struct LastChatRow {
    pub conversation_id: String,
    pub peer_id: String,
    pub peer_name: String,
    pub peer_avatar: Option<String>,
    pub last_message: String,
    pub timestamp: String,
    pub unread_count: u32,
}
