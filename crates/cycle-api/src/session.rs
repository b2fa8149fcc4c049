//! Session tokens: issuance, rotation and revocation.
//!
//! An access token is a 15-minute HS256 JWT; a refresh token is the same
//! payload without `exp`. Every outstanding refresh token is recorded in the
//! owner's token list, and a refresh token is only honoured while it is still
//! in that list. Rotation swaps it for a new one, so presenting an
//! already-rotated token means it was copied: the whole list is dropped and
//! every session of that user has to sign in again.

use anyhow::Context;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use cycle_db::Database;
use cycle_db::models::RotateOutcome;
use cycle_types::api::SessionTokens;
use cycle_types::models::Claims;

pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad signature, or a payload that is not a refresh token.
    #[error("invalid refresh token")]
    InvalidToken,

    /// Well-formed token that is no longer (or never was) in the owner's list.
    #[error("refresh token is not active")]
    Unauthorized,

    #[error("session not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessTokenError {
    #[error("access token expired")]
    Expired,
    #[error("access token invalid")]
    Invalid,
}

/// Signing and verification keys derived from the configured secret.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn access_token(&self, user_id: Uuid) -> anyhow::Result<String> {
        let exp = chrono::Utc::now().timestamp() + ACCESS_TOKEN_TTL_SECS;
        self.sign(user_id, Some(exp as usize))
    }

    pub fn refresh_token(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign(user_id, None)
    }

    pub(crate) fn sign(&self, user_id: Uuid, exp: Option<usize>) -> anyhow::Result<String> {
        let claims = Claims {
            id: user_id,
            jti: Uuid::new_v4(),
            iat: chrono::Utc::now().timestamp() as usize,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).context("Failed to sign token")
    }

    /// Decode an access token. Expiry is reported separately so clients can
    /// refresh silently instead of sending the user back to sign in.
    pub fn decode_access(&self, token: &str) -> Result<Claims, AccessTokenError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AccessTokenError::Expired,
                _ => AccessTokenError::Invalid,
            })
    }

    /// Decode a refresh token: signature only, and it must not carry `exp`.
    pub fn decode_refresh(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &self.decoding, &validation)
            .ok()
            .map(|data| data.claims)
            .filter(|claims| claims.exp.is_none())
    }
}

/// Mint a token pair and record the refresh token in the user's list.
pub fn issue_session(db: &Database, keys: &TokenKeys, user_id: Uuid) -> Result<SessionTokens, SessionError> {
    let access = keys.access_token(user_id)?;
    let refresh = keys.refresh_token(user_id)?;

    db.append_refresh_token(&user_id.to_string(), &refresh)?;

    Ok(SessionTokens { refresh, access })
}

/// Exchange a refresh token for a new pair. The presented token is consumed.
pub fn renew_session(db: &Database, keys: &TokenKeys, refresh_token: &str) -> Result<SessionTokens, SessionError> {
    let claims = keys.decode_refresh(refresh_token).ok_or(SessionError::InvalidToken)?;
    let user_id = claims.id;

    let refresh = keys.refresh_token(user_id)?;

    match db.rotate_refresh_token(&user_id.to_string(), refresh_token, &refresh)? {
        RotateOutcome::Rotated => {
            let access = keys.access_token(user_id)?;
            info!(user_id = %user_id, "Session renewed");
            Ok(SessionTokens { refresh, access })
        }
        RotateOutcome::Compromised => {
            warn!(user_id = %user_id, "Inactive refresh token presented; all sessions revoked");
            Err(SessionError::Unauthorized)
        }
        RotateOutcome::UnknownUser => Err(SessionError::Unauthorized),
    }
}

/// Sign one session out by dropping its refresh token.
pub fn revoke_session(db: &Database, user_id: Uuid, refresh_token: &str) -> Result<(), SessionError> {
    if db.remove_refresh_token(&user_id.to_string(), refresh_token)? {
        Ok(())
    } else {
        Err(SessionError::NotFound)
    }
}
