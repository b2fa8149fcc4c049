//! The one error type handlers return.
//!
//! Component errors convert into [`ApiError`], and [`IntoResponse`] is the only
//! place a failure becomes a status code and a `{"message": ...}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use cycle_types::api::StatusMessage;

use crate::ephemeral::EphemeralError;
use crate::images::ImageHostError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// No usable credentials on the request.
    #[error("{0}")]
    Unauthenticated(String),

    /// The access token was valid but has expired; the client should refresh.
    #[error("Session expired!")]
    SessionExpired,

    /// Credentials were understood but do not grant this.
    #[error("{0}")]
    Unauthorized(String),

    /// An ephemeral token did not match.
    #[error("Unauthorized request, invalid token!")]
    InvalidToken,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthenticated(_) | Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) | Self::InvalidToken => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(e) => {
                error!(error = ?e, "Request failed");
                "Something went wrong, please try again later.".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(StatusMessage::new(message))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidToken => Self::Unauthenticated("Unauthorized request, invalid token!".into()),
            SessionError::Unauthorized => Self::Unauthorized("Unauthorized request!".into()),
            SessionError::NotFound => Self::NotFound("Unauthorized request, session not found!".into()),
            SessionError::Internal(e) => Self::Internal(e),
        }
    }
}

impl From<EphemeralError> for ApiError {
    fn from(err: EphemeralError) -> Self {
        match err {
            EphemeralError::NotFound => Self::NotFound("Unauthorized request, token not found!".into()),
            EphemeralError::InvalidToken => Self::InvalidToken,
            EphemeralError::Internal(e) => Self::Internal(e),
        }
    }
}

impl From<ImageHostError> for ApiError {
    fn from(err: ImageHostError) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = ApiError::Internal(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("disk on fire"));
    }

    #[test]
    fn statuses() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::SessionExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn compromise_maps_to_forbidden() {
        let err: ApiError = SessionError::Unauthorized.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
