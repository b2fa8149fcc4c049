use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use cycle_types::models::UserProfile;

use crate::error::{ApiError, ApiResult};
use crate::session::AccessTokenError;
use crate::state::{AppState, AppStateInner};
use crate::views;

/// The identity handlers receive through `Extension<AuthUser>`.
pub type AuthUser = UserProfile;

/// Resolve the bearer token to a user and attach their profile to the request.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let user = authenticate(&state, req.headers())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub fn authenticate(state: &AppStateInner, headers: &HeaderMap) -> ApiResult<AuthUser> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("Unauthorized request!".into()))?;

    let claims = state.keys.decode_access(token).map_err(|e| match e {
        AccessTokenError::Expired => ApiError::SessionExpired,
        AccessTokenError::Invalid => ApiError::Unauthenticated("Unauthorized access!".into()),
    })?;

    let user = state
        .db
        .get_user_by_id(&claims.id.to_string())?
        .ok_or_else(|| ApiError::Unauthenticated("Unauthorized access!".into()))?;

    Ok(views::profile(&user))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use uuid::Uuid;

    use super::*;
    use crate::testing::TestApp;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn valid_token_resolves_profile() {
        let app = TestApp::new();
        let (user_id, tokens) = app.signed_in_user("Ann", "ann@x.com");

        let user = authenticate(&app.state, &bearer(&tokens.access)).unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.email, "ann@x.com");
        assert!(!user.verified);
    }

    #[test]
    fn missing_or_malformed_header_is_unauthenticated() {
        let app = TestApp::new();

        let err = authenticate(&app.state, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(matches!(
            authenticate(&app.state, &headers).unwrap_err(),
            ApiError::Unauthenticated(_)
        ));

        assert!(matches!(
            authenticate(&app.state, &bearer("garbage")).unwrap_err(),
            ApiError::Unauthenticated(_)
        ));
    }

    #[test]
    fn expired_token_is_session_expired() {
        let app = TestApp::new();
        let (user_id, _) = app.signed_in_user("Ann", "ann@x.com");

        let past = (chrono::Utc::now().timestamp() - 3600) as usize;
        let expired = app.state.keys.sign(user_id, Some(past)).unwrap();

        assert!(matches!(
            authenticate(&app.state, &bearer(&expired)).unwrap_err(),
            ApiError::SessionExpired
        ));
    }

    #[test]
    fn refresh_token_is_not_accepted() {
        let app = TestApp::new();
        let (_, tokens) = app.signed_in_user("Ann", "ann@x.com");

        assert!(matches!(
            authenticate(&app.state, &bearer(&tokens.refresh)).unwrap_err(),
            ApiError::Unauthenticated(_)
        ));
    }

    #[test]
    fn deleted_user_is_unauthenticated() {
        let app = TestApp::new();
        let ghost = app.state.keys.access_token(Uuid::new_v4()).unwrap();

        assert!(matches!(
            authenticate(&app.state, &bearer(&ghost)).unwrap_err(),
            ApiError::Unauthenticated(_)
        ));
    }
}
