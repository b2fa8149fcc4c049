use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use cycle_db::models::{NewUser, TokenPurpose};
use cycle_db::secrets;
use cycle_types::api::{
    ForgetPasswordRequest, ProfileResponse, PublicProfileResponse, RefreshTokenRequest, ResetPasswordRequest,
    SignInRequest, SignInResponse, SignUpRequest, StatusMessage, TokensResponse, UpdateProfileRequest,
    ValidResponse, VerifyTokenRequest,
};
use cycle_types::models::UserProfile;

use crate::ephemeral;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::form::UploadForm;
use crate::images::Transform;
use crate::mail::{self, Mail};
use crate::middleware::AuthUser;
use crate::session;
use crate::state::{AppState, blocking};
use crate::validation;
use crate::views;

pub async fn sign_up(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignUpRequest>,
) -> ApiResult<impl IntoResponse> {
    let input = validation::sign_up(req)?;

    if state.db.get_user_by_email(&input.email)?.is_some() {
        return Err(ApiError::Conflict("Email is already in use!".into()));
    }

    let user_id = Uuid::new_v4();
    let email = input.email.clone();

    let raw = blocking(&state, move |state| {
        let created = state.db.create_user(&NewUser {
            id: &user_id.to_string(),
            name: &input.name,
            email: &input.email,
            password: &input.password,
        })?;
        // Lost a race with a concurrent sign-up for the same address.
        if !created {
            return Err(ApiError::Conflict("Email is already in use!".into()));
        }
        Ok(ephemeral::issue(&state.db, TokenPurpose::Verification, user_id)?)
    })
    .await?;

    let link = ephemeral::link(&state.config.verification_link, user_id, &raw);
    mail::deliver(state.mailer.as_ref(), &email, Mail::Verification { link }).await;

    info!(user_id = %user_id, "Account registered");

    Ok((StatusCode::CREATED, Json(StatusMessage::new("Please check your inbox."))))
}

pub async fn verify_email(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let (user_id, token) = validation::token_and_id(req)?;

    blocking(&state, move |state| {
        ephemeral::verify(&state.db, TokenPurpose::Verification, user_id, &token)?;
        state.db.mark_verified(&user_id.to_string())?;
        ephemeral::consume(&state.db, TokenPurpose::Verification, user_id)?;
        Ok(())
    })
    .await?;

    info!(user_id = %user_id, "Email verified");

    Ok(Json(StatusMessage::new("Thanks for joining us, your email is verified.")))
}

/// Mail a fresh verification link to the signed-in user.
pub async fn resend_verification_link(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    if user.verified {
        return Err(ApiError::Validation("Your account is already verified!".into()));
    }

    let user_id = user.id;
    let raw = blocking(&state, move |state| {
        Ok(ephemeral::issue(&state.db, TokenPurpose::Verification, user_id)?)
    })
    .await?;

    let link = ephemeral::link(&state.config.verification_link, user_id, &raw);
    mail::deliver(state.mailer.as_ref(), &user.email, Mail::Verification { link }).await;

    Ok(Json(StatusMessage::new("Please check your inbox.")))
}

pub async fn sign_in(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignInRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = validation::required(req.email, "Email is missing!")?.to_lowercase();
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("Password is missing!".into()))?;

    let (profile, tokens) = blocking(&state, move |state| {
        let mismatch = || ApiError::Unauthorized("Email/Password mismatch!".into());

        let user = state.db.get_user_by_email(&email)?.ok_or_else(mismatch)?;
        if !secrets::verify_secret(&password, &user.password)? {
            return Err(mismatch());
        }

        let profile = views::profile(&user);
        let tokens = session::issue_session(&state.db, &state.keys, profile.id)?;
        Ok((profile, tokens))
    })
    .await?;

    info!(user_id = %profile.id, "Signed in");

    Ok(Json(SignInResponse { profile, tokens }))
}

pub async fn profile(Extension(user): Extension<AuthUser>) -> impl IntoResponse {
    Json(ProfileResponse { profile: user })
}

pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let token = req
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("Unauthorized request!".into()))?;

    let tokens = session::renew_session(&state.db, &state.keys, &token)?;

    Ok(Json(TokensResponse { tokens }))
}

pub async fn sign_out(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<RefreshTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let token = validation::required(req.refresh_token, "Refresh token is missing!")?;

    session::revoke_session(&state.db, user.id, &token)?;

    info!(user_id = %user.id, "Signed out");

    Ok(Json(StatusMessage::new("Signed out successfully.")))
}

pub async fn forget_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = validation::email(req.email)?;

    let user = state
        .db
        .get_user_by_email(&email)?
        .ok_or_else(|| ApiError::NotFound("Account not found!".into()))?;
    let user_id = views::profile(&user).id;

    let raw = blocking(&state, move |state| {
        Ok(ephemeral::issue(&state.db, TokenPurpose::PasswordReset, user_id)?)
    })
    .await?;

    let link = ephemeral::link(&state.config.password_reset_link, user_id, &raw);
    mail::deliver(state.mailer.as_ref(), &user.email, Mail::PasswordReset { link }).await;

    Ok(Json(StatusMessage::new("Please check your email.")))
}

/// Lets the reset page check a link before asking for the new password.
pub async fn grant_valid(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyTokenRequest>,
) -> ApiResult<impl IntoResponse> {
    let (user_id, token) = validation::token_and_id(req)?;

    blocking(&state, move |state| {
        Ok(ephemeral::verify(&state.db, TokenPurpose::PasswordReset, user_id, &token)?)
    })
    .await?;

    Ok(Json(ValidResponse { valid: true }))
}

pub async fn update_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let input = validation::reset_password(req)?;
    let user_id = input.owner;

    let email = blocking(&state, move |state| {
        ephemeral::verify(&state.db, TokenPurpose::PasswordReset, input.owner, &input.token)?;

        let id = input.owner.to_string();
        let user = state
            .db
            .get_user_by_id(&id)?
            .ok_or_else(|| ApiError::NotFound("Account not found!".into()))?;

        if secrets::verify_secret(&input.password, &user.password)? {
            return Err(ApiError::Validation("The new password must be different!".into()));
        }

        state.db.update_password(&id, &input.password)?;
        ephemeral::consume(&state.db, TokenPurpose::PasswordReset, input.owner)?;
        Ok(user.email)
    })
    .await?;

    mail::deliver(state.mailer.as_ref(), &email, Mail::PasswordUpdated).await;

    info!(user_id = %user_id, "Password reset");

    Ok(Json(StatusMessage::new("Password resets successfully.")))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = validation::profile_name(req.name)?;

    state.db.update_name(&user.id.to_string(), &name)?;

    Ok(Json(ProfileResponse {
        profile: UserProfile { name, ..user },
    }))
}

pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut form: UploadForm,
) -> ApiResult<impl IntoResponse> {
    let mut files = form.take_files("avatar");
    if files.len() > 1 {
        return Err(ApiError::Validation("Multiple files are not allowed!".into()));
    }
    let file = files
        .pop()
        .ok_or_else(|| ApiError::Validation("Avatar is missing!".into()))?;
    if !file.is_image() {
        return Err(ApiError::Validation("Invalid image file!".into()));
    }

    let id = user.id.to_string();
    let current = state
        .db
        .get_user_by_id(&id)?
        .ok_or_else(|| ApiError::NotFound("User not found!".into()))?;

    let avatar = state.images.upload(file.into_upload(), Transform::Avatar).await?;
    state.db.update_avatar(&id, &avatar.url, &avatar.id)?;

    if let Some(old) = current.avatar_id.as_deref() {
        if let Err(e) = state.images.destroy(old).await {
            warn!(user_id = %id, image_id = %old, "Failed to destroy replaced avatar: {}", e);
        }
    }

    Ok(Json(ProfileResponse {
        profile: UserProfile {
            avatar: Some(avatar.url),
            ..user
        },
    }))
}

pub async fn public_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let user_id = validation::id(&id, "Invalid user id!")?;

    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("User not found!".into()))?;

    Ok(Json(PublicProfileResponse {
        profile: views::public_profile(&user),
    }))
}
