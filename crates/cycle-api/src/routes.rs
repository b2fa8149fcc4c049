use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, conversations, products};

/// Five product photos plus form fields.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let gate = || middleware::from_fn_with_state(state.clone(), require_auth);

    let auth_public = Router::new()
        .route("/sign-up", post(auth::sign_up))
        .route("/verify", post(auth::verify_email))
        .route("/sign-in", post(auth::sign_in))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/forget-pass", post(auth::forget_password))
        .route("/verify-pass-reset-token", post(auth::grant_valid))
        .route("/reset-pass", post(auth::update_password));

    let auth_protected = Router::new()
        .route("/verify-token", get(auth::resend_verification_link))
        .route("/profile", get(auth::profile))
        .route("/sign-out", post(auth::sign_out))
        .route("/update-profile", patch(auth::update_profile))
        .route("/update-avatar", patch(auth::update_avatar))
        .route("/profile/{id}", get(auth::public_profile))
        .route_layer(gate());

    let product_public = Router::new()
        .route("/detail/{id}", get(products::get_product_detail))
        .route("/by-category/{category}", get(products::get_products_by_category))
        .route("/latest", get(products::get_latest_products));

    let product_protected = Router::new()
        .route("/list", post(products::list_new_product))
        .route(
            "/{id}",
            patch(products::update_product).delete(products::delete_product),
        )
        .route("/image/{id}/{image_id}", delete(products::delete_product_image))
        .route("/listings", get(products::get_listings))
        .route_layer(gate());

    let conversation = Router::new()
        .route("/with/{peer_id}", get(conversations::get_or_create_conversation))
        .route(
            "/chats/{id}",
            get(conversations::get_conversation).post(conversations::send_chat),
        )
        .route("/last-chats", get(conversations::get_last_chats))
        .route("/seen/{id}/{peer_id}", patch(conversations::update_chat_seen_status))
        .route_layer(gate());

    Router::new()
        .nest("/auth", auth_public.merge(auth_protected))
        .nest("/product", product_public.merge(product_protected))
        .nest("/conversation", conversation)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
