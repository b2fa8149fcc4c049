use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Category, PublicProfile, UserProfile};

// Request fields are optional so missing values surface as validation
// messages instead of deserialization rejections.

// -- Auth --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignUpRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignInRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of `/auth/verify` and `/auth/verify-pass-reset-token`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyTokenRequest {
    pub id: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub id: Option<String>,
    pub token: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgetPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub refresh: String,
    pub access: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub profile: UserProfile,
    pub tokens: SessionTokens,
}

#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub tokens: SessionTokens,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct PublicProfileResponse {
    pub profile: PublicProfile,
}

#[derive(Debug, Serialize)]
pub struct ValidResponse {
    pub valid: bool,
}

// -- Products --

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageQuery {
    pub page_no: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub thumbnail: Option<String>,
    pub category: Category,
    pub price: f64,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub thumbnail: Option<String>,
    pub category: Category,
    pub date: DateTime<Utc>,
    pub price: f64,
    pub image: Vec<String>,
    pub seller: PublicProfile,
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse<T> {
    pub products: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    pub product: ProductDetail,
}

// -- Conversations --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendChatRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationIdResponse {
    pub conversation_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub id: Uuid,
    pub text: String,
    pub time: DateTime<Utc>,
    pub viewed: bool,
    pub user: PublicProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: Uuid,
    pub chats: Vec<ChatView>,
    pub peer_profile: PublicProfile,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: ConversationView,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat: ChatView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastChat {
    pub id: Uuid,
    pub last_message: String,
    pub timestamp: DateTime<Utc>,
    pub unread_chat_counts: u32,
    pub peer_profile: PublicProfile,
}

#[derive(Debug, Serialize)]
pub struct LastChatsResponse {
    pub chats: Vec<LastChat>,
}
