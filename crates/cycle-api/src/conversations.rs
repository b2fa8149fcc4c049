use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use cycle_db::models::ConversationRow;
use cycle_types::api::{
    ChatResponse, ConversationIdResponse, ConversationResponse, ConversationView, LastChatsResponse,
    SendChatRequest, StatusMessage,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::middleware::AuthUser;
use crate::state::{AppState, AppStateInner};
use crate::validation;
use crate::views;

const MAX_MESSAGE_CHARS: usize = 2000;

/// The conversation, provided `user_id` takes part in it.
fn conversation_for(state: &AppStateInner, conversation_id: Uuid, user_id: &str) -> ApiResult<ConversationRow> {
    state
        .db
        .get_conversation(&conversation_id.to_string())?
        .filter(|c| c.has_participant(user_id))
        .ok_or_else(|| ApiError::NotFound("Conversation not found!".into()))
}

pub async fn get_or_create_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(peer_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let peer = validation::id(&peer_id, "Invalid peer id!")?;
    if peer == user.id {
        return Err(ApiError::Validation("You can't start a conversation with yourself!".into()));
    }

    let peer = peer.to_string();
    if state.db.get_user_by_id(&peer)?.is_none() {
        return Err(ApiError::NotFound("User not found!".into()));
    }

    let id = state
        .db
        .get_or_create_conversation(&Uuid::new_v4().to_string(), &user.id.to_string(), &peer)?;

    Ok(Json(ConversationIdResponse {
        conversation_id: id.parse::<Uuid>().map_err(|e| anyhow::anyhow!("Corrupt conversation id '{}': {}", id, e))?,
    }))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = validation::id(&id, "Invalid conversation id!")?;
    let me = user.id.to_string();
    let conversation = conversation_for(&state, conversation_id, &me)?;

    let peer = state
        .db
        .get_user_by_id(conversation.peer_of(&me))?
        .ok_or_else(|| ApiError::NotFound("User not found!".into()))?;
    let chats = state.db.get_chats(&conversation.id)?;

    Ok(Json(ConversationResponse {
        conversation: ConversationView {
            id: conversation_id,
            chats: chats.iter().map(views::chat).collect(),
            peer_profile: views::public_profile(&peer),
        },
    }))
}

pub async fn send_chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SendChatRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = validation::id(&id, "Invalid conversation id!")?;
    let content = validation::required(req.content, "Message is missing!")?;
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation("Message is too long!".into()));
    }

    let me = user.id.to_string();
    let conversation = conversation_for(&state, conversation_id, &me)?;

    let chat = state
        .db
        .insert_chat(&Uuid::new_v4().to_string(), &conversation.id, &me, &content)?;

    debug!(conversation_id = %conversation_id, sender = %user.id, "Chat sent");

    Ok((StatusCode::CREATED, Json(ChatResponse { chat: views::chat(&chat) })))
}

pub async fn get_last_chats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.db.get_last_chats(&user.id.to_string())?;

    Ok(Json(LastChatsResponse {
        chats: rows.iter().map(views::last_chat).collect(),
    }))
}

/// Mark everything `peer_id` sent in the conversation as seen.
pub async fn update_chat_seen_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, peer_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = validation::id(&id, "Invalid conversation or peer id!")?;
    let peer = validation::id(&peer_id, "Invalid conversation or peer id!")?.to_string();

    let conversation = conversation_for(&state, conversation_id, &user.id.to_string())?;
    if !conversation.has_participant(&peer) {
        return Err(ApiError::NotFound("Conversation not found!".into()));
    }

    state.db.mark_chats_viewed(&conversation.id, &peer)?;

    Ok(Json(StatusMessage::new("Updated successfully.")))
}
