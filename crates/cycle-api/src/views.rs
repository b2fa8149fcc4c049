//! Store rows to API views.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use cycle_db::models::{ChatRow, LastChatRow, ProductRow, UserRow};
use cycle_db::parse_timestamp;
use cycle_types::api::{ChatView, LastChat, ProductDetail, ProductSummary};
use cycle_types::models::{Category, PublicProfile, UserProfile};

fn uuid_of(value: &str, what: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, value, e);
        Uuid::default()
    })
}

fn time_of(value: &str, what: &str) -> DateTime<Utc> {
    parse_timestamp(value).unwrap_or_else(|| {
        warn!("Corrupt {} '{}'", what, value);
        DateTime::default()
    })
}

fn category_of(value: &str) -> Category {
    value.parse().unwrap_or_else(|e| {
        warn!("{}; listing as Others", e);
        Category::Others
    })
}

pub fn profile(row: &UserRow) -> UserProfile {
    UserProfile {
        id: uuid_of(&row.id, "user id"),
        name: row.name.clone(),
        email: row.email.clone(),
        verified: row.verified,
        avatar: row.avatar_url.clone(),
    }
}

pub fn public_profile(row: &UserRow) -> PublicProfile {
    PublicProfile {
        id: uuid_of(&row.id, "user id"),
        name: row.name.clone(),
        avatar: row.avatar_url.clone(),
    }
}

pub fn product_summary(row: &ProductRow) -> ProductSummary {
    ProductSummary {
        id: uuid_of(&row.id, "product id"),
        name: row.name.clone(),
        thumbnail: row.thumbnail.clone(),
        category: category_of(&row.category),
        price: row.price,
    }
}

pub fn product_detail(row: &ProductRow, seller: PublicProfile) -> ProductDetail {
    ProductDetail {
        id: uuid_of(&row.id, "product id"),
        name: row.name.clone(),
        description: row.description.clone(),
        thumbnail: row.thumbnail.clone(),
        category: category_of(&row.category),
        date: time_of(&row.purchasing_date, "purchasing date"),
        price: row.price,
        image: row.images.iter().map(|img| img.url.clone()).collect(),
        seller,
    }
}

pub fn chat(row: &ChatRow) -> ChatView {
    ChatView {
        id: uuid_of(&row.id, "chat id"),
        text: row.content.clone(),
        time: time_of(&row.timestamp, "chat timestamp"),
        viewed: row.viewed,
        user: PublicProfile {
            id: uuid_of(&row.sent_by, "sender id"),
            name: row.sender_name.clone(),
            avatar: row.sender_avatar.clone(),
        },
    }
}

pub fn last_chat(row: &LastChatRow) -> LastChat {
    LastChat {
        id: uuid_of(&row.conversation_id, "conversation id"),
        last_message: row.last_message.clone(),
        timestamp: time_of(&row.timestamp, "chat timestamp"),
        unread_chat_counts: row.unread_count,
        peer_profile: PublicProfile {
            id: uuid_of(&row.peer_id, "peer id"),
            name: row.peer_name.clone(),
            avatar: row.peer_avatar.clone(),
        },
    }
}
