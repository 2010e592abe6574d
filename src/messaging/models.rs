//! Row types for the messaging state machine (spec §3, §4.4).

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    PendingGreeting,
    Active,
    Rejected,
    Closed,
}

impl ChatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatState::PendingGreeting => "pending_greeting",
            ChatState::Active => "active",
            ChatState::Rejected => "rejected",
            ChatState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Chat {
    pub chat_id: i64,
    pub initiator_id: i64,
    pub responder_id: i64,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Chat {
    pub fn is_party(&self, user_id: i64) -> bool {
        self.initiator_id == user_id || self.responder_id == user_id
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ChatMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub body: String,
    pub is_greeting: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    pub chat: Chat,
    pub last_message_preview: Option<String>,
    pub unread_count: i64,
}
