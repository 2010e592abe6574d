//! `/chats/*` handlers (spec §6, §4.4).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::Result;
use crate::messaging::{Chat, ChatMessage, ChatSummary};
use crate::middleware::AuthUser;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GreetingRequest {
    pub recipient_id: i64,
    pub body: String,
}

pub async fn send_greeting(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<GreetingRequest>,
) -> Result<(StatusCode, Json<Chat>)> {
    let chat = state.messaging.send_greeting(user.user_id, request.recipient_id, &request.body).await?;
    if let Some(m) = crate::observability::metrics() {
        m.chats_created.add(1, &[]);
    }
    Ok((StatusCode::CREATED, Json(chat)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondGreetingRequest {
    pub chat_id: i64,
    pub accept: bool,
}

pub async fn respond_greeting(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<RespondGreetingRequest>,
) -> Result<Json<Chat>> {
    let chat = state.messaging.respond_greeting(user.user_id, request.chat_id, request.accept).await?;
    if let Some(m) = crate::observability::metrics() {
        m.chats_transitioned.add(1, &[]);
    }
    Ok(Json(chat))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub body: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>)> {
    let message = state.messaging.send_message(user.user_id, request.chat_id, &request.body).await?;
    if let Some(m) = crate::observability::metrics() {
        m.messages_sent.add(1, &[]);
    }
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_chats(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Vec<ChatSummary>>> {
    Ok(Json(state.messaging.list_chats(user.user_id).await?))
}

pub async fn list_pending(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Vec<Chat>>> {
    Ok(Json(state.messaging.list_pending(user.user_id).await?))
}

pub async fn get_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<Chat>> {
    let summaries = state.messaging.list_chats(user.user_id).await?;
    summaries
        .into_iter()
        .find(|s| s.chat.chat_id == chat_id)
        .map(|s| Json(s.chat))
        .ok_or_else(|| crate::error::Error::NotFound("no such chat".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<i64>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<ChatMessage>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let messages = state.messaging.get_messages(user.user_id, chat_id, query.cursor, limit).await?;
    Ok(Json(messages))
}
