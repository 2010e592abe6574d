//! Two-Phase Messaging Handshake (spec §4.4, component J).

use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::messaging::models::{Chat, ChatMessage, ChatSummary};

pub struct MessagingService {
    pool: PgPool,
}

impl MessagingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Preconditions: no existing open chat for the unordered pair (enforced
    /// by `chats_one_open_per_pair`); recipient must have received a `like`
    /// from sender.
    pub async fn send_greeting(&self, sender_id: i64, recipient_id: i64, body: &str) -> Result<Chat> {
        if sender_id == recipient_id {
            return Err(Error::InvalidArgument("cannot message yourself".to_string()));
        }

        let liked: Option<(i64,)> = sqlx::query_as(
            "SELECT swipe_id FROM swipes WHERE swiper_id = $1 AND target_id = $2 AND direction = 'like'",
        )
        .bind(sender_id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await?;

        if liked.is_none() {
            return Err(Error::Forbidden("recipient has not been liked by sender".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let chat: Chat = sqlx::query_as(
            r#"
            INSERT INTO chats (initiator_id, responder_id, state)
            VALUES ($1, $2, 'pending_greeting')
            RETURNING chat_id, initiator_id, responder_id, state, created_at, last_message_at
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Conflict("a chat is already open between these users".to_string())
            }
            other => Error::Database(other),
        })?;

        sqlx::query(
            "INSERT INTO chat_messages (chat_id, sender_id, body, is_greeting) VALUES ($1, $2, $3, true)",
        )
        .bind(chat.chat_id)
        .bind(sender_id)
        .bind(body)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE chats SET last_message_at = now() WHERE chat_id = $1")
            .bind(chat.chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(chat)
    }

    /// Row-level lock serialises concurrent responders; the loser observes
    /// a state that is no longer `pending_greeting` and gets `Conflict`
    /// (spec §4.4 Concurrency).
    pub async fn respond_greeting(&self, responder_id: i64, chat_id: i64, accept: bool) -> Result<Chat> {
        let mut tx = self.pool.begin().await?;

        let chat: Option<Chat> = sqlx::query_as(
            "SELECT chat_id, initiator_id, responder_id, state, created_at, last_message_at FROM chats WHERE chat_id = $1 FOR UPDATE",
        )
        .bind(chat_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(chat) = chat else {
            return Err(Error::NotFound("no such chat".to_string()));
        };

        if chat.responder_id != responder_id {
            return Err(Error::Forbidden("not the recipient of this greeting".to_string()));
        }

        if chat.state != "pending_greeting" {
            return Err(Error::Conflict("greeting already resolved".to_string()));
        }

        let new_state = if accept { "active" } else { "rejected" };
        let updated: Chat = sqlx::query_as(
            "UPDATE chats SET state = $2 WHERE chat_id = $1 RETURNING chat_id, initiator_id, responder_id, state, created_at, last_message_at",
        )
        .bind(chat_id)
        .bind(new_state)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn send_message(&self, sender_id: i64, chat_id: i64, body: &str) -> Result<ChatMessage> {
        let mut tx = self.pool.begin().await?;

        let chat: Option<Chat> = sqlx::query_as(
            "SELECT chat_id, initiator_id, responder_id, state, created_at, last_message_at FROM chats WHERE chat_id = $1 FOR UPDATE",
        )
        .bind(chat_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(chat) = chat else {
            return Err(Error::NotFound("no such chat".to_string()));
        };

        if !chat.is_party(sender_id) {
            return Err(Error::Forbidden("not a party to this chat".to_string()));
        }
        if chat.state != "active" {
            return Err(Error::Conflict("chat is not active".to_string()));
        }

        let message: ChatMessage = sqlx::query_as(
            r#"
            INSERT INTO chat_messages (chat_id, sender_id, body, is_greeting)
            VALUES ($1, $2, $3, false)
            RETURNING message_id, chat_id, sender_id, body, is_greeting, created_at, read_at
            "#,
        )
        .bind(chat_id)
        .bind(sender_id)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE chats SET last_message_at = now() WHERE chat_id = $1")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    pub async fn list_pending(&self, user_id: i64) -> Result<Vec<Chat>> {
        let chats = sqlx::query_as(
            "SELECT chat_id, initiator_id, responder_id, state, created_at, last_message_at FROM chats WHERE responder_id = $1 AND state = 'pending_greeting' ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chats)
    }

    pub async fn list_chats(&self, user_id: i64) -> Result<Vec<ChatSummary>> {
        let chats: Vec<Chat> = sqlx::query_as(
            "SELECT chat_id, initiator_id, responder_id, state, created_at, last_message_at FROM chats WHERE initiator_id = $1 OR responder_id = $1 ORDER BY last_message_at DESC NULLS LAST",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(chats.len());
        for chat in chats {
            let preview: Option<(String,)> = sqlx::query_as(
                "SELECT body FROM chat_messages WHERE chat_id = $1 ORDER BY created_at DESC, message_id DESC LIMIT 1",
            )
            .bind(chat.chat_id)
            .fetch_optional(&self.pool)
            .await?;

            let unread: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM chat_messages WHERE chat_id = $1 AND sender_id <> $2 AND read_at IS NULL",
            )
            .bind(chat.chat_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

            summaries.push(ChatSummary {
                chat,
                last_message_preview: preview.map(|(b,)| b),
                unread_count: unread.0,
            });
        }
        Ok(summaries)
    }

    /// Paginated message history; marks messages not authored by `user_id`
    /// as read (spec §4.4).
    pub async fn get_messages(
        &self,
        user_id: i64,
        chat_id: i64,
        cursor: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>> {
        let chat: Option<Chat> = sqlx::query_as(
            "SELECT chat_id, initiator_id, responder_id, state, created_at, last_message_at FROM chats WHERE chat_id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(chat) = chat else {
            return Err(Error::NotFound("no such chat".to_string()));
        };
        if !chat.is_party(user_id) {
            return Err(Error::Forbidden("not a party to this chat".to_string()));
        }

        let messages: Vec<ChatMessage> = sqlx::query_as(
            r#"
            SELECT message_id, chat_id, sender_id, body, is_greeting, created_at, read_at
            FROM chat_messages
            WHERE chat_id = $1 AND message_id > $2
            ORDER BY created_at ASC, message_id ASC
            LIMIT $3
            "#,
        )
        .bind(chat_id)
        .bind(cursor.unwrap_or(0))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        sqlx::query(
            "UPDATE chat_messages SET read_at = now() WHERE chat_id = $1 AND sender_id <> $2 AND read_at IS NULL",
        )
        .bind(chat_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(messages)
    }
}
