use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Chat, ChatMessage};

const CHAT_COLUMNS: &str = "id, booking_id, customer_id, provider_id, created_at";
const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, sender_type, content, sent_at";

pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Chat>> {
        let row = sqlx::query_as::<_, Chat>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Chat>> {
        let row = sqlx::query_as::<_, Chat>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE booking_id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Inserts the booking's chat; the unique constraint on `booking_id`
    /// surfaces as `DuplicateChat` so callers can decide between failing
    /// (explicit create) and re-fetching (find-or-create).
    pub async fn create(&self, chat: &Chat) -> Result<Chat> {
        let row = sqlx::query_as::<_, Chat>(&format!(
            r#"
            INSERT INTO chats ({CHAT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(chat.id)
        .bind(chat.booking_id)
        .bind(chat.customer_id)
        .bind(chat.provider_id)
        .bind(chat.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, "chats_booking_id_key", AppError::DuplicateChat)
        })?;

        Ok(row)
    }

    pub async fn append_message(&self, message: &ChatMessage) -> Result<ChatMessage> {
        let row = sqlx::query_as::<_, ChatMessage>(&format!(
            r#"
            INSERT INTO chat_messages ({MESSAGE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(message.id)
        .bind(message.chat_id)
        .bind(message.sender_id)
        .bind(message.sender_type)
        .bind(&message.content)
        .bind(message.sent_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE chat_id = $1 ORDER BY sent_at, id"
        ))
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
