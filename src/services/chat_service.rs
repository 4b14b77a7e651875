use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{self, Actor};
use crate::error::{AppError, Result};
use crate::models::{Booking, Chat, ChatMessage};
use crate::observability::get_metrics;
use crate::repositories::ChatRepository;

/// Manages the 1:1 chat thread attached to each booking. Admins can read any
/// thread but can never post into one.
pub struct ChatService {
    chat_repo: ChatRepository,
}

impl ChatService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            chat_repo: ChatRepository::new(pool),
        }
    }

    /// Find-or-create the booking's chat. Racing creators converge on the
    /// same row: a duplicate insert falls back to the winner's chat.
    pub async fn ensure_chat_for_booking(&self, booking: &Booking) -> Result<Chat> {
        if let Some(existing) = self.chat_repo.find_by_booking(booking.id).await? {
            return Ok(existing);
        }

        let chat = Chat {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            customer_id: booking.customer_id,
            provider_id: booking.provider_id,
            created_at: Utc::now(),
        };

        match self.chat_repo.create(&chat).await {
            Ok(created) => {
                get_metrics().record_chat_created();
                Ok(created)
            }
            Err(AppError::DuplicateChat) => self
                .chat_repo
                .find_by_booking(booking.id)
                .await?
                .ok_or(AppError::DuplicateChat),
            Err(e) => Err(e),
        }
    }

    pub async fn get_chat(&self, actor: &Actor, chat_id: Uuid) -> Result<Chat> {
        let chat = self
            .chat_repo
            .find_by_id(chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Chat '{chat_id}' not found")))?;

        if !auth::can_view_chat(actor, &chat) {
            return Err(AppError::Forbidden(
                "not a participant of this chat".to_string(),
            ));
        }
        Ok(chat)
    }

    pub async fn get_chat_for_booking(&self, actor: &Actor, booking_id: Uuid) -> Result<Chat> {
        let chat = self
            .chat_repo
            .find_by_booking(booking_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Chat for booking '{booking_id}' not found"))
            })?;

        if !auth::can_view_chat(actor, &chat) {
            return Err(AppError::Forbidden(
                "not a participant of this chat".to_string(),
            ));
        }
        Ok(chat)
    }

    /// Appends a message. Only the two participants may post; the sender side
    /// is derived from which participant the actor is, never client-supplied.
    pub async fn post_message(
        &self,
        actor: &Actor,
        chat_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation(
                "message content cannot be empty".to_string(),
            ));
        }

        let chat = self
            .chat_repo
            .find_by_id(chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Chat '{chat_id}' not found")))?;

        if !auth::can_post_message(actor, &chat) {
            return Err(AppError::Forbidden(
                "only chat participants can send messages".to_string(),
            ));
        }

        // can_post_message guarantees the actor is a participant.
        let sender_type = chat
            .sender_side(actor.id)
            .ok_or_else(|| AppError::Forbidden("not a participant of this chat".to_string()))?;

        let message = ChatMessage {
            id: Uuid::new_v4(),
            chat_id,
            sender_id: actor.id,
            sender_type,
            content: content.to_string(),
            sent_at: Utc::now(),
        };

        let message = self.chat_repo.append_message(&message).await?;
        get_metrics().record_chat_message();
        Ok(message)
    }

    pub async fn list_messages(&self, actor: &Actor, chat_id: Uuid) -> Result<Vec<ChatMessage>> {
        // Re-checks access; returns messages oldest first.
        self.get_chat(actor, chat_id).await?;
        self.chat_repo.list_messages(chat_id).await
    }
}
