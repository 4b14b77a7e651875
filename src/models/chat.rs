use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The side a chat message was sent from. Admins cannot send messages, so
/// there is no admin variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sender_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Customer,
    Provider,
}

/// The 1:1 message thread for a booking. Participants are copied from the
/// booking at creation and never change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chat {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.customer_id == user_id || self.provider_id == user_id
    }

    /// Resolves the sender side for a participant.
    pub fn sender_side(&self, user_id: Uuid) -> Option<SenderType> {
        if user_id == self.customer_id {
            Some(SenderType::Customer)
        } else if user_id == self.provider_id {
            Some(SenderType::Provider)
        } else {
            None
        }
    }
}

/// Append-only chat message, ordered by insertion time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub sender_type: SenderType,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}
