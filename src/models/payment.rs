use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::TransactionStatus;

/// The payment record for a booking, created when the customer pays and
/// marked refunded at most once by the refund policy.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub status: TransactionStatus,
    pub refund_amount: Option<Decimal>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(booking_id: Uuid, customer_id: Uuid, amount: Decimal, method: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            customer_id,
            amount,
            method,
            status: TransactionStatus::Completed,
            refund_amount: None,
            refund_reason: None,
            refunded_at: None,
            created_at: Utc::now(),
        }
    }
}
