use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "withdrawal_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Failed,
}

/// A provider payout request. Auto-approved to `completed` on creation, with
/// the matching wallet debit written in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

impl Withdrawal {
    pub fn new(
        user_id: Uuid,
        amount: Decimal,
        bank_name: String,
        account_number: String,
        account_name: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            bank_name,
            account_number,
            account_name,
            status: WithdrawalStatus::Completed,
            created_at: Utc::now(),
        }
    }
}
