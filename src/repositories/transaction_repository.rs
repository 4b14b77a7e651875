use crate::error::{AppError, Result};
use crate::models::{LedgerPurpose, WalletTransaction};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const TX_COLUMNS: &str = "id, account_id, counterparty_id, booking_id, purpose, tx_type, action, \
                          method, status, amount, currency, note, balance_after, created_at";

/// Read side of the wallet transaction log. Writes happen only inside the
/// wallet service's SQL transactions so that the log and the balance can
/// never diverge.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_account(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransaction>(&format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM wallet_transactions
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn count_by_account(&self, account_id: Uuid) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM wallet_transactions WHERE account_id = $1")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::Database)?;

        Ok(count.0)
    }

    /// Looks up a prior booking-driven effect. Used as the cheap pre-check
    /// before the unique index settles any race.
    pub async fn find_booking_effect(
        &self,
        booking_id: Uuid,
        purpose: LedgerPurpose,
    ) -> Result<Option<WalletTransaction>> {
        let row = sqlx::query_as::<_, WalletTransaction>(&format!(
            "SELECT {TX_COLUMNS} FROM wallet_transactions WHERE booking_id = $1 AND purpose = $2"
        ))
        .bind(booking_id)
        .bind(purpose)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Replays the log into a signed sum. Reconciliation only; the `users`
    /// balance column is authoritative.
    pub async fn derived_balance(&self, account_id: Uuid) -> Result<Decimal> {
        let sum: (Option<Decimal>,) = sqlx::query_as(
            r#"
            SELECT SUM(CASE action WHEN 'CREDIT' THEN amount ELSE -amount END)
            FROM wallet_transactions
            WHERE account_id = $1 AND status = 'COMPLETED'
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(sum.0.unwrap_or(Decimal::ZERO))
    }
}
