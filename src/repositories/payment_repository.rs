use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Payment;

const PAYMENT_COLUMNS: &str = "id, booking_id, customer_id, amount, method, status, \
                               refund_amount, refund_reason, refunded_at, created_at";

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }
}
