use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Booking, BookingStatus, PaymentStatus};

const BOOKING_COLUMNS: &str = "id, customer_id, provider_id, service_id, service_name, \
                               booking_date, start_time, end_time, total_hours, total_amount, \
                               deposit_amount, status, payment_status, special_requests, \
                               cancelled_by, refund_amount, created_at, updated_at";

/// Filters for booking listings. Every field is optional; the query treats
/// NULL as "no filter".
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub customer_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, booking: &Booking) -> Result<Booking> {
        let row = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings ({BOOKING_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(booking.id)
        .bind(booking.customer_id)
        .bind(booking.provider_id)
        .bind(booking.service_id)
        .bind(&booking.service_name)
        .bind(booking.booking_date)
        .bind(&booking.start_time)
        .bind(&booking.end_time)
        .bind(booking.total_hours)
        .bind(booking.total_amount)
        .bind(booking.deposit_amount)
        .bind(booking.status)
        .bind(booking.payment_status)
        .bind(&booking.special_requests)
        .bind(booking.cancelled_by)
        .bind(booking.refund_amount)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Result<Booking> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking '{id}' not found")))
    }

    pub async fn list(
        &self,
        filter: &BookingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR provider_id = $2)
              AND ($3::uuid IS NULL OR service_id = $3)
              AND ($4::booking_status IS NULL OR status = $4)
              AND ($5::payment_status IS NULL OR payment_status = $5)
              AND ($6::date IS NULL OR booking_date >= $6)
              AND ($7::date IS NULL OR booking_date <= $7)
            ORDER BY created_at DESC
            LIMIT $8 OFFSET $9
            "#
        ))
        .bind(filter.customer_id)
        .bind(filter.provider_id)
        .bind(filter.service_id)
        .bind(filter.status)
        .bind(filter.payment_status)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn count(&self, filter: &BookingFilter) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM bookings
            WHERE ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::uuid IS NULL OR provider_id = $2)
              AND ($3::uuid IS NULL OR service_id = $3)
              AND ($4::booking_status IS NULL OR status = $4)
              AND ($5::payment_status IS NULL OR payment_status = $5)
              AND ($6::date IS NULL OR booking_date >= $6)
              AND ($7::date IS NULL OR booking_date <= $7)
            "#,
        )
        .bind(filter.customer_id)
        .bind(filter.provider_id)
        .bind(filter.service_id)
        .bind(filter.status)
        .bind(filter.payment_status)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(count.0)
    }

    /// Exact count of completed bookings for a service, used to resync the
    /// listing's derived `booking_count`.
    pub async fn count_completed_for_service(&self, service_id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE service_id = $1 AND status = 'COMPLETED'",
        )
        .bind(service_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(count.0)
    }
}
