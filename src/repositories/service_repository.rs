use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::ServiceListing;

const SERVICE_COLUMNS: &str = "id, provider_id, name, description, categories, price_hour, \
                               price_day, images, rating, review_count, booking_count, active, \
                               created_at, updated_at";

pub struct ServiceRepository {
    pool: PgPool,
}

impl ServiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, service: &ServiceListing) -> Result<ServiceListing> {
        let row = sqlx::query_as::<_, ServiceListing>(&format!(
            r#"
            INSERT INTO services ({SERVICE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(service.id)
        .bind(service.provider_id)
        .bind(&service.name)
        .bind(&service.description)
        .bind(&service.categories)
        .bind(service.price_hour)
        .bind(service.price_day)
        .bind(&service.images)
        .bind(service.rating)
        .bind(service.review_count)
        .bind(service.booking_count)
        .bind(service.active)
        .bind(service.created_at)
        .bind(service.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ServiceListing>> {
        let row = sqlx::query_as::<_, ServiceListing>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Result<ServiceListing> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Service '{id}' not found")))
    }

    pub async fn list(
        &self,
        provider_id: Option<Uuid>,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ServiceListing>> {
        let rows = sqlx::query_as::<_, ServiceListing>(&format!(
            r#"
            SELECT {SERVICE_COLUMNS}
            FROM services
            WHERE ($1::uuid IS NULL OR provider_id = $1)
              AND (NOT $2 OR active)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(provider_id)
        .bind(active_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// Writes the derived rating aggregate.
    pub async fn update_rating(
        &self,
        id: Uuid,
        rating: Decimal,
        review_count: i32,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE services SET rating = $2, review_count = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(rating)
        .bind(review_count)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Service '{id}' not found")));
        }
        Ok(())
    }

    /// Resyncs the derived completed-booking counter.
    pub async fn set_booking_count(&self, id: Uuid, booking_count: i64) -> Result<()> {
        sqlx::query("UPDATE services SET booking_count = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(booking_count as i32)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
