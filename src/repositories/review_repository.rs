use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Review;

const REVIEW_COLUMNS: &str =
    "id, service_id, customer_id, booking_id, rating, comment, created_at, updated_at";

pub struct ReviewRepository {
    pool: PgPool,
}

impl ReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a review; the (service, customer) unique constraint surfaces
    /// as `DuplicateReview`.
    pub async fn create(&self, review: &Review) -> Result<Review> {
        let row = sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO reviews ({REVIEW_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(review.id)
        .bind(review.service_id)
        .bind(review.customer_id)
        .bind(review.booking_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .bind(review.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(
                e,
                "reviews_service_id_customer_id_key",
                AppError::DuplicateReview,
            )
        })?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>> {
        let row = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Result<Review> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Review '{id}' not found")))
    }

    pub async fn update(&self, id: Uuid, rating: i32, comment: &str) -> Result<Review> {
        let row = sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET rating = $2, comment = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(rating)
        .bind(comment)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Review '{id}' not found")))
    }

    pub async fn delete(&self, id: Uuid) -> Result<Review> {
        let row = sqlx::query_as::<_, Review>(&format!(
            "DELETE FROM reviews WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.ok_or_else(|| AppError::NotFound(format!("Review '{id}' not found")))
    }

    pub async fn list_by_service(&self, service_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE service_id = $1 ORDER BY created_at DESC"
        ))
        .bind(service_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// Current rating values for one service, feeding the aggregate.
    pub async fn ratings_for_service(&self, service_id: Uuid) -> Result<Vec<i32>> {
        let rows: Vec<(i32,)> =
            sqlx::query_as("SELECT rating FROM reviews WHERE service_id = $1")
                .bind(service_id)
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::Database)?;

        Ok(rows.into_iter().map(|(r,)| r).collect())
    }
}
