use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{self, Actor};
use crate::error::{AppError, Result};
use crate::models::{aggregate_ratings, is_valid_rating, Review};
use crate::observability::get_metrics;
use crate::repositories::{BookingRepository, ReviewRepository, ServiceRepository};

/// Review CRUD plus the derived rating aggregate on the service listing.
/// Every mutation recomputes mean rating and count from the surviving rows,
/// so the aggregate can never drift from the review set.
pub struct ReviewService {
    review_repo: ReviewRepository,
    booking_repo: BookingRepository,
    service_repo: ServiceRepository,
}

impl ReviewService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            review_repo: ReviewRepository::new(pool.clone()),
            booking_repo: BookingRepository::new(pool.clone()),
            service_repo: ServiceRepository::new(pool),
        }
    }

    /// Creates a review tied to a booking. The booking must belong to the
    /// target service, and unless the actor is an admin it must be the
    /// booking's customer. One review per (service, customer).
    pub async fn create_review(
        &self,
        actor: &Actor,
        service_id: Uuid,
        booking_id: Uuid,
        rating: i32,
        comment: &str,
    ) -> Result<Review> {
        Self::check_rating(rating)?;

        let booking = self.booking_repo.get(booking_id).await?;
        if booking.service_id != service_id {
            return Err(AppError::Validation(format!(
                "booking '{booking_id}' is not for service '{service_id}'"
            )));
        }
        if !auth::can_review_booking(actor, &booking) {
            return Err(AppError::Forbidden(
                "only the booking customer can review it".to_string(),
            ));
        }

        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            service_id,
            customer_id: booking.customer_id,
            booking_id,
            rating,
            comment: comment.trim().to_string(),
            created_at: now,
            updated_at: now,
        };

        let review = self.review_repo.create(&review).await?;
        self.resync_rating(service_id).await?;
        get_metrics().record_review_written();
        Ok(review)
    }

    pub async fn get_review(&self, id: Uuid) -> Result<Review> {
        self.review_repo.get(id).await
    }

    pub async fn list_for_service(&self, service_id: Uuid) -> Result<Vec<Review>> {
        self.service_repo.get(service_id).await?;
        self.review_repo.list_by_service(service_id).await
    }

    /// Edits a review's rating and comment; author or admin only.
    pub async fn update_review(
        &self,
        actor: &Actor,
        id: Uuid,
        rating: i32,
        comment: &str,
    ) -> Result<Review> {
        Self::check_rating(rating)?;

        let existing = self.review_repo.get(id).await?;
        if !actor.is_admin() && existing.customer_id != actor.id {
            return Err(AppError::Forbidden(
                "only the review author can edit it".to_string(),
            ));
        }

        let review = self.review_repo.update(id, rating, comment.trim()).await?;
        self.resync_rating(review.service_id).await?;
        Ok(review)
    }

    /// Deletes a review; author or admin only. An emptied service drops back
    /// to a zero rating.
    pub async fn delete_review(&self, actor: &Actor, id: Uuid) -> Result<Review> {
        let existing = self.review_repo.get(id).await?;
        if !actor.is_admin() && existing.customer_id != actor.id {
            return Err(AppError::Forbidden(
                "only the review author can delete it".to_string(),
            ));
        }

        let review = self.review_repo.delete(id).await?;
        self.resync_rating(review.service_id).await?;
        Ok(review)
    }

    async fn resync_rating(&self, service_id: Uuid) -> Result<()> {
        let ratings = self.review_repo.ratings_for_service(service_id).await?;
        let agg = aggregate_ratings(&ratings);
        self.service_repo
            .update_rating(service_id, agg.rating, agg.review_count)
            .await
    }

    fn check_rating(rating: i32) -> Result<()> {
        if !is_valid_rating(rating) {
            return Err(AppError::Validation(format!(
                "rating must be between 0 and 5, got {rating}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_rating_bounds() {
        assert!(ReviewService::check_rating(0).is_ok());
        assert!(ReviewService::check_rating(5).is_ok());
        assert!(matches!(
            ReviewService::check_rating(6),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            ReviewService::check_rating(-1),
            Err(AppError::Validation(_))
        ));
    }
}
