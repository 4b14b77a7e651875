use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One review per (service, customer), tied to a booking of that service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub service_id: Uuid,
    pub customer_id: Uuid,
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived rating stats for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingAggregate {
    pub rating: Decimal,
    pub review_count: i32,
}

impl RatingAggregate {
    pub const EMPTY: RatingAggregate = RatingAggregate {
        rating: Decimal::ZERO,
        review_count: 0,
    };
}

/// Mean rating rounded to two decimals, zero when no reviews remain.
pub fn aggregate_ratings(ratings: &[i32]) -> RatingAggregate {
    if ratings.is_empty() {
        return RatingAggregate::EMPTY;
    }
    let sum: i64 = ratings.iter().map(|&r| r as i64).sum();
    let mean = Decimal::from(sum) / Decimal::from(ratings.len() as i64);
    RatingAggregate {
        rating: mean.round_dp(2),
        review_count: ratings.len() as i32,
    }
}

pub fn is_valid_rating(rating: i32) -> bool {
    (0..=5).contains(&rating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_aggregate_two_reviews() {
        let agg = aggregate_ratings(&[5, 4]);
        assert_eq!(agg.rating, dec!(4.5));
        assert_eq!(agg.review_count, 2);
    }

    #[test]
    fn test_aggregate_rounds_to_two_decimals() {
        let agg = aggregate_ratings(&[5, 4, 4]);
        assert_eq!(agg.rating, dec!(4.33));
        assert_eq!(agg.review_count, 3);
    }

    #[test]
    fn test_aggregate_after_deletion() {
        assert_eq!(aggregate_ratings(&[5]).rating, dec!(5));
        assert_eq!(aggregate_ratings(&[4]).rating, dec!(4));
    }

    #[test]
    fn test_aggregate_empty_resets_to_zero() {
        let agg = aggregate_ratings(&[]);
        assert_eq!(agg, RatingAggregate::EMPTY);
    }

    #[test]
    fn test_rating_bounds() {
        assert!(is_valid_rating(0));
        assert!(is_valid_rating(5));
        assert!(!is_valid_rating(6));
        assert!(!is_valid_rating(-1));
    }
}
