mod common;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use uuid::Uuid;

use marketplace_engine::auth::Actor;
use marketplace_engine::error::AppError;
use marketplace_engine::models::{Booking, User, UserRole};
use marketplace_engine::repositories::ServiceRepository;
use marketplace_engine::services::{BookingService, CreateBooking, ReviewService};

async fn book_service(pool: &PgPool, customer: &User, service_id: Uuid) -> Booking {
    BookingService::new(pool.clone())
        .create_booking(
            &Actor::new(customer.id, UserRole::Customer),
            CreateBooking {
                customer_id: None,
                service_id,
                booking_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                start_time: "09:00".to_string(),
                end_time: "12:00".to_string(),
                total_hours: dec!(3),
                total_amount: dec!(1000),
                deposit_amount: dec!(0),
                special_requests: None,
            },
        )
        .await
        .expect("Failed to create booking")
}

#[tokio::test]
async fn test_reviews_update_service_aggregate() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let provider = common::create_user(&pool, UserRole::Provider).await;
    let service = common::create_service(&pool, provider.id).await;
    let reviews = ReviewService::new(pool.clone());
    let services = ServiceRepository::new(pool.clone());

    let alice = common::create_user(&pool, UserRole::Customer).await;
    let bob = common::create_user(&pool, UserRole::Customer).await;
    let alice_booking = book_service(&pool, &alice, service.id).await;
    let bob_booking = book_service(&pool, &bob, service.id).await;

    reviews
        .create_review(
            &Actor::new(alice.id, UserRole::Customer),
            service.id,
            alice_booking.id,
            5,
            "Spotless",
        )
        .await
        .expect("Failed to create review");
    reviews
        .create_review(
            &Actor::new(bob.id, UserRole::Customer),
            service.id,
            bob_booking.id,
            4,
            "Good, a bit late",
        )
        .await
        .expect("Failed to create review");

    let refreshed = services.get(service.id).await.expect("Failed to load service");
    assert_eq!(refreshed.rating, dec!(4.5));
    assert_eq!(refreshed.review_count, 2);

    let listed = reviews
        .list_for_service(service.id)
        .await
        .expect("Failed to list reviews");
    assert_eq!(listed.len(), 2);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_second_review_for_same_service_is_rejected() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let provider = common::create_user(&pool, UserRole::Provider).await;
    let service = common::create_service(&pool, provider.id).await;
    let customer = common::create_user(&pool, UserRole::Customer).await;
    let first_booking = book_service(&pool, &customer, service.id).await;
    let second_booking = book_service(&pool, &customer, service.id).await;

    let reviews = ReviewService::new(pool.clone());
    let actor = Actor::new(customer.id, UserRole::Customer);

    reviews
        .create_review(&actor, service.id, first_booking.id, 5, "Great")
        .await
        .expect("Failed to create review");

    // A second booking does not grant a second review of the same service.
    let err = reviews
        .create_review(&actor, service.id, second_booking.id, 1, "Changed my mind")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateReview));

    let refreshed = ServiceRepository::new(pool.clone())
        .get(service.id)
        .await
        .expect("Failed to load service");
    assert_eq!(refreshed.review_count, 1);
    assert_eq!(refreshed.rating, dec!(5));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_update_review_recomputes_aggregate() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let provider = common::create_user(&pool, UserRole::Provider).await;
    let service = common::create_service(&pool, provider.id).await;
    let customer = common::create_user(&pool, UserRole::Customer).await;
    let booking = book_service(&pool, &customer, service.id).await;

    let reviews = ReviewService::new(pool.clone());
    let actor = Actor::new(customer.id, UserRole::Customer);

    let review = reviews
        .create_review(&actor, service.id, booking.id, 2, "Mediocre")
        .await
        .expect("Failed to create review");

    let updated = reviews
        .update_review(&actor, review.id, 4, "Better after the redo")
        .await
        .expect("Failed to update review");
    assert_eq!(updated.rating, 4);

    let refreshed = ServiceRepository::new(pool.clone())
        .get(service.id)
        .await
        .expect("Failed to load service");
    assert_eq!(refreshed.rating, dec!(4));
    assert_eq!(refreshed.review_count, 1);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_delete_last_review_resets_aggregate() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let provider = common::create_user(&pool, UserRole::Provider).await;
    let service = common::create_service(&pool, provider.id).await;
    let customer = common::create_user(&pool, UserRole::Customer).await;
    let booking = book_service(&pool, &customer, service.id).await;

    let reviews = ReviewService::new(pool.clone());
    let actor = Actor::new(customer.id, UserRole::Customer);

    let review = reviews
        .create_review(&actor, service.id, booking.id, 5, "Great")
        .await
        .expect("Failed to create review");
    reviews
        .delete_review(&actor, review.id)
        .await
        .expect("Failed to delete review");

    let refreshed = ServiceRepository::new(pool.clone())
        .get(service.id)
        .await
        .expect("Failed to load service");
    assert_eq!(refreshed.rating, dec!(0));
    assert_eq!(refreshed.review_count, 0);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_only_booking_customer_can_review() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let provider = common::create_user(&pool, UserRole::Provider).await;
    let service = common::create_service(&pool, provider.id).await;
    let customer = common::create_user(&pool, UserRole::Customer).await;
    let stranger = common::create_user(&pool, UserRole::Customer).await;
    let booking = book_service(&pool, &customer, service.id).await;

    let reviews = ReviewService::new(pool.clone());
    let err = reviews
        .create_review(
            &Actor::new(stranger.id, UserRole::Customer),
            service.id,
            booking.id,
            5,
            "Not my booking",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_review_rejects_booking_for_other_service() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let provider = common::create_user(&pool, UserRole::Provider).await;
    let reviewed_service = common::create_service(&pool, provider.id).await;
    let booked_service = common::create_service(&pool, provider.id).await;
    let customer = common::create_user(&pool, UserRole::Customer).await;
    let booking = book_service(&pool, &customer, booked_service.id).await;

    let err = ReviewService::new(pool.clone())
        .create_review(
            &Actor::new(customer.id, UserRole::Customer),
            reviewed_service.id,
            booking.id,
            5,
            "Wrong target",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_only_author_or_admin_can_edit_or_delete() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let provider = common::create_user(&pool, UserRole::Provider).await;
    let service = common::create_service(&pool, provider.id).await;
    let customer = common::create_user(&pool, UserRole::Customer).await;
    let other = common::create_user(&pool, UserRole::Customer).await;
    let booking = book_service(&pool, &customer, service.id).await;

    let reviews = ReviewService::new(pool.clone());
    let review = reviews
        .create_review(
            &Actor::new(customer.id, UserRole::Customer),
            service.id,
            booking.id,
            3,
            "Okay",
        )
        .await
        .expect("Failed to create review");

    let err = reviews
        .update_review(&Actor::new(other.id, UserRole::Customer), review.id, 1, "Sabotage")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Admins can moderate any review.
    reviews
        .delete_review(&Actor::new(Uuid::new_v4(), UserRole::Admin), review.id)
        .await
        .expect("Admin failed to delete review");

    common::cleanup_test_data(&pool).await;
}
