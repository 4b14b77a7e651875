mod common;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use uuid::Uuid;

use marketplace_engine::auth::Actor;
use marketplace_engine::error::AppError;
use marketplace_engine::models::{
    Booking, BookingStatus, BookingUpdate, CancelParty, PaymentStatus, User, UserRole,
};
use marketplace_engine::repositories::{ChatRepository, ServiceRepository, UserRepository};
use marketplace_engine::services::{BookingService, CreateBooking, WalletService};

async fn booked_scenario(pool: &PgPool, total: rust_decimal::Decimal) -> (User, User, Booking) {
    let customer =
        common::create_user_with_balance(pool, UserRole::Customer, dec!(10000)).await;
    let provider = common::create_user(pool, UserRole::Provider).await;
    let service = common::create_service(pool, provider.id).await;

    let booking = BookingService::new(pool.clone())
        .create_booking(
            &Actor::new(customer.id, UserRole::Customer),
            CreateBooking {
                customer_id: None,
                service_id: service.id,
                booking_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                start_time: "09:00".to_string(),
                end_time: "12:00".to_string(),
                total_hours: dec!(3),
                total_amount: total,
                deposit_amount: dec!(0),
                special_requests: None,
            },
        )
        .await
        .expect("Failed to create booking");

    (customer, provider, booking)
}

async fn balance_of(pool: &PgPool, user_id: Uuid) -> rust_decimal::Decimal {
    UserRepository::new(pool.clone())
        .get(user_id)
        .await
        .expect("Failed to load user")
        .balance
}

#[tokio::test]
async fn test_create_booking_snapshots_service_and_provisions_chat() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, provider, booking) = booked_scenario(&pool, dec!(1000)).await;

    assert_eq!(booking.customer_id, customer.id);
    assert_eq!(booking.provider_id, provider.id);
    assert_eq!(booking.service_name, "House Cleaning");
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, PaymentStatus::Pending);

    let chat = ChatRepository::new(pool.clone())
        .find_by_booking(booking.id)
        .await
        .expect("Failed to query chat")
        .expect("Chat was not provisioned");
    assert_eq!(chat.customer_id, customer.id);
    assert_eq!(chat.provider_id, provider.id);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_provider_cannot_create_booking() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let provider = common::create_user(&pool, UserRole::Provider).await;
    let service = common::create_service(&pool, provider.id).await;

    let err = BookingService::new(pool.clone())
        .create_booking(
            &Actor::new(provider.id, UserRole::Provider),
            CreateBooking {
                customer_id: None,
                service_id: service.id,
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
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_pay_booking_debits_customer_and_flips_payment_status() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, provider, booking) = booked_scenario(&pool, dec!(1000)).await;
    let service = BookingService::new(pool.clone());

    let (paid, payment) = service
        .pay_booking(&Actor::new(customer.id, UserRole::Customer), booking.id, "wallet")
        .await
        .expect("Failed to pay booking");

    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(payment.amount, dec!(1000));
    assert_eq!(balance_of(&pool, customer.id).await, dec!(9000));
    // Funds are held by the platform until completion.
    assert_eq!(balance_of(&pool, provider.id).await, dec!(0));

    // Paying twice fails cleanly.
    let err = service
        .pay_booking(&Actor::new(customer.id, UserRole::Customer), booking.id, "wallet")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidPaymentStatus(_)));
    assert_eq!(balance_of(&pool, customer.id).await, dec!(9000));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_provider_cancellation_refunds_in_full() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, provider, booking) = booked_scenario(&pool, dec!(1000)).await;
    let service = BookingService::new(pool.clone());
    let customer_actor = Actor::new(customer.id, UserRole::Customer);
    let provider_actor = Actor::new(provider.id, UserRole::Provider);

    service
        .pay_booking(&customer_actor, booking.id, "wallet")
        .await
        .expect("Failed to pay");

    let cancelled = service
        .update_booking(
            &provider_actor,
            booking.id,
            BookingUpdate {
                status: Some(BookingStatus::Cancelled),
                payment_status: Some(PaymentStatus::Refunded),
                cancelled_by: None,
                special_requests: None,
                refund_reason: Some("Provider unavailable".to_string()),
            },
        )
        .await
        .expect("Failed to cancel");

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(CancelParty::Provider));
    assert_eq!(cancelled.refund_amount, Some(dec!(1000)));
    assert_eq!(balance_of(&pool, customer.id).await, dec!(10000));
    assert_eq!(balance_of(&pool, provider.id).await, dec!(0));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_customer_cancellation_splits_refund_and_compensation() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    // Odd amount so the floor in the split is visible.
    let (customer, provider, booking) = booked_scenario(&pool, dec!(1001)).await;
    let service = BookingService::new(pool.clone());
    let customer_actor = Actor::new(customer.id, UserRole::Customer);

    service
        .pay_booking(&customer_actor, booking.id, "wallet")
        .await
        .expect("Failed to pay");

    let cancelled = service
        .update_booking(
            &customer_actor,
            booking.id,
            BookingUpdate {
                status: Some(BookingStatus::Cancelled),
                payment_status: Some(PaymentStatus::PartiallyRefunded),
                cancelled_by: None,
                special_requests: None,
                refund_reason: Some("Changed plans".to_string()),
            },
        )
        .await
        .expect("Failed to cancel");

    assert_eq!(cancelled.cancelled_by, Some(CancelParty::Customer));
    assert_eq!(cancelled.refund_amount, Some(dec!(500)));
    // 10000 - 1001 + floor(1001 * 0.5) = 9499
    assert_eq!(balance_of(&pool, customer.id).await, dec!(9499));
    // The provider keeps the remainder.
    assert_eq!(balance_of(&pool, provider.id).await, dec!(501));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_cancellation_replay_is_inert() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, provider, booking) = booked_scenario(&pool, dec!(1000)).await;
    let service = BookingService::new(pool.clone());
    let customer_actor = Actor::new(customer.id, UserRole::Customer);

    service
        .pay_booking(&customer_actor, booking.id, "wallet")
        .await
        .expect("Failed to pay");

    let cancel = BookingUpdate {
        status: Some(BookingStatus::Cancelled),
        payment_status: Some(PaymentStatus::PartiallyRefunded),
        cancelled_by: None,
        special_requests: None,
        refund_reason: None,
    };

    service
        .update_booking(&customer_actor, booking.id, cancel.clone())
        .await
        .expect("Failed to cancel");
    let after_first_customer = balance_of(&pool, customer.id).await;
    let after_first_provider = balance_of(&pool, provider.id).await;

    // Replaying the exact same update must not move money again.
    service
        .update_booking(&customer_actor, booking.id, cancel)
        .await
        .expect("Replay failed");

    assert_eq!(balance_of(&pool, customer.id).await, after_first_customer);
    assert_eq!(balance_of(&pool, provider.id).await, after_first_provider);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_completion_credits_net_earning_once() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, provider, booking) = booked_scenario(&pool, dec!(1000)).await;
    let service = BookingService::new(pool.clone());
    let customer_actor = Actor::new(customer.id, UserRole::Customer);
    let provider_actor = Actor::new(provider.id, UserRole::Provider);

    service
        .pay_booking(&customer_actor, booking.id, "wallet")
        .await
        .expect("Failed to pay");

    let complete = BookingUpdate {
        status: Some(BookingStatus::Completed),
        payment_status: None,
        cancelled_by: None,
        special_requests: None,
        refund_reason: None,
    };

    let completed = service
        .update_booking(&provider_actor, booking.id, complete.clone())
        .await
        .expect("Failed to complete");
    assert_eq!(completed.status, BookingStatus::Completed);
    // Earning is total minus the 10% commission.
    assert_eq!(balance_of(&pool, provider.id).await, dec!(900));

    // Replay does not double-credit.
    service
        .update_booking(&provider_actor, booking.id, complete)
        .await
        .expect("Replay failed");
    assert_eq!(balance_of(&pool, provider.id).await, dec!(900));

    // The completed-booking counter was resynced.
    let listing = ServiceRepository::new(pool.clone())
        .get(booking.service_id)
        .await
        .expect("Failed to load service");
    assert_eq!(listing.booking_count, 1);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_losing_the_earning_race_is_not_an_error() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, provider, booking) = booked_scenario(&pool, dec!(1000)).await;
    let service = BookingService::new(pool.clone());
    let customer_actor = Actor::new(customer.id, UserRole::Customer);
    let provider_actor = Actor::new(provider.id, UserRole::Provider);

    service
        .pay_booking(&customer_actor, booking.id, "wallet")
        .await
        .expect("Failed to pay");

    // Hold an uncommitted transaction owning the earning row for this
    // booking. The update below passes its replay lookup, then collides
    // on the unique index when this transaction commits first.
    let mut blocker = pool.begin().await.expect("Failed to begin");
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions
            (id, account_id, booking_id, purpose, tx_type, action, method, amount, note)
        VALUES ($1, $2, $3, 'EARNING', 'PAYMENT', 'CREDIT', 'transfer', $4, 'Service earning')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(provider.id)
    .bind(booking.id)
    .bind(dec!(900))
    .execute(&mut *blocker)
    .await
    .expect("Failed to stage earning row");

    let racer_pool = pool.clone();
    let booking_id = booking.id;
    let racer = tokio::spawn(async move {
        BookingService::new(racer_pool)
            .update_booking(
                &provider_actor,
                booking_id,
                BookingUpdate {
                    status: Some(BookingStatus::Completed),
                    payment_status: None,
                    cancelled_by: None,
                    special_requests: None,
                    refund_reason: None,
                },
            )
            .await
    });

    // Let the update reach the index before handing it the conflict.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    blocker.commit().await.expect("Failed to commit");

    racer
        .await
        .expect("update task panicked")
        .expect("losing the effect race must not surface an error");

    // Exactly one earning row, and the loser's rolled-back credit never
    // reached the wallet.
    let (earning_rows,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM wallet_transactions WHERE booking_id = $1 AND purpose = 'EARNING'",
    )
    .bind(booking.id)
    .fetch_one(&pool)
    .await
    .expect("Failed to count earnings");
    assert_eq!(earning_rows, 1);
    assert_eq!(balance_of(&pool, provider.id).await, dec!(0));

    // A later replay sees the existing effect and settles the status
    // without crediting again.
    let completed = service
        .update_booking(
            &provider_actor,
            booking.id,
            BookingUpdate {
                status: Some(BookingStatus::Completed),
                payment_status: None,
                cancelled_by: None,
                special_requests: None,
                refund_reason: None,
            },
        )
        .await
        .expect("Replay failed");
    assert_eq!(completed.status, BookingStatus::Completed);
    assert_eq!(balance_of(&pool, provider.id).await, dec!(0));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_outsider_cannot_touch_booking() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (_customer, _provider, booking) = booked_scenario(&pool, dec!(1000)).await;
    let outsider = common::create_user(&pool, UserRole::Customer).await;
    let service = BookingService::new(pool.clone());
    let outsider_actor = Actor::new(outsider.id, UserRole::Customer);

    let err = service
        .get_booking(&outsider_actor, booking.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = service
        .update_booking(
            &outsider_actor,
            booking.id,
            BookingUpdate {
                status: Some(BookingStatus::Cancelled),
                payment_status: None,
                cancelled_by: None,
                special_requests: None,
                refund_reason: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_insufficient_funds_fail_payment_without_partial_state() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let customer = common::create_user_with_balance(&pool, UserRole::Customer, dec!(100)).await;
    let provider = common::create_user(&pool, UserRole::Provider).await;
    let listing = common::create_service(&pool, provider.id).await;
    let service = BookingService::new(pool.clone());
    let customer_actor = Actor::new(customer.id, UserRole::Customer);

    let booking = service
        .create_booking(
            &customer_actor,
            CreateBooking {
                customer_id: None,
                service_id: listing.id,
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
        .expect("Failed to create booking");

    let err = service
        .pay_booking(&customer_actor, booking.id, "wallet")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance { .. }));

    // Booking is still awaiting payment and no money moved.
    let unchanged = service
        .get_booking(&customer_actor, booking.id)
        .await
        .expect("Failed to reload booking");
    assert_eq!(unchanged.payment_status, PaymentStatus::Pending);
    assert_eq!(balance_of(&pool, customer.id).await, dec!(100));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_wallet_balance_matches_ledger_after_full_lifecycle() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, provider, booking) = booked_scenario(&pool, dec!(1000)).await;
    let service = BookingService::new(pool.clone());
    let wallet = WalletService::new(pool.clone());
    let customer_actor = Actor::new(customer.id, UserRole::Customer);
    let provider_actor = Actor::new(provider.id, UserRole::Provider);

    service
        .pay_booking(&customer_actor, booking.id, "wallet")
        .await
        .expect("Failed to pay");
    service
        .update_booking(
            &provider_actor,
            booking.id,
            BookingUpdate {
                status: Some(BookingStatus::Completed),
                payment_status: None,
                cancelled_by: None,
                special_requests: None,
                refund_reason: None,
            },
        )
        .await
        .expect("Failed to complete");

    // Provider balance was built entirely through the ledger, so the two
    // views agree.
    let provider_balance = wallet
        .balance(provider.id)
        .await
        .expect("Failed to read balance");
    assert_eq!(provider_balance.balance, dec!(900));
    assert_eq!(provider_balance.ledger_balance, dec!(900));

    common::cleanup_test_data(&pool).await;
}
