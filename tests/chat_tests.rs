mod common;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use uuid::Uuid;

use marketplace_engine::auth::Actor;
use marketplace_engine::error::AppError;
use marketplace_engine::models::{Booking, Chat, SenderType, User, UserRole};
use marketplace_engine::services::{BookingService, ChatService, CreateBooking};

async fn chat_scenario(pool: &PgPool) -> (User, User, Booking, Chat) {
    let customer = common::create_user(pool, UserRole::Customer).await;
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
                total_amount: dec!(1000),
                deposit_amount: dec!(0),
                special_requests: None,
            },
        )
        .await
        .expect("Failed to create booking");

    let chat = ChatService::new(pool.clone())
        .get_chat_for_booking(&Actor::new(customer.id, UserRole::Customer), booking.id)
        .await
        .expect("Chat was not provisioned with the booking");

    (customer, provider, booking, chat)
}

#[tokio::test]
async fn test_one_chat_per_booking() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (_, _, booking, chat) = chat_scenario(&pool).await;

    // Re-ensuring converges on the existing thread.
    let again = ChatService::new(pool.clone())
        .ensure_chat_for_booking(&booking)
        .await
        .expect("Failed to ensure chat");
    assert_eq!(again.id, chat.id);
    assert_eq!(again.booking_id, booking.id);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_participants_can_post_and_sides_are_derived() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, provider, _, chat) = chat_scenario(&pool).await;
    let chats = ChatService::new(pool.clone());

    let first = chats
        .post_message(
            &Actor::new(customer.id, UserRole::Customer),
            chat.id,
            "Can you come at nine?",
        )
        .await
        .expect("Customer failed to post");
    assert_eq!(first.sender_type, SenderType::Customer);
    assert_eq!(first.sender_id, customer.id);

    let second = chats
        .post_message(
            &Actor::new(provider.id, UserRole::Provider),
            chat.id,
            "Nine works.",
        )
        .await
        .expect("Provider failed to post");
    assert_eq!(second.sender_type, SenderType::Provider);

    let messages = chats
        .list_messages(&Actor::new(customer.id, UserRole::Customer), chat.id)
        .await
        .expect("Failed to list messages");
    assert_eq!(messages.len(), 2);
    // Oldest first.
    assert_eq!(messages[0].id, first.id);
    assert_eq!(messages[1].id, second.id);

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_admin_reads_but_never_posts() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, _, _, chat) = chat_scenario(&pool).await;
    let chats = ChatService::new(pool.clone());
    let admin = Actor::new(Uuid::new_v4(), UserRole::Admin);

    chats
        .post_message(
            &Actor::new(customer.id, UserRole::Customer),
            chat.id,
            "Hello",
        )
        .await
        .expect("Customer failed to post");

    let viewed = chats.get_chat(&admin, chat.id).await.expect("Admin failed to view chat");
    assert_eq!(viewed.id, chat.id);
    let messages = chats
        .list_messages(&admin, chat.id)
        .await
        .expect("Admin failed to list messages");
    assert_eq!(messages.len(), 1);

    let err = chats.post_message(&admin, chat.id, "Stop arguing").await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_outsiders_cannot_view_or_post() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (_, _, _, chat) = chat_scenario(&pool).await;
    let outsider = common::create_user(&pool, UserRole::Customer).await;
    let chats = ChatService::new(pool.clone());
    let actor = Actor::new(outsider.id, UserRole::Customer);

    let err = chats.get_chat(&actor, chat.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = chats.list_messages(&actor, chat.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = chats.post_message(&actor, chat.id, "Let me in").await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let (customer, _, _, chat) = chat_scenario(&pool).await;

    let err = ChatService::new(pool.clone())
        .post_message(
            &Actor::new(customer.id, UserRole::Customer),
            chat.id,
            "   \n ",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    common::cleanup_test_data(&pool).await;
}

#[tokio::test]
async fn test_missing_chat_is_not_found() {
    let Some(pool) = common::try_setup_db().await else { return };
    common::cleanup_test_data(&pool).await;

    let customer = common::create_user(&pool, UserRole::Customer).await;
    let err = ChatService::new(pool.clone())
        .get_chat(&Actor::new(customer.id, UserRole::Customer), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    common::cleanup_test_data(&pool).await;
}
