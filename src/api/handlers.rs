use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::api::requests::{
    CreateBookingRequest, CreateReviewRequest, CreateServiceRequest, CreateUserRequest,
    CreateWithdrawalRequest, ListBookingsQuery, ListServicesQuery, PaginationQuery,
    PayBookingRequest, PostMessageRequest, TopUpRequest, TransferRequest, UpdateBookingRequest,
    UpdateReviewRequest, ValidationError,
};
use crate::api::responses::{
    ApiResponse, BalanceResponse, ErrorResponse, HealthResponse, PaginatedResponse,
    PayBookingResponse, ServiceHealth, TransferResponse, ValidationErrorDetail,
};
use crate::auth::{self, Actor};
use crate::error::AppError;
use crate::models::{
    Booking, BookingStatus, BookingUpdate, CancelParty, Chat, ChatMessage, Payment, PaymentStatus,
    Review,
    ServiceListing, TransactionMeta, TransactionType, User, UserRole, WalletTransaction,
    Withdrawal,
};
use crate::observability::AggregatedHealth;
use crate::repositories::{BookingFilter, UserRepository};
use crate::services::{CreateBooking, CreateServiceListing, WithdrawalRequest};

use super::routes::AppState;

type HandlerError = (StatusCode, Json<ApiResponse<()>>);

/// Maps a domain error onto the HTTP surface. Infrastructure failures are
/// logged here and surfaced as an opaque 500.
fn error_reply(e: AppError) -> HandlerError {
    let status = match &e {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::InvalidAmount(_)
        | AppError::InvalidStatus(_)
        | AppError::InvalidPaymentStatus(_)
        | AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::DuplicateReview | AppError::DuplicateChat => StatusCode::CONFLICT,
        AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Request failed: {}", e);
        "An internal error occurred".to_string()
    } else {
        e.to_string()
    };

    (
        status,
        Json(ApiResponse::<()>::error(ErrorResponse::new(e.code(), message))),
    )
}

fn validation_reply(errors: Vec<ValidationError>) -> HandlerError {
    let details: Vec<ValidationErrorDetail> = errors
        .into_iter()
        .map(|e| ValidationErrorDetail {
            field: e.field,
            message: e.message,
        })
        .collect();

    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                .with_details(details),
        )),
    )
}

fn unauthorized(message: &str) -> HandlerError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error(ErrorResponse::new(
            "UNAUTHORIZED",
            message,
        ))),
    )
}

/// Extracts the caller identity from the `x-user-id` / `x-user-role` headers
/// injected by the upstream auth gateway.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = HandlerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("missing x-user-id header"))?;
        let id: Uuid = id
            .parse()
            .map_err(|_| unauthorized("x-user-id is not a valid UUID"))?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("missing x-user-role header"))?;
        let role: UserRole = role
            .parse()
            .map_err(|_| unauthorized("x-user-role is not a valid role"))?;

        Ok(Actor::new(id, role))
    }
}

fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(50).clamp(1, 100), offset.unwrap_or(0).max(0))
}

// ============================================================================
// Health and metrics
// ============================================================================

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();
    let redis_healthy = state
        .redis_client
        .get_multiplexed_async_connection()
        .await
        .is_ok();

    let response = HealthResponse {
        status: if db_healthy && redis_healthy {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        services: ServiceHealth {
            database: db_healthy,
            redis: redis_healthy,
        },
    };

    Json(ApiResponse::success(response))
}

/// Per-dependency health with latency readings.
pub async fn detailed_health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AggregatedHealth>>, HandlerError> {
    match &state.health_checker {
        Some(checker) => Ok(Json(ApiResponse::success(checker.check_all().await))),
        None => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::error(ErrorResponse::new(
                "INTERNAL_ERROR",
                "Health checker not configured",
            ))),
        )),
    }
}

/// Readiness check endpoint.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let ready = match &state.health_checker {
        Some(checker) => checker.is_ready().await,
        None => sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok(),
    };

    if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness check endpoint.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    match &state.metrics_handle {
        Some(handle) => Ok(handle.render()),
        None => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

// ============================================================================
// Users and wallet
// ============================================================================

/// Register a wallet-holding user.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), HandlerError> {
    request.validate().map_err(validation_reply)?;

    // Validated above, so the parse cannot fail.
    let role: UserRole = request.role.parse().map_err(|_| {
        validation_reply(vec![ValidationError {
            field: "role".to_string(),
            message: "invalid role".to_string(),
        }])
    })?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        role,
        balance: rust_decimal::Decimal::ZERO,
        created_at: now,
        updated_at: now,
    };

    let user = UserRepository::new(state.pool.clone())
        .create(&user)
        .await
        .map_err(error_reply)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<User>>, HandlerError> {
    let user = UserRepository::new(state.pool.clone())
        .get(id)
        .await
        .map_err(error_reply)?;
    Ok(Json(ApiResponse::success(user)))
}

/// Credit the caller's wallet.
pub async fn top_up(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<TopUpRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WalletTransaction>>), HandlerError> {
    request.validate().map_err(validation_reply)?;
    auth::ensure_own_account(&actor, id).map_err(error_reply)?;

    let method = request.method.as_deref().unwrap_or("manual");
    let meta = TransactionMeta::new(method, "Wallet top-up");

    let record = state
        .wallet_service()
        .credit(id, request.amount, TransactionType::Topup, meta)
        .await
        .map_err(error_reply)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

pub async fn get_balance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BalanceResponse>>, HandlerError> {
    auth::ensure_own_account(&actor, id).map_err(error_reply)?;

    let balance = state
        .wallet_service()
        .balance(id)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(BalanceResponse::from(balance))))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<WalletTransaction>>>, HandlerError> {
    auth::ensure_own_account(&actor, id).map_err(error_reply)?;
    let (limit, offset) = page(query.limit, query.offset);

    let (items, total) = state
        .wallet_service()
        .list_transactions(id, limit, offset)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, limit, offset,
    ))))
}

/// Transfer funds from the caller's wallet to another user.
pub async fn transfer(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransferResponse>>), HandlerError> {
    request.validate().map_err(validation_reply)?;

    let note = request.note.unwrap_or_else(|| "Wallet transfer".to_string());
    let meta = TransactionMeta::new("transfer", note);

    let outcome = state
        .wallet_service()
        .transfer(actor.id, request.to_user_id, request.amount, meta)
        .await
        .map_err(error_reply)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(TransferResponse::from(outcome))),
    ))
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Withdrawal>>), HandlerError> {
    request.validate().map_err(validation_reply)?;

    let withdrawal = state
        .withdrawal_service()
        .request_withdrawal(
            &actor,
            id,
            WithdrawalRequest {
                amount: request.amount,
                bank_name: request.bank_name,
                account_number: request.account_number,
                account_name: request.account_name,
            },
        )
        .await
        .map_err(error_reply)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(withdrawal))))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<Withdrawal>>>, HandlerError> {
    let (limit, offset) = page(query.limit, query.offset);

    let items = state
        .withdrawal_service()
        .list_withdrawals(&actor, id, limit, offset)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(items)))
}

// ============================================================================
// Bookings
// ============================================================================

pub async fn create_booking(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), HandlerError> {
    request.validate().map_err(validation_reply)?;

    let booking = state
        .booking_service()
        .create_booking(
            &actor,
            CreateBooking {
                customer_id: request.customer_id,
                service_id: request.service_id,
                booking_date: request.booking_date,
                start_time: request.start_time,
                end_time: request.end_time,
                total_hours: request.total_hours,
                total_amount: request.total_amount,
                deposit_amount: request.deposit_amount,
                special_requests: request.special_requests,
            },
        )
        .await
        .map_err(error_reply)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(booking))))
}

pub async fn get_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, HandlerError> {
    let booking = state
        .booking_service()
        .get_booking(&actor, id)
        .await
        .map_err(error_reply)?;
    Ok(Json(ApiResponse::success(booking)))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<Booking>>>, HandlerError> {
    let status = parse_status(query.status.as_deref()).map_err(error_reply)?;
    let payment_status =
        parse_payment_status(query.payment_status.as_deref()).map_err(error_reply)?;

    let filter = BookingFilter {
        customer_id: query.customer_id,
        provider_id: query.provider_id,
        service_id: query.service_id,
        status,
        payment_status,
        date_from: query.date_from,
        date_to: query.date_to,
    };
    let (limit, offset) = page(query.limit, query.offset);

    let (items, total) = state
        .booking_service()
        .list_bookings(&actor, filter, limit, offset)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, limit, offset,
    ))))
}

pub async fn update_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, HandlerError> {
    let status = parse_status(request.status.as_deref()).map_err(error_reply)?;
    let payment_status =
        parse_payment_status(request.payment_status.as_deref()).map_err(error_reply)?;
    let cancelled_by = match request.cancelled_by.as_deref() {
        Some(s) => Some(
            s.parse::<CancelParty>()
                .map_err(|e| error_reply(AppError::Validation(e)))?,
        ),
        None => None,
    };

    let update = BookingUpdate {
        status,
        payment_status,
        cancelled_by,
        special_requests: request.special_requests,
        refund_reason: request.refund_reason,
    };

    let booking = state
        .booking_service()
        .update_booking(&actor, id, update)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(booking)))
}

pub async fn pay_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<PayBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PayBookingResponse>>), HandlerError> {
    let method = request.method.as_deref().unwrap_or("wallet");

    let (booking, payment) = state
        .booking_service()
        .pay_booking(&actor, id, method)
        .await
        .map_err(error_reply)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(PayBookingResponse { booking, payment })),
    ))
}

pub async fn get_booking_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Payment>>, HandlerError> {
    let payment = state
        .booking_service()
        .get_payment(&actor, id)
        .await
        .map_err(error_reply)?;
    Ok(Json(ApiResponse::success(payment)))
}

fn parse_status(raw: Option<&str>) -> Result<Option<BookingStatus>, AppError> {
    match raw {
        Some(s) => s
            .parse::<BookingStatus>()
            .map(Some)
            .map_err(AppError::InvalidStatus),
        None => Ok(None),
    }
}

fn parse_payment_status(raw: Option<&str>) -> Result<Option<PaymentStatus>, AppError> {
    match raw {
        Some(s) => s
            .parse::<PaymentStatus>()
            .map(Some)
            .map_err(AppError::InvalidPaymentStatus),
        None => Ok(None),
    }
}

// ============================================================================
// Chats
// ============================================================================

/// The booking's chat thread, provisioned on first access if creation at
/// booking time failed.
pub async fn get_booking_chat(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Chat>>, HandlerError> {
    let booking = state
        .booking_service()
        .get_booking(&actor, id)
        .await
        .map_err(error_reply)?;

    let chat = state
        .chat_service()
        .ensure_chat_for_booking(&booking)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(chat)))
}

pub async fn get_chat(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Chat>>, HandlerError> {
    let chat = state
        .chat_service()
        .get_chat(&actor, id)
        .await
        .map_err(error_reply)?;
    Ok(Json(ApiResponse::success(chat)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, HandlerError> {
    let messages = state
        .chat_service()
        .list_messages(&actor, id)
        .await
        .map_err(error_reply)?;
    Ok(Json(ApiResponse::success(messages)))
}

pub async fn post_message(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ChatMessage>>), HandlerError> {
    request.validate().map_err(validation_reply)?;

    let message = state
        .chat_service()
        .post_message(&actor, id, &request.content)
        .await
        .map_err(error_reply)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(message))))
}

// ============================================================================
// Service listings
// ============================================================================

pub async fn create_service(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceListing>>), HandlerError> {
    request.validate().map_err(validation_reply)?;

    let service = state
        .catalog_service()
        .create_service(
            &actor,
            CreateServiceListing {
                name: request.name,
                description: request.description,
                categories: request.categories,
                price_hour: request.price_hour,
                price_day: request.price_day,
                images: request.images,
            },
        )
        .await
        .map_err(error_reply)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(service))))
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ServiceListing>>, HandlerError> {
    let service = state
        .catalog_service()
        .get_service(id)
        .await
        .map_err(error_reply)?;
    Ok(Json(ApiResponse::success(service)))
}

pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ListServicesQuery>,
) -> Result<Json<ApiResponse<Vec<ServiceListing>>>, HandlerError> {
    let (limit, offset) = page(query.limit, query.offset);

    let services = state
        .catalog_service()
        .list_services(query.provider_id, query.active.unwrap_or(true), limit, offset)
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(services)))
}

// ============================================================================
// Reviews
// ============================================================================

pub async fn create_review(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Review>>), HandlerError> {
    request.validate().map_err(validation_reply)?;

    let review = state
        .review_service()
        .create_review(
            &actor,
            request.service_id,
            request.booking_id,
            request.rating,
            request.comment.as_deref().unwrap_or(""),
        )
        .await
        .map_err(error_reply)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(review))))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Review>>, HandlerError> {
    let review = state
        .review_service()
        .get_review(id)
        .await
        .map_err(error_reply)?;
    Ok(Json(ApiResponse::success(review)))
}

pub async fn update_review(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateReviewRequest>,
) -> Result<Json<ApiResponse<Review>>, HandlerError> {
    request.validate().map_err(validation_reply)?;

    let review = state
        .review_service()
        .update_review(
            &actor,
            id,
            request.rating,
            request.comment.as_deref().unwrap_or(""),
        )
        .await
        .map_err(error_reply)?;

    Ok(Json(ApiResponse::success(review)))
}

pub async fn delete_review(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Review>>, HandlerError> {
    let review = state
        .review_service()
        .delete_review(&actor, id)
        .await
        .map_err(error_reply)?;
    Ok(Json(ApiResponse::success(review)))
}

pub async fn list_service_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Review>>>, HandlerError> {
    let reviews = state
        .review_service()
        .list_for_service(id)
        .await
        .map_err(error_reply)?;
    Ok(Json(ApiResponse::success(reviews)))
}
