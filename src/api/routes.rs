use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;

use super::handlers;
use crate::cache::WalletCache;
use crate::config::PlatformSettings;
use crate::observability::{get_metrics, HealthChecker, LatencyTimer};
use crate::policy::PolicyRates;
use crate::services::{
    BookingService, CatalogService, ChatService, ReviewService, WalletService, WithdrawalService,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis_client: redis::Client,
    pub platform: PlatformSettings,
    pub cache: Option<Arc<WalletCache>>,
    pub metrics_handle: Option<PrometheusHandle>,
    pub health_checker: Option<Arc<HealthChecker>>,
}

impl AppState {
    pub fn new(pool: PgPool, redis_client: redis::Client, platform: PlatformSettings) -> Self {
        Self {
            pool,
            redis_client,
            platform,
            cache: None,
            metrics_handle: None,
            health_checker: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<WalletCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    pub fn with_health_checker(mut self, checker: Arc<HealthChecker>) -> Self {
        self.health_checker = Some(checker);
        self
    }

    pub fn rates(&self) -> PolicyRates {
        PolicyRates {
            commission_rate: self.platform.commission_rate,
            customer_cancel_refund_rate: self.platform.customer_cancel_refund_rate,
        }
    }

    pub fn wallet_service(&self) -> WalletService {
        let service = WalletService::new(self.pool.clone())
            .with_currency(self.platform.currency.clone());
        match &self.cache {
            Some(cache) => service.with_cache(cache.clone()),
            None => service,
        }
    }

    pub fn booking_service(&self) -> BookingService {
        BookingService::new(self.pool.clone())
            .with_rates(self.rates())
            .with_currency(self.platform.currency.clone())
    }

    pub fn chat_service(&self) -> ChatService {
        ChatService::new(self.pool.clone())
    }

    pub fn review_service(&self) -> ReviewService {
        ReviewService::new(self.pool.clone())
    }

    pub fn withdrawal_service(&self) -> WithdrawalService {
        WithdrawalService::new(self.pool.clone())
            .with_minimum(self.platform.min_withdrawal)
            .with_currency(self.platform.currency.clone())
    }

    pub fn catalog_service(&self) -> CatalogService {
        CatalogService::new(self.pool.clone())
    }
}

/// Records count and latency per route template and status. The matched
/// path keeps the label set bounded; raw URIs would explode cardinality.
async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let timer = LatencyTimer::new();
    let response = next.run(request).await;
    get_metrics().record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        timer.elapsed_ms(),
    );
    response
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/detailed", get(handlers::detailed_health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // User and wallet endpoints
        .route("/users", post(handlers::create_user))
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/topup", post(handlers::top_up))
        .route("/users/:id/balance", get(handlers::get_balance))
        .route("/users/:id/transactions", get(handlers::list_transactions))
        .route(
            "/users/:id/withdrawals",
            post(handlers::create_withdrawal).get(handlers::list_withdrawals),
        )
        .route("/wallet/transfer", post(handlers::transfer))
        // Booking endpoints
        .route(
            "/bookings",
            post(handlers::create_booking).get(handlers::list_bookings),
        )
        .route(
            "/bookings/:id",
            get(handlers::get_booking).patch(handlers::update_booking),
        )
        .route("/bookings/:id/pay", post(handlers::pay_booking))
        .route("/bookings/:id/payment", get(handlers::get_booking_payment))
        .route("/bookings/:id/chat", get(handlers::get_booking_chat))
        // Chat endpoints
        .route("/chats/:id", get(handlers::get_chat))
        .route(
            "/chats/:id/messages",
            get(handlers::list_messages).post(handlers::post_message),
        )
        // Service listing endpoints
        .route(
            "/services",
            post(handlers::create_service).get(handlers::list_services),
        )
        .route("/services/:id", get(handlers::get_service))
        .route("/services/:id/reviews", get(handlers::list_service_reviews))
        // Review endpoints
        .route("/reviews", post(handlers::create_review))
        .route(
            "/reviews/:id",
            get(handlers::get_review)
                .patch(handlers::update_review)
                .delete(handlers::delete_review),
        )
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(track_http_metrics))
        .with_state(state)
}
