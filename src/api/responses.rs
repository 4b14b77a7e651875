use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Booking, Payment};
use crate::services::{TransferOutcome, WalletBalance};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<ValidationErrorDetail>) -> Self {
        self.details = Some(details);
        self
    }
}

/// Validation error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceHealth,
}

/// Service health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub database: bool,
    pub redis: bool,
}

/// Wallet balance response DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account_id: Uuid,
    pub balance: Decimal,
    pub ledger_balance: Decimal,
}

impl From<WalletBalance> for BalanceResponse {
    fn from(balance: WalletBalance) -> Self {
        Self {
            account_id: balance.account_id,
            balance: balance.balance,
            ledger_balance: balance.ledger_balance,
        }
    }
}

/// Transfer response DTO: the recorded movement plus both resulting balances.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResponse {
    pub transaction: crate::models::WalletTransaction,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

impl From<TransferOutcome> for TransferResponse {
    fn from(outcome: TransferOutcome) -> Self {
        Self {
            transaction: outcome.transaction,
            from_balance: outcome.from_balance,
            to_balance: outcome.to_balance,
        }
    }
}

/// Booking payment response DTO.
#[derive(Debug, Clone, Serialize)]
pub struct PayBookingResponse {
    pub booking: Booking,
    pub payment: Payment,
}

/// Paginated list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, offset: i64) -> Self {
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}
