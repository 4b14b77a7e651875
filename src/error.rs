use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Domain error taxonomy. Every variant maps to a structured API error at the
/// handler boundary; none of them terminates the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid booking status: {0}")]
    InvalidStatus(String),

    #[error("Invalid payment status: {0}")]
    InvalidPaymentStatus(String),

    #[error("A review for this service by this customer already exists")]
    DuplicateReview,

    #[error("A chat for this booking already exists")]
    DuplicateChat,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::InvalidStatus(_) => "INVALID_STATUS",
            AppError::InvalidPaymentStatus(_) => "INVALID_PAYMENT_STATUS",
            AppError::DuplicateReview => "DUPLICATE_REVIEW",
            AppError::DuplicateChat => "DUPLICATE_CHAT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Maps a sqlx error, translating unique-constraint violations on the
    /// given constraint name into the supplied domain error.
    pub fn from_unique_violation(err: sqlx::Error, constraint: &str, domain: AppError) -> AppError {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.constraint() == Some(constraint) {
                return domain;
            }
        }
        AppError::Database(err)
    }

    /// True when this error wraps a Postgres unique violation on the given
    /// constraint or index.
    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        if let AppError::Database(sqlx::Error::Database(db_err)) = self {
            return db_err.constraint() == Some(constraint);
        }
        false
    }
}
