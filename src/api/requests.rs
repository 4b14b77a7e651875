use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::looks_like_time;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Request to register a wallet-holding user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub role: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("name", "name cannot be empty"));
        }
        if self.role.parse::<crate::models::UserRole>().is_err() {
            errors.push(ValidationError::new(
                "role",
                "role must be one of customer, provider, admin",
            ));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to top up a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub amount: Decimal,
    pub method: Option<String>,
}

impl TopUpRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.amount <= Decimal::ZERO {
            errors.push(ValidationError::new("amount", "amount must be positive"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to transfer funds to another wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub to_user_id: Uuid,
    pub amount: Decimal,
    pub note: Option<String>,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.amount <= Decimal::ZERO {
            errors.push(ValidationError::new("amount", "amount must be positive"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to pay for a booking from the wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayBookingRequest {
    pub method: Option<String>,
}

/// Request to withdraw funds to a bank account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub amount: Decimal,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

impl CreateWithdrawalRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.amount <= Decimal::ZERO {
            errors.push(ValidationError::new("amount", "amount must be positive"));
        }
        if self.bank_name.trim().is_empty() {
            errors.push(ValidationError::new("bank_name", "bank_name cannot be empty"));
        }
        if self.account_number.trim().is_empty() {
            errors.push(ValidationError::new(
                "account_number",
                "account_number cannot be empty",
            ));
        }
        if self.account_name.trim().is_empty() {
            errors.push(ValidationError::new(
                "account_name",
                "account_name cannot be empty",
            ));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to create a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub customer_id: Option<Uuid>,
    pub service_id: Uuid,
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub total_hours: Decimal,
    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
    pub special_requests: Option<String>,
}

impl CreateBookingRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if !looks_like_time(&self.start_time) {
            errors.push(ValidationError::new("start_time", "start_time must be HH:MM"));
        }
        if !looks_like_time(&self.end_time) {
            errors.push(ValidationError::new("end_time", "end_time must be HH:MM"));
        }
        if self.total_hours < Decimal::new(5, 1) {
            errors.push(ValidationError::new(
                "total_hours",
                "total_hours must be at least 0.5",
            ));
        }
        if self.total_amount < Decimal::ZERO {
            errors.push(ValidationError::new(
                "total_amount",
                "total_amount cannot be negative",
            ));
        }
        if self.deposit_amount < Decimal::ZERO {
            errors.push(ValidationError::new(
                "deposit_amount",
                "deposit_amount cannot be negative",
            ));
        }
        if self.deposit_amount > self.total_amount {
            errors.push(ValidationError::new(
                "deposit_amount",
                "deposit_amount cannot exceed total_amount",
            ));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to update a booking's status fields. Status strings are parsed
/// against their enums in the handler so that unknown values map to the
/// status-specific error codes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateBookingRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub cancelled_by: Option<String>,
    pub special_requests: Option<String>,
    pub refund_reason: Option<String>,
}

/// Request to create a service listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub description: String,
    pub categories: Vec<String>,
    pub price_hour: Decimal,
    pub price_day: Decimal,
    pub images: Vec<String>,
}

impl CreateServiceRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("name", "name cannot be empty"));
        }
        if self.price_hour <= Decimal::ZERO {
            errors.push(ValidationError::new("price_hour", "price_hour must be positive"));
        }
        if self.price_day < Decimal::ZERO {
            errors.push(ValidationError::new(
                "price_day",
                "price_day cannot be negative",
            ));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to create a review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    pub service_id: Uuid,
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

impl CreateReviewRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if !crate::models::is_valid_rating(self.rating) {
            errors.push(ValidationError::new("rating", "rating must be between 0 and 5"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to update a review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

impl UpdateReviewRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if !crate::models::is_valid_rating(self.rating) {
            errors.push(ValidationError::new("rating", "rating must be between 0 and 5"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to post a chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
}

impl PostMessageRequest {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.content.trim().is_empty() {
            errors.push(ValidationError::new("content", "content cannot be empty"));
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Query parameters for listing bookings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListBookingsQuery {
    pub customer_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Query parameters for listing service listings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListServicesQuery {
    pub provider_id: Option<Uuid>,
    pub active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Generic pagination query.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn booking_request() -> CreateBookingRequest {
        CreateBookingRequest {
            customer_id: None,
            service_id: Uuid::new_v4(),
            booking_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            start_time: "09:00".to_string(),
            end_time: "12:00".to_string(),
            total_hours: dec!(3),
            total_amount: dec!(1500),
            deposit_amount: dec!(500),
            special_requests: None,
        }
    }

    #[test]
    fn test_create_booking_request_valid() {
        assert!(booking_request().validate().is_ok());
    }

    #[test]
    fn test_create_booking_rejects_bad_time() {
        let mut req = booking_request();
        req.start_time = "9am".to_string();
        let errors = req.validate().unwrap_err();
        assert_eq!(errors[0].field, "start_time");
    }

    #[test]
    fn test_create_booking_rejects_short_duration() {
        let mut req = booking_request();
        req.total_hours = dec!(0.25);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_booking_rejects_deposit_over_total() {
        let mut req = booking_request();
        req.deposit_amount = dec!(2000);
        let errors = req.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "deposit_amount"));
    }

    #[test]
    fn test_top_up_request_validation() {
        let valid = TopUpRequest { amount: dec!(100), method: None };
        assert!(valid.validate().is_ok());

        let invalid = TopUpRequest { amount: dec!(0), method: None };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_create_user_request_validation() {
        let valid = CreateUserRequest {
            name: "Alice".to_string(),
            role: "customer".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_role = CreateUserRequest {
            name: "Alice".to_string(),
            role: "superuser".to_string(),
        };
        assert!(bad_role.validate().is_err());
    }

    #[test]
    fn test_withdrawal_request_validation() {
        let valid = CreateWithdrawalRequest {
            amount: dec!(150),
            bank_name: "KBank".to_string(),
            account_number: "1234567890".to_string(),
            account_name: "Alice".to_string(),
        };
        assert!(valid.validate().is_ok());

        let missing_bank = CreateWithdrawalRequest {
            amount: dec!(150),
            bank_name: "  ".to_string(),
            account_number: "1234567890".to_string(),
            account_name: "Alice".to_string(),
        };
        assert!(missing_bank.validate().is_err());
    }
}
