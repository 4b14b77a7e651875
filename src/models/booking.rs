use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::UserRole;
use crate::policy::{self, PolicyRates};

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

/// Payment state of a booking, set by an authorized actor independently of
/// the lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    /// True for the two states that trigger the refund policy on cancellation.
    pub fn is_refunding(&self) -> bool {
        matches!(self, PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded)
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            "partially_refunded" => Ok(PaymentStatus::PartiallyRefunded),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// Which side cancelled a booking. Drives the refund split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cancel_party", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum CancelParty {
    Customer,
    Provider,
}

impl std::str::FromStr for CancelParty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(CancelParty::Customer),
            "provider" => Ok(CancelParty::Provider),
            other => Err(format!("unknown cancel party '{other}'")),
        }
    }
}

/// A reserved time-window of a provider's service by a customer.
///
/// `provider_id` and `service_name` are copied from the service at creation
/// time and immutable thereafter. `refund_amount` is written at most once, on
/// the first refund-triggering transition, and doubles as the replay guard
/// for refund side effects.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub booking_date: NaiveDate,
    /// Free-text HH:MM; chronological validity is not enforced.
    pub start_time: String,
    pub end_time: String,
    pub total_hours: Decimal,
    pub total_amount: Decimal,
    pub deposit_amount: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub special_requests: Option<String>,
    pub cancelled_by: Option<CancelParty>,
    pub refund_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Requested changes to a booking, already parsed into enums.
#[derive(Debug, Clone, Default)]
pub struct BookingUpdate {
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub cancelled_by: Option<CancelParty>,
    pub special_requests: Option<String>,
    pub refund_reason: Option<String>,
}

/// A ledger movement the booking service must apply alongside an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    CustomerRefund(Decimal),
    ProviderCompensation(Decimal),
    ProviderEarning(Decimal),
}

/// Fully resolved outcome of one booking update: the new field values plus
/// every side effect the transition demands. Computed without I/O so the
/// transition rules stay unit-testable; the service applies it atomically.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub cancelled_by: Option<CancelParty>,
    /// Set exactly once, on the first refund-triggering transition.
    pub set_refund_amount: Option<Decimal>,
    pub effects: Vec<LedgerEffect>,
    /// True when the service's completed-booking counter must be resynced.
    pub resync_booking_count: bool,
}

impl Booking {
    /// Resolves an update request against the current state.
    ///
    /// Rules (in order):
    /// - entering `cancelled` records who cancelled: the request value when
    ///   present, otherwise inferred from the acting role (provider cancels as
    ///   provider, everyone else as customer);
    /// - entering `cancelled` with a refunding payment status runs the refund
    ///   split once, guarded by the absence of a prior `refund_amount`;
    /// - entering `completed` while paid produces the provider earning and a
    ///   booking-count resync;
    /// - leaving `cancelled` clears `cancelled_by`.
    pub fn plan_update(
        &self,
        actor_role: UserRole,
        update: &BookingUpdate,
        rates: &PolicyRates,
    ) -> UpdatePlan {
        let status = update.status.unwrap_or(self.status);
        let payment_status = update.payment_status.unwrap_or(self.payment_status);

        let entering_cancelled =
            status == BookingStatus::Cancelled && self.status != BookingStatus::Cancelled;
        let entering_completed =
            status == BookingStatus::Completed && self.status != BookingStatus::Completed;
        let leaving_cancelled =
            self.status == BookingStatus::Cancelled && status != BookingStatus::Cancelled;

        let mut plan = UpdatePlan {
            status,
            payment_status,
            cancelled_by: self.cancelled_by,
            set_refund_amount: None,
            effects: Vec::new(),
            resync_booking_count: false,
        };

        if entering_cancelled {
            let cancelled_by = update.cancelled_by.unwrap_or(match actor_role {
                UserRole::Provider => CancelParty::Provider,
                UserRole::Customer | UserRole::Admin => CancelParty::Customer,
            });
            plan.cancelled_by = Some(cancelled_by);

            let already_refunded = self.refund_amount.unwrap_or(Decimal::ZERO) > Decimal::ZERO;
            if payment_status.is_refunding() && !already_refunded {
                let split = policy::refund_split(self.total_amount, cancelled_by, rates);
                plan.set_refund_amount = Some(split.customer_refund);
                if split.customer_refund > Decimal::ZERO {
                    plan.effects.push(LedgerEffect::CustomerRefund(split.customer_refund));
                }
                if split.provider_compensation > Decimal::ZERO {
                    plan.effects
                        .push(LedgerEffect::ProviderCompensation(split.provider_compensation));
                }
            }
        } else if leaving_cancelled {
            plan.cancelled_by = None;
        }

        if entering_completed && payment_status == PaymentStatus::Paid {
            let earning = policy::provider_earning(self.total_amount, rates);
            if earning > Decimal::ZERO {
                plan.effects.push(LedgerEffect::ProviderEarning(earning));
            }
            plan.resync_booking_count = true;
        }

        plan
    }
}

/// Shape check for the free-text HH:MM fields. Deliberately does not compare
/// start against end; the stored strings are opaque to the engine.
pub fn looks_like_time(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let hour = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    let minute = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
    hour < 24 && minute < 60
}
