use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{self, Actor};
use crate::error::{AppError, Result};
use crate::models::{
    Booking, BookingStatus, BookingUpdate, LedgerEffect, LedgerPurpose, Payment, PaymentStatus,
    TransactionMeta, TransactionType, UpdatePlan, UserRole,
};
use crate::observability::get_metrics;
use crate::policy::PolicyRates;
use crate::repositories::{
    BookingFilter, BookingRepository, PaymentRepository, ServiceRepository, TransactionRepository,
};
use crate::services::{ChatService, WalletService};

/// Input for creating a booking. `customer_id` is honored only for admins;
/// everyone else books for themselves.
#[derive(Debug, Clone)]
pub struct CreateBooking {
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

/// Drives the booking lifecycle: creation, listing, and the status update
/// that triggers refunds, compensation and provider earnings. Transition
/// rules live in [`Booking::plan_update`]; this service applies the plan
/// atomically and owns the idempotency lookups.
pub struct BookingService {
    pool: PgPool,
    booking_repo: BookingRepository,
    service_repo: ServiceRepository,
    payment_repo: PaymentRepository,
    tx_repo: TransactionRepository,
    chat_service: ChatService,
    rates: PolicyRates,
    currency: String,
}

impl BookingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            booking_repo: BookingRepository::new(pool.clone()),
            service_repo: ServiceRepository::new(pool.clone()),
            payment_repo: PaymentRepository::new(pool.clone()),
            tx_repo: TransactionRepository::new(pool.clone()),
            chat_service: ChatService::new(pool.clone()),
            pool,
            rates: PolicyRates::default(),
            currency: "THB".to_string(),
        }
    }

    pub fn with_rates(mut self, rates: PolicyRates) -> Self {
        self.rates = rates;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Creates a booking against an active service. The provider and service
    /// name are copied from the listing and immutable afterwards. The chat
    /// thread is provisioned best-effort: its failure never fails the booking.
    pub async fn create_booking(&self, actor: &Actor, input: CreateBooking) -> Result<Booking> {
        if actor.role == UserRole::Provider {
            return Err(AppError::Forbidden(
                "providers cannot create bookings".to_string(),
            ));
        }

        let customer_id = match (actor.is_admin(), input.customer_id) {
            (true, Some(id)) => id,
            _ => actor.id,
        };

        let service = self.service_repo.get(input.service_id).await?;
        if !service.active {
            return Err(AppError::Validation(format!(
                "service '{}' is not active",
                service.id
            )));
        }

        if input.deposit_amount > input.total_amount {
            return Err(AppError::Validation(
                "deposit_amount cannot exceed total_amount".to_string(),
            ));
        }

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            customer_id,
            provider_id: service.provider_id,
            service_id: service.id,
            service_name: service.name.clone(),
            booking_date: input.booking_date,
            start_time: input.start_time,
            end_time: input.end_time,
            total_hours: input.total_hours,
            total_amount: input.total_amount,
            deposit_amount: input.deposit_amount,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            special_requests: input.special_requests,
            cancelled_by: None,
            refund_amount: None,
            created_at: now,
            updated_at: now,
        };

        let booking = self.booking_repo.create(&booking).await?;
        get_metrics().record_booking_created();

        if let Err(e) = self.chat_service.ensure_chat_for_booking(&booking).await {
            tracing::warn!(booking_id = %booking.id, error = %e, "chat auto-provisioning failed");
        }

        Ok(booking)
    }

    pub async fn get_booking(&self, actor: &Actor, id: Uuid) -> Result<Booking> {
        let booking = self.booking_repo.get(id).await?;
        if !auth::can_access_booking(actor, &booking) {
            return Err(AppError::Forbidden(
                "not a participant of this booking".to_string(),
            ));
        }
        Ok(booking)
    }

    /// Lists bookings. Non-admin callers are scoped to their own side of the
    /// marketplace regardless of the requested filter.
    pub async fn list_bookings(
        &self,
        actor: &Actor,
        mut filter: BookingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Booking>, i64)> {
        match actor.role {
            UserRole::Customer => filter.customer_id = Some(actor.id),
            UserRole::Provider => filter.provider_id = Some(actor.id),
            UserRole::Admin => {}
        }

        let items = self.booking_repo.list(&filter, limit, offset).await?;
        let total = self.booking_repo.count(&filter).await?;
        Ok((items, total))
    }

    /// Pays for a booking from the customer's wallet. The debit, payment
    /// record and payment-status flip share one SQL transaction; funds are
    /// held by the platform and released as the completion earning. The
    /// unique payment-per-booking constraint makes a replay fail cleanly.
    pub async fn pay_booking(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        method: &str,
    ) -> Result<(Booking, Payment)> {
        let booking = self.booking_repo.get(booking_id).await?;
        if !actor.is_admin() && actor.id != booking.customer_id {
            return Err(AppError::Forbidden(
                "only the booking customer can pay for it".to_string(),
            ));
        }
        if booking.payment_status != PaymentStatus::Pending {
            return Err(AppError::InvalidPaymentStatus(format!(
                "booking is not awaiting payment (payment_status: {:?})",
                booking.payment_status
            )));
        }

        let payment = Payment::new(
            booking.id,
            booking.customer_id,
            booking.total_amount,
            method.to_string(),
        );

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let meta = TransactionMeta::new(
            method,
            format!("Payment for booking - {}", booking.service_name),
        );
        WalletService::debit_with_counterparty_in_tx(
            &mut tx,
            booking.customer_id,
            booking.provider_id,
            booking.total_amount,
            TransactionType::Payment,
            &self.currency,
            meta,
        )
        .await?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
                (id, booking_id, customer_id, amount, method, status,
                 refund_amount, refund_reason, refunded_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, booking_id, customer_id, amount, method, status,
                      refund_amount, refund_reason, refunded_at, created_at
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.customer_id)
        .bind(payment.amount)
        .bind(&payment.method)
        .bind(payment.status)
        .bind(payment.refund_amount)
        .bind(payment.refund_reason.as_deref())
        .bind(payment.refunded_at)
        .bind(payment.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(
                e,
                "payments_booking_id_key",
                AppError::InvalidPaymentStatus("booking is already paid".to_string()),
            )
        })?;

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET payment_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, customer_id, provider_id, service_id, service_name, booking_date,
                      start_time, end_time, total_hours, total_amount, deposit_amount, status,
                      payment_status, special_requests, cancelled_by, refund_amount,
                      created_at, updated_at
            "#,
        )
        .bind(booking.id)
        .bind(PaymentStatus::Paid)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        get_metrics().record_wallet_movement("debit", "payment");
        Ok((updated, payment))
    }

    /// Looks up the payment record for a booking the actor can access.
    pub async fn get_payment(&self, actor: &Actor, booking_id: Uuid) -> Result<Payment> {
        let booking = self.get_booking(actor, booking_id).await?;
        self.payment_repo
            .find_by_booking(booking.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No payment recorded for booking '{booking_id}'"))
            })
    }

    /// Applies a status/payment-status update with its ledger side effects.
    ///
    /// The financial writes and the booking row update share one SQL
    /// transaction: a booking can never advance to `cancelled`/`completed`
    /// without its required ledger effect. Replays are inert: the refund is
    /// guarded by `refund_amount`, the earning by a prior-effect lookup, and
    /// both by the (booking_id, purpose) unique index underneath. Losing a
    /// concurrent race to that index is not an error; the stored booking,
    /// written by the winner, is returned as-is.
    pub async fn update_booking(
        &self,
        actor: &Actor,
        id: Uuid,
        update: BookingUpdate,
    ) -> Result<Booking> {
        let booking = self.booking_repo.get(id).await?;
        if !auth::can_modify_booking(actor, &booking) {
            return Err(AppError::Forbidden(
                "not a participant of this booking".to_string(),
            ));
        }

        let mut plan = booking.plan_update(actor.role, &update, &self.rates);

        // Drop effects that already landed in an earlier replay.
        let mut effects = Vec::with_capacity(plan.effects.len());
        for effect in plan.effects.drain(..) {
            let purpose = effect_purpose(&effect);
            if self.tx_repo.find_booking_effect(id, purpose).await?.is_none() {
                effects.push(effect);
            }
        }

        let updated = match self.apply_plan(&booking, &plan, &effects, &update).await {
            Ok(updated) => {
                get_metrics().record_booking_transition(status_label(plan.status));
                updated
            }
            // A concurrent update committed the same effect between the
            // lookup above and our insert; its transaction carried the
            // booking row along, so the stored state is the outcome.
            Err(e) if e.is_unique_violation("idx_wallet_tx_booking_effect") => {
                tracing::info!(
                    booking_id = %id,
                    "ledger effect already applied by a concurrent update"
                );
                self.booking_repo.get(id).await?
            }
            Err(e) => return Err(e),
        };

        // Derived counter; failure must not fail the update.
        if plan.resync_booking_count {
            if let Err(e) = self.resync_booking_count(booking.service_id).await {
                tracing::warn!(
                    service_id = %booking.service_id,
                    error = %e,
                    "booking count resync failed"
                );
            }
        }

        Ok(updated)
    }

    /// One SQL transaction covering the remaining ledger effects and the
    /// booking row update.
    async fn apply_plan(
        &self,
        booking: &Booking,
        plan: &UpdatePlan,
        effects: &[LedgerEffect],
        update: &BookingUpdate,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        for effect in effects {
            match *effect {
                LedgerEffect::CustomerRefund(amount) => {
                    let meta = TransactionMeta::new(
                        "refund",
                        format!("Refund for cancelled booking - {}", booking.service_name),
                    )
                    .for_booking(booking.id, LedgerPurpose::Refund);
                    WalletService::credit_in_tx(
                        &mut tx,
                        booking.customer_id,
                        amount,
                        TransactionType::Refund,
                        &self.currency,
                        meta,
                    )
                    .await?;

                    // Mark the payment record refunded, once.
                    sqlx::query(
                        r#"
                        UPDATE payments
                        SET refund_amount = $2, refund_reason = $3, refunded_at = NOW()
                        WHERE booking_id = $1 AND refunded_at IS NULL
                        "#,
                    )
                    .bind(booking.id)
                    .bind(amount)
                    .bind(update.refund_reason.as_deref())
                    .execute(&mut *tx)
                    .await
                    .map_err(AppError::Database)?;
                }
                LedgerEffect::ProviderCompensation(amount) => {
                    let meta = TransactionMeta::new(
                        "compensation",
                        format!("Cancellation compensation - {}", booking.service_name),
                    )
                    .for_booking(booking.id, LedgerPurpose::Compensation);
                    WalletService::credit_in_tx(
                        &mut tx,
                        booking.provider_id,
                        amount,
                        TransactionType::Refund,
                        &self.currency,
                        meta,
                    )
                    .await?;
                }
                LedgerEffect::ProviderEarning(amount) => {
                    let meta = TransactionMeta::new(
                        "transfer",
                        format!("Service earning - {}", booking.service_name),
                    )
                    .for_booking(booking.id, LedgerPurpose::Earning);
                    WalletService::credit_in_tx(
                        &mut tx,
                        booking.provider_id,
                        amount,
                        TransactionType::Payment,
                        &self.currency,
                        meta,
                    )
                    .await?;
                }
            }
        }

        let special_requests = update
            .special_requests
            .as_deref()
            .or(booking.special_requests.as_deref());

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2,
                payment_status = $3,
                cancelled_by = $4,
                refund_amount = COALESCE($5, refund_amount),
                special_requests = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, customer_id, provider_id, service_id, service_name, booking_date,
                      start_time, end_time, total_hours, total_amount, deposit_amount, status,
                      payment_status, special_requests, cancelled_by, refund_amount,
                      created_at, updated_at
            "#,
        )
        .bind(booking.id)
        .bind(plan.status)
        .bind(plan.payment_status)
        .bind(plan.cancelled_by)
        .bind(plan.set_refund_amount)
        .bind(special_requests)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(updated)
    }

    async fn resync_booking_count(&self, service_id: Uuid) -> Result<()> {
        let completed = self
            .booking_repo
            .count_completed_for_service(service_id)
            .await?;
        self.service_repo.set_booking_count(service_id, completed).await
    }
}

fn effect_purpose(effect: &LedgerEffect) -> LedgerPurpose {
    match effect {
        LedgerEffect::CustomerRefund(_) => LedgerPurpose::Refund,
        LedgerEffect::ProviderCompensation(_) => LedgerPurpose::Compensation,
        LedgerEffect::ProviderEarning(_) => LedgerPurpose::Earning,
    }
}

fn status_label(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "pending",
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::Completed => "completed",
        BookingStatus::Cancelled => "cancelled",
    }
}
