use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Semantic category of a wallet movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "wallet_tx_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Funds added to the wallet from outside.
    Topup,
    /// Wallet spend against a booking or provider.
    Payment,
    /// Funds leaving the platform to a bank account.
    Withdrawal,
    /// Funds returned after a cancellation.
    Refund,
}

/// Authoritative sign of the movement on the affected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_action", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum EntryAction {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "tx_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Why a booking-driven ledger effect was written. Backed by a partial unique
/// index on (booking_id, purpose), which is what makes replayed booking
/// updates unable to double-credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_purpose", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum LedgerPurpose {
    /// Customer refund after cancellation.
    Refund,
    /// Provider compensation after a customer cancellation.
    Compensation,
    /// Provider share of a completed booking.
    Earning,
}

/// Immutable record of one wallet movement. Created only by the wallet
/// engine or booking-lifecycle side effects; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    /// The affected user.
    pub account_id: Uuid,
    /// For payments: the party on the other side of the transfer.
    pub counterparty_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub purpose: Option<LedgerPurpose>,
    pub tx_type: TransactionType,
    pub action: EntryAction,
    /// Free-text funding/spending channel (wallet, promptpay, bank_transfer...).
    pub method: String,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub currency: String,
    /// Human-readable description shown in statements.
    pub note: String,
    /// Snapshot of the account balance after this movement was applied.
    pub balance_after: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Descriptive fields accompanying a wallet operation.
#[derive(Debug, Clone, Default)]
pub struct TransactionMeta {
    pub method: String,
    pub note: String,
    pub booking_id: Option<Uuid>,
    pub purpose: Option<LedgerPurpose>,
}

impl TransactionMeta {
    pub fn new(method: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            note: note.into(),
            booking_id: None,
            purpose: None,
        }
    }

    pub fn for_booking(mut self, booking_id: Uuid, purpose: LedgerPurpose) -> Self {
        self.booking_id = Some(booking_id);
        self.purpose = Some(purpose);
        self
    }
}

impl WalletTransaction {
    pub fn new(
        account_id: Uuid,
        tx_type: TransactionType,
        action: EntryAction,
        amount: Decimal,
        currency: String,
        meta: TransactionMeta,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            counterparty_id: None,
            booking_id: meta.booking_id,
            purpose: meta.purpose,
            tx_type,
            action,
            method: meta.method,
            status: TransactionStatus::Completed,
            amount,
            currency,
            note: meta.note,
            balance_after: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_counterparty(mut self, counterparty_id: Uuid) -> Self {
        self.counterparty_id = Some(counterparty_id);
        self
    }

    pub fn with_balance_after(mut self, balance: Decimal) -> Self {
        self.balance_after = Some(balance);
        self
    }

    /// The movement as a signed amount: credits are positive, debits negative.
    /// `action` is authoritative; `tx_type` is descriptive only.
    pub fn signed_amount(&self) -> Decimal {
        match self.action {
            EntryAction::Credit => self.amount,
            EntryAction::Debit => -self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(action: EntryAction) -> WalletTransaction {
        WalletTransaction::new(
            Uuid::new_v4(),
            TransactionType::Payment,
            action,
            dec!(250),
            "THB".to_string(),
            TransactionMeta::new("wallet", "booking payment"),
        )
    }

    #[test]
    fn test_signed_amount_follows_action() {
        assert_eq!(sample(EntryAction::Credit).signed_amount(), dec!(250));
        assert_eq!(sample(EntryAction::Debit).signed_amount(), dec!(-250));
    }

    #[test]
    fn test_new_transaction_defaults() {
        let tx = sample(EntryAction::Debit);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.counterparty_id.is_none());
        assert!(tx.booking_id.is_none());
        assert!(tx.balance_after.is_none());
    }

    #[test]
    fn test_booking_meta_sets_idempotency_fields() {
        let booking_id = Uuid::new_v4();
        let meta = TransactionMeta::new("wallet", "refund")
            .for_booking(booking_id, LedgerPurpose::Refund);
        let tx = WalletTransaction::new(
            Uuid::new_v4(),
            TransactionType::Refund,
            EntryAction::Credit,
            dec!(500),
            "THB".to_string(),
            meta,
        );
        assert_eq!(tx.booking_id, Some(booking_id));
        assert_eq!(tx.purpose, Some(LedgerPurpose::Refund));
    }

    #[test]
    fn test_builder_helpers() {
        let other = Uuid::new_v4();
        let tx = sample(EntryAction::Debit)
            .with_counterparty(other)
            .with_balance_after(dec!(750));
        assert_eq!(tx.counterparty_id, Some(other));
        assert_eq!(tx.balance_after, Some(dec!(750)));
    }

    #[test]
    fn test_serialization_round_trip() {
        let tx = sample(EntryAction::Credit);
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"credit\""));
        let back: WalletTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.amount, dec!(250));
        assert_eq!(back.action, EntryAction::Credit);
    }
}
