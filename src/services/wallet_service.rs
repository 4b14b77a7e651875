use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::WalletCache;
use crate::error::{AppError, Result};
use crate::models::{
    EntryAction, TransactionMeta, TransactionType, WalletTransaction,
};
use crate::observability::get_metrics;
use crate::repositories::{TransactionRepository, UserRepository};

/// Authoritative and ledger-derived views of one wallet.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WalletBalance {
    pub account_id: Uuid,
    pub balance: Decimal,
    /// Signed sum over the transaction log; reconciliation only.
    pub ledger_balance: Decimal,
}

/// Outcome of a two-sided transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub transaction: WalletTransaction,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

/// The wallet transfer engine: applies signed balance changes and records the
/// movement in one SQL transaction. The guarded `balance >= amount` update is
/// what keeps concurrent debits from both passing a stale balance check.
pub struct WalletService {
    pool: PgPool,
    user_repo: UserRepository,
    tx_repo: TransactionRepository,
    cache: Option<Arc<WalletCache>>,
    currency: String,
}

impl WalletService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repo: UserRepository::new(pool.clone()),
            tx_repo: TransactionRepository::new(pool.clone()),
            pool,
            cache: None,
            currency: "THB".to_string(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<WalletCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Increases the target balance. Always succeeds once the account exists
    /// and the amount is positive.
    pub async fn credit(
        &self,
        account_id: Uuid,
        amount: Decimal,
        tx_type: TransactionType,
        meta: TransactionMeta,
    ) -> Result<WalletTransaction> {
        Self::require_positive(amount)?;

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let record =
            Self::credit_in_tx(&mut tx, account_id, amount, tx_type, &self.currency, meta).await?;
        tx.commit().await.map_err(AppError::Database)?;

        self.invalidate_cache(account_id).await;
        get_metrics().record_wallet_movement("credit", tx_type_label(tx_type));
        Ok(record)
    }

    /// Decreases the target balance, failing `InsufficientBalance` when the
    /// wallet cannot cover the amount.
    pub async fn debit(
        &self,
        account_id: Uuid,
        amount: Decimal,
        tx_type: TransactionType,
        meta: TransactionMeta,
    ) -> Result<WalletTransaction> {
        Self::require_positive(amount)?;

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let record =
            Self::debit_in_tx(&mut tx, account_id, amount, tx_type, &self.currency, meta).await?;
        tx.commit().await.map_err(AppError::Database)?;

        self.invalidate_cache(account_id).await;
        get_metrics().record_wallet_movement("debit", tx_type_label(tx_type));
        Ok(record)
    }

    /// Moves funds between two wallets as one atomic unit. Recorded as a
    /// single transaction row capturing the debit leg, with the credited
    /// party as counterparty.
    pub async fn transfer(
        &self,
        from_id: Uuid,
        to_id: Uuid,
        amount: Decimal,
        meta: TransactionMeta,
    ) -> Result<TransferOutcome> {
        Self::require_positive(amount)?;
        if from_id == to_id {
            return Err(AppError::Validation(
                "cannot transfer to the same account".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let from_balance = Self::apply_debit(&mut tx, from_id, amount).await?;
        let to_balance = Self::apply_credit(&mut tx, to_id, amount).await?;

        let record = WalletTransaction::new(
            from_id,
            TransactionType::Payment,
            EntryAction::Debit,
            amount,
            self.currency.clone(),
            meta,
        )
        .with_counterparty(to_id)
        .with_balance_after(from_balance);

        let record = Self::insert_transaction(&mut tx, &record).await?;
        tx.commit().await.map_err(AppError::Database)?;

        self.invalidate_cache(from_id).await;
        self.invalidate_cache(to_id).await;
        get_metrics().record_wallet_movement("transfer", "payment");

        Ok(TransferOutcome {
            transaction: record,
            from_balance,
            to_balance,
        })
    }

    /// Authoritative balance plus the ledger-derived sum, cache-assisted.
    pub async fn balance(&self, account_id: Uuid) -> Result<WalletBalance> {
        let balance = match self.cached_balance(account_id).await {
            Some(balance) => balance,
            None => {
                let user = self.user_repo.get(account_id).await?;
                self.store_cache(account_id, user.balance).await;
                user.balance
            }
        };

        let ledger_balance = self.tx_repo.derived_balance(account_id).await?;
        if balance != ledger_balance {
            tracing::warn!(
                account_id = %account_id,
                %balance,
                %ledger_balance,
                "wallet balance diverges from ledger sum"
            );
        }

        Ok(WalletBalance {
            account_id,
            balance,
            ledger_balance,
        })
    }

    pub async fn list_transactions(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<WalletTransaction>, i64)> {
        // Existence check keeps the 404 semantics of the account resource.
        self.user_repo.get(account_id).await?;
        let items = self.tx_repo.list_by_account(account_id, limit, offset).await?;
        let total = self.tx_repo.count_by_account(account_id).await?;
        Ok((items, total))
    }

    // ------------------------------------------------------------------
    // Transactional building blocks, shared with the booking lifecycle.
    // ------------------------------------------------------------------

    /// Credit leg inside an existing transaction: mutates the balance and
    /// appends the log row with a `balance_after` snapshot.
    pub(crate) async fn credit_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        amount: Decimal,
        tx_type: TransactionType,
        currency: &str,
        meta: TransactionMeta,
    ) -> Result<WalletTransaction> {
        let balance = Self::apply_credit(tx, account_id, amount).await?;
        let record = WalletTransaction::new(
            account_id,
            tx_type,
            EntryAction::Credit,
            amount,
            currency.to_string(),
            meta,
        )
        .with_balance_after(balance);
        Self::insert_transaction(tx, &record).await
    }

    /// Debit leg with the receiving party recorded as counterparty. Used for
    /// booking payments, where funds are held by the platform until release.
    pub(crate) async fn debit_with_counterparty_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        counterparty_id: Uuid,
        amount: Decimal,
        tx_type: TransactionType,
        currency: &str,
        meta: TransactionMeta,
    ) -> Result<WalletTransaction> {
        let balance = Self::apply_debit(tx, account_id, amount).await?;
        let record = WalletTransaction::new(
            account_id,
            tx_type,
            EntryAction::Debit,
            amount,
            currency.to_string(),
            meta,
        )
        .with_counterparty(counterparty_id)
        .with_balance_after(balance);
        Self::insert_transaction(tx, &record).await
    }

    /// Debit leg inside an existing transaction.
    pub(crate) async fn debit_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        amount: Decimal,
        tx_type: TransactionType,
        currency: &str,
        meta: TransactionMeta,
    ) -> Result<WalletTransaction> {
        let balance = Self::apply_debit(tx, account_id, amount).await?;
        let record = WalletTransaction::new(
            account_id,
            tx_type,
            EntryAction::Debit,
            amount,
            currency.to_string(),
            meta,
        )
        .with_balance_after(balance);
        Self::insert_transaction(tx, &record).await
    }

    async fn apply_credit(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        amount: Decimal,
    ) -> Result<Decimal> {
        let row: Option<(Decimal,)> = sqlx::query_as(
            r#"
            UPDATE users
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        row.map(|(b,)| b)
            .ok_or_else(|| AppError::NotFound(format!("User '{account_id}' not found")))
    }

    async fn apply_debit(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        amount: Decimal,
    ) -> Result<Decimal> {
        let row: Option<(Decimal,)> = sqlx::query_as(
            r#"
            UPDATE users
            SET balance = balance - $2, updated_at = NOW()
            WHERE id = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        if let Some((balance,)) = row {
            return Ok(balance);
        }

        // Guarded update matched nothing: missing account or short funds.
        let available: Option<(Decimal,)> =
            sqlx::query_as("SELECT balance FROM users WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(AppError::Database)?;

        match available {
            Some((available,)) => Err(AppError::InsufficientBalance {
                requested: amount,
                available,
            }),
            None => Err(AppError::NotFound(format!("User '{account_id}' not found"))),
        }
    }

    pub(crate) async fn insert_transaction(
        tx: &mut Transaction<'_, Postgres>,
        record: &WalletTransaction,
    ) -> Result<WalletTransaction> {
        let row = sqlx::query_as::<_, WalletTransaction>(
            r#"
            INSERT INTO wallet_transactions
                (id, account_id, counterparty_id, booking_id, purpose, tx_type, action,
                 method, status, amount, currency, note, balance_after, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id, account_id, counterparty_id, booking_id, purpose, tx_type, action,
                      method, status, amount, currency, note, balance_after, created_at
            "#,
        )
        .bind(record.id)
        .bind(record.account_id)
        .bind(record.counterparty_id)
        .bind(record.booking_id)
        .bind(record.purpose)
        .bind(record.tx_type)
        .bind(record.action)
        .bind(&record.method)
        .bind(record.status)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(&record.note)
        .bind(record.balance_after)
        .bind(record.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    fn require_positive(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(format!(
                "amount must be positive, got {amount}"
            )));
        }
        Ok(())
    }

    async fn cached_balance(&self, account_id: Uuid) -> Option<Decimal> {
        match &self.cache {
            Some(cache) => cache.get(account_id).await,
            None => None,
        }
    }

    async fn store_cache(&self, account_id: Uuid, balance: Decimal) {
        if let Some(cache) = &self.cache {
            cache.put(account_id, balance).await;
        }
    }

    pub(crate) async fn invalidate_cache(&self, account_id: Uuid) {
        if let Some(cache) = &self.cache {
            cache.invalidate(account_id).await;
        }
    }
}

fn tx_type_label(tx_type: TransactionType) -> &'static str {
    match tx_type {
        TransactionType::Topup => "topup",
        TransactionType::Payment => "payment",
        TransactionType::Withdrawal => "withdrawal",
        TransactionType::Refund => "refund",
    }
}
