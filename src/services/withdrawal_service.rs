use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{self, Actor};
use crate::error::{AppError, Result};
use crate::models::{TransactionMeta, TransactionType, Withdrawal};
use crate::observability::{get_metrics, mask_account_number};
use crate::repositories::WithdrawalRepository;
use crate::services::WalletService;

const WITHDRAWAL_COLUMNS: &str =
    "id, user_id, amount, bank_name, account_number, account_name, status, created_at";

#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub amount: Decimal,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

/// Provider payouts. Requests at or above the configured minimum are
/// auto-approved: the withdrawal row and the wallet debit land in one SQL
/// transaction, so a recorded payout always has its matching debit.
pub struct WithdrawalService {
    pool: PgPool,
    withdrawal_repo: WithdrawalRepository,
    min_withdrawal: Decimal,
    currency: String,
}

impl WithdrawalService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            withdrawal_repo: WithdrawalRepository::new(pool.clone()),
            pool,
            min_withdrawal: Decimal::from(100),
            currency: "THB".to_string(),
        }
    }

    pub fn with_minimum(mut self, min_withdrawal: Decimal) -> Self {
        self.min_withdrawal = min_withdrawal;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub async fn request_withdrawal(
        &self,
        actor: &Actor,
        user_id: Uuid,
        request: WithdrawalRequest,
    ) -> Result<Withdrawal> {
        auth::ensure_own_account(actor, user_id)?;

        if request.amount < self.min_withdrawal {
            return Err(AppError::InvalidAmount(format!(
                "withdrawal amount must be at least {}, got {}",
                self.min_withdrawal, request.amount
            )));
        }

        let withdrawal = Withdrawal::new(
            user_id,
            request.amount,
            request.bank_name,
            request.account_number,
            request.account_name,
        );

        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let meta = TransactionMeta::new(
            "bank_transfer",
            format!("Withdrawal to {}", withdrawal.bank_name),
        );
        WalletService::debit_in_tx(
            &mut tx,
            user_id,
            withdrawal.amount,
            TransactionType::Withdrawal,
            &self.currency,
            meta,
        )
        .await?;

        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            INSERT INTO withdrawals ({WITHDRAWAL_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(withdrawal.id)
        .bind(withdrawal.user_id)
        .bind(withdrawal.amount)
        .bind(&withdrawal.bank_name)
        .bind(&withdrawal.account_number)
        .bind(&withdrawal.account_name)
        .bind(withdrawal.status)
        .bind(withdrawal.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        get_metrics().record_withdrawal();
        tracing::info!(
            user_id = %user_id,
            amount = %withdrawal.amount,
            account = %mask_account_number(&withdrawal.account_number),
            "withdrawal completed"
        );

        Ok(withdrawal)
    }

    pub async fn get_withdrawal(&self, actor: &Actor, id: Uuid) -> Result<Withdrawal> {
        let withdrawal = self
            .withdrawal_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Withdrawal '{id}' not found")))?;

        auth::ensure_own_account(actor, withdrawal.user_id)?;
        Ok(withdrawal)
    }

    pub async fn list_withdrawals(
        &self,
        actor: &Actor,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Withdrawal>> {
        auth::ensure_own_account(actor, user_id)?;
        self.withdrawal_repo.list_by_user(user_id, limit, offset).await
    }
}
