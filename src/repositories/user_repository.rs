use crate::error::{AppError, Result};
use crate::models::User;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for users and their authoritative wallet balance. Balance
/// mutations live in the wallet service's transactional write path, not here.
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, role, balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, role, balance, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.role)
        .bind(user.balance)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, role, balance, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Fetches a user or fails with `NotFound`.
    pub async fn get(&self, id: Uuid) -> Result<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{id}' not found")))
    }
}
