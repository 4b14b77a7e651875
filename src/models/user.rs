use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The three marketplace roles. Admins moderate; they hold no wallet-facing
/// privileges beyond acting on behalf of users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Provider,
    Admin,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(UserRole::Customer),
            "provider" => Ok(UserRole::Provider),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A wallet-holding user. `balance` is the authoritative wallet value,
/// mutated only inside the wallet engine's transactional write path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: UserRole,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_sufficient_balance(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}
