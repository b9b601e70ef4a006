//! sqlx-backed `UserRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::adapters::persistence::error::map_sqlx_error;
use crate::core::error::CoreError;
use crate::core::user::{User, UserRepository, UserStatus};

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    status: String,
    email_verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            status: match row.status.as_str() {
                "active" => UserStatus::Active,
                "suspended" => UserStatus::Suspended,
                "deleted" => UserStatus::Deleted,
                _ => UserStatus::PendingVerification,
            },
            email_verified_at: row.email_verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct SqlUserRepository {
    pool: PgPool,
}

impl SqlUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, CoreError> {
        sqlx::query_as::<_, UserRow>("SELECT id, email, password_hash, status, email_verified_at, created_at, updated_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(User::from))
            .map_err(|e| map_sqlx_error("user", e))
    }

    async fn find_by_email(&self, email_lower: &str) -> Result<Option<User>, CoreError> {
        sqlx::query_as::<_, UserRow>("SELECT id, email, password_hash, status, email_verified_at, created_at, updated_at FROM users WHERE email = $1")
            .bind(email_lower)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(User::from))
            .map_err(|e| map_sqlx_error("user", e))
    }

    async fn update_password_hash(&self, user_id: &str, new_hash: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(new_hash)
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user", e))?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("user not found"));
        }
        Ok(())
    }
}
