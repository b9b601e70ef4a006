//! sqlx-backed `PasswordResetTokenRepository` and `PasswordHistoryRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::adapters::persistence::error::map_sqlx_error;
use crate::core::error::CoreError;
use crate::core::password_reset::{PasswordHistoryRepository, PasswordResetToken, PasswordResetTokenRepository};

#[derive(FromRow)]
struct ResetTokenRow {
    id: String,
    user_id: String,
    token_hash: String,
    ip_address: Option<String>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl From<ResetTokenRow> for PasswordResetToken {
    fn from(row: ResetTokenRow) -> Self {
        PasswordResetToken {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            ip_address: row.ip_address,
            expires_at: row.expires_at,
            used_at: row.used_at,
        }
    }
}

pub struct SqlPasswordResetTokenRepository {
    pool: PgPool,
}

impl SqlPasswordResetTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetTokenRepository for SqlPasswordResetTokenRepository {
    async fn invalidate_active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
        sqlx::query("UPDATE password_reset_tokens SET used_at = $1 WHERE user_id = $2 AND used_at IS NULL AND expires_at > $1")
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("password reset token", e))?;
        Ok(())
    }

    async fn insert(&self, token: PasswordResetToken) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (id, user_id, token_hash, ip_address, expires_at, used_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&token.id)
        .bind(&token.user_id)
        .bind(&token.token_hash)
        .bind(&token.ip_address)
        .bind(token.expires_at)
        .bind(token.used_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("password reset token", e))?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<PasswordResetToken>, CoreError> {
        sqlx::query_as::<_, ResetTokenRow>(
            "SELECT id, user_id, token_hash, ip_address, expires_at, used_at FROM password_reset_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(PasswordResetToken::from))
        .map_err(|e| map_sqlx_error("password reset token", e))
    }

    async fn mark_used(&self, id: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
        sqlx::query("UPDATE password_reset_tokens SET used_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("password reset token", e))?;
        Ok(())
    }
}

pub struct SqlPasswordHistoryRepository {
    pool: PgPool,
}

impl SqlPasswordHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordHistoryRepository for SqlPasswordHistoryRepository {
    async fn recent_hashes(&self, user_id: &str) -> Result<Vec<String>, CoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT password_hash FROM password_history WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("password history", e))?;
        Ok(rows.into_iter().map(|(hash,)| hash).collect())
    }

    async fn push_and_trim(&self, user_id: &str, new_hash: String, keep: usize) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("password history", e))?;
        sqlx::query("INSERT INTO password_history (user_id, password_hash, created_at) VALUES ($1, $2, now())")
            .bind(user_id)
            .bind(&new_hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("password history", e))?;
        sqlx::query(
            "DELETE FROM password_history WHERE user_id = $1 AND id NOT IN ( \
                 SELECT id FROM password_history WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 \
             )",
        )
        .bind(user_id)
        .bind(keep as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("password history", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("password history", e))?;
        Ok(())
    }
}
