//! sqlx-backed `LoginAttemptRepository` and `DeviceRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::adapters::persistence::error::map_sqlx_error;
use crate::core::auth::{DeviceRepository, LoginAttempt, LoginAttemptRepository, LoginAttemptStatus, UserDevice};
use crate::core::error::CoreError;

fn status_str(status: LoginAttemptStatus) -> &'static str {
    match status {
        LoginAttemptStatus::Success => "SUCCESS",
        LoginAttemptStatus::FailedInvalidCredentials => "FAILED_INVALID_CREDENTIALS",
        LoginAttemptStatus::FailedAccountLocked => "FAILED_ACCOUNT_LOCKED",
        LoginAttemptStatus::FailedMfa => "FAILED_MFA",
        LoginAttemptStatus::FailedRateLimited => "FAILED_RATE_LIMITED",
    }
}

pub struct SqlLoginAttemptRepository {
    pool: PgPool,
}

impl SqlLoginAttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoginAttemptRepository for SqlLoginAttemptRepository {
    async fn insert(&self, attempt: LoginAttempt) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO login_attempts (user_id, email, status, ip_address, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&attempt.user_id)
        .bind(&attempt.email)
        .bind(status_str(attempt.status))
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(attempt.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("login attempt", e))?;
        Ok(())
    }
}

#[derive(FromRow)]
struct UserDeviceRow {
    id: String,
    user_id: String,
    fingerprint: String,
    last_ip_address: Option<String>,
    last_used_at: DateTime<Utc>,
    is_trusted: bool,
}

impl From<UserDeviceRow> for UserDevice {
    fn from(row: UserDeviceRow) -> Self {
        UserDevice {
            id: row.id,
            user_id: row.user_id,
            fingerprint: row.fingerprint,
            last_ip_address: row.last_ip_address,
            last_used_at: row.last_used_at,
            is_trusted: row.is_trusted,
        }
    }
}

pub struct SqlDeviceRepository {
    pool: PgPool,
}

impl SqlDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRepository for SqlDeviceRepository {
    async fn find(&self, user_id: &str, fingerprint: &str) -> Result<Option<UserDevice>, CoreError> {
        sqlx::query_as::<_, UserDeviceRow>(
            "SELECT id, user_id, fingerprint, last_ip_address, last_used_at, is_trusted \
             FROM user_devices WHERE user_id = $1 AND fingerprint = $2",
        )
        .bind(user_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(UserDevice::from))
        .map_err(|e| map_sqlx_error("user device", e))
    }

    async fn upsert(&self, device: UserDevice) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO user_devices (id, user_id, fingerprint, last_ip_address, last_used_at, is_trusted) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET last_ip_address = EXCLUDED.last_ip_address, \
             last_used_at = EXCLUDED.last_used_at, is_trusted = EXCLUDED.is_trusted",
        )
        .bind(&device.id)
        .bind(&device.user_id)
        .bind(&device.fingerprint)
        .bind(&device.last_ip_address)
        .bind(device.last_used_at)
        .bind(device.is_trusted)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("user device", e))?;
        Ok(())
    }
}
