//! sqlx-backed `SessionRepository` and `BlacklistRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::adapters::persistence::error::map_sqlx_error;
use crate::core::error::CoreError;
use crate::core::session::{BlacklistReason, BlacklistRepository, BlacklistedToken, Geo, RevokeReason, Session, SessionRepository};

#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    access_token_hash: String,
    refresh_token_hash: String,
    token_family: String,
    device_fingerprint: Option<String>,
    user_agent: Option<String>,
    ip_address: Option<String>,
    geo_city: Option<String>,
    geo_country: Option<String>,
    is_remembered: bool,
    last_activity_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    revoke_reason: Option<String>,
    created_at: DateTime<Utc>,
}

fn parse_revoke_reason(s: &str) -> RevokeReason {
    match s {
        "TOKEN_ROTATED" => RevokeReason::TokenRotated,
        "SESSION_REVOKED" => RevokeReason::SessionRevoked,
        "ADMIN_FORCE_LOGOUT" => RevokeReason::AdminForceLogout,
        "TOKEN_REUSE_DETECTED" => RevokeReason::TokenReuseDetected,
        "LOGOUT_ALL_DEVICES" => RevokeReason::LogoutAllDevices,
        "PASSWORD_RESET" => RevokeReason::PasswordReset,
        "INACTIVITY_TIMEOUT" => RevokeReason::InactivityTimeout,
        "CONCURRENT_LIMIT_ENFORCED" => RevokeReason::ConcurrentLimitEnforced,
        _ => RevokeReason::UserLogout,
    }
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            access_token_hash: row.access_token_hash,
            refresh_token_hash: row.refresh_token_hash,
            token_family: row.token_family,
            device_fingerprint: row.device_fingerprint,
            user_agent: row.user_agent,
            ip_address: row.ip_address,
            geo: match (row.geo_city, row.geo_country) {
                (None, None) => None,
                (city, country) => Some(Geo { city, country }),
            },
            is_remembered: row.is_remembered,
            last_activity_at: row.last_activity_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            revoke_reason: row.revoke_reason.as_deref().map(parse_revoke_reason),
            created_at: row.created_at,
        }
    }
}

const SESSION_COLUMNS: &str = "id, user_id, access_token_hash, refresh_token_hash, token_family, device_fingerprint, \
     user_agent, ip_address, geo_city, geo_country, is_remembered, last_activity_at, expires_at, \
     revoked_at, revoke_reason, created_at";

pub struct SqlSessionRepository {
    pool: PgPool,
}

impl SqlSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn insert(&self, session: Session) -> Result<(), CoreError> {
        sqlx::query(&format!(
            "INSERT INTO sessions ({SESSION_COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)"
        ))
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.access_token_hash)
        .bind(&session.refresh_token_hash)
        .bind(&session.token_family)
        .bind(&session.device_fingerprint)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.geo.as_ref().and_then(|g| g.city.clone()))
        .bind(session.geo.as_ref().and_then(|g| g.country.clone()))
        .bind(session.is_remembered)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .bind(session.revoked_at)
        .bind(session.revoke_reason.map(|r| r.as_str()))
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("session", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, CoreError> {
        sqlx::query_as::<_, SessionRow>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Session::from))
            .map_err(|e| map_sqlx_error("session", e))
    }

    async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<Session>, CoreError> {
        sqlx::query_as::<_, SessionRow>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 AND revoked_at IS NULL"))
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Session::from).collect())
            .map_err(|e| map_sqlx_error("session", e))
    }

    async fn find_by_token_family(&self, token_family: &str) -> Result<Vec<Session>, CoreError> {
        sqlx::query_as::<_, SessionRow>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token_family = $1"))
            .bind(token_family)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(Session::from).collect())
            .map_err(|e| map_sqlx_error("session", e))
    }

    async fn update(&self, session: Session) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE sessions SET refresh_token_hash = $1, ip_address = $2, last_activity_at = $3, \
             revoked_at = $4, revoke_reason = $5 WHERE id = $6",
        )
        .bind(&session.refresh_token_hash)
        .bind(&session.ip_address)
        .bind(session.last_activity_at)
        .bind(session.revoked_at)
        .bind(session.revoke_reason.map(|r| r.as_str()))
        .bind(&session.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("session", e))?;
        Ok(())
    }
}

fn blacklist_reason_str(reason: BlacklistReason) -> &'static str {
    match reason {
        BlacklistReason::UserLogout => "USER_LOGOUT",
        BlacklistReason::TokenRotated => "TOKEN_ROTATED",
        BlacklistReason::SessionRevoked => "SESSION_REVOKED",
        BlacklistReason::AdminForceLogout => "ADMIN_FORCE_LOGOUT",
        BlacklistReason::TokenReuseDetected => "TOKEN_REUSE_DETECTED",
        BlacklistReason::LogoutAllDevices => "LOGOUT_ALL_DEVICES",
        BlacklistReason::PasswordReset => "PASSWORD_RESET",
    }
}

pub struct SqlBlacklistRepository {
    pool: PgPool,
}

impl SqlBlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlacklistRepository for SqlBlacklistRepository {
    async fn insert(&self, token: BlacklistedToken) -> Result<(), CoreError> {
        sqlx::query("INSERT INTO token_blacklist (token_hash, expires_at, reason) VALUES ($1, $2, $3) ON CONFLICT (token_hash) DO NOTHING")
            .bind(&token.token_hash)
            .bind(token.expires_at)
            .bind(blacklist_reason_str(token.reason))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("blacklisted token", e))?;
        Ok(())
    }

    async fn is_blacklisted(&self, token_hash: &str) -> Result<bool, CoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM token_blacklist WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("blacklisted token", e))?;
        Ok(row.is_some())
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("blacklisted token", e))?;
        Ok(result.rows_affected())
    }
}
