//! sqlx-backed `MfaConfigRepository`, `MfaChallengeRepository`, `BackupCodeRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::adapters::persistence::error::map_sqlx_error;
use crate::core::error::CoreError;
use crate::core::mfa::{BackupCodeRepository, MfaBackupCode, MfaChallenge, MfaChallengeRepository, MfaConfigRepository, MfaConfiguration};

#[derive(FromRow)]
struct MfaConfigRow {
    user_id: String,
    secret_encrypted: String,
    is_enabled: bool,
    verified_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
}

impl From<MfaConfigRow> for MfaConfiguration {
    fn from(row: MfaConfigRow) -> Self {
        MfaConfiguration {
            user_id: row.user_id,
            secret_encrypted: row.secret_encrypted,
            is_enabled: row.is_enabled,
            verified_at: row.verified_at,
            last_used_at: row.last_used_at,
            failed_attempts: row.failed_attempts.max(0) as u32,
            locked_until: row.locked_until,
        }
    }
}

pub struct SqlMfaConfigRepository {
    pool: PgPool,
}

impl SqlMfaConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MfaConfigRepository for SqlMfaConfigRepository {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<MfaConfiguration>, CoreError> {
        sqlx::query_as::<_, MfaConfigRow>(
            "SELECT user_id, secret_encrypted, is_enabled, verified_at, last_used_at, failed_attempts, locked_until \
             FROM mfa_configurations WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(MfaConfiguration::from))
        .map_err(|e| map_sqlx_error("mfa configuration", e))
    }

    async fn upsert(&self, config: MfaConfiguration) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO mfa_configurations (user_id, secret_encrypted, is_enabled, verified_at, last_used_at, failed_attempts, locked_until) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id) DO UPDATE SET secret_encrypted = EXCLUDED.secret_encrypted, \
             is_enabled = EXCLUDED.is_enabled, verified_at = EXCLUDED.verified_at, \
             last_used_at = EXCLUDED.last_used_at, failed_attempts = EXCLUDED.failed_attempts, \
             locked_until = EXCLUDED.locked_until",
        )
        .bind(&config.user_id)
        .bind(&config.secret_encrypted)
        .bind(config.is_enabled)
        .bind(config.verified_at)
        .bind(config.last_used_at)
        .bind(config.failed_attempts as i32)
        .bind(config.locked_until)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mfa configuration", e))?;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM mfa_configurations WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("mfa configuration", e))?;
        Ok(())
    }
}

#[derive(FromRow)]
struct MfaChallengeRow {
    id: String,
    challenge_token: String,
    user_id: String,
    attempts: i32,
    max_attempts: i32,
    expires_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
}

impl From<MfaChallengeRow> for MfaChallenge {
    fn from(row: MfaChallengeRow) -> Self {
        MfaChallenge {
            id: row.id,
            challenge_token: row.challenge_token,
            user_id: row.user_id,
            attempts: row.attempts.max(0) as u32,
            max_attempts: row.max_attempts.max(0) as u32,
            expires_at: row.expires_at,
            completed_at: row.completed_at,
            ip_address: row.ip_address,
        }
    }
}

pub struct SqlMfaChallengeRepository {
    pool: PgPool,
}

impl SqlMfaChallengeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MfaChallengeRepository for SqlMfaChallengeRepository {
    async fn insert(&self, challenge: MfaChallenge) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO mfa_challenges (id, challenge_token, user_id, attempts, max_attempts, expires_at, completed_at, ip_address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&challenge.id)
        .bind(&challenge.challenge_token)
        .bind(&challenge.user_id)
        .bind(challenge.attempts as i32)
        .bind(challenge.max_attempts as i32)
        .bind(challenge.expires_at)
        .bind(challenge.completed_at)
        .bind(&challenge.ip_address)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mfa challenge", e))?;
        Ok(())
    }

    async fn find_by_token(&self, challenge_token: &str) -> Result<Option<MfaChallenge>, CoreError> {
        sqlx::query_as::<_, MfaChallengeRow>(
            "SELECT id, challenge_token, user_id, attempts, max_attempts, expires_at, completed_at, ip_address \
             FROM mfa_challenges WHERE challenge_token = $1",
        )
        .bind(challenge_token)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(MfaChallenge::from))
        .map_err(|e| map_sqlx_error("mfa challenge", e))
    }

    async fn update(&self, challenge: MfaChallenge) -> Result<(), CoreError> {
        sqlx::query("UPDATE mfa_challenges SET attempts = $1, completed_at = $2 WHERE id = $3")
            .bind(challenge.attempts as i32)
            .bind(challenge.completed_at)
            .bind(&challenge.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("mfa challenge", e))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM mfa_challenges WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("mfa challenge", e))?;
        Ok(())
    }

    async fn delete_expired_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM mfa_challenges WHERE user_id = $1 AND expires_at < $2")
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("mfa challenge", e))?;
        Ok(())
    }
}

#[derive(FromRow)]
struct BackupCodeRow {
    id: String,
    user_id: String,
    code_hash: String,
    used_at: Option<DateTime<Utc>>,
    used_ip_address: Option<String>,
    used_user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<BackupCodeRow> for MfaBackupCode {
    fn from(row: BackupCodeRow) -> Self {
        MfaBackupCode {
            id: row.id,
            user_id: row.user_id,
            code_hash: row.code_hash,
            used_at: row.used_at,
            used_ip_address: row.used_ip_address,
            used_user_agent: row.used_user_agent,
            created_at: row.created_at,
        }
    }
}

pub struct SqlBackupCodeRepository {
    pool: PgPool,
}

impl SqlBackupCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BackupCodeRepository for SqlBackupCodeRepository {
    async fn replace_all(&self, user_id: &str, codes: Vec<MfaBackupCode>) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("backup code", e))?;
        sqlx::query("DELETE FROM mfa_backup_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("backup code", e))?;
        for code in codes {
            sqlx::query(
                "INSERT INTO mfa_backup_codes (id, user_id, code_hash, used_at, used_ip_address, used_user_agent, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&code.id)
            .bind(&code.user_id)
            .bind(&code.code_hash)
            .bind(code.used_at)
            .bind(&code.used_ip_address)
            .bind(&code.used_user_agent)
            .bind(code.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("backup code", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("backup code", e))?;
        Ok(())
    }

    async fn find_unused(&self, user_id: &str) -> Result<Vec<MfaBackupCode>, CoreError> {
        sqlx::query_as::<_, BackupCodeRow>(
            "SELECT id, user_id, code_hash, used_at, used_ip_address, used_user_agent, created_at \
             FROM mfa_backup_codes WHERE user_id = $1 AND used_at IS NULL",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(MfaBackupCode::from).collect())
        .map_err(|e| map_sqlx_error("backup code", e))
    }

    async fn find_used(&self, user_id: &str) -> Result<Vec<MfaBackupCode>, CoreError> {
        sqlx::query_as::<_, BackupCodeRow>(
            "SELECT id, user_id, code_hash, used_at, used_ip_address, used_user_agent, created_at \
             FROM mfa_backup_codes WHERE user_id = $1 AND used_at IS NOT NULL",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(MfaBackupCode::from).collect())
        .map_err(|e| map_sqlx_error("backup code", e))
    }

    async fn mark_used(&self, code_id: &str, now: DateTime<Utc>, ip: Option<String>, ua: Option<String>) -> Result<(), CoreError> {
        sqlx::query("UPDATE mfa_backup_codes SET used_at = $1, used_ip_address = $2, used_user_agent = $3 WHERE id = $4")
            .bind(now)
            .bind(&ip)
            .bind(&ua)
            .bind(code_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("backup code", e))?;
        Ok(())
    }
}
