//! Process entry point: load configuration, wire concrete adapters behind
//! `core`'s ports, and serve the HTTP API.

use std::sync::Arc;

use aim_core::adapters::cache::{DashmapFastCache, RedisFastCache, RedisRateLimiter};
use aim_core::adapters::crypto::{Argon2CryptoService, RsaTokenService, TotpRsService};
use aim_core::adapters::http::{create_router, AppState};
use aim_core::adapters::persistence::{
    self, PoolConfig, SqlAuditLogSink, SqlBackupCodeRepository, SqlBlacklistRepository, SqlDeviceRepository, SqlLoginAttemptRepository,
    SqlMfaChallengeRepository, SqlMfaConfigRepository, SqlNotificationSubscriptionRepository, SqlPasswordHistoryRepository,
    SqlPasswordResetTokenRepository, SqlPermissionRepository, SqlRoleHierarchyRepository, SqlRolePermissionRepository, SqlRoleRepository,
    SqlSecurityAlertRepository, SqlSessionRepository, SqlUserPermissionRepository, SqlUserRepository, SqlUserRoleRepository,
};
use aim_core::adapters::queue::PostgresOutboxQueue;
use aim_core::config::AppConfig;
use aim_core::core::audit::ResilientAuditSink;
use aim_core::core::clock::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = AppConfig::from_env();

    let pool = persistence::connect(&config.database_url, PoolConfig { max_connections: config.db_max_connections, ..Default::default() }).await?;

    let encryption_key = decode_encryption_key(&config.mfa_encryption_key_hex)?;
    let crypto_owned = Argon2CryptoService::new(19 * 1024, 2, 1, encryption_key)?;
    let crypto: Arc<dyn aim_core::core::crypto::CryptoService> = Arc::new(crypto_owned.clone());
    // TOTP wraps a crypto reference for secret generation; leaking a clone
    // into a 'static reference avoids threading a lifetime through AppState.
    let crypto_static: &'static Argon2CryptoService = Box::leak(Box::new(crypto_owned));
    let totp: Arc<dyn aim_core::core::totp::TotpService> = Arc::new(TotpRsService::new(crypto_static));

    let tokens: Arc<dyn aim_core::core::token::TokenService> = Arc::new(RsaTokenService::new(
        config.jwt_private_key_pem.as_bytes(),
        config.jwt_public_key_pem.as_bytes(),
        chrono::Duration::from_std(config.access_token_ttl).unwrap_or(chrono::Duration::minutes(15)),
        chrono::Duration::from_std(config.refresh_token_ttl).unwrap_or(chrono::Duration::days(7)),
        chrono::Duration::from_std(config.remember_me_refresh_ttl).unwrap_or(chrono::Duration::days(30)),
    )?);

    let cache: Arc<dyn aim_core::core::cache::FastCache> = match RedisFastCache::connect(&config.redis_url).await {
        Ok(redis_cache) => Arc::new(redis_cache),
        Err(err) => {
            tracing::warn!(error = %err, "redis cache unreachable at startup, falling back to in-memory cache");
            Arc::new(DashmapFastCache::new())
        }
    };

    let redis_client = redis::Client::open(config.redis_url.clone())?;
    let rate_limit_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    let rate_limiter: Arc<dyn aim_core::core::rate_limit::RateLimiter> = Arc::new(RedisRateLimiter::new(rate_limit_conn));

    let queue: Arc<dyn aim_core::core::queue::NotificationQueue> = Arc::new(PostgresOutboxQueue::new(pool.clone()));
    let audit = Arc::new(ResilientAuditSink::new(Arc::new(SqlAuditLogSink::new(pool.clone()))));
    let clock: Arc<dyn aim_core::core::clock::Clock> = Arc::new(SystemClock);

    let state = AppState {
        users: Arc::new(SqlUserRepository::new(pool.clone())),
        sessions: Arc::new(SqlSessionRepository::new(pool.clone())),
        blacklist: Arc::new(SqlBlacklistRepository::new(pool.clone())),
        login_attempts: Arc::new(SqlLoginAttemptRepository::new(pool.clone())),
        devices: Arc::new(SqlDeviceRepository::new(pool.clone())),
        mfa_configs: Arc::new(SqlMfaConfigRepository::new(pool.clone())),
        mfa_challenges: Arc::new(SqlMfaChallengeRepository::new(pool.clone())),
        backup_codes: Arc::new(SqlBackupCodeRepository::new(pool.clone())),
        reset_tokens: Arc::new(SqlPasswordResetTokenRepository::new(pool.clone())),
        password_history: Arc::new(SqlPasswordHistoryRepository::new(pool.clone())),
        roles: Arc::new(SqlRoleRepository::new(pool.clone())),
        role_hierarchy: Arc::new(SqlRoleHierarchyRepository::new(pool.clone())),
        role_permissions: Arc::new(SqlRolePermissionRepository::new(pool.clone())),
        user_roles: Arc::new(SqlUserRoleRepository::new(pool.clone())),
        permissions: Arc::new(SqlPermissionRepository::new(pool.clone())),
        user_permissions: Arc::new(SqlUserPermissionRepository::new(pool.clone())),
        alerts: Arc::new(SqlSecurityAlertRepository::new(pool.clone())),
        subscriptions: Arc::new(SqlNotificationSubscriptionRepository::new(pool.clone())),
        cache,
        crypto,
        tokens,
        totp,
        rate_limiter,
        queue,
        clock,
        audit,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    tracing::info!(addr = %config.http_bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn decode_encryption_key(hex_key: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(hex_key).map_err(|e| anyhow::anyhow!("MFA_ENCRYPTION_KEY_HEX is not valid hex: {e}"))?;
    bytes.try_into().map_err(|_| anyhow::anyhow!("MFA_ENCRYPTION_KEY_HEX must decode to exactly 32 bytes"))
}
