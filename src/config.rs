//! Application configuration, loaded from the process environment (with an
//! optional `.env` file for local development) — never hard-coded.

use std::env;
use std::time::Duration;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub http_bind_addr: String,

    pub jwt_private_key_pem: String,
    pub jwt_public_key_pem: String,
    pub mfa_encryption_key_hex: String,

    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub remember_me_refresh_ttl: Duration,

    pub max_active_sessions: usize,
    pub inactivity_timeout_minutes: i64,

    pub login_max_failures: i64,
    pub login_lockout_minutes: i64,
    pub login_rate_limit_per_email: u64,
    pub login_rate_limit_per_ip: u64,

    pub mfa_max_failed_attempts: u32,
    pub mfa_lockout_minutes: i64,
    pub mfa_challenge_ttl_seconds: i64,

    pub reset_token_ttl_hours: i64,
    pub password_history_depth: usize,

    pub totp_issuer: String,

    pub db_max_connections: u32,
}

impl AppConfig {
    /// Loads `.env` (ignored if absent — production deployments set real
    /// environment variables) then reads every setting, falling back to the
    /// documented development defaults from spec.md.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env_or("DATABASE_URL", "postgres://localhost/aim"),
            redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
            http_bind_addr: env_or("HTTP_BIND_ADDR", "0.0.0.0:8080"),

            jwt_private_key_pem: env_or("JWT_PRIVATE_KEY_PEM", ""),
            jwt_public_key_pem: env_or("JWT_PUBLIC_KEY_PEM", ""),
            mfa_encryption_key_hex: env_or("MFA_ENCRYPTION_KEY_HEX", ""),

            access_token_ttl: Duration::from_secs(env_parse_or("ACCESS_TOKEN_TTL_SECONDS", 15 * 60)),
            refresh_token_ttl: Duration::from_secs(env_parse_or("REFRESH_TOKEN_TTL_SECONDS", 7 * 24 * 60 * 60)),
            remember_me_refresh_ttl: Duration::from_secs(env_parse_or("REMEMBER_ME_REFRESH_TTL_SECONDS", 30 * 24 * 60 * 60)),

            max_active_sessions: env_parse_or("MAX_ACTIVE_SESSIONS", 5),
            inactivity_timeout_minutes: env_parse_or("INACTIVITY_TIMEOUT_MINUTES", 60),

            login_max_failures: env_parse_or("LOGIN_MAX_FAILURES", 10),
            login_lockout_minutes: env_parse_or("LOGIN_LOCKOUT_MINUTES", 30),
            login_rate_limit_per_email: env_parse_or("LOGIN_RATE_LIMIT_PER_EMAIL", 5),
            login_rate_limit_per_ip: env_parse_or("LOGIN_RATE_LIMIT_PER_IP", 20),

            mfa_max_failed_attempts: env_parse_or("MFA_MAX_FAILED_ATTEMPTS", 5),
            mfa_lockout_minutes: env_parse_or("MFA_LOCKOUT_MINUTES", 30),
            mfa_challenge_ttl_seconds: env_parse_or("MFA_CHALLENGE_TTL_SECONDS", 300),

            reset_token_ttl_hours: env_parse_or("RESET_TOKEN_TTL_HOURS", 1),
            password_history_depth: env_parse_or("PASSWORD_HISTORY_DEPTH", 5),

            totp_issuer: env_or("TOTP_ISSUER", "Aim"),

            db_max_connections: env_parse_or("DB_MAX_CONNECTIONS", 20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_documented_defaults() {
        // SAFETY: test runs single-threaded w.r.t. this var via serial defaults below.
        unsafe { env::remove_var("MAX_ACTIVE_SESSIONS") };
        let config = AppConfig::from_env();
        assert_eq!(config.max_active_sessions, 5);
        assert_eq!(config.login_max_failures, 10);
    }
}
