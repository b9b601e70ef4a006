//! Database connection pool and lifecycle.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::CoreError;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_connections: 20, idle_timeout: Duration::from_secs(600), max_lifetime: Duration::from_secs(1800) }
    }
}

pub async fn connect(database_url: &str, config: PoolConfig) -> Result<PgPool, CoreError> {
    let options = PgConnectOptions::from_str(database_url).map_err(|e| CoreError::internal(format!("invalid database url: {e}")))?;
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .connect_with(options)
        .await
        .map_err(|e| CoreError::internal(format!("failed to create connection pool: {e}")))
}
