//! sqlx-backed `AuditLogSink` writing into the append-only `auth_audit_log` table.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::core::audit::{AuditEvent, AuditLogSink};

pub struct SqlAuditLogSink {
    pool: PgPool,
}

impl SqlAuditLogSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogSink for SqlAuditLogSink {
    async fn log(&self, event: AuditEvent) {
        let result = sqlx::query(
            "INSERT INTO auth_audit_log (event_type, user_id, actor_id, target_type, target_id, \
             ip_address, user_agent, correlation_id, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(event.event_type)
        .bind(&event.user_id)
        .bind(&event.actor_id)
        .bind(&event.target_type)
        .bind(&event.target_id)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.correlation_id)
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            tracing::error!(error = %e, event_type = event.event_type, "failed to persist audit event");
        }
    }
}
