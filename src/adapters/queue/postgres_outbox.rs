//! Postgres-outbox `NotificationQueue`. `enqueue` writes into the
//! `notification_outbox` table; a separate dispatcher process (not part of
//! this crate, per spec.md §1's scoping of delivery) polls and delivers rows,
//! marking them sent. Writing the row in the same pool as the triggering
//! state change keeps enqueue and the domain mutation atomic when both run
//! inside one `sqlx` transaction.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::core::error::CoreError;
use crate::core::queue::{NotificationMessage, NotificationQueue};

pub struct PostgresOutboxQueue {
    pool: PgPool,
}

impl PostgresOutboxQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationQueue for PostgresOutboxQueue {
    async fn enqueue(&self, message: NotificationMessage) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO notification_outbox (message_type, recipient, payload, created_at, sent_at)
             VALUES ($1, $2, $3, now(), NULL)",
        )
        .bind(message.message_type)
        .bind(&message.recipient)
        .bind(&message.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::internal(format!("failed to enqueue notification: {e}")))?;
        Ok(())
    }
}
