//! Durable notification queue port.
//!
//! Spec.md scopes email/notification delivery out ("the core enqueues
//! notification records into a durable queue, nothing more", §1). This port is
//! that enqueue call; `adapters::queue` supplies a Postgres-outbox
//! implementation so enqueue participates in the same transaction as the
//! state change that triggered it.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub message_type: &'static str,
    pub recipient: String,
    pub payload: Value,
}

impl NotificationMessage {
    pub fn new(message_type: &'static str, recipient: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type,
            recipient: recipient.into(),
            payload,
        }
    }
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, message: NotificationMessage) -> Result<(), crate::core::error::CoreError>;
}


#[cfg(test)]
mod tests {
    use super::fake::InMemoryQueue;
    use super::*;

    #[tokio::test]
    async fn enqueue_records_message() {
        let queue = InMemoryQueue::default();
        queue
            .enqueue(NotificationMessage::new(
                "NEW_DEVICE_ALERT",
                "user@example.com",
                serde_json::json!({"device": "Chrome"}),
            ))
            .await
            .unwrap();
        assert!(queue.contains_type("NEW_DEVICE_ALERT"));
        assert_eq!(queue.len(), 1);
    }
}
