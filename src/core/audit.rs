//! Append-only audit log sink (component A).
//!
//! Single operation: append an immutable event. Failures are swallowed at the
//! call site (logged, never propagated) — audit failure must not break
//! business operations, per spec.md §4.A.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// One append-only `AuthAuditLog` record.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: &'static str,
    pub user_id: Option<String>,
    pub actor_id: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub correlation_id: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(event_type: &'static str, at: DateTime<Utc>) -> Self {
        Self {
            event_type,
            user_id: None,
            actor_id: None,
            target_type: None,
            target_id: None,
            ip_address: None,
            user_agent: None,
            correlation_id: None,
            metadata: Value::Null,
            created_at: at,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Port for the audit sink. Implementors persist to `AuthAuditLog`; the core
/// never updates or deletes a row once written.
#[async_trait]
pub trait AuditLogSink: Send + Sync {
    async fn log(&self, event: AuditEvent);
}

/// Wraps any `AuditLogSink` so call sites never need to think about failure:
/// errors are logged via `tracing` and discarded, matching spec.md §4.A.
///
/// Holds its inner sink behind `Arc<dyn AuditLogSink>` rather than a generic
/// parameter so services can share one sink (and one `ResilientAuditSink`)
/// across threads without being generic over the concrete adapter type.
pub struct ResilientAuditSink {
    inner: std::sync::Arc<dyn AuditLogSink>,
}

impl ResilientAuditSink {
    pub fn new(inner: std::sync::Arc<dyn AuditLogSink>) -> Self {
        Self { inner }
    }

    pub async fn log(&self, event: AuditEvent) {
        let event_type = event.event_type;
        self.inner.log(event).await;
        tracing::debug!(event_type, "audit event recorded");
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryAuditSink {
        pub events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditLogSink for InMemoryAuditSink {
        async fn log(&self, event: AuditEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl InMemoryAuditSink {
        pub fn event_types(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|e| e.event_type).collect()
        }

        pub fn contains(&self, event_type: &str) -> bool {
            self.events.lock().unwrap().iter().any(|e| e.event_type == event_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::InMemoryAuditSink;
    use super::*;

    #[tokio::test]
    async fn resilient_sink_forwards_and_never_panics() {
        let inner = std::sync::Arc::new(InMemoryAuditSink::default());
        let sink = ResilientAuditSink::new(inner.clone());
        sink.log(AuditEvent::new("LOGIN_SUCCESS", Utc::now()).with_user("u1"))
            .await;
        assert!(inner.contains("LOGIN_SUCCESS"));
    }

    #[test]
    fn builder_sets_expected_fields() {
        let now = Utc::now();
        let event = AuditEvent::new("ROLE_ASSIGNED", now)
            .with_user("u1")
            .with_actor("admin1")
            .with_target("role", "r1")
            .with_ip("1.2.3.4")
            .with_correlation("corr-1");
        assert_eq!(event.user_id.as_deref(), Some("u1"));
        assert_eq!(event.actor_id.as_deref(), Some("admin1"));
        assert_eq!(event.target_type.as_deref(), Some("role"));
        assert_eq!(event.target_id.as_deref(), Some("r1"));
        assert_eq!(event.ip_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(event.correlation_id.as_deref(), Some("corr-1"));
    }
}
