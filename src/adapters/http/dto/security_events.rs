//! Security alert and notification-subscription DTOs (component N).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAlertRequest {
    pub user_id: Option<String>,
    #[validate(length(min = 1))]
    pub alert_type: String,
    /// One of `low`/`medium`/`high`/`critical` — parsed by the handler since
    /// the core `AlertSeverity` enum intentionally has no `Deserialize` impl
    /// (it never round-trips through anything but this one request path).
    #[validate(length(min = 1))]
    pub severity: String,
    pub ip_address: Option<String>,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub alert_type: String,
    pub severity: &'static str,
    pub status: &'static str,
    pub ip_address: Option<String>,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<crate::core::security_events::SecurityAlert> for AlertResponse {
    fn from(a: crate::core::security_events::SecurityAlert) -> Self {
        use crate::core::security_events::{AlertSeverity, AlertStatus};
        Self {
            id: a.id,
            user_id: a.user_id,
            alert_type: a.alert_type,
            severity: match a.severity {
                AlertSeverity::Low => "low",
                AlertSeverity::Medium => "medium",
                AlertSeverity::High => "high",
                AlertSeverity::Critical => "critical",
            },
            status: match a.status {
                AlertStatus::Active => "active",
                AlertStatus::Acknowledged => "acknowledged",
                AlertStatus::Resolved => "resolved",
                AlertStatus::Dismissed => "dismissed",
            },
            ip_address: a.ip_address,
            description: a.description,
            metadata: a.metadata,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListAlertsQuery {
    pub user_id: Option<String>,
    #[serde(default)]
    pub alert_types: Vec<String>,
    #[serde(default)]
    pub severities: Vec<String>,
    #[serde(default)]
    pub statuses: Vec<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub search_term: Option<String>,
    #[serde(default)]
    pub group_by_type: bool,
    #[serde(default)]
    pub group_by_severity: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertStatsResponse {
    pub total: usize,
    pub active: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub dismissed: usize,
    pub by_type: Option<std::collections::HashMap<String, usize>>,
    pub by_severity: Option<std::collections::HashMap<String, usize>>,
}

impl From<crate::core::security_events::AlertStats> for AlertStatsResponse {
    fn from(s: crate::core::security_events::AlertStats) -> Self {
        Self {
            total: s.total,
            active: s.active,
            acknowledged: s.acknowledged,
            resolved: s.resolved,
            dismissed: s.dismissed,
            by_type: s.by_type,
            by_severity: s.by_severity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummaryResponse {
    pub active_count: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub alerts_last_24h: usize,
    pub alerts_last_7d: usize,
    pub top_alert_types: Vec<(String, usize)>,
    pub recent_alert_ids: Vec<String>,
}

impl From<crate::core::security_events::DashboardSummary> for DashboardSummaryResponse {
    fn from(s: crate::core::security_events::DashboardSummary) -> Self {
        Self {
            active_count: s.active_count,
            critical_count: s.critical_count,
            high_count: s.high_count,
            alerts_last_24h: s.alerts_last_24h,
            alerts_last_7d: s.alerts_last_7d,
            top_alert_types: s.top_alert_types,
            recent_alert_ids: s.recent_alert_ids,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(length(min = 1))]
    pub alert_types: Vec<String>,
    #[validate(length(min = 1))]
    pub channel: String,
    #[validate(length(min = 1))]
    pub endpoint: String,
}

/// `/internal` — acknowledge/resolve/dismiss all require the acting admin's
/// identity, supplied in the body like the rest of the internal surface.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AlertTransitionRequest {
    #[validate(length(min = 1, message = "actorId is required"))]
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub user_id: String,
    pub alert_types: Vec<String>,
    pub channel: String,
    pub endpoint: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<crate::core::security_events::NotificationSubscription> for SubscriptionResponse {
    fn from(s: crate::core::security_events::NotificationSubscription) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            alert_types: s.alert_types,
            channel: s.channel,
            endpoint: s.endpoint,
            is_active: s.is_active,
            created_at: s.created_at,
        }
    }
}
