//! Security Events Service (component N) — alert lifecycle, dashboard
//! summary, and notification subscriptions.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::core::audit::{AuditEvent, ResilientAuditSink};
use crate::core::cache::{keys, CacheLookup, FastCache};
use crate::core::clock::Clock;
use crate::core::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    fn is_terminal(self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Dismissed)
    }
}

#[derive(Debug, Clone)]
pub struct SecurityAlert {
    pub id: String,
    pub user_id: Option<String>,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub ip_address: Option<String>,
    pub description: String,
    pub metadata: serde_json::Value,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub dismissed_by: Option<String>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationSubscription {
    pub id: String,
    pub user_id: String,
    pub alert_types: Vec<String>,
    pub channel: String,
    pub endpoint: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct AlertFilter {
    pub user_id: Option<String>,
    pub alert_types: Vec<String>,
    pub severities: Vec<AlertSeverity>,
    pub statuses: Vec<AlertStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub search_term: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertStats {
    pub total: usize,
    pub active: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub dismissed: usize,
    pub by_type: Option<std::collections::HashMap<String, usize>>,
    pub by_severity: Option<std::collections::HashMap<String, usize>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub active_count: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub alerts_last_24h: usize,
    pub alerts_last_7d: usize,
    pub top_alert_types: Vec<(String, usize)>,
    pub recent_alert_ids: Vec<String>,
}

#[async_trait]
pub trait SecurityAlertRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<SecurityAlert>, CoreError>;
    async fn insert(&self, alert: SecurityAlert) -> Result<(), CoreError>;
    async fn update(&self, alert: SecurityAlert) -> Result<(), CoreError>;
    async fn list(&self, filter: &AlertFilter) -> Result<Vec<SecurityAlert>, CoreError>;
}

#[async_trait]
pub trait NotificationSubscriptionRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<NotificationSubscription>, CoreError>;
    async fn find_duplicate(&self, user_id: &str, channel: &str, endpoint: &str) -> Result<Option<NotificationSubscription>, CoreError>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<NotificationSubscription>, CoreError>;
    async fn insert(&self, subscription: NotificationSubscription) -> Result<(), CoreError>;
    async fn update(&self, subscription: NotificationSubscription) -> Result<(), CoreError>;
}

pub struct SecurityEventsService<'a> {
    pub alerts: &'a dyn SecurityAlertRepository,
    pub subscriptions: &'a dyn NotificationSubscriptionRepository,
    pub cache: &'a dyn FastCache,
    pub clock: &'a dyn Clock,
    pub audit: Arc<ResilientAuditSink>,
}

/// Shared by [`SecurityEventsService::create_alert`] and the lockout/reuse/
/// new-device sites in `AuthService`, `SessionService`, and `MfaService`,
/// none of which otherwise need the dashboard-summary cache or subscription
/// plumbing the full service carries.
#[allow(clippy::too_many_arguments)]
pub async fn create_alert(
    alerts: &dyn SecurityAlertRepository,
    cache: &dyn FastCache,
    clock: &dyn Clock,
    audit: &ResilientAuditSink,
    user_id: Option<&str>,
    alert_type: &str,
    severity: AlertSeverity,
    ip_address: Option<String>,
    description: &str,
    metadata: serde_json::Value,
) -> Result<SecurityAlert, CoreError> {
    let now = clock.now();
    let alert = SecurityAlert {
        id: format!("alert-{}", now.timestamp_nanos_opt().unwrap_or_default()),
        user_id: user_id.map(str::to_string),
        alert_type: alert_type.to_string(),
        severity,
        status: AlertStatus::Active,
        ip_address,
        description: description.to_string(),
        metadata,
        acknowledged_by: None,
        acknowledged_at: None,
        resolved_by: None,
        resolved_at: None,
        dismissed_by: None,
        dismissed_at: None,
        created_at: now,
    };
    alerts.insert(alert.clone()).await?;
    cache.delete(keys::dashboard_summary()).await.ok();
    audit
        .log(
            AuditEvent::new("SECURITY_ALERT_CREATED", now)
                .with_target("alert", &alert.id)
                .with_metadata(serde_json::json!({"alertType": alert_type, "severity": format!("{:?}", alert.severity)})),
        )
        .await;
    Ok(alert)
}

impl<'a> SecurityEventsService<'a> {
    /// Internal entry point used by other services on lockout, token reuse,
    /// or new-device login (spec.md §4.N).
    pub async fn create_alert(&self, user_id: Option<&str>, alert_type: &str, severity: AlertSeverity, ip_address: Option<String>, description: &str, metadata: serde_json::Value) -> Result<SecurityAlert, CoreError> {
        create_alert(self.alerts, self.cache, self.clock, &self.audit, user_id, alert_type, severity, ip_address, description, metadata).await
    }

    async fn transition(&self, alert_id: &str, new_status: AlertStatus, actor_id: &str, event_type: &'static str) -> Result<(), CoreError> {
        let mut alert = self.alerts.find_by_id(alert_id).await?.ok_or_else(|| CoreError::not_found("alert not found"))?;
        if alert.status.is_terminal() {
            return Err(CoreError::bad_request("alert is already in a terminal state"));
        }
        let now = self.clock.now();
        match new_status {
            AlertStatus::Acknowledged => {
                alert.acknowledged_by = Some(actor_id.to_string());
                alert.acknowledged_at = Some(now);
            }
            AlertStatus::Resolved => {
                alert.resolved_by = Some(actor_id.to_string());
                alert.resolved_at = Some(now);
            }
            AlertStatus::Dismissed => {
                alert.dismissed_by = Some(actor_id.to_string());
                alert.dismissed_at = Some(now);
            }
            AlertStatus::Active => return Err(CoreError::bad_request("cannot transition back to active")),
        }
        alert.status = new_status;
        self.alerts.update(alert).await?;
        self.cache.delete(keys::dashboard_summary()).await.ok();
        self.audit.log(AuditEvent::new(event_type, now).with_actor(actor_id).with_target("alert", alert_id)).await;
        Ok(())
    }

    pub async fn acknowledge(&self, alert_id: &str, actor_id: &str) -> Result<(), CoreError> {
        self.transition(alert_id, AlertStatus::Acknowledged, actor_id, "SECURITY_ALERT_ACKNOWLEDGED").await
    }

    pub async fn resolve(&self, alert_id: &str, actor_id: &str) -> Result<(), CoreError> {
        self.transition(alert_id, AlertStatus::Resolved, actor_id, "SECURITY_ALERT_RESOLVED").await
    }

    pub async fn dismiss(&self, alert_id: &str, actor_id: &str) -> Result<(), CoreError> {
        self.transition(alert_id, AlertStatus::Dismissed, actor_id, "SECURITY_ALERT_DISMISSED").await
    }

    pub async fn list_alerts(&self, filter: AlertFilter) -> Result<Vec<SecurityAlert>, CoreError> {
        self.alerts.list(&filter).await
    }

    pub async fn get_alert_stats(&self, filter: AlertFilter, group_by_type: bool, group_by_severity: bool) -> Result<AlertStats, CoreError> {
        let alerts = self.alerts.list(&filter).await?;
        let mut stats = AlertStats {
            total: alerts.len(),
            active: 0,
            acknowledged: 0,
            resolved: 0,
            dismissed: 0,
            by_type: group_by_type.then(std::collections::HashMap::new),
            by_severity: group_by_severity.then(std::collections::HashMap::new),
        };
        for alert in &alerts {
            match alert.status {
                AlertStatus::Active => stats.active += 1,
                AlertStatus::Acknowledged => stats.acknowledged += 1,
                AlertStatus::Resolved => stats.resolved += 1,
                AlertStatus::Dismissed => stats.dismissed += 1,
            }
            if let Some(by_type) = stats.by_type.as_mut() {
                *by_type.entry(alert.alert_type.clone()).or_insert(0) += 1;
            }
            if let Some(by_severity) = stats.by_severity.as_mut() {
                *by_severity.entry(format!("{:?}", alert.severity)).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }

    /// Cached 60s (spec.md §4.N). Top 3 alert types by volume, 5 most recent
    /// alert ids.
    pub async fn get_dashboard_summary(&self) -> Result<DashboardSummary, CoreError> {
        if let CacheLookup::Hit(cached) = self.cache.get(keys::dashboard_summary()).await.unwrap_or(CacheLookup::Miss) {
            if let Ok(summary) = serde_json::from_str::<CachedSummary>(&cached) {
                return Ok(summary.into());
            }
        }

        let now = self.clock.now();
        let all = self.alerts.list(&AlertFilter::default()).await?;
        let day_ago = now - ChronoDuration::hours(24);
        let week_ago = now - ChronoDuration::days(7);

        let active_count = all.iter().filter(|a| a.status == AlertStatus::Active).count();
        let critical_count = all.iter().filter(|a| a.status == AlertStatus::Active && a.severity == AlertSeverity::Critical).count();
        let high_count = all.iter().filter(|a| a.status == AlertStatus::Active && a.severity == AlertSeverity::High).count();
        let alerts_last_24h = all.iter().filter(|a| a.created_at >= day_ago).count();
        let alerts_last_7d = all.iter().filter(|a| a.created_at >= week_ago).count();

        let mut by_type: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for alert in &all {
            *by_type.entry(alert.alert_type.clone()).or_insert(0) += 1;
        }
        let mut top_alert_types: Vec<(String, usize)> = by_type.into_iter().collect();
        top_alert_types.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_alert_types.truncate(3);

        let mut sorted_recent = all.clone();
        sorted_recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let recent_alert_ids: Vec<String> = sorted_recent.into_iter().take(5).map(|a| a.id).collect();

        let summary = DashboardSummary { active_count, critical_count, high_count, alerts_last_24h, alerts_last_7d, top_alert_types, recent_alert_ids };
        let cached = CachedSummary::from(&summary);
        if let Ok(serialised) = serde_json::to_string(&cached) {
            self.cache.set(keys::dashboard_summary(), &serialised, Duration::from_secs(60)).await.ok();
        }
        Ok(summary)
    }

    pub async fn subscribe(&self, user_id: &str, alert_types: Vec<String>, channel: &str, endpoint: &str) -> Result<NotificationSubscription, CoreError> {
        if self.subscriptions.find_duplicate(user_id, channel, endpoint).await?.is_some() {
            return Err(CoreError::conflict("a subscription for this channel and endpoint already exists"));
        }
        let now = self.clock.now();
        let subscription = NotificationSubscription {
            id: format!("sub-{}", now.timestamp_nanos_opt().unwrap_or_default()),
            user_id: user_id.to_string(),
            alert_types,
            channel: channel.to_string(),
            endpoint: endpoint.to_string(),
            is_active: true,
            created_at: now,
        };
        self.subscriptions.insert(subscription.clone()).await?;
        Ok(subscription)
    }

    pub async fn unsubscribe(&self, subscription_id: &str, requesting_user_id: &str) -> Result<(), CoreError> {
        let mut subscription = self
            .subscriptions
            .find_by_id(subscription_id)
            .await?
            .ok_or_else(|| CoreError::not_found("subscription not found"))?;
        if subscription.user_id != requesting_user_id {
            return Err(CoreError::forbidden("subscription belongs to a different user"));
        }
        subscription.is_active = false;
        self.subscriptions.update(subscription).await
    }

    pub async fn list_subscriptions(&self, user_id: &str) -> Result<Vec<NotificationSubscription>, CoreError> {
        self.subscriptions.list_for_user(user_id).await
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CachedSummary {
    active_count: usize,
    critical_count: usize,
    high_count: usize,
    alerts_last_24h: usize,
    alerts_last_7d: usize,
    top_alert_types: Vec<(String, usize)>,
    recent_alert_ids: Vec<String>,
}

impl From<&DashboardSummary> for CachedSummary {
    fn from(s: &DashboardSummary) -> Self {
        Self {
            active_count: s.active_count,
            critical_count: s.critical_count,
            high_count: s.high_count,
            alerts_last_24h: s.alerts_last_24h,
            alerts_last_7d: s.alerts_last_7d,
            top_alert_types: s.top_alert_types.clone(),
            recent_alert_ids: s.recent_alert_ids.clone(),
        }
    }
}

impl From<CachedSummary> for DashboardSummary {
    fn from(s: CachedSummary) -> Self {
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

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryAlertRepository {
        pub alerts: Mutex<Vec<SecurityAlert>>,
    }

    #[async_trait]
    impl SecurityAlertRepository for InMemoryAlertRepository {
        async fn find_by_id(&self, id: &str) -> Result<Option<SecurityAlert>, CoreError> {
            Ok(self.alerts.lock().unwrap().iter().find(|a| a.id == id).cloned())
        }

        async fn insert(&self, alert: SecurityAlert) -> Result<(), CoreError> {
            self.alerts.lock().unwrap().push(alert);
            Ok(())
        }

        async fn update(&self, alert: SecurityAlert) -> Result<(), CoreError> {
            let mut alerts = self.alerts.lock().unwrap();
            if let Some(existing) = alerts.iter_mut().find(|a| a.id == alert.id) {
                *existing = alert;
            }
            Ok(())
        }

        async fn list(&self, filter: &AlertFilter) -> Result<Vec<SecurityAlert>, CoreError> {
            Ok(self
                .alerts
                .lock()
                .unwrap()
                .iter()
                .filter(|a| filter.user_id.as_deref().is_none_or(|u| a.user_id.as_deref() == Some(u)))
                .filter(|a| filter.alert_types.is_empty() || filter.alert_types.contains(&a.alert_type))
                .filter(|a| filter.severities.is_empty() || filter.severities.contains(&a.severity))
                .filter(|a| filter.statuses.is_empty() || filter.statuses.contains(&a.status))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct InMemorySubscriptionRepository {
        pub subscriptions: Mutex<Vec<NotificationSubscription>>,
    }

    #[async_trait]
    impl NotificationSubscriptionRepository for InMemorySubscriptionRepository {
        async fn find_by_id(&self, id: &str) -> Result<Option<NotificationSubscription>, CoreError> {
            Ok(self.subscriptions.lock().unwrap().iter().find(|s| s.id == id).cloned())
        }

        async fn find_duplicate(&self, user_id: &str, channel: &str, endpoint: &str) -> Result<Option<NotificationSubscription>, CoreError> {
            Ok(self
                .subscriptions
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.user_id == user_id && s.channel == channel && s.endpoint == endpoint && s.is_active)
                .cloned())
        }

        async fn list_for_user(&self, user_id: &str) -> Result<Vec<NotificationSubscription>, CoreError> {
            Ok(self.subscriptions.lock().unwrap().iter().filter(|s| s.user_id == user_id).cloned().collect())
        }

        async fn insert(&self, subscription: NotificationSubscription) -> Result<(), CoreError> {
            self.subscriptions.lock().unwrap().push(subscription);
            Ok(())
        }

        async fn update(&self, subscription: NotificationSubscription) -> Result<(), CoreError> {
            let mut subscriptions = self.subscriptions.lock().unwrap();
            if let Some(existing) = subscriptions.iter_mut().find(|s| s.id == subscription.id) {
                *existing = subscription;
            }
            Ok(())
        }
    }
}
