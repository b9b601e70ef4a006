//! sqlx-backed `SecurityAlertRepository` and `NotificationSubscriptionRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, QueryBuilder};

use crate::adapters::persistence::error::map_sqlx_error;
use crate::core::error::CoreError;
use crate::core::security_events::{
    AlertFilter, AlertSeverity, AlertStatus, NotificationSubscription, NotificationSubscriptionRepository, SecurityAlert, SecurityAlertRepository,
};

fn severity_str(s: AlertSeverity) -> &'static str {
    match s {
        AlertSeverity::Low => "low",
        AlertSeverity::Medium => "medium",
        AlertSeverity::High => "high",
        AlertSeverity::Critical => "critical",
    }
}

fn parse_severity(s: &str) -> AlertSeverity {
    match s {
        "medium" => AlertSeverity::Medium,
        "high" => AlertSeverity::High,
        "critical" => AlertSeverity::Critical,
        _ => AlertSeverity::Low,
    }
}

fn status_str(s: AlertStatus) -> &'static str {
    match s {
        AlertStatus::Active => "active",
        AlertStatus::Acknowledged => "acknowledged",
        AlertStatus::Resolved => "resolved",
        AlertStatus::Dismissed => "dismissed",
    }
}

fn parse_status(s: &str) -> AlertStatus {
    match s {
        "acknowledged" => AlertStatus::Acknowledged,
        "resolved" => AlertStatus::Resolved,
        "dismissed" => AlertStatus::Dismissed,
        _ => AlertStatus::Active,
    }
}

#[derive(FromRow)]
struct AlertRow {
    id: String,
    user_id: Option<String>,
    alert_type: String,
    severity: String,
    status: String,
    ip_address: Option<String>,
    description: String,
    metadata: serde_json::Value,
    acknowledged_by: Option<String>,
    acknowledged_at: Option<DateTime<Utc>>,
    resolved_by: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    dismissed_by: Option<String>,
    dismissed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<AlertRow> for SecurityAlert {
    fn from(row: AlertRow) -> Self {
        SecurityAlert {
            id: row.id,
            user_id: row.user_id,
            alert_type: row.alert_type,
            severity: parse_severity(&row.severity),
            status: parse_status(&row.status),
            ip_address: row.ip_address,
            description: row.description,
            metadata: row.metadata,
            acknowledged_by: row.acknowledged_by,
            acknowledged_at: row.acknowledged_at,
            resolved_by: row.resolved_by,
            resolved_at: row.resolved_at,
            dismissed_by: row.dismissed_by,
            dismissed_at: row.dismissed_at,
            created_at: row.created_at,
        }
    }
}

const ALERT_COLUMNS: &str = "id, user_id, alert_type, severity, status, ip_address, description, metadata, \
     acknowledged_by, acknowledged_at, resolved_by, resolved_at, dismissed_by, dismissed_at, created_at";

pub struct SqlSecurityAlertRepository {
    pool: PgPool,
}

impl SqlSecurityAlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityAlertRepository for SqlSecurityAlertRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<SecurityAlert>, CoreError> {
        sqlx::query_as::<_, AlertRow>(&format!("SELECT {ALERT_COLUMNS} FROM security_alerts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(SecurityAlert::from))
            .map_err(|e| map_sqlx_error("security alert", e))
    }

    async fn insert(&self, alert: SecurityAlert) -> Result<(), CoreError> {
        sqlx::query(&format!(
            "INSERT INTO security_alerts ({ALERT_COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)"
        ))
        .bind(&alert.id)
        .bind(&alert.user_id)
        .bind(&alert.alert_type)
        .bind(severity_str(alert.severity))
        .bind(status_str(alert.status))
        .bind(&alert.ip_address)
        .bind(&alert.description)
        .bind(&alert.metadata)
        .bind(&alert.acknowledged_by)
        .bind(alert.acknowledged_at)
        .bind(&alert.resolved_by)
        .bind(alert.resolved_at)
        .bind(&alert.dismissed_by)
        .bind(alert.dismissed_at)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("security alert", e))?;
        Ok(())
    }

    async fn update(&self, alert: SecurityAlert) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE security_alerts SET status = $1, acknowledged_by = $2, acknowledged_at = $3, \
             resolved_by = $4, resolved_at = $5, dismissed_by = $6, dismissed_at = $7 WHERE id = $8",
        )
        .bind(status_str(alert.status))
        .bind(&alert.acknowledged_by)
        .bind(alert.acknowledged_at)
        .bind(&alert.resolved_by)
        .bind(alert.resolved_at)
        .bind(&alert.dismissed_by)
        .bind(alert.dismissed_at)
        .bind(&alert.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("security alert", e))?;
        Ok(())
    }

    async fn list(&self, filter: &AlertFilter) -> Result<Vec<SecurityAlert>, CoreError> {
        let mut builder = QueryBuilder::new(format!("SELECT {ALERT_COLUMNS} FROM security_alerts WHERE 1=1"));
        if let Some(user_id) = &filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if !filter.alert_types.is_empty() {
            builder.push(" AND alert_type = ANY(").push_bind(filter.alert_types.clone()).push(")");
        }
        if !filter.severities.is_empty() {
            let severities: Vec<&'static str> = filter.severities.iter().map(|s| severity_str(*s)).collect();
            builder.push(" AND severity = ANY(").push_bind(severities).push(")");
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<&'static str> = filter.statuses.iter().map(|s| status_str(*s)).collect();
            builder.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if let Some(from) = filter.from {
            builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            builder.push(" AND created_at <= ").push_bind(to);
        }
        if let Some(ip) = &filter.ip_address {
            builder.push(" AND ip_address = ").push_bind(ip);
        }
        if let Some(term) = &filter.search_term {
            builder.push(" AND description ILIKE ").push_bind(format!("%{term}%"));
        }
        builder.push(" ORDER BY created_at DESC");
        builder
            .build_query_as::<AlertRow>()
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.into_iter().map(SecurityAlert::from).collect())
            .map_err(|e| map_sqlx_error("security alert", e))
    }
}

#[derive(FromRow)]
struct SubscriptionRow {
    id: String,
    user_id: String,
    alert_types: Vec<String>,
    channel: String,
    endpoint: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<SubscriptionRow> for NotificationSubscription {
    fn from(row: SubscriptionRow) -> Self {
        NotificationSubscription {
            id: row.id,
            user_id: row.user_id,
            alert_types: row.alert_types,
            channel: row.channel,
            endpoint: row.endpoint,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, alert_types, channel, endpoint, is_active, created_at";

pub struct SqlNotificationSubscriptionRepository {
    pool: PgPool,
}

impl SqlNotificationSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSubscriptionRepository for SqlNotificationSubscriptionRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<NotificationSubscription>, CoreError> {
        sqlx::query_as::<_, SubscriptionRow>(&format!("SELECT {SUBSCRIPTION_COLUMNS} FROM notification_subscriptions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(NotificationSubscription::from))
            .map_err(|e| map_sqlx_error("notification subscription", e))
    }

    async fn find_duplicate(&self, user_id: &str, channel: &str, endpoint: &str) -> Result<Option<NotificationSubscription>, CoreError> {
        sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM notification_subscriptions WHERE user_id = $1 AND channel = $2 AND endpoint = $3"
        ))
        .bind(user_id)
        .bind(channel)
        .bind(endpoint)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(NotificationSubscription::from))
        .map_err(|e| map_sqlx_error("notification subscription", e))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<NotificationSubscription>, CoreError> {
        sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM notification_subscriptions WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(NotificationSubscription::from).collect())
        .map_err(|e| map_sqlx_error("notification subscription", e))
    }

    async fn insert(&self, subscription: NotificationSubscription) -> Result<(), CoreError> {
        sqlx::query(&format!(
            "INSERT INTO notification_subscriptions ({SUBSCRIPTION_COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7)"
        ))
        .bind(&subscription.id)
        .bind(&subscription.user_id)
        .bind(&subscription.alert_types)
        .bind(&subscription.channel)
        .bind(&subscription.endpoint)
        .bind(subscription.is_active)
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("notification subscription", e))?;
        Ok(())
    }

    async fn update(&self, subscription: NotificationSubscription) -> Result<(), CoreError> {
        sqlx::query("UPDATE notification_subscriptions SET is_active = $1 WHERE id = $2")
            .bind(subscription.is_active)
            .bind(&subscription.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("notification subscription", e))?;
        Ok(())
    }
}
