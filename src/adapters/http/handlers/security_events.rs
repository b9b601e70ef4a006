//! Security alert and notification-subscription handlers (component N).
//! Alert creation/lifecycle/stats are `/internal`; subscription management is
//! self-service `/public`, gated by the caller's own bearer token.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use validator::Validate;

use crate::adapters::http::dto::security_events::{
    AlertResponse, AlertStatsResponse, AlertTransitionRequest, CreateAlertRequest, DashboardSummaryResponse, ListAlertsQuery, SubscribeRequest,
    SubscriptionResponse,
};
use crate::adapters::http::error::{validation_error, HttpError};
use crate::adapters::http::handlers::authenticated_claims;
use crate::adapters::http::middleware::BearerToken;
use crate::adapters::http::state::AppState;
use crate::core::error::CoreError;
use crate::core::security_events::{AlertFilter, AlertSeverity, AlertStatus, SecurityEventsService};

fn security_events_service(state: &AppState) -> SecurityEventsService<'_> {
    SecurityEventsService { alerts: &*state.alerts, subscriptions: &*state.subscriptions, cache: &*state.cache, clock: &*state.clock, audit: state.audit.clone() }
}

fn parse_severity(raw: &str) -> Result<AlertSeverity, HttpError> {
    match raw.to_ascii_lowercase().as_str() {
        "low" => Ok(AlertSeverity::Low),
        "medium" => Ok(AlertSeverity::Medium),
        "high" => Ok(AlertSeverity::High),
        "critical" => Ok(AlertSeverity::Critical),
        _ => Err(CoreError::bad_request("severity must be one of low, medium, high, critical").into()),
    }
}

fn parse_status(raw: &str) -> Result<AlertStatus, HttpError> {
    match raw.to_ascii_lowercase().as_str() {
        "active" => Ok(AlertStatus::Active),
        "acknowledged" => Ok(AlertStatus::Acknowledged),
        "resolved" => Ok(AlertStatus::Resolved),
        "dismissed" => Ok(AlertStatus::Dismissed),
        _ => Err(CoreError::bad_request("status must be one of active, acknowledged, resolved, dismissed").into()),
    }
}

pub async fn create_alert(
    State(state): State<AppState>,
    Json(request): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<AlertResponse>), HttpError> {
    request.validate().map_err(validation_error)?;
    let severity = parse_severity(&request.severity)?;
    let alert = security_events_service(&state)
        .create_alert(request.user_id.as_deref(), &request.alert_type, severity, request.ip_address, &request.description, request.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(alert.into())))
}

pub async fn acknowledge(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    Json(request): Json<AlertTransitionRequest>,
) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    security_events_service(&state).acknowledge(&alert_id, &request.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resolve(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    Json(request): Json<AlertTransitionRequest>,
) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    security_events_service(&state).resolve(&alert_id, &request.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dismiss(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    Json(request): Json<AlertTransitionRequest>,
) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    security_events_service(&state).dismiss(&alert_id, &request.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_alerts(State(state): State<AppState>, Query(query): Query<ListAlertsQuery>) -> Result<Json<Vec<AlertResponse>>, HttpError> {
    let filter = build_filter(&query)?;
    let alerts = security_events_service(&state).list_alerts(filter).await?;
    Ok(Json(alerts.into_iter().map(Into::into).collect()))
}

pub async fn get_alert_stats(State(state): State<AppState>, Query(query): Query<ListAlertsQuery>) -> Result<Json<AlertStatsResponse>, HttpError> {
    let group_by_type = query.group_by_type;
    let group_by_severity = query.group_by_severity;
    let filter = build_filter(&query)?;
    let stats = security_events_service(&state).get_alert_stats(filter, group_by_type, group_by_severity).await?;
    Ok(Json(stats.into()))
}

pub async fn get_dashboard_summary(State(state): State<AppState>) -> Result<Json<DashboardSummaryResponse>, HttpError> {
    let summary = security_events_service(&state).get_dashboard_summary().await?;
    Ok(Json(summary.into()))
}

fn build_filter(query: &ListAlertsQuery) -> Result<AlertFilter, HttpError> {
    Ok(AlertFilter {
        user_id: query.user_id.clone(),
        alert_types: query.alert_types.clone(),
        severities: query.severities.iter().map(|s| parse_severity(s)).collect::<Result<Vec<_>, _>>()?,
        statuses: query.statuses.iter().map(|s| parse_status(s)).collect::<Result<Vec<_>, _>>()?,
        from: query.from,
        to: query.to,
        ip_address: query.ip_address.clone(),
        search_term: query.search_term.clone(),
    })
}

pub async fn subscribe(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), HttpError> {
    request.validate().map_err(validation_error)?;
    let claims = authenticated_claims(&state, &token)?;
    let subscription = security_events_service(&state).subscribe(&claims.sub, request.alert_types, &request.channel, &request.endpoint).await?;
    Ok((StatusCode::CREATED, Json(subscription.into())))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Path(subscription_id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    security_events_service(&state).unsubscribe(&subscription_id, &claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<Json<Vec<SubscriptionResponse>>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let subscriptions = security_events_service(&state).list_subscriptions(&claims.sub).await?;
    Ok(Json(subscriptions.into_iter().map(Into::into).collect()))
}
