//! Router definition and assembly.

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::adapters::http::state::AppState;
use crate::adapters::http::{handlers, middleware};

/// Build the complete HTTP router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/auth", auth_routes())
        .nest("/public", public_routes())
        .nest("/internal", internal_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness/readiness probes — no authentication.
fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check)).route("/ready", get(readiness_check))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn readiness_check() -> &'static str {
    "READY"
}

/// Unauthenticated — these are the means of obtaining a bearer token, or of
/// recovering account access without one.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/mfa/complete", post(handlers::auth::complete_mfa_login))
        .route("/password-reset/request", post(handlers::password_reset::request_password_reset))
        .route("/password-reset/validate", post(handlers::password_reset::validate_reset_token))
        .route("/password-reset/reset", post(handlers::password_reset::reset_password))
}

/// Bearer-gated self-service — sessions, MFA, RBAC self-check, alert
/// subscriptions, all scoped to the caller's own identity.
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(handlers::sessions::list_sessions))
        .route("/sessions/{id}", delete(handlers::sessions::revoke_session))
        .route("/sessions/heartbeat", post(handlers::sessions::heartbeat))
        .route("/logout", post(handlers::sessions::logout))
        .route("/logout-all", post(handlers::sessions::logout_all_devices))
        .route("/mfa/status", get(handlers::mfa::status))
        .route("/mfa/setup", post(handlers::mfa::initiate_setup))
        .route("/mfa/setup/verify", post(handlers::mfa::verify_setup))
        .route("/mfa/disable", post(handlers::mfa::disable))
        .route("/mfa/verify", post(handlers::mfa::verify_direct))
        .route("/mfa/backup-codes/regenerate", post(handlers::mfa::regenerate_backup_codes))
        .route("/mfa/backup-codes/status", get(handlers::mfa::backup_codes_status))
        .route("/mfa/backup-codes/used", get(handlers::mfa::list_used_backup_codes))
        .route("/rbac/effective-permissions", get(handlers::rbac::my_effective_permissions))
        .route("/rbac/check-permission", post(handlers::rbac::check_my_permission))
        .route(
            "/security-events/subscriptions",
            get(handlers::security_events::list_subscriptions).post(handlers::security_events::subscribe),
        )
        .route("/security-events/subscriptions/{id}", delete(handlers::security_events::unsubscribe))
        .layer(axum::middleware::from_fn(middleware::bearer_auth))
}

/// Trusted-network / admin-tool surface. Actor identity travels in the
/// request body rather than a bearer token — there is no end-user session to
/// authenticate against most of these operations.
fn internal_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/force-logout", post(handlers::sessions::force_logout))
        .route("/sessions/cleanup", post(handlers::sessions::cleanup_expired_tokens))
        .route("/rbac/roles", post(handlers::rbac::create_role))
        .route("/rbac/roles/{id}", patch(handlers::rbac::update_role).delete(handlers::rbac::delete_role))
        .route("/rbac/roles/{id}/permissions", put(handlers::rbac::update_role_permissions))
        .route("/rbac/assign", post(handlers::rbac::assign_role))
        .route("/rbac/revoke", post(handlers::rbac::revoke_role))
        .route(
            "/permissions",
            post(handlers::permissions::create_permission).get(handlers::permissions::list_permissions),
        )
        .route("/permissions/{id}/deactivate", post(handlers::permissions::deactivate_permission))
        .route("/permissions/assign", post(handlers::permissions::assign_to_user))
        .route("/permissions/revoke", post(handlers::permissions::revoke_from_user))
        .route("/permissions/bulk-assign", post(handlers::permissions::bulk_assign))
        .route("/permissions/check/{user_id}", post(handlers::permissions::check_permission_with_context))
        .route(
            "/security-events/alerts",
            post(handlers::security_events::create_alert).get(handlers::security_events::list_alerts),
        )
        .route("/security-events/alerts/{id}/acknowledge", post(handlers::security_events::acknowledge))
        .route("/security-events/alerts/{id}/resolve", post(handlers::security_events::resolve))
        .route("/security-events/alerts/{id}/dismiss", post(handlers::security_events::dismiss))
        .route("/security-events/stats", get(handlers::security_events::get_alert_stats))
        .route("/security-events/dashboard", get(handlers::security_events::get_dashboard_summary))
}
