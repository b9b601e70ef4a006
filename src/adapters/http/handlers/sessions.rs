//! Session self-service and admin handlers (component F, J).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use validator::Validate;

use crate::adapters::http::dto::sessions::{CleanupResponse, ForceLogoutRequest, LogoutAllResponse, LogoutResponse, SessionSummaryResponse};
use crate::adapters::http::error::{validation_error, HttpError};
use crate::adapters::http::handlers::authenticated_claims;
use crate::adapters::http::middleware::BearerToken;
use crate::adapters::http::state::AppState;
use crate::core::logout::LogoutService;
use crate::core::session::{RevokeReason, SessionService};

fn session_service(state: &AppState) -> SessionService<'_> {
    SessionService {
        sessions: &*state.sessions,
        blacklist: &*state.blacklist,
        users: &*state.users,
        roles: &*state.roles,
        user_roles: &*state.user_roles,
        alerts: &*state.alerts,
        cache: &*state.cache,
        tokens: &*state.tokens,
        clock: &*state.clock,
        audit: state.audit.clone(),
    }
}

fn logout_service(state: &AppState) -> LogoutService<'_> {
    LogoutService {
        sessions: &*state.sessions,
        blacklist: &*state.blacklist,
        cache: &*state.cache,
        clock: &*state.clock,
        audit: state.audit.clone(),
    }
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<Json<Vec<SessionSummaryResponse>>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let active = state.sessions.find_active_by_user(&claims.sub).await?;
    let now = state.clock.now();
    let summaries = session_service(&state).list_summaries(&active, &claims.session_id, now);
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    session_service(&state).revoke_single(&session_id, &claims.sub, RevokeReason::SessionRevoked).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<StatusCode, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let session = state
        .sessions
        .find_by_id(&claims.session_id)
        .await?
        .ok_or_else(|| crate::core::error::CoreError::not_found("session not found"))?;
    session_service(&state).heartbeat(session).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<Json<LogoutResponse>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let access_token_hash = state.tokens.get_token_hash(&token.0);
    let result = logout_service(&state).logout(&claims.session_id, &claims.sub, &access_token_hash).await;
    Ok(Json(LogoutResponse { success: result.success, server_logout_failed: result.server_logout_failed }))
}

pub async fn logout_all_devices(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<Json<LogoutAllResponse>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let revoked = logout_service(&state).logout_all_devices(&claims.sub, &claims.session_id).await?;
    Ok(Json(LogoutAllResponse { sessions_revoked: revoked }))
}

/// `/internal` — called by an admin console or support tool, not gated by the
/// end user's own bearer token; the caller supplies the acting admin's id.
pub async fn force_logout(State(state): State<AppState>, Json(request): Json<ForceLogoutRequest>) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    logout_service(&state).force_logout(&request.session_id, &request.admin_user_id, &request.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `/internal` — periodic cleanup, intended to be called by a scheduler
/// outside this crate (spec.md §1 scopes the scheduler itself out).
pub async fn cleanup_expired_tokens(State(state): State<AppState>) -> Result<Json<CleanupResponse>, HttpError> {
    let tokens_cleaned = logout_service(&state).cleanup_expired_tokens().await?;
    Ok(Json(CleanupResponse { tokens_cleaned }))
}
