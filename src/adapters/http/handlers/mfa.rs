//! MFA self-service handlers (components G, H).

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use validator::Validate;

use crate::adapters::http::dto::mfa::{
    BackupCodeVerifyResponse, BackupCodesResponse, BackupCodesStatusResponse, ListUsedCodesQuery, MfaSetupResponse, MfaStatusResponse,
    UsedBackupCodeResponse, UsedCodesPage, VerifyDirectMfaRequest, VerifySetupRequest,
};
use crate::adapters::http::error::{validation_error, HttpError};
use crate::adapters::http::handlers::{authenticated_claims, client_ip, user_agent};
use crate::adapters::http::middleware::BearerToken;
use crate::adapters::http::state::AppState;
use crate::core::mfa::{BackupCodesService, MfaService};

fn mfa_service(state: &AppState) -> MfaService<'_> {
    MfaService {
        configs: &*state.mfa_configs,
        challenges: &*state.mfa_challenges,
        backup_codes: &*state.backup_codes,
        alerts: &*state.alerts,
        cache: &*state.cache,
        crypto: &*state.crypto,
        totp: &*state.totp,
        clock: &*state.clock,
        audit: state.audit.clone(),
    }
}

fn backup_codes_service(state: &AppState) -> BackupCodesService<'_> {
    BackupCodesService { configs: &*state.mfa_configs, backup_codes: &*state.backup_codes }
}

pub async fn status(State(state): State<AppState>, Extension(token): Extension<BearerToken>) -> Result<Json<MfaStatusResponse>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let status = mfa_service(&state).status(&claims.sub).await?;
    Ok(Json(status.into()))
}

pub async fn initiate_setup(State(state): State<AppState>, Extension(token): Extension<BearerToken>) -> Result<Json<MfaSetupResponse>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let user = state
        .users
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| crate::core::error::CoreError::not_found("user not found"))?;
    let result = mfa_service(&state).initiate_setup(&claims.sub, &user.email, &state.config.totp_issuer).await?;
    Ok(Json(result.into()))
}

pub async fn verify_setup(
    State(state): State<AppState>,
    Json(request): Json<VerifySetupRequest>,
) -> Result<Json<BackupCodesResponse>, HttpError> {
    request.validate().map_err(validation_error)?;
    let backup_codes = mfa_service(&state).verify_setup(&request.setup_token, &request.code).await?;
    Ok(Json(BackupCodesResponse { backup_codes }))
}

pub async fn disable(State(state): State<AppState>, Extension(token): Extension<BearerToken>) -> Result<StatusCode, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    mfa_service(&state).disable(&claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Out-of-band code verification for an already-authenticated user (e.g. a
/// step-up check before a sensitive action), distinct from the in-login
/// challenge flow in `handlers::auth`.
pub async fn verify_direct(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    headers: HeaderMap,
    Json(request): Json<VerifyDirectMfaRequest>,
) -> Result<Json<BackupCodeVerifyResponse>, HttpError> {
    request.validate().map_err(validation_error)?;
    let claims = authenticated_claims(&state, &token)?;
    let remaining = mfa_service(&state)
        .verify_direct(&claims.sub, &request.code, client_ip(&headers), user_agent(&headers))
        .await?;
    Ok(Json(BackupCodeVerifyResponse { remaining }))
}

pub async fn regenerate_backup_codes(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<Json<BackupCodesResponse>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let backup_codes = mfa_service(&state).regenerate_backup_codes(&claims.sub).await?;
    Ok(Json(BackupCodesResponse { backup_codes }))
}

pub async fn backup_codes_status(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<Json<BackupCodesStatusResponse>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let status = backup_codes_service(&state).get_status(&claims.sub).await?;
    Ok(Json(status.into()))
}

pub async fn list_used_backup_codes(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Query(query): Query<ListUsedCodesQuery>,
) -> Result<Json<UsedCodesPage>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let (codes, total_pages) = backup_codes_service(&state).list_used_codes(&claims.sub, query.page, query.limit).await?;
    Ok(Json(UsedCodesPage {
        codes: codes
            .into_iter()
            .map(|c| UsedBackupCodeResponse { id: c.id, used_at: c.used_at, used_ip_address: c.used_ip_address })
            .collect(),
        total_pages,
    }))
}
