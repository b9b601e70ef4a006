//! Password reset handlers (cross-cutting, spec.md §6). Unauthenticated —
//! these live under `/auth` alongside login, since a locked-out user has no
//! bearer token yet.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use validator::Validate;

use crate::adapters::http::dto::password_reset::{
    RequestPasswordResetRequest, RequestPasswordResetResponse, ResetPasswordRequest, ValidateResetTokenRequest, ValidateResetTokenResponse,
};
use crate::adapters::http::error::{validation_error, HttpError};
use crate::adapters::http::handlers::client_ip;
use crate::adapters::http::state::AppState;
use crate::core::password_reset::PasswordResetService;

fn password_reset_service(state: &AppState) -> PasswordResetService<'_> {
    PasswordResetService {
        users: &*state.users,
        tokens: &*state.reset_tokens,
        history: &*state.password_history,
        sessions: &*state.sessions,
        queue: &*state.queue,
        crypto: &*state.crypto,
        clock: &*state.clock,
        audit: state.audit.clone(),
    }
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RequestPasswordResetRequest>,
) -> Result<Json<RequestPasswordResetResponse>, HttpError> {
    request.validate().map_err(validation_error)?;
    let message = password_reset_service(&state).request_password_reset(&request.email, client_ip(&headers)).await;
    Ok(Json(RequestPasswordResetResponse { message }))
}

pub async fn validate_reset_token(
    State(state): State<AppState>,
    Json(request): Json<ValidateResetTokenRequest>,
) -> Result<Json<ValidateResetTokenResponse>, HttpError> {
    request.validate().map_err(validation_error)?;
    let valid = password_reset_service(&state).validate_reset_token(&request.token).await?;
    Ok(Json(ValidateResetTokenResponse { valid }))
}

pub async fn reset_password(State(state): State<AppState>, Json(request): Json<ResetPasswordRequest>) -> Result<(), HttpError> {
    request.validate().map_err(validation_error)?;
    password_reset_service(&state).reset_password(&request.token, &request.new_password).await
}
