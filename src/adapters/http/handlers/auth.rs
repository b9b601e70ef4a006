//! Login, refresh, and MFA-login-completion handlers (components B, D, F, G).
//!
//! Login and MFA completion are two-step flows split across `AuthService` and
//! `MfaService`, which do not know about each other to avoid a circular
//! dependency (`auth.rs`'s own doc comment on step 9). Stitching the steps
//! together — enforcing the concurrent-session cap, and, after an MFA
//! challenge completes, replaying the token-issuance tail `AuthService::login`
//! runs for a non-MFA login — is this handler's job, the same way the
//! teacher's `authenticate` handler chains `AuthenticateUser` then
//! `IssueSession`.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use validator::Validate;

use crate::adapters::http::dto::auth::{CompleteMfaLoginRequest, LoginRequest, LoginResponse, RefreshRequest, TokenPairResponse};
use crate::adapters::http::error::{validation_error, HttpError};
use crate::adapters::http::handlers::{client_ip, user_agent};
use crate::adapters::http::state::AppState;
use crate::core::auth::{AuthService, LoginInput, LoginOutcome};
use crate::core::cache::keys;
use crate::core::error::CoreError;
use crate::core::mfa::MfaService;
use crate::core::session::Session;
use crate::core::token::IssueTokenPair;

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), HttpError> {
    request.validate().map_err(validation_error)?;

    let auth = AuthService {
        users: &*state.users,
        sessions: &*state.sessions,
        devices: &*state.devices,
        attempts: &*state.login_attempts,
        mfa_configs: &*state.mfa_configs,
        roles: &*state.roles,
        user_roles: &*state.user_roles,
        alerts: &*state.alerts,
        cache: &*state.cache,
        rate_limiter: &*state.rate_limiter,
        crypto: &*state.crypto,
        tokens: &*state.tokens,
        clock: &*state.clock,
        audit: state.audit.clone(),
    };

    let outcome = auth
        .login(LoginInput {
            email: request.email,
            password: request.password,
            device_fingerprint: request.device_fingerprint,
            ip_address: client_ip(&headers),
            user_agent: user_agent(&headers),
            correlation_id: None,
            remember_me: request.remember_me,
        })
        .await?;

    match outcome {
        LoginOutcome::Success { token_pair, user_id } => {
            let session_service = crate::core::session::SessionService {
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
            };
            session_service.enforce_concurrent_limit(&user_id).await?;
            let now = state.clock.now();
            Ok((StatusCode::OK, Json(LoginResponse::Success(TokenPairResponse::from_pair(token_pair, now)))))
        }
        LoginOutcome::MfaRequired { challenge_id } => {
            let payload = state
                .cache
                .get(&keys::mfa_challenge(&challenge_id))
                .await
                .map_err(|e| CoreError::internal(e.to_string()))?
                .into_option()
                .ok_or_else(|| CoreError::internal("mfa challenge payload vanished"))?;
            let login_context: serde_json::Value = serde_json::from_str(&payload).map_err(|e| CoreError::internal(e.to_string()))?;
            let user_id = login_context["userId"].as_str().ok_or_else(|| CoreError::internal("malformed mfa challenge payload"))?;

            let mfa = MfaService {
                configs: &*state.mfa_configs,
                challenges: &*state.mfa_challenges,
                backup_codes: &*state.backup_codes,
                alerts: &*state.alerts,
                cache: &*state.cache,
                crypto: &*state.crypto,
                totp: &*state.totp,
                clock: &*state.clock,
                audit: state.audit.clone(),
            };
            let challenge = mfa.create_challenge(user_id, client_ip(&headers)).await?;

            // Re-stash the login context under the MFA challenge's own token
            // so `complete_mfa_login` can recover it once the code verifies.
            state
                .cache
                .set(&keys::mfa_challenge(&challenge.challenge_token), &payload, std::time::Duration::from_secs(300))
                .await
                .map_err(|e| CoreError::internal(e.to_string()))?;

            Ok((
                StatusCode::OK,
                Json(LoginResponse::MfaRequired { challenge_token: challenge.challenge_token }),
            ))
        }
    }
}

pub async fn complete_mfa_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CompleteMfaLoginRequest>,
) -> Result<(StatusCode, Json<TokenPairResponse>), HttpError> {
    request.validate().map_err(validation_error)?;

    let mfa = MfaService {
        configs: &*state.mfa_configs,
        challenges: &*state.mfa_challenges,
        backup_codes: &*state.backup_codes,
        alerts: &*state.alerts,
        cache: &*state.cache,
        crypto: &*state.crypto,
        totp: &*state.totp,
        clock: &*state.clock,
        audit: state.audit.clone(),
    };

    if request.use_backup_code {
        mfa.verify_backup_code(&request.challenge_token, &request.code).await?;
    } else {
        mfa.verify_totp(&request.challenge_token, &request.code).await?;
    }

    let payload = state
        .cache
        .get(&keys::mfa_challenge(&request.challenge_token))
        .await
        .map_err(|e| CoreError::internal(e.to_string()))?
        .into_option()
        .ok_or_else(|| CoreError::unauthorized("mfa login context expired"))?;
    let login_context: serde_json::Value = serde_json::from_str(&payload).map_err(|e| CoreError::internal(e.to_string()))?;
    let user_id = login_context["userId"].as_str().ok_or_else(|| CoreError::internal("malformed mfa login context"))?.to_string();
    let remember_me = login_context["rememberMe"].as_bool().unwrap_or(false);
    let device_fingerprint = login_context["deviceFingerprint"].as_str().map(str::to_string);

    let now = state.clock.now();
    let token_family = state.crypto.random_hex(16);
    let session_id = state.crypto.random_hex(16);
    let role_names = crate::core::rbac::resolve_role_names(&*state.user_roles, &*state.roles, &user_id, now).await?;
    let pair = state.tokens.generate_token_pair(IssueTokenPair {
        user_id: &user_id,
        session_id: &session_id,
        roles: role_names,
        org_id: None,
        token_family: &token_family,
        remember_me,
        now,
    })?;

    let session = Session {
        id: session_id,
        user_id: user_id.clone(),
        access_token_hash: state.tokens.get_token_hash(&pair.access_token),
        refresh_token_hash: state.tokens.get_token_hash(&pair.refresh_token),
        token_family,
        device_fingerprint,
        user_agent: user_agent(&headers),
        ip_address: client_ip(&headers),
        geo: None,
        is_remembered: remember_me,
        last_activity_at: now,
        expires_at: pair.refresh_expires_at,
        revoked_at: None,
        revoke_reason: None,
        created_at: now,
    };
    state.sessions.insert(session).await?;
    state.cache.delete(&keys::mfa_challenge(&request.challenge_token)).await.ok();

    let session_service = crate::core::session::SessionService {
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
    };
    session_service.enforce_concurrent_limit(&user_id).await?;

    state
        .audit
        .log(crate::core::audit::AuditEvent::new("LOGIN_SUCCESS", now).with_user(&user_id))
        .await;

    Ok((StatusCode::OK, Json(TokenPairResponse::from_pair(pair, now))))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, HttpError> {
    request.validate().map_err(validation_error)?;

    let session_service = crate::core::session::SessionService {
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
    };

    let pair = session_service
        .refresh(crate::core::session::RefreshInput {
            refresh_token: &request.refresh_token,
            ip_address: client_ip(&headers),
            user_agent: user_agent(&headers),
        })
        .await?;

    Ok(Json(TokenPairResponse::from_pair(pair, state.clock.now())))
}

impl TokenPairResponse {
    fn from_pair(pair: crate::core::token::TokenPair, now: chrono::DateTime<chrono::Utc>) -> Self {
        let expires_in = (pair.access_expires_at - now).num_seconds().max(0);
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
