//! HTTP handlers — one module per bounded context. Each handler builds the
//! matching `core` `*Service` from borrowed `AppState` fields for the
//! lifetime of the request, the same `&'a dyn Trait` wiring the `core`
//! services' own unit tests use.

pub mod auth;
pub mod mfa;
pub mod password_reset;
pub mod permissions;
pub mod rbac;
pub mod security_events;
pub mod sessions;

use axum::http::HeaderMap;

use crate::adapters::http::error::HttpError;
use crate::adapters::http::middleware::BearerToken;
use crate::adapters::http::state::AppState;
use crate::core::token::AccessClaims;

/// Verify the bearer token `middleware::bearer_auth` stashed in extensions
/// and return its claims, or a 401.
pub fn authenticated_claims(state: &AppState, token: &BearerToken) -> Result<AccessClaims, HttpError> {
    state.tokens.verify_access_token(&token.0, state.clock.now()).map_err(HttpError::from)
}

/// Best-effort client IP from `X-Forwarded-For` (first hop) — there is no
/// `ConnectInfo` layer wired in front of this router, since deployments
/// typically sit behind a load balancer that sets this header.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(str::to_string)
}
