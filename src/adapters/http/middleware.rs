//! Bearer token authentication middleware.

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

/// Extract the bearer token from `Authorization` and stash it in request
/// extensions for handlers to verify. Does not itself check the token's
/// signature or expiry — that is the handler's job, via `AppState.tokens`.
///
/// Returns 401 if the header is missing, malformed, or the token is empty.
pub async fn bearer_auth(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let token = {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        if !auth_header.starts_with("Bearer ") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let token_str = &auth_header[7..];
        if token_str.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }
        token_str.to_string()
    };

    request.extensions_mut().insert(BearerToken(token));
    Ok(next.run(request).await)
}

/// Wrapper so handlers pull the raw token out of extensions with a type,
/// not a bare `String` that could collide with something else.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);
