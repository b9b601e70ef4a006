//! Projects `CoreError` onto an HTTP status code and a JSON error envelope.
//!
//! `CoreError`'s taxonomy was already chosen to mirror the HTTP error classes
//! the transport layer is allowed to observe, so this is a single mechanical
//! match rather than a parallel `HttpError` hierarchy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core::error::CoreError;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

pub struct HttpError(pub CoreError);

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        HttpError(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            ErrorBody { code: self.0.code().to_string(), message: "an unexpected error occurred".to_string() }
        } else {
            ErrorBody { code: self.0.code().to_string(), message: self.0.message().to_string() }
        };
        (status, Json(body)).into_response()
    }
}

/// Used by handlers to project a `validator` failure into the same envelope
/// as a domain `BadRequest` without constructing a `CoreError` for it.
pub fn validation_error(errors: validator::ValidationErrors) -> HttpError {
    HttpError(CoreError::bad_request(errors.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_message_from_clients() {
        let err = HttpError(CoreError::internal("sqlx pool exhausted: connection refused"));
        match &err.0 {
            CoreError::Internal(msg) => assert!(msg.contains("pool")),
            _ => panic!("expected internal"),
        }
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = HttpError(CoreError::not_found("role not found")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
