//! Core error taxonomy for the AIM domain.
//!
//! This is the single error type every use-case service returns. It mirrors the
//! error classes the transport layer is allowed to observe (`NOT_FOUND`,
//! `UNAUTHORIZED`, `FORBIDDEN`, `BAD_REQUEST`, `CONFLICT`, `TOO_MANY_REQUESTS`,
//! `INTERNAL_SERVER_ERROR`) so that `adapters::http::error` has a single,
//! mechanical projection to do and no business rules ever leak into it.
//!
//! Design Principles:
//! - **No transport concepts**: no status codes, no headers, no JSON here.
//! - **Errors are values**: no panics on expected failure paths.
//! - **Stable codes**: `code()` is a machine-stable identifier, kept even if the
//!   message text changes.

use std::fmt;

/// A domain-level error. Every use-case method returns `Result<T, CoreError>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Entity absent (user, role, permission, alert, subscription, challenge,
    /// session, ...), or a not-enabled-MFA precondition.
    NotFound(String),
    /// Credential mismatch on login, or an invalid/blacklisted/expired refresh
    /// token.
    Unauthorized(String),
    /// Account suspended/unverified/locked, ownership violation, or an attempt
    /// to modify a system role.
    Forbidden(String),
    /// Invalid input format, invalid state transition, password reuse, or an
    /// already-used one-shot step.
    BadRequest(String),
    /// Duplicate name/key/assignment, or MFA already enabled.
    Conflict(String),
    /// Rate limit hit, MFA lockout, or challenge attempts exhausted.
    TooManyRequests(String),
    /// Unexpected failure (store/cache unavailable, programmer error).
    Internal(String),
}

impl CoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Machine-stable error code, independent of the human message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Conflict(_) => "CONFLICT",
            Self::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::BadRequest(m)
            | Self::Conflict(m)
            | Self::TooManyRequests(m)
            | Self::Internal(m) => m,
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for CoreError {}

/// Convenience alias used throughout `core`.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_regardless_of_message() {
        assert_eq!(CoreError::not_found("x").code(), "NOT_FOUND");
        assert_eq!(CoreError::not_found("y").code(), "NOT_FOUND");
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = CoreError::conflict("role already exists");
        assert_eq!(err.to_string(), "CONFLICT: role already exists");
    }

    #[test]
    fn each_constructor_maps_to_expected_variant() {
        assert!(matches!(CoreError::unauthorized("a"), CoreError::Unauthorized(_)));
        assert!(matches!(CoreError::forbidden("a"), CoreError::Forbidden(_)));
        assert!(matches!(CoreError::bad_request("a"), CoreError::BadRequest(_)));
        assert!(matches!(
            CoreError::too_many_requests("a"),
            CoreError::TooManyRequests(_)
        ));
        assert!(matches!(CoreError::internal("a"), CoreError::Internal(_)));
    }
}
