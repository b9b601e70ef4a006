//! Password reset DTOs (cross-cutting concern, spec.md §6).

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestPasswordResetRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestPasswordResetResponse {
    /// Always the same message regardless of whether the email exists —
    /// enumeration-resistance is load-bearing here, not a detail to drop.
    pub message: &'static str,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ValidateResetTokenRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateResetTokenResponse {
    pub valid: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}
