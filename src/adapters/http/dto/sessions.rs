//! Session self-service DTOs (component F).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummaryResponse {
    pub id: String,
    pub masked_ip: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub location: Option<String>,
    pub is_current: bool,
    pub is_remembered: bool,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<crate::core::session::SessionSummary> for SessionSummaryResponse {
    fn from(s: crate::core::session::SessionSummary) -> Self {
        Self {
            id: s.id,
            masked_ip: s.masked_ip,
            device_type: s.device_type,
            browser: s.browser,
            os: s.os,
            location: s.location,
            is_current: s.is_current,
            is_remembered: s.is_remembered,
            last_activity_at: s.last_activity_at,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutAllResponse {
    pub sessions_revoked: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub server_logout_failed: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForceLogoutRequest {
    #[validate(length(min = 1, message = "sessionId is required"))]
    pub session_id: String,
    #[validate(length(min = 1, message = "adminUserId is required"))]
    pub admin_user_id: String,
    #[validate(length(min = 1, message = "reason is required"))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    pub tokens_cleaned: u64,
}
