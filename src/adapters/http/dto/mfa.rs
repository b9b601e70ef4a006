//! MFA and backup-code DTOs (components G, H).

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct MfaStatusResponse {
    pub is_enabled: bool,
    pub is_verified: bool,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub backup_codes_remaining: usize,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<crate::core::mfa::MfaStatus> for MfaStatusResponse {
    fn from(s: crate::core::mfa::MfaStatus) -> Self {
        Self {
            is_enabled: s.is_enabled,
            is_verified: s.is_verified,
            last_used_at: s.last_used_at,
            backup_codes_remaining: s.backup_codes_remaining,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MfaSetupResponse {
    pub setup_token: String,
    pub provisioning_uri: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<crate::core::mfa::MfaSetupResult> for MfaSetupResponse {
    fn from(r: crate::core::mfa::MfaSetupResult) -> Self {
        Self {
            setup_token: r.setup_token,
            provisioning_uri: r.provisioning_uri,
            expires_at: r.expires_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifySetupRequest {
    #[validate(length(min = 1, message = "setupToken is required"))]
    pub setup_token: String,
    #[validate(length(equal = 6, message = "code must be 6 digits"))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupCodesResponse {
    pub backup_codes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyDirectMfaRequest {
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupCodeVerifyResponse {
    pub remaining: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupCodesStatusResponse {
    pub is_enabled: bool,
    pub total_codes: usize,
    pub remaining_codes: usize,
    pub used_codes: usize,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub should_regenerate: bool,
}

impl From<crate::core::mfa::BackupCodesStatus> for BackupCodesStatusResponse {
    fn from(s: crate::core::mfa::BackupCodesStatus) -> Self {
        Self {
            is_enabled: s.is_enabled,
            total_codes: s.total_codes,
            remaining_codes: s.remaining_codes,
            used_codes: s.used_codes,
            last_used_at: s.last_used_at,
            should_regenerate: s.should_regenerate,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListUsedCodesQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize)]
pub struct UsedBackupCodeResponse {
    pub id: String,
    pub used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub used_ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsedCodesPage {
    pub codes: Vec<UsedBackupCodeResponse>,
    pub total_pages: usize,
}
