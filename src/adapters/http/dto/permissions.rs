//! Permission catalogue and direct-grant DTOs (component M).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::permission::Condition;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1))]
    pub resource: String,
    #[validate(length(min = 1))]
    pub action: String,
    #[validate(length(min = 1, max = 128))]
    pub display_name: String,
    #[validate(length(min = 1))]
    pub module: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "actorId is required"))]
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeactivatePermissionRequest {
    #[validate(length(min = 1, message = "actorId is required"))]
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListPermissionsQuery {
    pub module: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionResponse {
    pub id: String,
    pub resource: String,
    pub action: String,
    pub display_name: String,
    pub description: Option<String>,
    pub module: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<crate::core::permission::Permission> for PermissionResponse {
    fn from(p: crate::core::permission::Permission) -> Self {
        Self {
            id: p.id,
            resource: p.resource,
            action: p.action,
            display_name: p.display_name,
            description: p.description,
            module: p.module,
            is_active: p.is_active,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignPermissionRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub permission_id: String,
    #[serde(default = "default_true")]
    pub is_granted: bool,
    pub condition: Option<Condition>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "grantedBy is required"))]
    pub granted_by: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RevokePermissionRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub permission_id: String,
    #[validate(length(min = 1, message = "revokedBy is required"))]
    pub revoked_by: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkAssignPermissionsRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub permission_ids: Vec<String>,
    #[validate(length(min = 1, message = "grantedBy is required"))]
    pub granted_by: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckPermissionWithContextRequest {
    #[validate(length(min = 1))]
    pub resource: String,
    #[validate(length(min = 1))]
    pub action: String,
    pub caller_organization_id: Option<String>,
    pub resource_organization_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckPermissionResponse {
    pub allowed: bool,
    pub reason: Option<String>,
}
