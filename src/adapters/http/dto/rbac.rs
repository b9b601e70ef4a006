//! Role and role-hierarchy DTOs (component K).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 1, max = 128))]
    pub display_name: String,
    pub description: Option<String>,
    pub parent_role_id: Option<String>,
    pub organization_id: Option<String>,
    #[validate(length(min = 1, message = "actorId is required"))]
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    pub new_parent_role_id: Option<String>,
    #[validate(length(min = 1, message = "actorId is required"))]
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateRolePermissionsRequest {
    pub permission_ids: Vec<String>,
    #[validate(length(min = 1, message = "actorId is required"))]
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeleteRoleRequest {
    #[validate(length(min = 1, message = "actorId is required"))]
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignRoleRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub role_id: String,
    #[validate(length(min = 1, message = "grantedBy is required"))]
    pub granted_by: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RevokeRoleRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub role_id: String,
    #[validate(length(min = 1, message = "revokedBy is required"))]
    pub revoked_by: String,
    #[validate(length(min = 1, message = "reason is required"))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub parent_role_id: Option<String>,
    pub organization_id: Option<String>,
    pub is_system: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<crate::core::rbac::Role> for RoleResponse {
    fn from(r: crate::core::rbac::Role) -> Self {
        Self {
            id: r.id,
            name: r.name,
            display_name: r.display_name,
            description: r.description,
            parent_role_id: r.parent_role_id,
            organization_id: r.organization_id,
            is_system: r.is_system,
            is_active: r.is_active,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectivePermissionsResponse {
    pub permission_keys: Vec<String>,
}

impl From<crate::core::rbac::EffectivePermissions> for EffectivePermissionsResponse {
    fn from(p: crate::core::rbac::EffectivePermissions) -> Self {
        let mut keys: Vec<String> = p.permission_keys.into_iter().collect();
        keys.sort();
        Self { permission_keys: keys }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckPermissionRequest {
    #[validate(length(min = 1))]
    pub resource: String,
    #[validate(length(min = 1))]
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckPermissionResponse {
    pub allowed: bool,
}
