//! Permission Service (component M) — the permission catalogue, direct
//! user-permission grants/denials, and condition evaluation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::audit::{AuditEvent, ResilientAuditSink};
use crate::core::clock::Clock;
use crate::core::error::CoreError;
use crate::core::rbac::{role_derived_permission_keys, RoleHierarchyRepository, RolePermissionRepository, UserRoleRepository};

#[derive(Debug, Clone)]
pub struct Permission {
    pub id: String,
    pub resource: String,
    pub action: String,
    pub display_name: String,
    pub description: Option<String>,
    pub module: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Conditions attached to a direct user-permission grant. Anything not
/// explicitly modelled here is denied (spec.md §4.M, "deny-by-default").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Condition {
    OwnOrganization { organization_id: String },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub caller_organization_id: Option<String>,
    pub resource_organization_id: Option<String>,
}

impl Condition {
    pub fn evaluate(&self, ctx: &EvaluationContext) -> bool {
        match self {
            Condition::OwnOrganization { organization_id } => {
                ctx.caller_organization_id.as_deref() == Some(organization_id.as_str())
                    && ctx.resource_organization_id.as_deref() == Some(organization_id.as_str())
            }
            Condition::Unsupported => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserPermission {
    pub id: String,
    pub user_id: String,
    pub permission_id: String,
    pub is_granted: bool,
    pub condition: Option<Condition>,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl UserPermission {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|e| e > now)
    }
}

pub fn is_valid_resource_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Permission>, CoreError>;
    async fn find_by_resource_action(&self, resource: &str, action: &str) -> Result<Option<Permission>, CoreError>;
    async fn list(&self, module: Option<&str>, search: Option<&str>, include_inactive: bool) -> Result<Vec<Permission>, CoreError>;
    async fn insert(&self, permission: Permission) -> Result<(), CoreError>;
    async fn update(&self, permission: Permission) -> Result<(), CoreError>;
    async fn is_referenced(&self, permission_id: &str) -> Result<bool, CoreError>;
}

#[async_trait]
pub trait UserPermissionRepository: Send + Sync {
    async fn active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<UserPermission>, CoreError>;
    async fn find_active(&self, user_id: &str, permission_id: &str, now: DateTime<Utc>) -> Result<Option<UserPermission>, CoreError>;
    async fn insert(&self, grant: UserPermission) -> Result<(), CoreError>;
    async fn update(&self, grant: UserPermission) -> Result<(), CoreError>;
}

pub struct PermissionService<'a> {
    pub permissions: &'a dyn PermissionRepository,
    pub user_permissions: &'a dyn UserPermissionRepository,
    pub user_roles: &'a dyn UserRoleRepository,
    pub hierarchy: &'a dyn RoleHierarchyRepository,
    pub role_permissions: &'a dyn RolePermissionRepository,
    pub clock: &'a dyn Clock,
    pub audit: Arc<ResilientAuditSink>,
}

impl<'a> PermissionService<'a> {
    pub async fn create_permission(&self, resource: &str, action: &str, display_name: &str, module: &str, description: Option<String>, actor_id: &str) -> Result<Permission, CoreError> {
        if !is_valid_resource_name(resource) || !is_valid_resource_name(action) {
            return Err(CoreError::bad_request("resource and action must match ^[a-z][a-z0-9_]*$"));
        }
        if self.permissions.find_by_resource_action(resource, action).await?.is_some() {
            return Err(CoreError::conflict("permission already exists for this resource/action pair"));
        }
        let now = self.clock.now();
        let permission = Permission {
            id: format!("perm-{}", now.timestamp_nanos_opt().unwrap_or_default()),
            resource: resource.to_string(),
            action: action.to_string(),
            display_name: display_name.to_string(),
            description,
            module: module.to_string(),
            is_active: true,
            created_at: now,
        };
        self.permissions.insert(permission.clone()).await?;
        self.audit
            .log(AuditEvent::new("PERMISSION_CREATED", now).with_actor(actor_id).with_target("permission", &permission.id))
            .await;
        Ok(permission)
    }

    pub async fn deactivate_permission(&self, permission_id: &str, actor_id: &str) -> Result<(), CoreError> {
        if self.permissions.is_referenced(permission_id).await? {
            return Err(CoreError::conflict("permission is still referenced by a role or user"));
        }
        let mut permission = self
            .permissions
            .find_by_id(permission_id)
            .await?
            .ok_or_else(|| CoreError::not_found("permission not found"))?;
        permission.is_active = false;
        self.permissions.update(permission).await?;
        self.audit
            .log(AuditEvent::new("PERMISSION_UPDATED", self.clock.now()).with_actor(actor_id).with_target("permission", permission_id))
            .await;
        Ok(())
    }

    pub async fn list_permissions(&self, module: Option<&str>, search: Option<&str>, include_inactive: bool) -> Result<Vec<Permission>, CoreError> {
        self.permissions.list(module, search, include_inactive).await
    }

    pub async fn assign_to_user(&self, user_id: &str, permission_id: &str, is_granted: bool, condition: Option<Condition>, granted_by: &str, expires_at: Option<DateTime<Utc>>) -> Result<(), CoreError> {
        self.permissions.find_by_id(permission_id).await?.ok_or_else(|| CoreError::not_found("permission not found"))?;
        let now = self.clock.now();
        if let Some(existing) = self.user_permissions.find_active(user_id, permission_id, now).await? {
            let mut existing = existing;
            existing.revoked_at = Some(now);
            self.user_permissions.update(existing).await?;
        }
        self.user_permissions
            .insert(UserPermission {
                id: format!("uperm-{}", now.timestamp_nanos_opt().unwrap_or_default()),
                user_id: user_id.to_string(),
                permission_id: permission_id.to_string(),
                is_granted,
                condition,
                granted_by: granted_by.to_string(),
                granted_at: now,
                expires_at,
                revoked_at: None,
            })
            .await?;
        self.audit
            .log(
                AuditEvent::new("USER_PERMISSION_ASSIGNED", now)
                    .with_user(user_id)
                    .with_actor(granted_by)
                    .with_target("permission", permission_id)
                    .with_metadata(serde_json::json!({"isGranted": is_granted})),
            )
            .await;
        Ok(())
    }

    pub async fn revoke_from_user(&self, user_id: &str, permission_id: &str, revoked_by: &str) -> Result<(), CoreError> {
        let now = self.clock.now();
        let mut grant = self
            .user_permissions
            .find_active(user_id, permission_id, now)
            .await?
            .ok_or_else(|| CoreError::not_found("no active grant found"))?;
        grant.revoked_at = Some(now);
        self.user_permissions.update(grant).await?;
        self.audit
            .log(AuditEvent::new("USER_PERMISSION_REVOKED", now).with_user(user_id).with_actor(revoked_by).with_target("permission", permission_id))
            .await;
        Ok(())
    }

    /// Validates every permission id before mutating any of them, then emits
    /// a single `BULK_PERMISSIONS_ASSIGNED` event (spec.md §4.M).
    pub async fn bulk_assign(&self, user_id: &str, permission_ids: &[String], granted_by: &str) -> Result<(), CoreError> {
        for id in permission_ids {
            self.permissions.find_by_id(id).await?.ok_or_else(|| CoreError::not_found("permission not found"))?;
        }
        let now = self.clock.now();
        for id in permission_ids {
            self.user_permissions
                .insert(UserPermission {
                    id: format!("uperm-{}-{}", now.timestamp_nanos_opt().unwrap_or_default(), id),
                    user_id: user_id.to_string(),
                    permission_id: id.clone(),
                    is_granted: true,
                    condition: None,
                    granted_by: granted_by.to_string(),
                    granted_at: now,
                    expires_at: None,
                    revoked_at: None,
                })
                .await?;
        }
        self.audit
            .log(
                AuditEvent::new("BULK_PERMISSIONS_ASSIGNED", now)
                    .with_user(user_id)
                    .with_actor(granted_by)
                    .with_metadata(serde_json::json!({"count": permission_ids.len()})),
            )
            .await;
        Ok(())
    }

    /// `checkPermissionWithContext` (spec.md §4.M): resolves effective
    /// permissions — role-derived first, falling back to a direct grant — then
    /// applies the grant's condition, if any.
    pub async fn check_permission_with_context(&self, user_id: &str, resource: &str, action: &str, ctx: &EvaluationContext) -> Result<(bool, Option<String>), CoreError> {
        let now = self.clock.now();

        let role_keys = role_derived_permission_keys(self.user_roles, self.hierarchy, self.role_permissions, self.permissions, user_id, now).await?;
        if role_keys.contains(&format!("{resource}:{action}")) || role_keys.contains(&format!("{resource}:*")) {
            return Ok((true, None));
        }

        let Some(permission) = self.permissions.find_by_resource_action(resource, action).await? else {
            return Ok((false, None));
        };
        let Some(grant) = self.user_permissions.find_active(user_id, &permission.id, now).await? else {
            return Ok((false, None));
        };
        if !grant.is_granted {
            return Ok((false, None));
        }
        match &grant.condition {
            None => Ok((true, None)),
            Some(condition) => {
                if condition.evaluate(ctx) {
                    Ok((true, None))
                } else {
                    Ok((false, Some("denied by condition".to_string())))
                }
            }
        }
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryPermissionRepository {
        pub permissions: Mutex<Vec<Permission>>,
        pub referenced: Mutex<std::collections::HashSet<String>>,
    }

    impl InMemoryPermissionRepository {
        pub fn seed(&self, permission: Permission) {
            self.permissions.lock().unwrap().push(permission);
        }
    }

    #[async_trait]
    impl PermissionRepository for InMemoryPermissionRepository {
        async fn find_by_id(&self, id: &str) -> Result<Option<Permission>, CoreError> {
            Ok(self.permissions.lock().unwrap().iter().find(|p| p.id == id).cloned())
        }

        async fn find_by_resource_action(&self, resource: &str, action: &str) -> Result<Option<Permission>, CoreError> {
            Ok(self
                .permissions
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.resource == resource && p.action == action)
                .cloned())
        }

        async fn list(&self, module: Option<&str>, search: Option<&str>, include_inactive: bool) -> Result<Vec<Permission>, CoreError> {
            Ok(self
                .permissions
                .lock()
                .unwrap()
                .iter()
                .filter(|p| include_inactive || p.is_active)
                .filter(|p| module.is_none_or(|m| p.module == m))
                .filter(|p| search.is_none_or(|s| p.display_name.to_lowercase().contains(&s.to_lowercase())))
                .cloned()
                .collect())
        }

        async fn insert(&self, permission: Permission) -> Result<(), CoreError> {
            self.permissions.lock().unwrap().push(permission);
            Ok(())
        }

        async fn update(&self, permission: Permission) -> Result<(), CoreError> {
            let mut permissions = self.permissions.lock().unwrap();
            if let Some(existing) = permissions.iter_mut().find(|p| p.id == permission.id) {
                *existing = permission;
            }
            Ok(())
        }

        async fn is_referenced(&self, permission_id: &str) -> Result<bool, CoreError> {
            Ok(self.referenced.lock().unwrap().contains(permission_id))
        }
    }

    #[derive(Default)]
    pub struct InMemoryUserPermissionRepository {
        pub grants: Mutex<Vec<UserPermission>>,
    }

    #[async_trait]
    impl UserPermissionRepository for InMemoryUserPermissionRepository {
        async fn active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<UserPermission>, CoreError> {
            Ok(self
                .grants
                .lock()
                .unwrap()
                .iter()
                .filter(|g| g.user_id == user_id && g.is_active(now))
                .cloned()
                .collect())
        }

        async fn find_active(&self, user_id: &str, permission_id: &str, now: DateTime<Utc>) -> Result<Option<UserPermission>, CoreError> {
            Ok(self
                .grants
                .lock()
                .unwrap()
                .iter()
                .find(|g| g.user_id == user_id && g.permission_id == permission_id && g.is_active(now))
                .cloned())
        }

        async fn insert(&self, grant: UserPermission) -> Result<(), CoreError> {
            self.grants.lock().unwrap().push(grant);
            Ok(())
        }

        async fn update(&self, grant: UserPermission) -> Result<(), CoreError> {
            let mut grants = self.grants.lock().unwrap();
            if let Some(existing) = grants.iter_mut().find(|g| g.id == grant.id) {
                *existing = grant;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;
    use crate::core::clock::fake::FakeClock;
    use crate::core::rbac::fake::{InMemoryHierarchyRepository, InMemoryRolePermissionRepository, InMemoryUserRoleRepository};

    fn service<'a>(
        permissions: &'a InMemoryPermissionRepository,
        user_permissions: &'a InMemoryUserPermissionRepository,
        user_roles: &'a InMemoryUserRoleRepository,
        hierarchy: &'a InMemoryHierarchyRepository,
        role_permissions: &'a InMemoryRolePermissionRepository,
        clock: &'a FakeClock,
    ) -> PermissionService<'a> {
        PermissionService {
            permissions,
            user_permissions,
            user_roles,
            hierarchy,
            role_permissions,
            clock,
            audit: Arc::new(ResilientAuditSink::new(Arc::new(crate::core::audit::fake::InMemoryAuditSink::default()))),
        }
    }

    #[test]
    fn resource_name_validation_rejects_uppercase_and_leading_digit() {
        assert!(is_valid_resource_name("reports"));
        assert!(is_valid_resource_name("own_organization"));
        assert!(!is_valid_resource_name("Reports"));
        assert!(!is_valid_resource_name("1reports"));
    }

    #[tokio::test]
    async fn duplicate_resource_action_pair_is_rejected() {
        let permissions = InMemoryPermissionRepository::default();
        let user_permissions = InMemoryUserPermissionRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let hierarchy = InMemoryHierarchyRepository::default();
        let role_permissions = InMemoryRolePermissionRepository::default();
        let clock = FakeClock::new(Utc::now());
        let svc = service(&permissions, &user_permissions, &user_roles, &hierarchy, &role_permissions, &clock);

        svc.create_permission("reports", "read", "Read reports", "reports", None, "admin").await.unwrap();
        let result = svc.create_permission("reports", "read", "Read reports again", "reports", None, "admin").await;
        assert!(matches!(result, Err(e) if e.code() == "CONFLICT"));
    }

    #[tokio::test]
    async fn own_organization_condition_denies_cross_tenant_access() {
        let permissions = InMemoryPermissionRepository::default();
        let user_permissions = InMemoryUserPermissionRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let hierarchy = InMemoryHierarchyRepository::default();
        let role_permissions = InMemoryRolePermissionRepository::default();
        let clock = FakeClock::new(Utc::now());
        let svc = service(&permissions, &user_permissions, &user_roles, &hierarchy, &role_permissions, &clock);

        let permission = svc.create_permission("clients", "update", "Update clients", "clients", None, "admin").await.unwrap();
        svc.assign_to_user(
            "u1",
            &permission.id,
            true,
            Some(Condition::OwnOrganization { organization_id: "org-a".into() }),
            "admin",
            None,
        )
        .await
        .unwrap();

        let same_org = EvaluationContext { caller_organization_id: Some("org-a".into()), resource_organization_id: Some("org-a".into()) };
        let other_org = EvaluationContext { caller_organization_id: Some("org-a".into()), resource_organization_id: Some("org-b".into()) };

        let (allowed, reason) = svc.check_permission_with_context("u1", "clients", "update", &same_org).await.unwrap();
        assert!(allowed);
        assert!(reason.is_none());

        let (allowed, reason) = svc.check_permission_with_context("u1", "clients", "update", &other_org).await.unwrap();
        assert!(!allowed);
        assert!(reason.unwrap().contains("condition"));
    }

    #[tokio::test]
    async fn deactivating_a_referenced_permission_is_rejected() {
        let permissions = InMemoryPermissionRepository::default();
        let user_permissions = InMemoryUserPermissionRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let hierarchy = InMemoryHierarchyRepository::default();
        let role_permissions = InMemoryRolePermissionRepository::default();
        let clock = FakeClock::new(Utc::now());
        let svc = service(&permissions, &user_permissions, &user_roles, &hierarchy, &role_permissions, &clock);

        let permission = svc.create_permission("clients", "delete", "Delete clients", "clients", None, "admin").await.unwrap();
        permissions.referenced.lock().unwrap().insert(permission.id.clone());

        let result = svc.deactivate_permission(&permission.id, "admin").await;
        assert!(matches!(result, Err(e) if e.code() == "CONFLICT"));
    }
}
