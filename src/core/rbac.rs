//! RBAC Service (component L) — roles, transitive-closure hierarchy, and the
//! central effective-permission algorithm.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::audit::{AuditEvent, ResilientAuditSink};
use crate::core::cache::{keys, CacheLookup, FastCache};
use crate::core::clock::Clock;
use crate::core::error::CoreError;
use crate::core::permission::{Permission, PermissionRepository, UserPermission, UserPermissionRepository};

#[derive(Debug, Clone)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub is_active: bool,
    pub parent_role_id: Option<String>,
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct HierarchyEdge<'a> {
    pub ancestor_role_id: &'a str,
    pub descendant_role_id: &'a str,
    pub depth: u32,
}

#[derive(Debug, Clone)]
pub struct UserRole {
    pub id: String,
    pub user_id: String,
    pub role_id: String,
    pub organization_id: Option<String>,
    pub granted_at: DateTime<Utc>,
    pub granted_by: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
    pub reason: Option<String>,
}

impl UserRole {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|e| e > now)
    }
}

/// Role name must be uppercase snake-case: `^[A-Z][A-Z0-9_]*$`.
pub fn is_valid_role_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Role>, CoreError>;
    async fn find_by_name(&self, name: &str, organization_id: Option<&str>) -> Result<Option<Role>, CoreError>;
    async fn insert(&self, role: Role) -> Result<(), CoreError>;
    async fn update(&self, role: Role) -> Result<(), CoreError>;
}

#[async_trait]
pub trait RoleHierarchyRepository: Send + Sync {
    /// Ancestors of `role_id`, including itself at depth 0.
    async fn ancestors(&self, role_id: &str) -> Result<Vec<(String, u32)>, CoreError>;
    /// True iff a row asserts `descendant` reaches `ancestor` (cycle check).
    async fn path_exists(&self, ancestor: &str, descendant: &str) -> Result<bool, CoreError>;
    async fn insert_closure(&self, edges: Vec<(String, String, u32)>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait RolePermissionRepository: Send + Sync {
    async fn permissions_for_role(&self, role_id: &str) -> Result<Vec<String>, CoreError>;
    async fn replace(&self, role_id: &str, permission_ids: Vec<String>) -> Result<(), CoreError>;
}

#[async_trait]
pub trait UserRoleRepository: Send + Sync {
    async fn active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<UserRole>, CoreError>;
    async fn users_with_role(&self, role_id: &str) -> Result<Vec<String>, CoreError>;
    async fn find_active_identical(&self, user_id: &str, role_id: &str, now: DateTime<Utc>) -> Result<Option<UserRole>, CoreError>;
    async fn insert(&self, assignment: UserRole) -> Result<(), CoreError>;
    async fn update(&self, assignment: UserRole) -> Result<(), CoreError>;
}

#[derive(Debug, Clone)]
pub struct EffectivePermissions {
    pub permission_keys: HashSet<String>,
}

impl EffectivePermissions {
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        self.permission_keys.contains(&format!("{resource}:{action}")) || self.permission_keys.contains(&format!("{resource}:*"))
    }
}

/// Permission keys reachable through role assignments alone (hierarchy
/// ancestors' role-permission grants), independent of a user's direct
/// `UserPermission` grants. Shared by [`RbacService::get_user_effective_permissions`]
/// and `PermissionService::check_permission_with_context`, which both need
/// the role-derived half of the merge without pulling in the other's
/// direct-grant handling.
pub async fn role_derived_permission_keys(
    user_roles: &dyn UserRoleRepository,
    hierarchy: &dyn RoleHierarchyRepository,
    role_permissions: &dyn RolePermissionRepository,
    permissions: &dyn PermissionRepository,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<HashSet<String>, CoreError> {
    let assignments = user_roles.active_for_user(user_id, now).await?;

    let mut permission_ids: HashSet<String> = HashSet::new();
    for assignment in &assignments {
        let ancestors = hierarchy.ancestors(&assignment.role_id).await?;
        for (ancestor_id, _depth) in ancestors {
            for permission_id in role_permissions.permissions_for_role(&ancestor_id).await? {
                permission_ids.insert(permission_id);
            }
        }
    }

    let mut keyset: HashSet<String> = HashSet::new();
    for id in &permission_ids {
        if let Some(permission) = permissions.find_by_id(id).await? {
            keyset.insert(format!("{}:{}", permission.resource, permission.action));
        }
    }
    Ok(keyset)
}

/// Role names currently active for a user, resolved for the access token's
/// `roles[]` claim (spec.md §4.B/§6).
pub async fn resolve_role_names(user_roles: &dyn UserRoleRepository, roles: &dyn RoleRepository, user_id: &str, now: DateTime<Utc>) -> Result<Vec<String>, CoreError> {
    let mut names = Vec::new();
    for assignment in user_roles.active_for_user(user_id, now).await? {
        if let Some(role) = roles.find_by_id(&assignment.role_id).await? {
            names.push(role.name);
        }
    }
    Ok(names)
}

pub struct RbacService<'a> {
    pub roles: &'a dyn RoleRepository,
    pub hierarchy: &'a dyn RoleHierarchyRepository,
    pub role_permissions: &'a dyn RolePermissionRepository,
    pub user_roles: &'a dyn UserRoleRepository,
    pub permissions: &'a dyn PermissionRepository,
    pub user_permissions: &'a dyn UserPermissionRepository,
    pub cache: &'a dyn FastCache,
    pub clock: &'a dyn Clock,
    pub audit: Arc<ResilientAuditSink>,
}

impl<'a> RbacService<'a> {
    pub async fn create_role(&self, name: &str, display_name: &str, description: Option<String>, parent_role_id: Option<&str>, organization_id: Option<&str>, actor_id: &str) -> Result<Role, CoreError> {
        if !is_valid_role_name(name) {
            return Err(CoreError::bad_request("role name must match ^[A-Z][A-Z0-9_]*$"));
        }
        if self.roles.find_by_name(name, organization_id).await?.is_some() {
            return Err(CoreError::conflict("role name already exists in this scope"));
        }
        if let Some(parent_id) = parent_role_id {
            let parent = self.roles.find_by_id(parent_id).await?.ok_or_else(|| CoreError::not_found("parent role not found"))?;
            if !parent.is_active {
                return Err(CoreError::bad_request("parent role is not active"));
            }
        }

        let now = self.clock.now();
        let role = Role {
            id: format!("role-{}", now.timestamp_nanos_opt().unwrap_or_default()),
            name: name.to_string(),
            display_name: display_name.to_string(),
            description,
            is_system: false,
            is_active: true,
            parent_role_id: parent_role_id.map(str::to_string),
            organization_id: organization_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.roles.insert(role.clone()).await?;
        self.hierarchy.insert_closure(vec![(role.id.clone(), role.id.clone(), 0)]).await?;

        if let Some(parent_id) = parent_role_id {
            self.attach_parent(&role.id, parent_id).await?;
        }

        self.audit.log(AuditEvent::new("ROLE_CREATED", now).with_actor(actor_id).with_target("role", &role.id)).await;
        Ok(role)
    }

    /// Attach `role_id` under `parent_id`, recomputing the transitive
    /// closure. Rejects on a detected cycle (spec.md §4.L).
    async fn attach_parent(&self, role_id: &str, parent_id: &str) -> Result<(), CoreError> {
        if self.hierarchy.path_exists(role_id, parent_id).await? {
            return Err(CoreError::bad_request("attaching this parent would create a cycle"));
        }
        let ancestors = self.hierarchy.ancestors(parent_id).await?;
        let mut edges = Vec::with_capacity(ancestors.len());
        for (ancestor_id, depth) in ancestors {
            edges.push((ancestor_id, role_id.to_string(), depth + 1));
        }
        self.hierarchy.insert_closure(edges).await
    }

    pub async fn update_role(&self, role_id: &str, new_parent_role_id: Option<&str>, actor_id: &str) -> Result<(), CoreError> {
        let mut role = self.roles.find_by_id(role_id).await?.ok_or_else(|| CoreError::not_found("role not found"))?;
        if role.is_system {
            return Err(CoreError::forbidden("system roles cannot be modified"));
        }
        if let Some(parent_id) = new_parent_role_id {
            if parent_id == role_id {
                return Err(CoreError::bad_request("a role cannot be its own parent"));
            }
            self.attach_parent(role_id, parent_id).await?;
            role.parent_role_id = Some(parent_id.to_string());
        }
        role.updated_at = self.clock.now();
        self.roles.update(role).await?;
        self.cache.delete(&keys::role(role_id)).await.ok();
        self.audit.log(AuditEvent::new("ROLE_UPDATED", self.clock.now()).with_actor(actor_id).with_target("role", role_id)).await;
        Ok(())
    }

    pub async fn delete_role(&self, role_id: &str, actor_id: &str) -> Result<(), CoreError> {
        let mut role = self.roles.find_by_id(role_id).await?.ok_or_else(|| CoreError::not_found("role not found"))?;
        if role.is_system {
            return Err(CoreError::forbidden("system roles cannot be deleted"));
        }
        if !self.user_roles.users_with_role(role_id).await?.is_empty() {
            return Err(CoreError::conflict("role has active user assignments"));
        }
        role.is_active = false;
        role.updated_at = self.clock.now();
        self.roles.update(role).await?;
        self.audit.log(AuditEvent::new("ROLE_DELETED", self.clock.now()).with_actor(actor_id).with_target("role", role_id)).await;
        Ok(())
    }

    pub async fn update_role_permissions(&self, role_id: &str, permission_ids: Vec<String>, actor_id: &str) -> Result<(), CoreError> {
        let role = self.roles.find_by_id(role_id).await?.ok_or_else(|| CoreError::not_found("role not found"))?;
        if role.is_system {
            return Err(CoreError::forbidden("system role permissions are immutable"));
        }
        for id in &permission_ids {
            self.permissions.find_by_id(id).await?.ok_or_else(|| CoreError::not_found("permission not found"))?;
        }
        self.role_permissions.replace(role_id, permission_ids).await?;
        for user_id in self.user_roles.users_with_role(role_id).await? {
            self.cache.delete(&keys::effective_permissions(&user_id)).await.ok();
        }
        self.audit
            .log(AuditEvent::new("ROLE_PERMISSIONS_UPDATED", self.clock.now()).with_actor(actor_id).with_target("role", role_id))
            .await;
        Ok(())
    }

    pub async fn assign_role(&self, user_id: &str, role_id: &str, granted_by: &str, expires_at: Option<DateTime<Utc>>, reason: Option<String>) -> Result<(), CoreError> {
        let role = self.roles.find_by_id(role_id).await?.ok_or_else(|| CoreError::not_found("role not found"))?;
        if !role.is_active {
            return Err(CoreError::bad_request("role is not active"));
        }
        let now = self.clock.now();
        if self.user_roles.find_active_identical(user_id, role_id, now).await?.is_some() {
            return Err(CoreError::conflict("role already assigned"));
        }
        self.user_roles
            .insert(UserRole {
                id: format!("ur-{}", now.timestamp_nanos_opt().unwrap_or_default()),
                user_id: user_id.to_string(),
                role_id: role_id.to_string(),
                organization_id: role.organization_id.clone(),
                granted_at: now,
                granted_by: granted_by.to_string(),
                expires_at,
                revoked_at: None,
                revoked_by: None,
                reason: reason.clone(),
            })
            .await?;
        self.cache.delete(&keys::effective_permissions(user_id)).await.ok();
        self.audit
            .log(
                AuditEvent::new("ROLE_ASSIGNED", now)
                    .with_user(user_id)
                    .with_actor(granted_by)
                    .with_target("role", role_id)
                    .with_metadata(serde_json::json!({"roleName": role.name, "reason": reason})),
            )
            .await;
        Ok(())
    }

    pub async fn revoke_role(&self, user_id: &str, role_id: &str, revoked_by: &str, reason: &str) -> Result<(), CoreError> {
        if reason.len() < 5 {
            return Err(CoreError::bad_request("a revocation reason of at least 5 characters is required"));
        }
        let now = self.clock.now();
        let active = self.user_roles.active_for_user(user_id, now).await?;
        if active.len() <= 1 {
            return Err(CoreError::conflict("cannot revoke a user's last active role"));
        }
        let mut assignment = active
            .into_iter()
            .find(|a| a.role_id == role_id)
            .ok_or_else(|| CoreError::not_found("role assignment not found"))?;
        assignment.revoked_at = Some(now);
        assignment.revoked_by = Some(revoked_by.to_string());
        assignment.reason = Some(reason.to_string());
        self.user_roles.update(assignment).await?;
        self.cache.delete(&keys::effective_permissions(user_id)).await.ok();
        self.audit
            .log(AuditEvent::new("ROLE_REVOKED", now).with_user(user_id).with_actor(revoked_by).with_target("role", role_id))
            .await;
        Ok(())
    }

    /// Central algorithm — spec.md §4.L "Effective permissions".
    pub async fn get_user_effective_permissions(&self, user_id: &str) -> Result<EffectivePermissions, CoreError> {
        if let CacheLookup::Hit(cached) = self.cache.get(&keys::effective_permissions(user_id)).await.unwrap_or(CacheLookup::Miss) {
            if let Ok(keys) = serde_json::from_str::<Vec<String>>(&cached) {
                return Ok(EffectivePermissions { permission_keys: keys.into_iter().collect() });
            }
        }

        let now = self.clock.now();
        let mut keyset = role_derived_permission_keys(self.user_roles, self.hierarchy, self.role_permissions, self.permissions, user_id, now).await?;

        for user_permission in self.user_permissions.active_for_user(user_id, now).await? {
            if let Some(permission) = self.permissions.find_by_id(&user_permission.permission_id).await? {
                let key = format!("{}:{}", permission.resource, permission.action);
                if user_permission.is_granted {
                    keyset.insert(key);
                } else {
                    keyset.remove(&key);
                }
            }
        }

        let serialised = serde_json::to_string(&keyset.iter().collect::<Vec<_>>()).unwrap_or_default();
        self.cache
            .set(&keys::effective_permissions(user_id), &serialised, std::time::Duration::from_secs(300))
            .await
            .ok();

        Ok(EffectivePermissions { permission_keys: keyset })
    }

    pub async fn check_permission(&self, user_id: &str, resource: &str, action: &str) -> Result<bool, CoreError> {
        Ok(self.get_user_effective_permissions(user_id).await?.allows(resource, action))
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryRoleRepository {
        pub roles: Mutex<Vec<Role>>,
    }

    #[async_trait]
    impl RoleRepository for InMemoryRoleRepository {
        async fn find_by_id(&self, id: &str) -> Result<Option<Role>, CoreError> {
            Ok(self.roles.lock().unwrap().iter().find(|r| r.id == id).cloned())
        }

        async fn find_by_name(&self, name: &str, organization_id: Option<&str>) -> Result<Option<Role>, CoreError> {
            Ok(self
                .roles
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.name == name && r.organization_id.as_deref() == organization_id)
                .cloned())
        }

        async fn insert(&self, role: Role) -> Result<(), CoreError> {
            self.roles.lock().unwrap().push(role);
            Ok(())
        }

        async fn update(&self, role: Role) -> Result<(), CoreError> {
            let mut roles = self.roles.lock().unwrap();
            if let Some(existing) = roles.iter_mut().find(|r| r.id == role.id) {
                *existing = role;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryHierarchyRepository {
        pub edges: Mutex<Vec<(String, String, u32)>>,
    }

    #[async_trait]
    impl RoleHierarchyRepository for InMemoryHierarchyRepository {
        async fn ancestors(&self, role_id: &str) -> Result<Vec<(String, u32)>, CoreError> {
            Ok(self
                .edges
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, descendant, _)| descendant == role_id)
                .map(|(ancestor, _, depth)| (ancestor.clone(), *depth))
                .collect())
        }

        async fn path_exists(&self, ancestor: &str, descendant: &str) -> Result<bool, CoreError> {
            Ok(self
                .edges
                .lock()
                .unwrap()
                .iter()
                .any(|(a, d, _)| a == ancestor && d == descendant))
        }

        async fn insert_closure(&self, new_edges: Vec<(String, String, u32)>) -> Result<(), CoreError> {
            self.edges.lock().unwrap().extend(new_edges);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryRolePermissionRepository {
        pub grants: Mutex<std::collections::HashMap<String, Vec<String>>>,
    }

    #[async_trait]
    impl RolePermissionRepository for InMemoryRolePermissionRepository {
        async fn permissions_for_role(&self, role_id: &str) -> Result<Vec<String>, CoreError> {
            Ok(self.grants.lock().unwrap().get(role_id).cloned().unwrap_or_default())
        }

        async fn replace(&self, role_id: &str, permission_ids: Vec<String>) -> Result<(), CoreError> {
            self.grants.lock().unwrap().insert(role_id.to_string(), permission_ids);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryUserRoleRepository {
        pub assignments: Mutex<Vec<UserRole>>,
    }

    #[async_trait]
    impl UserRoleRepository for InMemoryUserRoleRepository {
        async fn active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<UserRole>, CoreError> {
            Ok(self
                .assignments
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.user_id == user_id && a.is_active(now))
                .cloned()
                .collect())
        }

        async fn users_with_role(&self, role_id: &str) -> Result<Vec<String>, CoreError> {
            Ok(self
                .assignments
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.role_id == role_id && a.revoked_at.is_none())
                .map(|a| a.user_id.clone())
                .collect())
        }

        async fn find_active_identical(&self, user_id: &str, role_id: &str, now: DateTime<Utc>) -> Result<Option<UserRole>, CoreError> {
            Ok(self
                .assignments
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.user_id == user_id && a.role_id == role_id && a.is_active(now))
                .cloned())
        }

        async fn insert(&self, assignment: UserRole) -> Result<(), CoreError> {
            self.assignments.lock().unwrap().push(assignment);
            Ok(())
        }

        async fn update(&self, assignment: UserRole) -> Result<(), CoreError> {
            let mut assignments = self.assignments.lock().unwrap();
            if let Some(existing) = assignments.iter_mut().find(|a| a.id == assignment.id) {
                *existing = assignment;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;
    use crate::core::cache::fake::InMemoryFastCache;
    use crate::core::clock::fake::FakeClock;
    use crate::core::permission::fake::{InMemoryPermissionRepository, InMemoryUserPermissionRepository};
    use crate::core::permission::Permission;

    fn service<'a>(
        roles: &'a InMemoryRoleRepository,
        hierarchy: &'a InMemoryHierarchyRepository,
        role_permissions: &'a InMemoryRolePermissionRepository,
        user_roles: &'a InMemoryUserRoleRepository,
        permissions: &'a InMemoryPermissionRepository,
        user_permissions: &'a InMemoryUserPermissionRepository,
        cache: &'a InMemoryFastCache,
        clock: &'a FakeClock,
    ) -> RbacService<'a> {
        RbacService {
            roles,
            hierarchy,
            role_permissions,
            user_roles,
            permissions,
            user_permissions,
            cache,
            clock,
            audit: Arc::new(ResilientAuditSink::new(Arc::new(crate::core::audit::fake::InMemoryAuditSink::default()))),
        }
    }

    #[test]
    fn role_name_validation_rejects_lowercase() {
        assert!(is_valid_role_name("ORG_ADMIN"));
        assert!(!is_valid_role_name("org_admin"));
        assert!(!is_valid_role_name("1ADMIN"));
    }

    #[tokio::test]
    async fn child_role_inherits_parent_permissions() {
        let roles = InMemoryRoleRepository::default();
        let hierarchy = InMemoryHierarchyRepository::default();
        let role_permissions = InMemoryRolePermissionRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let permissions = InMemoryPermissionRepository::default();
        let user_permissions = InMemoryUserPermissionRepository::default();
        let cache = InMemoryFastCache::default();
        let clock = FakeClock::new(Utc::now());
        let now = clock.now();

        permissions.seed(Permission {
            id: "p-reports-read".into(),
            resource: "reports".into(),
            action: "read".into(),
            display_name: "Read reports".into(),
            description: None,
            module: "reports".into(),
            is_active: true,
            created_at: now,
        });
        permissions.seed(Permission {
            id: "p-clients-read".into(),
            resource: "clients".into(),
            action: "read".into(),
            display_name: "Read clients".into(),
            description: None,
            module: "clients".into(),
            is_active: true,
            created_at: now,
        });

        let svc = service(&roles, &hierarchy, &role_permissions, &user_roles, &permissions, &user_permissions, &cache, &clock);

        let parent = svc.create_role("PARENT", "Parent", None, None, None, "admin").await.unwrap();
        role_permissions.replace(&parent.id, vec!["p-reports-read".into()]).await.unwrap();
        let child = svc.create_role("CHILD", "Child", None, Some(&parent.id), None, "admin").await.unwrap();
        role_permissions.replace(&child.id, vec!["p-clients-read".into()]).await.unwrap();

        svc.assign_role("u1", &child.id, "admin", None, None).await.unwrap();

        assert!(svc.check_permission("u1", "clients", "read").await.unwrap());
        assert!(svc.check_permission("u1", "reports", "read").await.unwrap());
    }

    #[tokio::test]
    async fn attaching_a_cyclic_parent_is_rejected() {
        let roles = InMemoryRoleRepository::default();
        let hierarchy = InMemoryHierarchyRepository::default();
        let role_permissions = InMemoryRolePermissionRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let permissions = InMemoryPermissionRepository::default();
        let user_permissions = InMemoryUserPermissionRepository::default();
        let cache = InMemoryFastCache::default();
        let clock = FakeClock::new(Utc::now());

        let svc = service(&roles, &hierarchy, &role_permissions, &user_roles, &permissions, &user_permissions, &cache, &clock);
        let parent = svc.create_role("PARENT", "Parent", None, None, None, "admin").await.unwrap();
        let child = svc.create_role("CHILD", "Child", None, Some(&parent.id), None, "admin").await.unwrap();

        let result = svc.update_role(&parent.id, Some(&child.id), "admin").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn revoking_the_last_active_role_is_rejected() {
        let roles = InMemoryRoleRepository::default();
        let hierarchy = InMemoryHierarchyRepository::default();
        let role_permissions = InMemoryRolePermissionRepository::default();
        let user_roles = InMemoryUserRoleRepository::default();
        let permissions = InMemoryPermissionRepository::default();
        let user_permissions = InMemoryUserPermissionRepository::default();
        let cache = InMemoryFastCache::default();
        let clock = FakeClock::new(Utc::now());

        let svc = service(&roles, &hierarchy, &role_permissions, &user_roles, &permissions, &user_permissions, &cache, &clock);
        let role = svc.create_role("MEMBER", "Member", None, None, None, "admin").await.unwrap();
        svc.assign_role("u1", &role.id, "admin", None, None).await.unwrap();

        let result = svc.revoke_role("u1", &role.id, "admin", "no longer needed").await;
        assert!(result.is_err());
    }
}
