//! sqlx-backed `RoleRepository`, `RoleHierarchyRepository`, `RolePermissionRepository`,
//! `UserRoleRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::adapters::persistence::error::map_sqlx_error;
use crate::core::error::CoreError;
use crate::core::rbac::{Role, RoleHierarchyRepository, RolePermissionRepository, RoleRepository, UserRole, UserRoleRepository};

#[derive(FromRow)]
struct RoleRow {
    id: String,
    name: String,
    display_name: String,
    description: Option<String>,
    is_system: bool,
    is_active: bool,
    parent_role_id: Option<String>,
    organization_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            name: row.name,
            display_name: row.display_name,
            description: row.description,
            is_system: row.is_system,
            is_active: row.is_active,
            parent_role_id: row.parent_role_id,
            organization_id: row.organization_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ROLE_COLUMNS: &str = "id, name, display_name, description, is_system, is_active, parent_role_id, organization_id, created_at, updated_at";

pub struct SqlRoleRepository {
    pool: PgPool,
}

impl SqlRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for SqlRoleRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Role>, CoreError> {
        sqlx::query_as::<_, RoleRow>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Role::from))
            .map_err(|e| map_sqlx_error("role", e))
    }

    async fn find_by_name(&self, name: &str, organization_id: Option<&str>) -> Result<Option<Role>, CoreError> {
        sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1 AND organization_id IS NOT DISTINCT FROM $2"
        ))
        .bind(name)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(Role::from))
        .map_err(|e| map_sqlx_error("role", e))
    }

    async fn insert(&self, role: Role) -> Result<(), CoreError> {
        sqlx::query(&format!(
            "INSERT INTO roles ({ROLE_COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)"
        ))
        .bind(&role.id)
        .bind(&role.name)
        .bind(&role.display_name)
        .bind(&role.description)
        .bind(role.is_system)
        .bind(role.is_active)
        .bind(&role.parent_role_id)
        .bind(&role.organization_id)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("role", e))?;
        Ok(())
    }

    async fn update(&self, role: Role) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE roles SET display_name = $1, description = $2, is_active = $3, parent_role_id = $4, updated_at = $5 WHERE id = $6",
        )
        .bind(&role.display_name)
        .bind(&role.description)
        .bind(role.is_active)
        .bind(&role.parent_role_id)
        .bind(role.updated_at)
        .bind(&role.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("role", e))?;
        Ok(())
    }
}

pub struct SqlRoleHierarchyRepository {
    pool: PgPool,
}

impl SqlRoleHierarchyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleHierarchyRepository for SqlRoleHierarchyRepository {
    async fn ancestors(&self, role_id: &str) -> Result<Vec<(String, u32)>, CoreError> {
        let rows: Vec<(String, i32)> = sqlx::query_as(
            "SELECT ancestor_role_id, depth FROM role_hierarchy WHERE descendant_role_id = $1",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("role hierarchy", e))?;
        Ok(rows.into_iter().map(|(id, depth)| (id, depth.max(0) as u32)).collect())
    }

    async fn path_exists(&self, ancestor: &str, descendant: &str) -> Result<bool, CoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM role_hierarchy WHERE ancestor_role_id = $1 AND descendant_role_id = $2",
        )
        .bind(ancestor)
        .bind(descendant)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("role hierarchy", e))?;
        Ok(row.is_some())
    }

    async fn insert_closure(&self, edges: Vec<(String, String, u32)>) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("role hierarchy", e))?;
        for (ancestor, descendant, depth) in edges {
            sqlx::query(
                "INSERT INTO role_hierarchy (ancestor_role_id, descendant_role_id, depth) VALUES ($1, $2, $3) \
                 ON CONFLICT (ancestor_role_id, descendant_role_id) DO NOTHING",
            )
            .bind(&ancestor)
            .bind(&descendant)
            .bind(depth as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("role hierarchy", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("role hierarchy", e))?;
        Ok(())
    }
}

pub struct SqlRolePermissionRepository {
    pool: PgPool,
}

impl SqlRolePermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RolePermissionRepository for SqlRolePermissionRepository {
    async fn permissions_for_role(&self, role_id: &str) -> Result<Vec<String>, CoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT permission_id FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("role permission", e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn replace(&self, role_id: &str, permission_ids: Vec<String>) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("role permission", e))?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("role permission", e))?;
        for permission_id in permission_ids {
            sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)")
                .bind(role_id)
                .bind(&permission_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("role permission", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("role permission", e))?;
        Ok(())
    }
}

#[derive(FromRow)]
struct UserRoleRow {
    id: String,
    user_id: String,
    role_id: String,
    organization_id: Option<String>,
    granted_at: DateTime<Utc>,
    granted_by: String,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<String>,
    reason: Option<String>,
}

impl From<UserRoleRow> for UserRole {
    fn from(row: UserRoleRow) -> Self {
        UserRole {
            id: row.id,
            user_id: row.user_id,
            role_id: row.role_id,
            organization_id: row.organization_id,
            granted_at: row.granted_at,
            granted_by: row.granted_by,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            revoked_by: row.revoked_by,
            reason: row.reason,
        }
    }
}

const USER_ROLE_COLUMNS: &str = "id, user_id, role_id, organization_id, granted_at, granted_by, expires_at, revoked_at, revoked_by, reason";

pub struct SqlUserRoleRepository {
    pool: PgPool,
}

impl SqlUserRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRoleRepository for SqlUserRoleRepository {
    async fn active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<UserRole>, CoreError> {
        sqlx::query_as::<_, UserRoleRow>(&format!(
            "SELECT {USER_ROLE_COLUMNS} FROM user_roles WHERE user_id = $1 AND revoked_at IS NULL AND (expires_at IS NULL OR expires_at > $2)"
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(UserRole::from).collect())
        .map_err(|e| map_sqlx_error("user role", e))
    }

    async fn users_with_role(&self, role_id: &str) -> Result<Vec<String>, CoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT user_id FROM user_roles WHERE role_id = $1 AND revoked_at IS NULL")
            .bind(role_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user role", e))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn find_active_identical(&self, user_id: &str, role_id: &str, now: DateTime<Utc>) -> Result<Option<UserRole>, CoreError> {
        sqlx::query_as::<_, UserRoleRow>(&format!(
            "SELECT {USER_ROLE_COLUMNS} FROM user_roles WHERE user_id = $1 AND role_id = $2 AND revoked_at IS NULL \
             AND (expires_at IS NULL OR expires_at > $3)"
        ))
        .bind(user_id)
        .bind(role_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(UserRole::from))
        .map_err(|e| map_sqlx_error("user role", e))
    }

    async fn insert(&self, assignment: UserRole) -> Result<(), CoreError> {
        sqlx::query(&format!(
            "INSERT INTO user_roles ({USER_ROLE_COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)"
        ))
        .bind(&assignment.id)
        .bind(&assignment.user_id)
        .bind(&assignment.role_id)
        .bind(&assignment.organization_id)
        .bind(assignment.granted_at)
        .bind(&assignment.granted_by)
        .bind(assignment.expires_at)
        .bind(assignment.revoked_at)
        .bind(&assignment.revoked_by)
        .bind(&assignment.reason)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("user role", e))?;
        Ok(())
    }

    async fn update(&self, assignment: UserRole) -> Result<(), CoreError> {
        sqlx::query("UPDATE user_roles SET revoked_at = $1, revoked_by = $2, reason = $3 WHERE id = $4")
            .bind(assignment.revoked_at)
            .bind(&assignment.revoked_by)
            .bind(&assignment.reason)
            .bind(&assignment.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user role", e))?;
        Ok(())
    }
}
