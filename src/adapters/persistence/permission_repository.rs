//! sqlx-backed `PermissionRepository` and `UserPermissionRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::adapters::persistence::error::map_sqlx_error;
use crate::core::error::CoreError;
use crate::core::permission::{Condition, Permission, PermissionRepository, UserPermission, UserPermissionRepository};

#[derive(FromRow)]
struct PermissionRow {
    id: String,
    resource: String,
    action: String,
    display_name: String,
    description: Option<String>,
    module: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            id: row.id,
            resource: row.resource,
            action: row.action,
            display_name: row.display_name,
            description: row.description,
            module: row.module,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const PERMISSION_COLUMNS: &str = "id, resource, action, display_name, description, module, is_active, created_at";

pub struct SqlPermissionRepository {
    pool: PgPool,
}

impl SqlPermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for SqlPermissionRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Permission>, CoreError> {
        sqlx::query_as::<_, PermissionRow>(&format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(|row| row.map(Permission::from))
            .map_err(|e| map_sqlx_error("permission", e))
    }

    async fn find_by_resource_action(&self, resource: &str, action: &str) -> Result<Option<Permission>, CoreError> {
        sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE resource = $1 AND action = $2"
        ))
        .bind(resource)
        .bind(action)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(Permission::from))
        .map_err(|e| map_sqlx_error("permission", e))
    }

    async fn list(&self, module: Option<&str>, search: Option<&str>, include_inactive: bool) -> Result<Vec<Permission>, CoreError> {
        let like = search.map(|s| format!("%{s}%"));
        sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions \
             WHERE ($1::text IS NULL OR module = $1) \
             AND ($2::boolean OR is_active) \
             AND ($3::text IS NULL OR resource ILIKE $3 OR action ILIKE $3 OR display_name ILIKE $3) \
             ORDER BY module, resource, action"
        ))
        .bind(module)
        .bind(include_inactive)
        .bind(&like)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Permission::from).collect())
        .map_err(|e| map_sqlx_error("permission", e))
    }

    async fn insert(&self, permission: Permission) -> Result<(), CoreError> {
        sqlx::query(&format!(
            "INSERT INTO permissions ({PERMISSION_COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)"
        ))
        .bind(&permission.id)
        .bind(&permission.resource)
        .bind(&permission.action)
        .bind(&permission.display_name)
        .bind(&permission.description)
        .bind(&permission.module)
        .bind(permission.is_active)
        .bind(permission.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("permission", e))?;
        Ok(())
    }

    async fn update(&self, permission: Permission) -> Result<(), CoreError> {
        sqlx::query("UPDATE permissions SET display_name = $1, description = $2, is_active = $3 WHERE id = $4")
            .bind(&permission.display_name)
            .bind(&permission.description)
            .bind(permission.is_active)
            .bind(&permission.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("permission", e))?;
        Ok(())
    }

    async fn is_referenced(&self, permission_id: &str) -> Result<bool, CoreError> {
        let in_roles: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM role_permissions WHERE permission_id = $1")
            .bind(permission_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("permission", e))?;
        if in_roles.is_some() {
            return Ok(true);
        }
        let in_users: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM user_permissions WHERE permission_id = $1")
            .bind(permission_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("permission", e))?;
        Ok(in_users.is_some())
    }
}

#[derive(FromRow)]
struct UserPermissionRow {
    id: String,
    user_id: String,
    permission_id: String,
    is_granted: bool,
    condition_json: Option<String>,
    granted_by: String,
    granted_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<UserPermissionRow> for UserPermission {
    fn from(row: UserPermissionRow) -> Self {
        UserPermission {
            id: row.id,
            user_id: row.user_id,
            permission_id: row.permission_id,
            is_granted: row.is_granted,
            condition: row.condition_json.as_deref().and_then(|s| serde_json::from_str::<Condition>(s).ok()),
            granted_by: row.granted_by,
            granted_at: row.granted_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
        }
    }
}

const USER_PERMISSION_COLUMNS: &str = "id, user_id, permission_id, is_granted, condition_json, granted_by, granted_at, expires_at, revoked_at";

pub struct SqlUserPermissionRepository {
    pool: PgPool,
}

impl SqlUserPermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserPermissionRepository for SqlUserPermissionRepository {
    async fn active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<UserPermission>, CoreError> {
        sqlx::query_as::<_, UserPermissionRow>(&format!(
            "SELECT {USER_PERMISSION_COLUMNS} FROM user_permissions WHERE user_id = $1 AND revoked_at IS NULL \
             AND (expires_at IS NULL OR expires_at > $2)"
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(UserPermission::from).collect())
        .map_err(|e| map_sqlx_error("user permission", e))
    }

    async fn find_active(&self, user_id: &str, permission_id: &str, now: DateTime<Utc>) -> Result<Option<UserPermission>, CoreError> {
        sqlx::query_as::<_, UserPermissionRow>(&format!(
            "SELECT {USER_PERMISSION_COLUMNS} FROM user_permissions WHERE user_id = $1 AND permission_id = $2 \
             AND revoked_at IS NULL AND (expires_at IS NULL OR expires_at > $3)"
        ))
        .bind(user_id)
        .bind(permission_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(UserPermission::from))
        .map_err(|e| map_sqlx_error("user permission", e))
    }

    async fn insert(&self, grant: UserPermission) -> Result<(), CoreError> {
        let condition_json = grant.condition.as_ref().map(|c| serde_json::to_string(c).unwrap_or_default());
        sqlx::query(&format!(
            "INSERT INTO user_permissions ({USER_PERMISSION_COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)"
        ))
        .bind(&grant.id)
        .bind(&grant.user_id)
        .bind(&grant.permission_id)
        .bind(grant.is_granted)
        .bind(&condition_json)
        .bind(&grant.granted_by)
        .bind(grant.granted_at)
        .bind(grant.expires_at)
        .bind(grant.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("user permission", e))?;
        Ok(())
    }

    async fn update(&self, grant: UserPermission) -> Result<(), CoreError> {
        sqlx::query("UPDATE user_permissions SET revoked_at = $1 WHERE id = $2")
            .bind(grant.revoked_at)
            .bind(&grant.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user permission", e))?;
        Ok(())
    }
}
