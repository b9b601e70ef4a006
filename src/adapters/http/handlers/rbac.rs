//! RBAC handlers (component K): role CRUD and assignment are `/internal`
//! (actor supplied explicitly by the calling admin tool); effective-permission
//! lookups are `/public` self-service against the caller's own access claims.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use validator::Validate;

use crate::adapters::http::dto::rbac::{
    AssignRoleRequest, CheckPermissionRequest, CheckPermissionResponse, CreateRoleRequest, DeleteRoleRequest, EffectivePermissionsResponse,
    RevokeRoleRequest, RoleResponse, UpdateRolePermissionsRequest, UpdateRoleRequest,
};
use crate::adapters::http::error::{validation_error, HttpError};
use crate::adapters::http::handlers::authenticated_claims;
use crate::adapters::http::middleware::BearerToken;
use crate::adapters::http::state::AppState;
use crate::core::rbac::RbacService;

fn rbac_service(state: &AppState) -> RbacService<'_> {
    RbacService {
        roles: &*state.roles,
        hierarchy: &*state.role_hierarchy,
        role_permissions: &*state.role_permissions,
        user_roles: &*state.user_roles,
        permissions: &*state.permissions,
        user_permissions: &*state.user_permissions,
        cache: &*state.cache,
        clock: &*state.clock,
        audit: state.audit.clone(),
    }
}

pub async fn create_role(State(state): State<AppState>, Json(request): Json<CreateRoleRequest>) -> Result<(StatusCode, Json<RoleResponse>), HttpError> {
    request.validate().map_err(validation_error)?;
    let role = rbac_service(&state)
        .create_role(
            &request.name,
            &request.display_name,
            request.description,
            request.parent_role_id.as_deref(),
            request.organization_id.as_deref(),
            &request.actor_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(role.into())))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    rbac_service(&state).update_role(&role_id, request.new_parent_role_id.as_deref(), &request.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(request): Json<DeleteRoleRequest>,
) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    rbac_service(&state).delete_role(&role_id, &request.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(request): Json<UpdateRolePermissionsRequest>,
) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    rbac_service(&state).update_role_permissions(&role_id, request.permission_ids, &request.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_role(State(state): State<AppState>, Json(request): Json<AssignRoleRequest>) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    rbac_service(&state)
        .assign_role(&request.user_id, &request.role_id, &request.granted_by, request.expires_at, request.reason)
        .await?;
    Ok(StatusCode::CREATED)
}

pub async fn revoke_role(State(state): State<AppState>, Json(request): Json<RevokeRoleRequest>) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    rbac_service(&state).revoke_role(&request.user_id, &request.role_id, &request.revoked_by, &request.reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_effective_permissions(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
) -> Result<Json<EffectivePermissionsResponse>, HttpError> {
    let claims = authenticated_claims(&state, &token)?;
    let effective = rbac_service(&state).get_user_effective_permissions(&claims.sub).await?;
    Ok(Json(effective.into()))
}

pub async fn check_my_permission(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Json(request): Json<CheckPermissionRequest>,
) -> Result<Json<CheckPermissionResponse>, HttpError> {
    request.validate().map_err(validation_error)?;
    let claims = authenticated_claims(&state, &token)?;
    let allowed = rbac_service(&state).check_permission(&claims.sub, &request.resource, &request.action).await?;
    Ok(Json(CheckPermissionResponse { allowed }))
}
