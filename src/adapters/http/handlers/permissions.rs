//! Permission-catalogue and direct-grant handlers (component M). All
//! `/internal` — actor identity is supplied explicitly in the request body,
//! the same convention as `handlers::rbac`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::adapters::http::dto::permissions::{
    AssignPermissionRequest, BulkAssignPermissionsRequest, CheckPermissionResponse, CheckPermissionWithContextRequest, CreatePermissionRequest,
    DeactivatePermissionRequest, ListPermissionsQuery, PermissionResponse, RevokePermissionRequest,
};
use crate::adapters::http::error::{validation_error, HttpError};
use crate::adapters::http::state::AppState;
use crate::core::permission::{EvaluationContext, PermissionService};

fn permission_service(state: &AppState) -> PermissionService<'_> {
    PermissionService {
        permissions: &*state.permissions,
        user_permissions: &*state.user_permissions,
        user_roles: &*state.user_roles,
        hierarchy: &*state.role_hierarchy,
        role_permissions: &*state.role_permissions,
        clock: &*state.clock,
        audit: state.audit.clone(),
    }
}

pub async fn create_permission(
    State(state): State<AppState>,
    Json(request): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<PermissionResponse>), HttpError> {
    request.validate().map_err(validation_error)?;
    let permission = permission_service(&state)
        .create_permission(&request.resource, &request.action, &request.display_name, &request.module, request.description, &request.actor_id)
        .await?;
    Ok((StatusCode::CREATED, Json(permission.into())))
}

pub async fn deactivate_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<String>,
    Json(request): Json<DeactivatePermissionRequest>,
) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    permission_service(&state).deactivate_permission(&permission_id, &request.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_permissions(
    State(state): State<AppState>,
    Query(query): Query<ListPermissionsQuery>,
) -> Result<Json<Vec<PermissionResponse>>, HttpError> {
    let permissions = permission_service(&state).list_permissions(query.module.as_deref(), query.search.as_deref(), query.include_inactive).await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

pub async fn assign_to_user(State(state): State<AppState>, Json(request): Json<AssignPermissionRequest>) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    permission_service(&state)
        .assign_to_user(&request.user_id, &request.permission_id, request.is_granted, request.condition, &request.granted_by, request.expires_at)
        .await?;
    Ok(StatusCode::CREATED)
}

pub async fn revoke_from_user(State(state): State<AppState>, Json(request): Json<RevokePermissionRequest>) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    permission_service(&state).revoke_from_user(&request.user_id, &request.permission_id, &request.revoked_by).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_assign(State(state): State<AppState>, Json(request): Json<BulkAssignPermissionsRequest>) -> Result<StatusCode, HttpError> {
    request.validate().map_err(validation_error)?;
    permission_service(&state).bulk_assign(&request.user_id, &request.permission_ids, &request.granted_by).await?;
    Ok(StatusCode::CREATED)
}

pub async fn check_permission_with_context(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<CheckPermissionWithContextRequest>,
) -> Result<Json<CheckPermissionResponse>, HttpError> {
    request.validate().map_err(validation_error)?;
    let ctx = EvaluationContext {
        caller_organization_id: request.caller_organization_id,
        resource_organization_id: request.resource_organization_id,
    };
    let (allowed, reason) = permission_service(&state).check_permission_with_context(&user_id, &request.resource, &request.action, &ctx).await?;
    Ok(Json(CheckPermissionResponse { allowed, reason }))
}
