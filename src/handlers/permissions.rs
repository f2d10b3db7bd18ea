//! Permission management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewPermission, Permission},
    pagination::{PaginationMeta, PaginationParams},
    schema::permissions,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionRequest {
    #[schema(example = "view_reports")]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionsListResponse {
    pub data: Vec<Permission>,
    pub pagination: PaginationMeta,
}

#[utoipa::path(
    get,
    path = "/permissions",
    tag = "Permissions",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated list of permissions", body = PermissionsListResponse),
        (status = 403, description = "Missing view_permissions permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<PermissionsListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = permissions::table
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = pagination.limit_offset();
    let data: Vec<Permission> = permissions::table
        .order(permissions::name.asc())
        .limit(limit)
        .offset(offset)
        .select(Permission::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(PermissionsListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    post,
    path = "/permissions",
    tag = "Permissions",
    request_body = PermissionRequest,
    responses(
        (status = 201, description = "Permission created", body = Permission),
        (status = 400, description = "Permission already exists", body = ApiError),
        (status = 403, description = "Missing manage_permissions permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_permission(
    State(state): State<AppState>,
    Json(payload): Json<PermissionRequest>,
) -> ApiResult<(StatusCode, Json<Permission>)> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let permission: Permission = diesel::insert_into(permissions::table)
        .values(&NewPermission {
            name: payload.name.clone(),
        })
        .returning(Permission::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            warn!(error = %e, name = %payload.name, "Failed to create permission");
            ApiError::conflict("Permission already exists", "PERMISSION_EXISTS")
        })?;

    info!(permission_id = %permission.id, name = %permission.name, "Created permission");
    Ok((StatusCode::CREATED, Json(permission)))
}

#[utoipa::path(
    put,
    path = "/permissions/{id}",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "Permission ID")),
    request_body = PermissionRequest,
    responses(
        (status = 200, description = "Permission updated", body = Permission),
        (status = 404, description = "Permission not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PermissionRequest>,
) -> ApiResult<Json<Permission>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let permission: Permission = diesel::update(permissions::table.filter(permissions::id.eq(id)))
        .set(permissions::name.eq(payload.name))
        .returning(Permission::as_returning())
        .get_result(&mut conn)
        .map_err(|_| ApiError::not_found("Permission not found", "PERMISSION_NOT_FOUND"))?;

    info!(permission_id = %id, "Updated permission");
    Ok(Json(permission))
}

#[utoipa::path(
    delete,
    path = "/permissions/{id}",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "Permission deleted"),
        (status = 404, description = "Permission not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = diesel::delete(permissions::table.filter(permissions::id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete permission", "DELETE_FAILED"))?;

    if deleted == 0 {
        return Err(ApiError::not_found(
            "Permission not found",
            "PERMISSION_NOT_FOUND",
        ));
    }

    info!(permission_id = %id, "Deleted permission");
    Ok(Json(serde_json::json!({"message": "Permission deleted"})))
}
