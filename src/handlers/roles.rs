//! Role management handlers.
//!
//! A role is a named bundle of permissions; responses always carry the
//! resolved permission objects so the admin UI never has to chase ids.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewRole, NewRolePermission, Permission, Role},
    pagination::{PaginationMeta, PaginationParams},
    schema::{permissions, role_permissions, roles},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    #[schema(example = "supervisor")]
    pub name: String,
    /// Permission ids granted to the role; may be empty.
    #[serde(default)]
    pub permissions: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    /// When present, replaces the role's permission set.
    pub permissions: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RolesListResponse {
    pub data: Vec<RoleResponse>,
    pub pagination: PaginationMeta,
}

fn attach_permissions(
    conn: &mut PgConnection,
    role_list: Vec<Role>,
) -> Result<Vec<RoleResponse>, diesel::result::Error> {
    let role_ids: Vec<Uuid> = role_list.iter().map(|r| r.id).collect();

    let rows: Vec<(Uuid, Permission)> = role_permissions::table
        .inner_join(permissions::table)
        .filter(role_permissions::role_id.eq_any(&role_ids))
        .select((role_permissions::role_id, Permission::as_select()))
        .load(conn)?;

    let mut by_role: HashMap<Uuid, Vec<Permission>> = HashMap::new();
    for (role_id, permission) in rows {
        by_role.entry(role_id).or_default().push(permission);
    }

    Ok(role_list
        .into_iter()
        .map(|role| {
            let permissions = by_role.remove(&role.id).unwrap_or_default();
            RoleResponse {
                id: role.id,
                name: role.name,
                created_at: role.created_at,
                permissions,
            }
        })
        .collect())
}

fn assert_permissions_exist(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> Result<(), (axum::http::StatusCode, Json<ApiError>)> {
    if ids.is_empty() {
        return Ok(());
    }

    let found: i64 = permissions::table
        .filter(permissions::id.eq_any(ids))
        .count()
        .get_result(conn)
        .map_err(|_| ApiError::db_error())?;

    if found as usize != ids.len() {
        return Err(ApiError::bad_request(
            "One or more permission ids do not exist",
            "UNKNOWN_PERMISSION",
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/roles",
    tag = "Roles",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated list of roles", body = RolesListResponse),
        (status = 403, description = "Missing view_roles permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_roles(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<RolesListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = roles::table
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = pagination.limit_offset();
    let role_list: Vec<Role> = roles::table
        .order(roles::name.asc())
        .limit(limit)
        .offset(offset)
        .select(Role::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let data = attach_permissions(&mut conn, role_list).map_err(|_| ApiError::db_error())?;

    Ok(Json(RolesListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    post,
    path = "/roles",
    tag = "Roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 400, description = "Unknown permission id", body = ApiError),
        (status = 403, description = "Missing manage_roles permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let mut conn = get_db_conn(&state.db_pool)?;

    assert_permissions_exist(&mut conn, &payload.permissions)?;

    let role: Role = diesel::insert_into(roles::table)
        .values(&NewRole {
            name: payload.name.clone(),
        })
        .returning(Role::as_returning())
        .get_result(&mut conn)
        .map_err(|_| ApiError::internal("Failed to create role", "ROLE_CREATE_FAILED"))?;

    for permission_id in &payload.permissions {
        diesel::insert_into(role_permissions::table)
            .values(&NewRolePermission {
                role_id: role.id,
                permission_id: *permission_id,
            })
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;
    }

    info!(role_id = %role.id, name = %role.name, "Created role");

    let mut data = attach_permissions(&mut conn, vec![role]).map_err(|_| ApiError::db_error())?;
    Ok((StatusCode::CREATED, Json(data.remove(0))))
}

#[utoipa::path(
    put,
    path = "/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 404, description = "Role not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let role: Role = roles::table
        .filter(roles::id.eq(id))
        .select(Role::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Role not found", "ROLE_NOT_FOUND"))?;

    let role = if let Some(name) = payload.name {
        diesel::update(roles::table.filter(roles::id.eq(id)))
            .set(roles::name.eq(name))
            .returning(Role::as_returning())
            .get_result(&mut conn)
            .map_err(|_| ApiError::db_error())?
    } else {
        role
    };

    if let Some(permission_ids) = payload.permissions {
        assert_permissions_exist(&mut conn, &permission_ids)?;

        diesel::delete(role_permissions::table.filter(role_permissions::role_id.eq(id)))
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;

        for permission_id in permission_ids {
            diesel::insert_into(role_permissions::table)
                .values(&NewRolePermission {
                    role_id: id,
                    permission_id,
                })
                .on_conflict_do_nothing()
                .execute(&mut conn)
                .map_err(|_| ApiError::db_error())?;
        }
    }

    info!(role_id = %id, "Updated role");

    let mut data = attach_permissions(&mut conn, vec![role]).map_err(|_| ApiError::db_error())?;
    Ok(Json(data.remove(0)))
}

#[utoipa::path(
    delete,
    path = "/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role deleted"),
        (status = 404, description = "Role not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    diesel::delete(role_permissions::table.filter(role_permissions::role_id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let deleted = diesel::delete(roles::table.filter(roles::id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete role", "DELETE_FAILED"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Role not found", "ROLE_NOT_FOUND"));
    }

    info!(role_id = %id, "Deleted role");
    Ok(Json(serde_json::json!({"message": "Role deleted"})))
}
