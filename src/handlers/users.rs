//! User management handlers.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::password::PasswordService,
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewUser, NewUserRole, Role, User},
    pagination::{PaginationMeta, PaginationParams},
    schema::{roles, user_roles, users},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "Ana Torres")]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ana@example.com")]
    pub email: String,
    pub password: String,
    /// Role ids assigned to the user.
    #[serde(default)]
    pub roles: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub roles: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRolesRequest {
    pub roles: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsersListResponse {
    pub data: Vec<UserResponse>,
    pub pagination: PaginationMeta,
}

fn attach_roles(
    conn: &mut PgConnection,
    user_list: Vec<User>,
) -> Result<Vec<UserResponse>, diesel::result::Error> {
    let user_ids: Vec<Uuid> = user_list.iter().map(|u| u.id).collect();

    let rows: Vec<(Uuid, Role)> = user_roles::table
        .inner_join(roles::table)
        .filter(user_roles::user_id.eq_any(&user_ids))
        .select((user_roles::user_id, Role::as_select()))
        .load(conn)?;

    let mut by_user: HashMap<Uuid, Vec<Role>> = HashMap::new();
    for (user_id, role) in rows {
        by_user.entry(user_id).or_default().push(role);
    }

    Ok(user_list
        .into_iter()
        .map(|user| {
            let roles = by_user.remove(&user.id).unwrap_or_default();
            UserResponse {
                id: user.id,
                name: user.name,
                email: user.email,
                created_at: user.created_at,
                roles,
            }
        })
        .collect())
}

fn assert_roles_exist(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> Result<(), (axum::http::StatusCode, Json<ApiError>)> {
    if ids.is_empty() {
        return Ok(());
    }

    let found: i64 = roles::table
        .filter(roles::id.eq_any(ids))
        .count()
        .get_result(conn)
        .map_err(|_| ApiError::db_error())?;

    if found as usize != ids.len() {
        return Err(ApiError::bad_request(
            "One or more role ids do not exist",
            "UNKNOWN_ROLE",
        ));
    }
    Ok(())
}

fn replace_user_roles(
    conn: &mut PgConnection,
    user_id: Uuid,
    role_ids: &[Uuid],
) -> Result<(), diesel::result::Error> {
    diesel::delete(user_roles::table.filter(user_roles::user_id.eq(user_id))).execute(conn)?;

    for role_id in role_ids {
        diesel::insert_into(user_roles::table)
            .values(&NewUserRole {
                user_id,
                role_id: *role_id,
            })
            .on_conflict_do_nothing()
            .execute(conn)?;
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated list of users with roles", body = UsersListResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<UsersListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = users::table
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = pagination.limit_offset();
    let user_list: Vec<User> = users::table
        .order(users::name.asc())
        .limit(limit)
        .offset(offset)
        .select(User::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let data = attach_roles(&mut conn, user_list).map_err(|_| ApiError::db_error())?;

    Ok(Json(UsersListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User with roles", body = UserResponse),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::id.eq(id))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    let mut data = attach_roles(&mut conn, vec![user]).map_err(|_| ApiError::db_error())?;
    Ok(Json(data.remove(0)))
}

#[utoipa::path(
    get,
    path = "/users/email/{email}",
    tag = "Users",
    params(("email" = String, Path, description = "User email")),
    responses(
        (status = 200, description = "User with roles", body = UserResponse),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::email.eq(email.to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    let mut data = attach_roles(&mut conn, vec![user]).map_err(|_| ApiError::db_error())?;
    Ok(Json(data.remove(0)))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Duplicate email or weak password", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(
            e.to_string(),
            "PASSWORD_POLICY_VIOLATION",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let email = payload.email.to_lowercase();
    let exists: i64 = users::table
        .filter(users::email.eq(&email))
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    if exists > 0 {
        warn!(email = %email, "Attempt to create duplicate user");
        return Err(ApiError::conflict("User already exists", "USER_EXISTS"));
    }

    assert_roles_exist(&mut conn, &payload.roles)?;

    let password_hash =
        PasswordService::hash_password_with_cost(&payload.password, state.password_hash_cost)
            .map_err(|e| {
                error!(error = %e, "Password hashing failed");
                ApiError::internal("Failed to process password", "PASSWORD_HASH_ERROR")
            })?;

    let user: User = diesel::insert_into(users::table)
        .values(&NewUser {
            name: payload.name,
            email,
            password_hash,
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            warn!(error = %e, "Failed to create user");
            ApiError::conflict("User already exists", "USER_EXISTS")
        })?;

    replace_user_roles(&mut conn, user.id, &payload.roles).map_err(|_| ApiError::db_error())?;

    info!(user_id = %user.id, email = %user.email, "Created user");

    let mut data = attach_roles(&mut conn, vec![user]).map_err(|_| ApiError::db_error())?;
    Ok((StatusCode::CREATED, Json(data.remove(0))))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Weak password or unknown role", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::id.eq(id))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    let now = Utc::now().naive_utc();

    if let Some(name) = payload.name {
        diesel::update(users::table.filter(users::id.eq(id)))
            .set((users::name.eq(name), users::updated_at.eq(now)))
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;
    }

    if let Some(email) = payload.email {
        diesel::update(users::table.filter(users::id.eq(id)))
            .set((users::email.eq(email.to_lowercase()), users::updated_at.eq(now)))
            .execute(&mut conn)
            .map_err(|e| {
                warn!(error = %e, user_id = %id, "Failed to update email");
                ApiError::conflict("User already exists", "USER_EXISTS")
            })?;
    }

    if let Some(password) = payload.password {
        if let Err(e) = state.password_policy.validate(&password) {
            return Err(ApiError::bad_request(
                e.to_string(),
                "PASSWORD_POLICY_VIOLATION",
            ));
        }

        let password_hash =
            PasswordService::hash_password_with_cost(&password, state.password_hash_cost)
                .map_err(|e| {
                    error!(error = %e, "Password hashing failed");
                    ApiError::internal("Failed to process password", "PASSWORD_HASH_ERROR")
                })?;

        diesel::update(users::table.filter(users::id.eq(id)))
            .set((users::password_hash.eq(password_hash), users::updated_at.eq(now)))
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;
    }

    if let Some(role_ids) = payload.roles {
        assert_roles_exist(&mut conn, &role_ids)?;
        replace_user_roles(&mut conn, id, &role_ids).map_err(|_| ApiError::db_error())?;
    }

    info!(user_id = %id, "Updated user");

    let user: User = users::table
        .filter(users::id.eq(user.id))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let mut data = attach_roles(&mut conn, vec![user]).map_err(|_| ApiError::db_error())?;
    Ok(Json(data.remove(0)))
}

#[utoipa::path(
    put,
    path = "/users/{id}/roles",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRolesRequest,
    responses(
        (status = 200, description = "Roles replaced", body = UserResponse),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user_roles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRolesRequest>,
) -> ApiResult<Json<UserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::id.eq(id))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    assert_roles_exist(&mut conn, &payload.roles)?;
    replace_user_roles(&mut conn, id, &payload.roles).map_err(|_| ApiError::db_error())?;

    info!(user_id = %id, role_count = payload.roles.len(), "Replaced user roles");

    let mut data = attach_roles(&mut conn, vec![user]).map_err(|_| ApiError::db_error())?;
    Ok(Json(data.remove(0)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    diesel::delete(user_roles::table.filter(user_roles::user_id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let deleted = diesel::delete(users::table.filter(users::id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete user", "DELETE_FAILED"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("User not found", "USER_NOT_FOUND"));
    }

    info!(user_id = %id, "Deleted user");
    Ok(Json(serde_json::json!({"message": "User deleted"})))
}
