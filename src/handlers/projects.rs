//! Project management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    middleware::auth::CurrentUser,
    models::{NewProject, Project},
    pagination::{PaginationMeta, PaginationParams},
    schema::projects,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    #[schema(example = "North access road")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectsListResponse {
    pub data: Vec<Project>,
    pub pagination: PaginationMeta,
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated list of projects", body = ProjectsListResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<ProjectsListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = projects::table
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = pagination.limit_offset();
    let data: Vec<Project> = projects::table
        .order(projects::created_at.desc())
        .limit(limit)
        .offset(offset)
        .select(Project::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(ProjectsListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let project: Project = projects::table
        .filter(projects::id.eq(id))
        .select(Project::as_select())
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Project not found", "PROJECT_NOT_FOUND"))?;

    Ok(Json(project))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_project(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let project: Project = diesel::insert_into(projects::table)
        .values(&NewProject {
            name: payload.name,
            description: payload.description,
            created_by: current.user.id,
        })
        .returning(Project::as_returning())
        .get_result(&mut conn)
        .map_err(|_| ApiError::internal("Failed to create project", "PROJECT_CREATE_FAILED"))?;

    info!(project_id = %project.id, name = %project.name, "Created project");
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "No fields to update", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    if payload.name.is_none() && payload.description.is_none() {
        return Err(ApiError::bad_request(
            "At least one field (name or description) must be provided",
            "NO_FIELDS_TO_UPDATE",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let query = diesel::update(projects::table.filter(projects::id.eq(id)));
    let now = chrono::Utc::now().naive_utc();

    let project: Project = match (payload.name, payload.description) {
        (Some(name), Some(desc)) => query
            .set((
                projects::name.eq(name),
                projects::description.eq(desc),
                projects::updated_at.eq(now),
            ))
            .get_result(&mut conn),
        (Some(name), None) => query
            .set((projects::name.eq(name), projects::updated_at.eq(now)))
            .get_result(&mut conn),
        (None, Some(desc)) => query
            .set((projects::description.eq(desc), projects::updated_at.eq(now)))
            .get_result(&mut conn),
        (None, None) => unreachable!(),
    }
    .map_err(|_| ApiError::not_found("Project not found", "PROJECT_NOT_FOUND"))?;

    info!(project_id = %id, "Updated project");
    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project deleted"),
        (status = 404, description = "Project not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = diesel::delete(projects::table.filter(projects::id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete project", "DELETE_FAILED"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Project not found", "PROJECT_NOT_FOUND"));
    }

    info!(project_id = %id, "Deleted project");
    Ok(Json(serde_json::json!({"message": "Project deleted"})))
}
