//! CIV management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    models::{Civ, NewCiv},
    pagination::{PaginationMeta, PaginationParams},
    schema::civs,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCivRequest {
    #[schema(example = "1024")]
    pub number: String,
    #[schema(example = "Storm drain, northern section")]
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CivsListResponse {
    pub data: Vec<Civ>,
    pub pagination: PaginationMeta,
}

#[utoipa::path(
    get,
    path = "/civs",
    tag = "CIVs",
    params(PaginationParams),
    responses(
        (status = 200, description = "CIVs ordered by number", body = CivsListResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_civs(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<CivsListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = civs::table
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = pagination.limit_offset();
    let data: Vec<Civ> = civs::table
        .order(civs::number.asc())
        .limit(limit)
        .offset(offset)
        .select(Civ::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(CivsListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    post,
    path = "/civs",
    tag = "CIVs",
    request_body = CreateCivRequest,
    responses(
        (status = 201, description = "CIV created", body = Civ),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_civ(
    State(state): State<AppState>,
    Json(payload): Json<CreateCivRequest>,
) -> ApiResult<(StatusCode, Json<Civ>)> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let civ: Civ = diesel::insert_into(civs::table)
        .values(&NewCiv {
            number: payload.number,
            description: payload.description,
        })
        .returning(Civ::as_returning())
        .get_result(&mut conn)
        .map_err(|_| ApiError::internal("Failed to create CIV", "CIV_CREATE_FAILED"))?;

    info!(civ_id = %civ.id, number = %civ.number, "Created CIV");
    Ok((StatusCode::CREATED, Json(civ)))
}

#[utoipa::path(
    delete,
    path = "/civs/{id}",
    tag = "CIVs",
    params(("id" = Uuid, Path, description = "CIV ID")),
    responses(
        (status = 200, description = "CIV deleted"),
        (status = 404, description = "CIV not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_civ(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let deleted = diesel::delete(civs::table.filter(civs::id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete CIV", "DELETE_FAILED"))?;

    if deleted == 0 {
        return Err(ApiError::not_found("CIV not found", "CIV_NOT_FOUND"));
    }

    info!(civ_id = %id, "Deleted CIV");
    Ok(Json(serde_json::json!({"message": "CIV deleted"})))
}
