//! Daily activity handlers.
//!
//! Create and full update recompute the volume totals from the submitted
//! dimensions and stamp the acting user's id and role label. An update whose
//! only field is `report_generated` is a flag flip and touches nothing else.

use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    middleware::auth::CurrentUser,
    models::{Civ, DailyActivity, NewDailyActivity},
    pagination::{PaginationMeta, PaginationParams},
    schema::{civs, daily_activities, users},
    uploads,
    volume::{self, Dimensions},
    AppState,
};

/// Activity fields as they arrive over the wire, from either a JSON body or
/// a multipart form. Everything is optional so the flag-only partial update
/// can be told apart from a full replace.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ActivityInput {
    pub civ_id: Option<Uuid>,
    pub description: Option<String>,
    pub location_start: Option<String>,
    pub location_end: Option<String>,
    pub item: Option<String>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub discount_length: Option<f64>,
    pub discount_width: Option<f64>,
    pub discount_height: Option<f64>,
    pub notes: Option<String>,
    /// Already-stored file name; a multipart `photo` file takes precedence.
    pub photo: Option<String>,
    pub report_generated: Option<bool>,
}

impl ActivityInput {
    /// True when `report_generated` is the only field present.
    fn is_flag_only(&self) -> bool {
        self.report_generated.is_some()
            && self.civ_id.is_none()
            && self.description.is_none()
            && self.location_start.is_none()
            && self.location_end.is_none()
            && self.item.is_none()
            && self.length.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.discount_length.is_none()
            && self.discount_width.is_none()
            && self.discount_height.is_none()
            && self.notes.is_none()
            && self.photo.is_none()
    }
}

/// A fully-specified activity write, validated out of [`ActivityInput`].
#[derive(Debug)]
struct ActivityWrite {
    civ_id: Uuid,
    description: String,
    location_start: String,
    location_end: String,
    item: String,
    measured: Dimensions,
    discounted: Dimensions,
    notes: Option<String>,
    photo: Option<String>,
}

fn require_full(input: ActivityInput) -> Result<ActivityWrite, (StatusCode, Json<ApiError>)> {
    let missing = |field: &str| {
        ApiError::bad_request(
            format!("Missing required activity field: {}", field),
            "VALIDATION_ERROR",
        )
    };

    Ok(ActivityWrite {
        civ_id: input.civ_id.ok_or_else(|| missing("civ_id"))?,
        description: input.description.ok_or_else(|| missing("description"))?,
        location_start: input.location_start.ok_or_else(|| missing("location_start"))?,
        location_end: input.location_end.ok_or_else(|| missing("location_end"))?,
        item: input.item.ok_or_else(|| missing("item"))?,
        measured: Dimensions::new(
            input.length.ok_or_else(|| missing("length"))?,
            input.width.ok_or_else(|| missing("width"))?,
            input.height.ok_or_else(|| missing("height"))?,
        ),
        discounted: Dimensions::new(
            input.discount_length.ok_or_else(|| missing("discount_length"))?,
            input.discount_width.ok_or_else(|| missing("discount_width"))?,
            input.discount_height.ok_or_else(|| missing("discount_height"))?,
        ),
        notes: input.notes,
        photo: input.photo,
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityResponse {
    #[serde(flatten)]
    pub activity: DailyActivity,
    /// Public URL of the stored photo, when present.
    pub photo_url: Option<String>,
    pub civ: Option<Civ>,
    pub created_by_name: Option<String>,
}

impl ActivityResponse {
    pub fn new(activity: DailyActivity, civ: Option<Civ>, created_by_name: Option<String>) -> Self {
        let photo_url = activity.photo.as_deref().map(uploads::public_path);
        Self {
            activity,
            photo_url,
            civ,
            created_by_name,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivitiesListResponse {
    pub data: Vec<ActivityResponse>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityCreatedResponse {
    pub id: Uuid,
}

/// Reads the activity payload from a JSON body or a multipart form; a
/// multipart `photo` file is written to the upload directory.
async fn parse_activity_request(
    state: &AppState,
    req: Request,
) -> Result<ActivityInput, (StatusCode, Json<ApiError>)> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if !is_multipart {
        let Json(input): Json<ActivityInput> = Json::from_request(req, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid body: {}", e), "INVALID_BODY"))?;
        return Ok(input);
    }

    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form: {}", e), "INVALID_BODY"))?;

    let mut input = ActivityInput::default();

    let parse_number = |name: &str, text: String| {
        text.trim().parse::<f64>().map_err(|_| {
            ApiError::bad_request(
                format!("Field '{}' must be a number", name),
                "VALIDATION_ERROR",
            )
        })
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form: {}", e), "INVALID_BODY"))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "photo" && field.file_name().is_some() {
            let original_name = field.file_name().unwrap_or("photo").to_string();
            let data = field.bytes().await.map_err(|e| {
                ApiError::bad_request(format!("Invalid upload: {}", e), "INVALID_BODY")
            })?;

            if data.is_empty() {
                continue;
            }

            let stored = uploads::store_photo(&state.upload_dir, &original_name, &data)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to store uploaded photo");
                    ApiError::internal("Failed to store uploaded photo", "UPLOAD_FAILED")
                })?;
            input.photo = Some(stored);
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid form: {}", e), "INVALID_BODY"))?;

        match name.as_str() {
            "civ_id" => {
                input.civ_id = Some(Uuid::parse_str(text.trim()).map_err(|_| {
                    ApiError::bad_request("Field 'civ_id' must be a UUID", "VALIDATION_ERROR")
                })?)
            }
            "description" => input.description = Some(text),
            "location_start" => input.location_start = Some(text),
            "location_end" => input.location_end = Some(text),
            "item" => input.item = Some(text),
            "length" => input.length = Some(parse_number("length", text)?),
            "width" => input.width = Some(parse_number("width", text)?),
            "height" => input.height = Some(parse_number("height", text)?),
            "discount_length" => {
                input.discount_length = Some(parse_number("discount_length", text)?)
            }
            "discount_width" => input.discount_width = Some(parse_number("discount_width", text)?),
            "discount_height" => {
                input.discount_height = Some(parse_number("discount_height", text)?)
            }
            "notes" => input.notes = Some(text),
            "photo" => {
                if !text.is_empty() {
                    input.photo = Some(text)
                }
            }
            "report_generated" => {
                input.report_generated = Some(text.trim().parse::<bool>().map_err(|_| {
                    ApiError::bad_request(
                        "Field 'report_generated' must be a boolean",
                        "VALIDATION_ERROR",
                    )
                })?)
            }
            _ => {}
        }
    }

    Ok(input)
}

fn assert_civ_exists(
    conn: &mut PgConnection,
    civ_id: Uuid,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    let found: i64 = civs::table
        .filter(civs::id.eq(civ_id))
        .count()
        .get_result(conn)
        .map_err(|_| ApiError::db_error())?;

    if found == 0 {
        return Err(ApiError::bad_request("Unknown CIV", "UNKNOWN_CIV"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/activities",
    tag = "Activities",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated activities with CIV and creator", body = ActivitiesListResponse),
        (status = 403, description = "Missing view_activities permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_activities(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<ActivitiesListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = daily_activities::table
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = pagination.limit_offset();
    let rows: Vec<(DailyActivity, Civ, String)> = daily_activities::table
        .inner_join(civs::table)
        .inner_join(users::table.on(users::id.eq(daily_activities::created_by)))
        .order(daily_activities::created_at.desc())
        .limit(limit)
        .offset(offset)
        .select((DailyActivity::as_select(), Civ::as_select(), users::name))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let data = rows
        .into_iter()
        .map(|(activity, civ, creator)| ActivityResponse::new(activity, Some(civ), Some(creator)))
        .collect();

    Ok(Json(ActivitiesListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    get,
    path = "/activities/{id}",
    tag = "Activities",
    params(("id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity with CIV and creator", body = ActivityResponse),
        (status = 404, description = "Activity not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ActivityResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let (activity, civ, creator): (DailyActivity, Civ, String) = daily_activities::table
        .inner_join(civs::table)
        .inner_join(users::table.on(users::id.eq(daily_activities::created_by)))
        .filter(daily_activities::id.eq(id))
        .select((DailyActivity::as_select(), Civ::as_select(), users::name))
        .first(&mut conn)
        .map_err(|_| ApiError::not_found("Activity not found", "ACTIVITY_NOT_FOUND"))?;

    Ok(Json(ActivityResponse::new(
        activity,
        Some(civ),
        Some(creator),
    )))
}

#[utoipa::path(
    post,
    path = "/activities",
    tag = "Activities",
    request_body(content = ActivityInput, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Activity created", body = ActivityCreatedResponse),
        (status = 400, description = "Missing or invalid fields", body = ApiError),
        (status = 403, description = "Missing create_activities permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_activity(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    req: Request,
) -> ApiResult<(StatusCode, Json<ActivityCreatedResponse>)> {
    let input = parse_activity_request(&state, req).await?;
    let write = require_full(input)?;

    let totals = volume::compute(write.measured, write.discounted);

    let mut conn = get_db_conn(&state.db_pool)?;
    assert_civ_exists(&mut conn, write.civ_id)?;

    let activity: DailyActivity = diesel::insert_into(daily_activities::table)
        .values(&NewDailyActivity {
            civ_id: write.civ_id,
            description: write.description,
            location_start: write.location_start,
            location_end: write.location_end,
            item: write.item,
            length: write.measured.length,
            width: write.measured.width,
            height: write.measured.height,
            gross_volume: totals.gross,
            discount_length: write.discounted.length,
            discount_width: write.discounted.width,
            discount_height: write.discounted.height,
            discount_volume: totals.discount,
            net_volume: totals.net,
            photo: write.photo,
            notes: write.notes,
            created_by: current.user.id,
            role_label: current.role_label(),
        })
        .returning(DailyActivity::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            error!(error = %e, "Failed to create activity");
            ApiError::internal("Failed to create activity", "ACTIVITY_CREATE_FAILED")
        })?;

    info!(activity_id = %activity.id, civ_id = %activity.civ_id, "Created activity");
    Ok((
        StatusCode::CREATED,
        Json(ActivityCreatedResponse { id: activity.id }),
    ))
}

#[utoipa::path(
    put,
    path = "/activities/{id}",
    tag = "Activities",
    params(("id" = Uuid, Path, description = "Activity ID")),
    request_body(content = ActivityInput, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Activity updated", body = DailyActivity),
        (status = 400, description = "Missing or invalid fields", body = ApiError),
        (status = 404, description = "Activity not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_activity(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<DailyActivity>> {
    let input = parse_activity_request(&state, req).await?;
    let mut conn = get_db_conn(&state.db_pool)?;
    let now = Utc::now().naive_utc();

    // Flag-only update: flip report_generated and leave every measurement,
    // computed volume and snapshot untouched.
    if input.is_flag_only() {
        let flag = input.report_generated.unwrap_or_default();
        let activity: DailyActivity =
            diesel::update(daily_activities::table.filter(daily_activities::id.eq(id)))
                .set((
                    daily_activities::report_generated.eq(flag),
                    daily_activities::updated_at.eq(now),
                ))
                .returning(DailyActivity::as_returning())
                .get_result(&mut conn)
                .map_err(|_| ApiError::not_found("Activity not found", "ACTIVITY_NOT_FOUND"))?;

        info!(activity_id = %id, report_generated = flag, "Updated activity flag");
        return Ok(Json(activity));
    }

    let write = require_full(input)?;
    let totals = volume::compute(write.measured, write.discounted);

    assert_civ_exists(&mut conn, write.civ_id)?;

    let activity: DailyActivity =
        diesel::update(daily_activities::table.filter(daily_activities::id.eq(id)))
            .set((
                daily_activities::civ_id.eq(write.civ_id),
                daily_activities::description.eq(write.description),
                daily_activities::location_start.eq(write.location_start),
                daily_activities::location_end.eq(write.location_end),
                daily_activities::item.eq(write.item),
                daily_activities::length.eq(write.measured.length),
                daily_activities::width.eq(write.measured.width),
                daily_activities::height.eq(write.measured.height),
                daily_activities::gross_volume.eq(totals.gross),
                daily_activities::discount_length.eq(write.discounted.length),
                daily_activities::discount_width.eq(write.discounted.width),
                daily_activities::discount_height.eq(write.discounted.height),
                daily_activities::discount_volume.eq(totals.discount),
                daily_activities::net_volume.eq(totals.net),
                daily_activities::photo.eq(write.photo),
                daily_activities::notes.eq(write.notes),
                daily_activities::created_by.eq(current.user.id),
                daily_activities::role_label.eq(current.role_label()),
                daily_activities::updated_at.eq(now),
            ))
            .returning(DailyActivity::as_returning())
            .get_result(&mut conn)
            .map_err(|_| ApiError::not_found("Activity not found", "ACTIVITY_NOT_FOUND"))?;

    info!(activity_id = %id, "Updated activity");
    Ok(Json(activity))
}

#[utoipa::path(
    delete,
    path = "/activities/{id}",
    tag = "Activities",
    params(("id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity deleted"),
        (status = 404, description = "Activity not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_activity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    diesel::delete(
        crate::schema::report_activities::table
            .filter(crate::schema::report_activities::activity_id.eq(id)),
    )
    .execute(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    let deleted = diesel::delete(daily_activities::table.filter(daily_activities::id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::internal("Failed to delete activity", "DELETE_FAILED"))?;

    if deleted == 0 {
        return Err(ApiError::not_found(
            "Activity not found",
            "ACTIVITY_NOT_FOUND",
        ));
    }

    info!(activity_id = %id, "Deleted activity");
    Ok(Json(serde_json::json!({"message": "Activity deleted"})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_input() -> ActivityInput {
        ActivityInput {
            civ_id: Some(Uuid::new_v4()),
            description: Some("Trench excavation".to_string()),
            location_start: Some("K0+100".to_string()),
            location_end: Some("K0+180".to_string()),
            item: Some("2.1".to_string()),
            length: Some(10.0),
            width: Some(2.0),
            height: Some(1.5),
            discount_length: Some(1.0),
            discount_width: Some(1.0),
            discount_height: Some(1.0),
            notes: None,
            photo: None,
            report_generated: None,
        }
    }

    #[test]
    fn test_flag_only_detection() {
        let input = ActivityInput {
            report_generated: Some(true),
            ..Default::default()
        };
        assert!(input.is_flag_only());
    }

    #[test]
    fn test_flag_with_other_fields_is_not_flag_only() {
        let mut input = full_input();
        input.report_generated = Some(true);
        assert!(!input.is_flag_only());
    }

    #[test]
    fn test_empty_input_is_not_flag_only() {
        assert!(!ActivityInput::default().is_flag_only());
    }

    #[test]
    fn test_require_full_accepts_complete_input() {
        let write = require_full(full_input()).expect("complete input should validate");
        assert_eq!(write.measured.length, 10.0);
        assert_eq!(write.discounted.height, 1.0);
    }

    #[test]
    fn test_require_full_rejects_missing_dimension() {
        let mut input = full_input();
        input.height = None;
        let (status, body) = require_full(input).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("height"));
    }
}
