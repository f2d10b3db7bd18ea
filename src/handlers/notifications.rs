//! Notification handlers.

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    middleware::auth::CurrentUser,
    models::Notification,
    notify::Emitter,
    schema::notifications,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNotificationRequest {
    #[schema(example = "approved")]
    pub status_label: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "Notifications",
    responses(
        (status = 200, description = "Notifications for the authenticated user", body = [Notification]),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_my_notifications(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Notification>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let data: Vec<Notification> = notifications::table
        .filter(notifications::user_id.eq(current.user.id))
        .order(notifications::created_at.desc())
        .select(Notification::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(data))
}

#[utoipa::path(
    put,
    path = "/notifications/mark-as-read",
    tag = "Notifications",
    responses(
        (status = 200, description = "Unread notifications marked as read"),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_notifications_as_read(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let updated = diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(current.user.id))
            .filter(notifications::read.eq(false)),
    )
    .set(notifications::read.eq(true))
    .execute(&mut conn)
    .map_err(|_| ApiError::db_error())?;

    info!(user_id = %current.user.id, count = updated, "Marked notifications as read");
    Ok(Json(
        serde_json::json!({"message": "Notifications marked as read"}),
    ))
}

#[utoipa::path(
    post,
    path = "/api/notifications",
    tag = "Notifications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Json(payload): Json<CreateNotificationRequest>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let notification = Emitter::notify(
        &mut conn,
        &payload.status_label,
        payload.user_id,
        &payload.message,
    )
    .map_err(|_| ApiError::internal("Failed to create notification", "NOTIFICATION_FAILED"))?;

    Ok((StatusCode::CREATED, Json(notification)))
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    responses(
        (status = 200, description = "All notifications", body = [Notification]),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Notification>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let data: Vec<Notification> = notifications::table
        .order(notifications::created_at.desc())
        .select(Notification::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(data))
}
