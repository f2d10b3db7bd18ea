//! Daily report handlers: CRUD plus the approval workflow.
//!
//! Terminal transitions pair the pure guards in [`crate::workflow`] with a
//! conditional write keyed on the expected prior status, so two concurrent
//! approve/reject calls cannot both succeed. The report row is committed
//! before any notification or message is attempted, and every emission sits
//! in its own failure boundary.

use std::collections::HashMap;
use std::path::Path as FsPath;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    handlers::activities::ActivityResponse,
    middleware::auth::CurrentUser,
    models::{
        Civ, DailyActivity, DailyReport, NewDailyReport, NewReportActivity, NewReportComment,
        ReportComment,
    },
    notify::Emitter,
    pagination::{PaginationMeta, PaginationParams},
    pdf,
    schema::{civs, daily_activities, daily_reports, report_activities, report_comments, users},
    workflow::{self, ReportStatus},
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReportRequest {
    #[schema(example = "2024-01-03")]
    pub date: NaiveDate,
    #[serde(default)]
    pub summary: String,
    /// Ordered activity ids bundled into the report.
    #[serde(default)]
    pub activities: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReportRequest {
    pub date: Option<NaiveDate>,
    pub summary: Option<String>,
    /// Setting `pending` on a rejected report is a resubmission.
    pub status: Option<String>,
    pub activities: Option<Vec<Uuid>>,
    /// Appends a threaded comment by the acting user.
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectReportRequest {
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportResponse {
    pub id: Uuid,
    pub date: NaiveDate,
    pub summary: String,
    #[schema(example = "pending")]
    pub status: String,
    pub created_by: Uuid,
    pub created_by_name: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_by_name: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub activities: Vec<ActivityResponse>,
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportsListResponse {
    pub data: Vec<DailyReport>,
    pub pagination: PaginationMeta,
}

fn user_names(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, String>, diesel::result::Error> {
    Ok(users::table
        .filter(users::id.eq_any(ids))
        .select((users::id, users::name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect())
}

/// Loads the activity list (with CIVs), comments and user names for one
/// report row. The joins are explicit at this call site; list endpoints
/// return bare rows and skip the cost entirely.
fn populate_report(
    conn: &mut PgConnection,
    report: DailyReport,
) -> Result<ReportResponse, (StatusCode, Json<ApiError>)> {
    let activity_rows: Vec<(DailyActivity, Civ)> = report_activities::table
        .inner_join(daily_activities::table.inner_join(civs::table))
        .filter(report_activities::report_id.eq(report.id))
        .order(report_activities::position.asc())
        .select((DailyActivity::as_select(), Civ::as_select()))
        .load(conn)
        .map_err(|_| ApiError::db_error())?;

    let comment_rows: Vec<ReportComment> = report_comments::table
        .filter(report_comments::report_id.eq(report.id))
        .order(report_comments::created_at.asc())
        .select(ReportComment::as_select())
        .load(conn)
        .map_err(|_| ApiError::db_error())?;

    let mut ids: Vec<Uuid> = vec![report.created_by];
    ids.extend(report.approved_by);
    ids.extend(comment_rows.iter().map(|c| c.author_id));
    ids.sort();
    ids.dedup();

    let names = user_names(conn, &ids).map_err(|_| ApiError::db_error())?;

    let activities = activity_rows
        .into_iter()
        .map(|(activity, civ)| ActivityResponse::new(activity, Some(civ), None))
        .collect();

    let comments = comment_rows
        .into_iter()
        .map(|c| CommentResponse {
            author_name: names.get(&c.author_id).cloned(),
            id: c.id,
            author_id: c.author_id,
            body: c.body,
            created_at: c.created_at,
        })
        .collect();

    Ok(ReportResponse {
        created_by_name: names.get(&report.created_by).cloned(),
        approved_by_name: report.approved_by.and_then(|id| names.get(&id).cloned()),
        id: report.id,
        date: report.date,
        summary: report.summary,
        status: report.status,
        created_by: report.created_by,
        approved_by: report.approved_by,
        approved_at: report.approved_at,
        rejection_reason: report.rejection_reason,
        created_at: report.created_at,
        updated_at: report.updated_at,
        activities,
        comments,
    })
}

fn load_report(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<DailyReport, (StatusCode, Json<ApiError>)> {
    daily_reports::table
        .filter(daily_reports::id.eq(id))
        .select(DailyReport::as_select())
        .first(conn)
        .optional()
        .map_err(|_| ApiError::db_error())?
        .ok_or_else(|| ApiError::not_found("Report not found", "REPORT_NOT_FOUND"))
}

fn assert_activities_exist(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> Result<(), (StatusCode, Json<ApiError>)> {
    if ids.is_empty() {
        return Ok(());
    }

    let found: i64 = daily_activities::table
        .filter(daily_activities::id.eq_any(ids))
        .count()
        .get_result(conn)
        .map_err(|_| ApiError::db_error())?;

    if found as usize != ids.len() {
        return Err(ApiError::bad_request(
            "One or more activity ids do not exist",
            "UNKNOWN_ACTIVITY",
        ));
    }
    Ok(())
}

fn replace_report_activities(
    conn: &mut PgConnection,
    report_id: Uuid,
    activity_ids: &[Uuid],
) -> Result<(), diesel::result::Error> {
    diesel::delete(report_activities::table.filter(report_activities::report_id.eq(report_id)))
        .execute(conn)?;

    for (position, activity_id) in activity_ids.iter().enumerate() {
        diesel::insert_into(report_activities::table)
            .values(&NewReportActivity {
                report_id,
                activity_id: *activity_id,
                position: position as i32,
            })
            .execute(conn)?;
    }
    Ok(())
}

fn current_status(report: &DailyReport) -> ReportStatus {
    ReportStatus::parse(&report.status).unwrap_or_default()
}

#[utoipa::path(
    get,
    path = "/daily-reports",
    tag = "Reports",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated list of reports", body = ReportsListResponse),
        (status = 403, description = "Missing view_reports permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_reports(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<ReportsListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let total_count: i64 = daily_reports::table
        .count()
        .get_result(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let (limit, offset) = pagination.limit_offset();
    let data: Vec<DailyReport> = daily_reports::table
        .order(daily_reports::date.desc())
        .limit(limit)
        .offset(offset)
        .select(DailyReport::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(ReportsListResponse {
        data,
        pagination: pagination.into_metadata(total_count),
    }))
}

#[utoipa::path(
    post,
    path = "/daily-reports",
    tag = "Reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report created with status pending", body = DailyReport),
        (status = 400, description = "Unknown activity id", body = ApiError),
        (status = 403, description = "Missing create_reports permission", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_report(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<DailyReport>)> {
    let mut conn = get_db_conn(&state.db_pool)?;

    assert_activities_exist(&mut conn, &payload.activities)?;

    let report: DailyReport = diesel::insert_into(daily_reports::table)
        .values(&NewDailyReport {
            date: payload.date,
            summary: payload.summary,
            status: ReportStatus::Pending.as_str().to_string(),
            created_by: current.user.id,
        })
        .returning(DailyReport::as_returning())
        .get_result(&mut conn)
        .map_err(|e| {
            error!(error = %e, "Failed to create report");
            ApiError::internal("Failed to create report", "REPORT_CREATE_FAILED")
        })?;

    replace_report_activities(&mut conn, report.id, &payload.activities)
        .map_err(|_| ApiError::db_error())?;

    info!(report_id = %report.id, date = %report.date, "Created report");
    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/daily-reports/{id}",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report with activities, CIVs and comments", body = ReportResponse),
        (status = 404, description = "Report not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReportResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let report = load_report(&mut conn, id)?;
    Ok(Json(populate_report(&mut conn, report)?))
}

#[utoipa::path(
    put,
    path = "/daily-reports/{id}",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report ID")),
    request_body = UpdateReportRequest,
    responses(
        (status = 200, description = "Report updated; resubmission notifies the prior reviewer", body = ReportResponse),
        (status = 400, description = "Invalid status value", body = ApiError),
        (status = 404, description = "Report not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_report(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let incoming_status = match &payload.status {
        Some(raw) => Some(ReportStatus::parse(raw).ok_or_else(|| {
            ApiError::bad_request("Invalid status value", "VALIDATION_ERROR")
        })?),
        None => None,
    };

    let mut conn = get_db_conn(&state.db_pool)?;
    let report = load_report(&mut conn, id)?;

    // Capture the resubmission signal before the row changes.
    let resubmission = workflow::is_resubmission(current_status(&report), incoming_status);
    let prior_approver = report.approved_by;

    let now = Utc::now().naive_utc();

    if let Some(date) = payload.date {
        diesel::update(daily_reports::table.filter(daily_reports::id.eq(id)))
            .set((daily_reports::date.eq(date), daily_reports::updated_at.eq(now)))
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;
    }

    if let Some(summary) = payload.summary {
        diesel::update(daily_reports::table.filter(daily_reports::id.eq(id)))
            .set((daily_reports::summary.eq(summary), daily_reports::updated_at.eq(now)))
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;
    }

    if let Some(status) = incoming_status {
        diesel::update(daily_reports::table.filter(daily_reports::id.eq(id)))
            .set((
                daily_reports::status.eq(status.as_str()),
                daily_reports::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;
    }

    // A resubmitted report is pending again: the review outcome fields are
    // cleared once the prior reviewer has been captured above.
    if resubmission {
        diesel::update(daily_reports::table.filter(daily_reports::id.eq(id)))
            .set((
                daily_reports::approved_by.eq(None::<Uuid>),
                daily_reports::approved_at.eq(None::<NaiveDateTime>),
                daily_reports::rejection_reason.eq(None::<String>),
                daily_reports::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .map_err(|_| ApiError::db_error())?;
    }

    if let Some(activity_ids) = &payload.activities {
        assert_activities_exist(&mut conn, activity_ids)?;
        replace_report_activities(&mut conn, id, activity_ids)
            .map_err(|_| ApiError::db_error())?;
    }

    if let Some(comment) = payload.comment.as_deref().map(str::trim) {
        if !comment.is_empty() {
            diesel::insert_into(report_comments::table)
                .values(&NewReportComment {
                    report_id: id,
                    author_id: current.user.id,
                    body: comment.to_string(),
                })
                .execute(&mut conn)
                .map_err(|_| ApiError::db_error())?;
        }
    }

    let report = load_report(&mut conn, id)?;

    if resubmission {
        if let Some(reviewer) = prior_approver {
            let notice = workflow::resubmission_notice(report.date);

            if let Err(e) = Emitter::notify(&mut conn, "updated", reviewer, &notice) {
                error!(error = %e, report_id = %id, "Failed to create resubmission notification");
            }

            if let Err(e) = Emitter::message(
                &mut conn,
                Some(id),
                report.created_by,
                reviewer,
                "Report updated",
                &notice,
            ) {
                error!(error = %e, report_id = %id, "Failed to create resubmission message");
            }

            info!(report_id = %id, reviewer = %reviewer, "Report resubmitted for review");
        }
    }

    info!(report_id = %id, "Updated report");
    Ok(Json(populate_report(&mut conn, report)?))
}

#[utoipa::path(
    delete,
    path = "/daily-reports/{id}",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report deleted"),
        (status = 400, description = "Report already approved or rejected", body = ApiError),
        (status = 404, description = "Report not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let report = load_report(&mut conn, id)?;

    workflow::check_delete(current_status(&report))
        .map_err(|e| ApiError::invalid_transition(e.message()))?;

    diesel::delete(report_activities::table.filter(report_activities::report_id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    diesel::delete(report_comments::table.filter(report_comments::report_id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    diesel::delete(daily_reports::table.filter(daily_reports::id.eq(id)))
        .execute(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    info!(report_id = %id, "Deleted report");
    Ok(Json(
        serde_json::json!({"message": "Report deleted successfully"}),
    ))
}

#[utoipa::path(
    put,
    path = "/daily-reports/{id}/approve",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report approved", body = ReportResponse),
        (status = 400, description = "Already processed or lost update race", body = ApiError),
        (status = 403, description = "Missing approve_reports permission", body = ApiError),
        (status = 404, description = "Report not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn approve_report(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReportResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let report = load_report(&mut conn, id)?;

    workflow::check_terminal_transition(current_status(&report))
        .map_err(|e| ApiError::invalid_transition(e.message()))?;

    let now = Utc::now().naive_utc();

    // Conditional write on the expected prior status: the loser of a
    // concurrent race updates zero rows.
    let updated = diesel::update(
        daily_reports::table
            .filter(daily_reports::id.eq(id))
            .filter(daily_reports::status.eq(ReportStatus::Pending.as_str())),
    )
    .set((
        daily_reports::status.eq(ReportStatus::Approved.as_str()),
        daily_reports::approved_by.eq(Some(current.user.id)),
        daily_reports::approved_at.eq(Some(now)),
        daily_reports::updated_at.eq(now),
    ))
    .execute(&mut conn)
    .map_err(|e| {
        error!(error = %e, report_id = %id, "Failed to approve report");
        ApiError::internal("Failed to approve report", "REPORT_UPDATE_FAILED")
    })?;

    if updated == 0 {
        warn!(report_id = %id, "Approve lost a concurrent status race");
        return Err(ApiError::conflict(
            "Report was modified concurrently",
            "CONFLICT",
        ));
    }

    // The transition is committed; a failed notification is logged and
    // swallowed.
    if let Err(e) = Emitter::notify(
        &mut conn,
        "approved",
        report.created_by,
        &workflow::approval_notice(report.date),
    ) {
        error!(error = %e, report_id = %id, "Failed to create approval notification");
    }

    info!(report_id = %id, approver = %current.user.id, "Report approved");

    let report = load_report(&mut conn, id)?;
    Ok(Json(populate_report(&mut conn, report)?))
}

#[utoipa::path(
    put,
    path = "/daily-reports/{id}/reject",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report ID")),
    request_body = RejectReportRequest,
    responses(
        (status = 200, description = "Report rejected", body = ReportResponse),
        (status = 400, description = "Blank reason, already processed or lost update race", body = ApiError),
        (status = 403, description = "Missing reject_reports permission", body = ApiError),
        (status = 404, description = "Report not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn reject_report(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let reason = payload
        .rejection_reason
        .as_deref()
        .and_then(workflow::validate_rejection_reason)
        .ok_or_else(|| {
            ApiError::bad_request("Rejection reason is required", "REJECTION_REASON_REQUIRED")
        })?;

    let mut conn = get_db_conn(&state.db_pool)?;
    let report = load_report(&mut conn, id)?;

    workflow::check_terminal_transition(current_status(&report))
        .map_err(|e| ApiError::invalid_transition(e.message()))?;

    let now = Utc::now().naive_utc();

    let updated = diesel::update(
        daily_reports::table
            .filter(daily_reports::id.eq(id))
            .filter(daily_reports::status.eq(ReportStatus::Pending.as_str())),
    )
    .set((
        daily_reports::status.eq(ReportStatus::Rejected.as_str()),
        daily_reports::approved_by.eq(Some(current.user.id)),
        daily_reports::approved_at.eq(Some(now)),
        daily_reports::rejection_reason.eq(Some(reason.clone())),
        daily_reports::updated_at.eq(now),
    ))
    .execute(&mut conn)
    .map_err(|e| {
        error!(error = %e, report_id = %id, "Failed to reject report");
        ApiError::internal("Failed to reject report", "REPORT_UPDATE_FAILED")
    })?;

    if updated == 0 {
        warn!(report_id = %id, "Reject lost a concurrent status race");
        return Err(ApiError::conflict(
            "Report was modified concurrently",
            "CONFLICT",
        ));
    }

    // Notification and message are independent best-effort follow-ups.
    let notice = workflow::rejection_notice(report.date, &reason);

    if let Err(e) = Emitter::notify(&mut conn, "rejected", report.created_by, &notice) {
        error!(error = %e, report_id = %id, "Failed to create rejection notification");
    }

    if let Err(e) = Emitter::message(
        &mut conn,
        Some(id),
        current.user.id,
        report.created_by,
        "Daily report rejected",
        &notice,
    ) {
        error!(error = %e, report_id = %id, "Failed to create rejection message");
    }

    info!(report_id = %id, reviewer = %current.user.id, "Report rejected");

    let report = load_report(&mut conn, id)?;
    Ok(Json(populate_report(&mut conn, report)?))
}

#[utoipa::path(
    get,
    path = "/daily-reports/{id}/pdf",
    tag = "Reports",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Rendered PDF document"),
        (status = 404, description = "Report not found", body = ApiError),
        (status = 500, description = "Rendering failed", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn report_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let report = load_report(&mut conn, id)?;
    let populated = populate_report(&mut conn, report)?;

    let activities = populated
        .activities
        .iter()
        .map(|entry| pdf::ActivityPage {
            civ_number: entry.civ.as_ref().map(|c| c.number.clone()),
            description: entry.activity.description.clone(),
            location_start: entry.activity.location_start.clone(),
            location_end: entry.activity.location_end.clone(),
            item: entry.activity.item.clone(),
            length: entry.activity.length,
            width: entry.activity.width,
            height: entry.activity.height,
            gross_volume: entry.activity.gross_volume,
            discount_length: entry.activity.discount_length,
            discount_width: entry.activity.discount_width,
            discount_height: entry.activity.discount_height,
            discount_volume: entry.activity.discount_volume,
            net_volume: entry.activity.net_volume,
            notes: entry.activity.notes.clone(),
            photo_path: entry
                .activity
                .photo
                .as_ref()
                .map(|file| FsPath::new(&state.upload_dir).join(file)),
        })
        .collect();

    let document = pdf::ReportPdf {
        date: populated.date,
        status: populated.status.clone(),
        created_by: populated
            .created_by_name
            .clone()
            .unwrap_or_else(|| "N/A".to_string()),
        approved_by: populated.approved_by_name.clone(),
        approved_at: populated.approved_at,
        summary: populated.summary.clone(),
        activities,
    };

    let bytes = pdf::render(&document).map_err(|e| {
        error!(error = %e, report_id = %id, "Failed to render report PDF");
        ApiError::internal("Failed to render report PDF", "PDF_RENDER_FAILED")
    })?;

    let disposition = format!(
        "attachment; filename=daily-report_{}.pdf",
        populated.date.format("%Y-%m-%d")
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
