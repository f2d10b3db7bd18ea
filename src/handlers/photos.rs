//! Photo handlers.
//!
//! Photos are stored both as standalone rows (this module) and embedded on
//! activities; the monthly gallery below reads the activity copies through
//! their owning reports. The two stores are intentionally independent.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewPhoto, Photo},
    schema::{daily_activities, daily_reports, photos, report_activities},
    uploads, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadPhotoRequest {
    pub civ_id: Uuid,
    pub report_id: Option<Uuid>,
    /// Stored file name or data reference.
    pub image: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PhotoQuery {
    pub civ_id: Uuid,
    /// 1-12.
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PhotoEntry {
    pub id: Uuid,
    pub date: NaiveDateTime,
    pub photo: String,
    pub civ_id: Uuid,
}

/// Groups gallery entries under their `YYYY-MM-DD` day key.
fn group_by_date(entries: Vec<PhotoEntry>) -> HashMap<String, Vec<PhotoEntry>> {
    let mut grouped: HashMap<String, Vec<PhotoEntry>> = HashMap::new();
    for entry in entries {
        let key = entry.date.date().format("%Y-%m-%d").to_string();
        grouped.entry(key).or_default().push(entry);
    }
    grouped
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((
        start.and_hms_opt(0, 0, 0)?,
        end.and_hms_opt(0, 0, 0)?,
    ))
}

#[utoipa::path(
    post,
    path = "/photos",
    tag = "Photos",
    request_body = UploadPhotoRequest,
    responses(
        (status = 201, description = "Photo stored", body = Photo),
        (status = 400, description = "Missing image", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_photo(
    State(state): State<AppState>,
    Json(payload): Json<UploadPhotoRequest>,
) -> ApiResult<(StatusCode, Json<Photo>)> {
    if payload.image.trim().is_empty() {
        return Err(ApiError::bad_request("No image provided", "MISSING_IMAGE"));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let photo: Photo = diesel::insert_into(photos::table)
        .values(&NewPhoto {
            civ_id: payload.civ_id,
            report_id: payload.report_id,
            image: payload.image,
            date: Utc::now().naive_utc(),
        })
        .returning(Photo::as_returning())
        .get_result(&mut conn)
        .map_err(|_| ApiError::internal("Failed to store photo", "PHOTO_STORE_FAILED"))?;

    Ok((StatusCode::CREATED, Json(photo)))
}

#[utoipa::path(
    get,
    path = "/photos",
    tag = "Photos",
    params(PhotoQuery),
    responses(
        (status = 200, description = "Activity photos for the CIV and month, grouped by day"),
        (status = 400, description = "Invalid month or year", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_photos_by_civ(
    State(state): State<AppState>,
    Query(query): Query<PhotoQuery>,
) -> ApiResult<Json<HashMap<String, Vec<PhotoEntry>>>> {
    let Some((start, end)) = month_bounds(query.year, query.month) else {
        return Err(ApiError::bad_request(
            "Invalid month or year",
            "INVALID_DATE_RANGE",
        ));
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let reports: Vec<(Uuid, NaiveDateTime)> = daily_reports::table
        .filter(daily_reports::created_at.ge(start))
        .filter(daily_reports::created_at.lt(end))
        .select((daily_reports::id, daily_reports::created_at))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let report_ids: Vec<Uuid> = reports.iter().map(|(id, _)| *id).collect();
    let report_dates: HashMap<Uuid, NaiveDateTime> = reports.into_iter().collect();

    let links: Vec<(Uuid, Uuid)> = report_activities::table
        .filter(report_activities::report_id.eq_any(&report_ids))
        .select((report_activities::activity_id, report_activities::report_id))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let activity_ids: Vec<Uuid> = links.iter().map(|(activity_id, _)| *activity_id).collect();
    let activity_report: HashMap<Uuid, Uuid> = links.into_iter().collect();

    let rows: Vec<(Uuid, Option<String>)> = daily_activities::table
        .filter(daily_activities::civ_id.eq(query.civ_id))
        .filter(daily_activities::id.eq_any(&activity_ids))
        .filter(daily_activities::photo.is_not_null())
        .select((daily_activities::id, daily_activities::photo))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let entries: Vec<PhotoEntry> = rows
        .into_iter()
        .filter_map(|(activity_id, photo)| {
            let photo = photo?;
            let report_id = activity_report.get(&activity_id)?;
            let date = *report_dates.get(report_id)?;
            Some(PhotoEntry {
                id: activity_id,
                date,
                photo: uploads::public_path(&photo),
                civ_id: query.civ_id,
            })
        })
        .collect();

    Ok(Json(group_by_date(entries)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: NaiveDateTime) -> PhotoEntry {
        PhotoEntry {
            id: Uuid::new_v4(),
            date,
            photo: "/uploads/x.jpg".to_string(),
            civ_id: Uuid::new_v4(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_group_by_date_merges_same_day() {
        let grouped = group_by_date(vec![
            entry(at(2024, 1, 3, 8)),
            entry(at(2024, 1, 3, 17)),
            entry(at(2024, 1, 4, 9)),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["2024-01-03"].len(), 2);
        assert_eq!(grouped["2024-01-04"].len(), 1);
    }

    #[test]
    fn test_month_bounds_regular_month() {
        let (start, end) = month_bounds(2024, 3).unwrap();
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(end.date(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    }

    #[test]
    fn test_month_bounds_december_rolls_over() {
        let (start, end) = month_bounds(2024, 12).unwrap();
        assert_eq!(start.date(), NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(end.date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn test_month_bounds_rejects_invalid_month() {
        assert!(month_bounds(2024, 13).is_none());
        assert!(month_bounds(2024, 0).is_none());
    }
}
