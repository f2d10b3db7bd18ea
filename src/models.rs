use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::roles)]
pub struct Role {
    pub id: Uuid,
    #[schema(example = "supervisor")]
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::roles)]
pub struct NewRole {
    pub name: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::permissions)]
pub struct Permission {
    pub id: Uuid,
    #[schema(example = "view_reports")]
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::permissions)]
pub struct NewPermission {
    pub name: String,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::user_roles)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::user_roles)]
pub struct NewUserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::role_permissions)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::role_permissions)]
pub struct NewRolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::civs)]
pub struct Civ {
    pub id: Uuid,
    #[schema(example = "1024")]
    pub number: String,
    #[schema(example = "Storm drain, northern section")]
    pub description: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::civs)]
pub struct NewCiv {
    pub number: String,
    pub description: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::daily_activities)]
pub struct DailyActivity {
    pub id: Uuid,
    pub civ_id: Uuid,
    pub description: String,
    pub location_start: String,
    pub location_end: String,
    pub item: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub gross_volume: f64,
    pub discount_length: f64,
    pub discount_width: f64,
    pub discount_height: f64,
    pub discount_volume: f64,
    pub net_volume: f64,
    pub photo: Option<String>,
    pub notes: Option<String>,
    pub report_generated: bool,
    pub created_by: Uuid,
    /// Comma-joined role names of the creator, captured at write time.
    pub role_label: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::daily_activities)]
pub struct NewDailyActivity {
    pub civ_id: Uuid,
    pub description: String,
    pub location_start: String,
    pub location_end: String,
    pub item: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub gross_volume: f64,
    pub discount_length: f64,
    pub discount_width: f64,
    pub discount_height: f64,
    pub discount_volume: f64,
    pub net_volume: f64,
    pub photo: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub role_label: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::daily_reports)]
pub struct DailyReport {
    pub id: Uuid,
    pub date: NaiveDate,
    pub summary: String,
    #[schema(example = "pending")]
    pub status: String,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::daily_reports)]
pub struct NewDailyReport {
    pub date: NaiveDate,
    pub summary: String,
    pub status: String,
    pub created_by: Uuid,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::report_activities)]
pub struct ReportActivity {
    pub report_id: Uuid,
    pub activity_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::report_activities)]
pub struct NewReportActivity {
    pub report_id: Uuid,
    pub activity_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::report_comments)]
pub struct ReportComment {
    pub id: Uuid,
    pub report_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::report_comments)]
pub struct NewReportComment {
    pub report_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::notifications)]
pub struct Notification {
    pub id: Uuid,
    #[schema(example = "approved")]
    pub status_label: String,
    pub user_id: Uuid,
    pub message: String,
    pub read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotification {
    pub status_label: String,
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::messages)]
pub struct Message {
    pub id: Uuid,
    pub report_id: Option<Uuid>,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub subject: String,
    pub body: String,
    pub scheduled_at: NaiveDateTime,
    pub document: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::messages)]
pub struct NewMessage {
    pub report_id: Option<Uuid>,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub subject: String,
    pub body: String,
    pub scheduled_at: NaiveDateTime,
    pub document: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::photos)]
pub struct Photo {
    pub id: Uuid,
    pub civ_id: Uuid,
    pub report_id: Option<Uuid>,
    pub image: String,
    pub date: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::photos)]
pub struct NewPhoto {
    pub civ_id: Uuid,
    pub report_id: Option<Uuid>,
    pub image: String,
    pub date: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::projects)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::projects)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
}
