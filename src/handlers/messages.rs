//! Message handlers.

use std::collections::HashMap;

use axum::{extract::State, Extension, Json};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{get_db_conn, ApiError, ApiResult},
    middleware::auth::CurrentUser,
    models::Message,
    notify::Emitter,
    schema::{messages, users},
    AppState,
};

/// Key used for messages that are not correlated to any report.
const UNASSIGNED_GROUP: &str = "unassigned";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMessageRequest {
    pub report_id: Option<Uuid>,
    pub recipient_id: Uuid,
    #[schema(example = "Daily report question")]
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub report_id: Option<Uuid>,
    pub sender_id: Uuid,
    pub sender_name: Option<String>,
    pub recipient_id: Uuid,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub scheduled_at: NaiveDateTime,
    pub document: String,
}

fn to_response(message: Message, names: &HashMap<Uuid, String>) -> MessageResponse {
    MessageResponse {
        id: message.id,
        report_id: message.report_id,
        sender_name: names.get(&message.sender_id).cloned(),
        sender_id: message.sender_id,
        recipient_name: names.get(&message.recipient_id).cloned(),
        recipient_id: message.recipient_id,
        subject: message.subject,
        body: message.body,
        scheduled_at: message.scheduled_at,
        document: message.document,
    }
}

/// Groups messages under their report id (or [`UNASSIGNED_GROUP`]),
/// preserving the incoming order within each group.
fn group_by_report(data: Vec<MessageResponse>) -> HashMap<String, Vec<MessageResponse>> {
    let mut grouped: HashMap<String, Vec<MessageResponse>> = HashMap::new();
    for message in data {
        let key = message
            .report_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| UNASSIGNED_GROUP.to_string());
        grouped.entry(key).or_default().push(message);
    }
    grouped
}

#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "Messages",
    request_body = CreateMessageRequest,
    responses(
        (status = 200, description = "Message created", body = Message),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_message(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CreateMessageRequest>,
) -> ApiResult<Json<Message>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let message = Emitter::message(
        &mut conn,
        payload.report_id,
        current.user.id,
        payload.recipient_id,
        &payload.subject,
        &payload.body,
    )
    .map_err(|_| ApiError::internal("Failed to create message", "MESSAGE_FAILED"))?;

    Ok(Json(message))
}

#[utoipa::path(
    get,
    path = "/api/messages",
    tag = "Messages",
    responses(
        (status = 200, description = "Messages grouped by report id, newest first"),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
) -> ApiResult<Json<HashMap<String, Vec<MessageResponse>>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let data: Vec<Message> = messages::table
        .order(messages::scheduled_at.desc())
        .select(Message::as_select())
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let mut user_ids: Vec<Uuid> = data
        .iter()
        .flat_map(|m| [m.sender_id, m.recipient_id])
        .collect();
    user_ids.sort();
    user_ids.dedup();

    let names: HashMap<Uuid, String> = users::table
        .filter(users::id.eq_any(&user_ids))
        .select((users::id, users::name))
        .load::<(Uuid, String)>(&mut conn)
        .map_err(|_| ApiError::db_error())?
        .into_iter()
        .collect();

    let responses = data
        .into_iter()
        .map(|m| to_response(m, &names))
        .collect::<Vec<_>>();

    Ok(Json(group_by_report(responses)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(report_id: Option<Uuid>) -> MessageResponse {
        MessageResponse {
            id: Uuid::new_v4(),
            report_id,
            sender_id: Uuid::new_v4(),
            sender_name: None,
            recipient_id: Uuid::new_v4(),
            recipient_name: None,
            subject: "s".to_string(),
            body: "b".to_string(),
            scheduled_at: NaiveDateTime::default(),
            document: String::new(),
        }
    }

    #[test]
    fn test_group_by_report_buckets_by_id() {
        let report_a = Uuid::new_v4();
        let report_b = Uuid::new_v4();

        let grouped = group_by_report(vec![
            message(Some(report_a)),
            message(Some(report_b)),
            message(Some(report_a)),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&report_a.to_string()].len(), 2);
        assert_eq!(grouped[&report_b.to_string()].len(), 1);
    }

    #[test]
    fn test_group_by_report_collects_uncorrelated_messages() {
        let grouped = group_by_report(vec![message(None), message(None)]);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[UNASSIGNED_GROUP].len(), 2);
    }

    #[test]
    fn test_group_by_report_preserves_order_within_group() {
        let report = Uuid::new_v4();
        let first = message(Some(report));
        let second = message(Some(report));
        let first_id = first.id;

        let grouped = group_by_report(vec![first, second]);
        assert_eq!(grouped[&report.to_string()][0].id, first_id);
    }
}
