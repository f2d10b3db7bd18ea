//! Permission-based authorization middleware.
//!
//! Each gated route attaches the gate explicitly:
//!
//! ```ignore
//! .route(
//!     "/daily-reports",
//!     post(handlers::reports::create_report).route_layer(
//!         axum::middleware::from_fn_with_state(
//!             (state.clone(), perms::CREATE_REPORTS),
//!             middleware::authorize::permission_gate,
//!         ),
//!     ),
//! )
//! ```
//!
//! The gate resolves the acting user's roles to a flat permission-name set
//! with a single query and grants access when any required permission is
//! present. Nothing is cached: role and permission edits apply on the very
//! next request.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use diesel::prelude::*;
use serde_json::json;

use crate::{
    middleware::auth::CurrentUser,
    schema::{permissions, role_permissions},
    AppState,
};

/// Permission names used by the route table.
pub mod perms {
    pub const VIEW_ACTIVITIES: &[&str] = &["view_activities"];
    pub const CREATE_ACTIVITIES: &[&str] = &["create_activities"];
    pub const UPDATE_ACTIVITIES: &[&str] = &["update_activities"];
    pub const DELETE_ACTIVITIES: &[&str] = &["delete_activities"];
    pub const VIEW_REPORTS: &[&str] = &["view_reports"];
    pub const CREATE_REPORTS: &[&str] = &["create_reports"];
    pub const UPDATE_REPORTS: &[&str] = &["update_reports"];
    pub const DELETE_REPORTS: &[&str] = &["delete_reports"];
    pub const APPROVE_REPORTS: &[&str] = &["approve_reports"];
    pub const REJECT_REPORTS: &[&str] = &["reject_reports"];
    pub const VIEW_ROLES: &[&str] = &["view_roles"];
    pub const MANAGE_ROLES: &[&str] = &["manage_roles"];
    pub const VIEW_PERMISSIONS: &[&str] = &["view_permissions"];
    pub const MANAGE_PERMISSIONS: &[&str] = &["manage_permissions"];
}

/// ANY-of semantics: access is granted when the two sets intersect.
pub fn has_any_permission(user_permissions: &[String], required: &[&str]) -> bool {
    required
        .iter()
        .any(|needed| user_permissions.iter().any(|have| have == needed))
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": message, "code": "FORBIDDEN"})),
    )
        .into_response()
}

/// Route-level gate. Expects [`CurrentUser`] to have been attached by the
/// authentication middleware.
pub async fn permission_gate(
    State((state, required)): State<(AppState, &'static [&'static str])>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(current) = req.extensions().get::<CurrentUser>() else {
        return Err(forbidden("Access denied. No roles provided."));
    };

    let role_ids = current.role_ids();
    if role_ids.is_empty() {
        return Err(forbidden(
            "Access denied. You do not have the required permissions.",
        ));
    }

    let mut conn = state.db_pool.get().map_err(|e| {
        tracing::error!(error = %e, "Database connection error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Database connection error", "code": "DB_CONNECTION_ERROR"})),
        )
            .into_response()
    })?;

    let user_permissions: Vec<String> = role_permissions::table
        .inner_join(permissions::table)
        .filter(role_permissions::role_id.eq_any(&role_ids))
        .select(permissions::name)
        .load(&mut conn)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load role permissions");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Database error", "code": "DB_ERROR"})),
            )
                .into_response()
        })?;

    if !has_any_permission(&user_permissions, required) {
        tracing::warn!(
            user_id = %current.user.id,
            required = ?required,
            "Permission denied"
        );
        return Err(forbidden(
            "Access denied. You do not have the required permissions.",
        ));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_grants_on_intersection() {
        let user = owned(&["view_reports", "create_activities"]);
        assert!(has_any_permission(&user, &["view_reports"]));
        assert!(has_any_permission(&user, &["approve_reports", "view_reports"]));
    }

    #[test]
    fn test_any_of_not_all_of() {
        let user = owned(&["p1"]);
        assert!(has_any_permission(&user, &["p1", "p2"]));
    }

    #[test]
    fn test_denies_without_intersection() {
        let user = owned(&["view_reports"]);
        assert!(!has_any_permission(&user, &["approve_reports"]));
    }

    #[test]
    fn test_empty_user_set_always_denies() {
        assert!(!has_any_permission(&[], &["view_reports"]));
        assert!(!has_any_permission(&[], &[]));
    }

    #[test]
    fn test_empty_required_set_denies() {
        let user = owned(&["view_reports"]);
        assert!(!has_any_permission(&user, &[]));
    }
}
