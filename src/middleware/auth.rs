//! Authentication middleware.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use diesel::prelude::*;
use serde_json::json;
use uuid::Uuid;

use crate::{
    models::{Role, User},
    schema::{roles, user_roles, users},
    AppState,
};

/// The authenticated actor, resolved from the token subject on every
/// request so role changes take effect immediately.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub roles: Vec<Role>,
}

impl CurrentUser {
    /// Comma-joined role names, the denormalized label stamped onto
    /// activities at creation time.
    pub fn role_label(&self) -> String {
        self.roles
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn role_ids(&self) -> Vec<Uuid> {
        self.roles.iter().map(|r| r.id).collect()
    }
}

fn unauthorized(message: &str, code: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": message, "code": code})),
    )
        .into_response()
}

/// Pulls the bearer token from the `token` cookie or the `Authorization`
/// header, in that order.
fn extract_token(req: &Request) -> Option<String> {
    if let Some(cookie_header) = req.headers().get(header::COOKIE) {
        if let Ok(cookies) = cookie_header.to_str() {
            for cookie in cookies.split(';') {
                if let Some(value) = cookie.trim().strip_prefix("token=") {
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

/// Validates the signed token and resolves the subject to a full user with
/// roles loaded, stored in request extensions as [`CurrentUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token(&req)
        .ok_or_else(|| unauthorized("Access denied. No token provided.", "MISSING_TOKEN"))?;

    let claims = state
        .jwt_config
        .verify_token(&token)
        .map_err(|_| unauthorized("Invalid token.", "INVALID_TOKEN"))?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| unauthorized("Invalid token.", "INVALID_TOKEN"))?;

    let mut conn = state.db_pool.get().map_err(|e| {
        tracing::error!(error = %e, "Database connection error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Database connection error", "code": "DB_CONNECTION_ERROR"})),
        )
            .into_response()
    })?;

    let user: User = users::table
        .filter(users::id.eq(user_id))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| unauthorized("Invalid token.", "UNKNOWN_USER"))?;

    let user_role_rows: Vec<Role> = user_roles::table
        .inner_join(roles::table)
        .filter(user_roles::user_id.eq(user_id))
        .select(Role::as_select())
        .load(&mut conn)
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "Failed to load user roles");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Database error", "code": "DB_ERROR"})),
            )
                .into_response()
        })?;

    req.extensions_mut().insert(CurrentUser {
        user,
        roles: user_role_rows,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn role(name: &str) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: NaiveDateTime::default(),
        }
    }

    fn user_with_roles(roles: Vec<Role>) -> CurrentUser {
        CurrentUser {
            user: User {
                id: Uuid::new_v4(),
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                password_hash: String::new(),
                reset_token_hash: None,
                reset_token_expires_at: None,
                created_at: NaiveDateTime::default(),
                updated_at: NaiveDateTime::default(),
            },
            roles,
        }
    }

    #[test]
    fn test_role_label_joins_names() {
        let current = user_with_roles(vec![role("inspector"), role("supervisor")]);
        assert_eq!(current.role_label(), "inspector, supervisor");
    }

    #[test]
    fn test_role_label_empty_without_roles() {
        let current = user_with_roles(vec![]);
        assert_eq!(current.role_label(), "");
    }
}
