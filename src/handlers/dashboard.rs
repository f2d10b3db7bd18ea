//! Dashboard handler.

use axum::{Extension, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::ApiResult,
    middleware::auth::CurrentUser,
    models::{Role, User},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub user: User,
    pub roles: Vec<Role>,
}

/// Returns the authenticated user together with their roles.
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Authenticated user and roles", body = DashboardResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_dashboard(
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<DashboardResponse>> {
    Ok(Json(DashboardResponse {
        user: current.user,
        roles: current.roles,
    }))
}
