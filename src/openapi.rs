//! OpenAPI document, served at `/api-docs/openapi.json`.

use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login,
        handlers::auth::forgot_password,
        handlers::auth::check_reset_token,
        handlers::auth::reset_password,
        handlers::health::health_check,
        handlers::dashboard::get_dashboard,
        handlers::civs::list_civs,
        handlers::civs::create_civ,
        handlers::civs::delete_civ,
        handlers::projects::list_projects,
        handlers::projects::get_project,
        handlers::projects::create_project,
        handlers::projects::update_project,
        handlers::projects::delete_project,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::get_user_by_email,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::update_user_roles,
        handlers::users::delete_user,
        handlers::roles::list_roles,
        handlers::roles::create_role,
        handlers::roles::update_role,
        handlers::roles::delete_role,
        handlers::permissions::list_permissions,
        handlers::permissions::create_permission,
        handlers::permissions::update_permission,
        handlers::permissions::delete_permission,
        handlers::activities::list_activities,
        handlers::activities::get_activity,
        handlers::activities::create_activity,
        handlers::activities::update_activity,
        handlers::activities::delete_activity,
        handlers::reports::list_reports,
        handlers::reports::create_report,
        handlers::reports::get_report,
        handlers::reports::update_report,
        handlers::reports::delete_report,
        handlers::reports::approve_report,
        handlers::reports::reject_report,
        handlers::reports::report_pdf,
        handlers::notifications::list_my_notifications,
        handlers::notifications::mark_notifications_as_read,
        handlers::notifications::create_notification,
        handlers::notifications::list_notifications,
        handlers::messages::create_message,
        handlers::messages::list_messages,
        handlers::photos::upload_photo,
        handlers::photos::list_photos_by_civ,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login and password recovery"),
        (name = "Reports", description = "Daily report workflow"),
        (name = "Activities", description = "Daily activity measurements"),
        (name = "CIVs", description = "Construction items"),
        (name = "Roles", description = "Role management"),
        (name = "Permissions", description = "Permission management"),
        (name = "Users", description = "User management"),
        (name = "Notifications", description = "Workflow notifications"),
        (name = "Messages", description = "Report correspondence"),
        (name = "Photos", description = "Site photo gallery"),
        (name = "Projects", description = "Project management"),
        (name = "Dashboard", description = "Authenticated user overview"),
        (name = "Health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert(utoipa::openapi::Components::new());
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn docs_router() -> Router {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
