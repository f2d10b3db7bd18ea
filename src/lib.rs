//! Bitacora - construction-site daily reporting API with role-based access
//! control.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod openapi;
pub mod pagination;
pub mod pdf;
pub mod schema;
pub mod telemetry;
pub mod uploads;
pub mod volume;
pub mod workflow;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};

use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use std::sync::Arc;
use std::time::Duration;

use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use auth::jwt::JwtConfig;
use auth::password::PasswordPolicy;
use mail::Mailer;
use middleware::authorize::perms;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub jwt_config: Arc<JwtConfig>,
    pub password_policy: PasswordPolicy,
    pub password_hash_cost: u32,
    pub reset_token_expiry_mins: i64,
    pub mailer: Option<Arc<Mailer>>,
    pub frontend_url: String,
    pub upload_dir: String,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: &Config) -> Self {
        let jwt_config =
            JwtConfig::from_env(config.jwt.token_expiry_secs, config.jwt.issuer.clone());

        let mailer = config
            .mail
            .clone()
            .map(|mail_config| Arc::new(Mailer::new(mail_config)));

        Self {
            db_pool,
            jwt_config: Arc::new(jwt_config),
            password_policy: PasswordPolicy::new(config.security.min_password_length),
            password_hash_cost: config.security.password_hash_cost,
            reset_token_expiry_mins: config.security.reset_token_expiry_mins,
            mailer,
            frontend_url: config.server.frontend_url.clone(),
            upload_dir: config.uploads.dir.clone(),
        }
    }
}

pub fn create_router(state: AppState, config: &config::Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Explicit permission gate per route; attached below the shared
    // authentication layer.
    let gate = |required: &'static [&'static str]| {
        axum_middleware::from_fn_with_state(
            (state.clone(), required),
            middleware::authorize::permission_gate,
        )
    };

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/auth/login", post(handlers::auth::login))
        .route(
            "/auth/forgot-password",
            post(handlers::auth::forgot_password),
        )
        .route("/auth/reset/{token}", get(handlers::auth::check_reset_token))
        .route("/auth/reset/{token}", post(handlers::auth::reset_password))
        .with_state(state.clone());

    let protected_routes = Router::new()
        // Authenticated, no permission gate.
        .route("/dashboard", get(handlers::dashboard::get_dashboard))
        .route("/civs", get(handlers::civs::list_civs))
        .route("/civs", post(handlers::civs::create_civ))
        .route("/civs/{id}", delete(handlers::civs::delete_civ))
        .route("/projects", get(handlers::projects::list_projects))
        .route("/projects", post(handlers::projects::create_project))
        .route("/projects/{id}", get(handlers::projects::get_project))
        .route("/projects/{id}", put(handlers::projects::update_project))
        .route("/projects/{id}", delete(handlers::projects::delete_project))
        .route("/users", get(handlers::users::list_users))
        .route("/users", post(handlers::users::create_user))
        .route("/users/email/{email}", get(handlers::users::get_user_by_email))
        .route("/users/{id}", get(handlers::users::get_user))
        .route("/users/{id}", put(handlers::users::update_user))
        .route("/users/{id}", delete(handlers::users::delete_user))
        .route("/users/{id}/roles", put(handlers::users::update_user_roles))
        .route(
            "/notifications",
            get(handlers::notifications::list_my_notifications),
        )
        .route(
            "/notifications/mark-as-read",
            put(handlers::notifications::mark_notifications_as_read),
        )
        .route("/api/messages", post(handlers::messages::create_message))
        .route("/api/messages", get(handlers::messages::list_messages))
        .route(
            "/api/notifications",
            post(handlers::notifications::create_notification),
        )
        .route(
            "/api/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route("/photos", get(handlers::photos::list_photos_by_civ))
        .route("/photos", post(handlers::photos::upload_photo))
        // Activity routes, permission-gated per method.
        .route(
            "/activities",
            get(handlers::activities::list_activities).route_layer(gate(perms::VIEW_ACTIVITIES)),
        )
        .route(
            "/activities",
            post(handlers::activities::create_activity)
                .route_layer(gate(perms::CREATE_ACTIVITIES)),
        )
        .route(
            "/activities/{id}",
            get(handlers::activities::get_activity).route_layer(gate(perms::VIEW_ACTIVITIES)),
        )
        .route(
            "/activities/{id}",
            put(handlers::activities::update_activity)
                .route_layer(gate(perms::UPDATE_ACTIVITIES)),
        )
        .route(
            "/activities/{id}",
            delete(handlers::activities::delete_activity)
                .route_layer(gate(perms::DELETE_ACTIVITIES)),
        )
        // Report workflow routes.
        .route(
            "/daily-reports",
            get(handlers::reports::list_reports).route_layer(gate(perms::VIEW_REPORTS)),
        )
        .route(
            "/daily-reports",
            post(handlers::reports::create_report).route_layer(gate(perms::CREATE_REPORTS)),
        )
        .route(
            "/daily-reports/{id}",
            get(handlers::reports::get_report).route_layer(gate(perms::VIEW_REPORTS)),
        )
        .route(
            "/daily-reports/{id}",
            put(handlers::reports::update_report).route_layer(gate(perms::UPDATE_REPORTS)),
        )
        .route(
            "/daily-reports/{id}",
            delete(handlers::reports::delete_report).route_layer(gate(perms::DELETE_REPORTS)),
        )
        .route(
            "/daily-reports/{id}/approve",
            put(handlers::reports::approve_report).route_layer(gate(perms::APPROVE_REPORTS)),
        )
        .route(
            "/daily-reports/{id}/reject",
            put(handlers::reports::reject_report).route_layer(gate(perms::REJECT_REPORTS)),
        )
        .route(
            "/daily-reports/{id}/pdf",
            get(handlers::reports::report_pdf).route_layer(gate(perms::VIEW_REPORTS)),
        )
        // Role and permission administration.
        .route(
            "/roles",
            get(handlers::roles::list_roles).route_layer(gate(perms::VIEW_ROLES)),
        )
        .route(
            "/roles",
            post(handlers::roles::create_role).route_layer(gate(perms::MANAGE_ROLES)),
        )
        .route(
            "/roles/{id}",
            put(handlers::roles::update_role).route_layer(gate(perms::MANAGE_ROLES)),
        )
        .route(
            "/roles/{id}",
            delete(handlers::roles::delete_role).route_layer(gate(perms::MANAGE_ROLES)),
        )
        .route(
            "/permissions",
            get(handlers::permissions::list_permissions)
                .route_layer(gate(perms::VIEW_PERMISSIONS)),
        )
        .route(
            "/permissions",
            post(handlers::permissions::create_permission)
                .route_layer(gate(perms::MANAGE_PERMISSIONS)),
        )
        .route(
            "/permissions/{id}",
            put(handlers::permissions::update_permission)
                .route_layer(gate(perms::MANAGE_PERMISSIONS)),
        )
        .route(
            "/permissions/{id}",
            delete(handlers::permissions::delete_permission)
                .route_layer(gate(perms::MANAGE_PERMISSIONS)),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(openapi::docs_router())
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/uploads", ServeDir::new(config.uploads.dir.clone()))
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(
            middleware::request_id::request_id_middleware,
        ))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found", "code": "NOT_FOUND"})),
    )
}

fn build_cors_layer(config: &config::Config) -> CorsLayer {
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::Method;

    let origins: Vec<_> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(config.cors.allow_credentials)
        .max_age(Duration::from_secs(config.cors.max_age_secs))
}

pub fn create_db_pool(config: &config::Config) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(&config.database.url);
    r2d2::Pool::builder()
        .max_size(config.database.max_connections)
        .min_idle(Some(config.database.min_connections))
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(config.database.idle_timeout_secs)))
        .build(manager)
        .expect("Failed to create database pool")
}

pub fn create_db_pool_with_url(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .max_size(10)
        .min_idle(Some(2))
        .connection_timeout(Duration::from_secs(30))
        .idle_timeout(Some(Duration::from_secs(600)))
        .build(manager)
        .expect("Failed to create database pool")
}

pub fn init_tracing(config: &config::Config) {
    telemetry::init_telemetry(config);
}

pub use config::Config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_build_cors_layer_from_test_config() {
        let config = Config::default_for_testing();
        let _ = build_cors_layer(&config);
    }
}
