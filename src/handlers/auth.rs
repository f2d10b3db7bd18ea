//! Authentication handlers: login and password recovery.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::password::PasswordService,
    error::{get_db_conn, ApiError, ApiResult},
    models::User,
    schema::{roles, user_roles, users},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "inspector@example.com")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "inspector@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_reset_token() -> String {
    use rand::Rng;
    let bytes: [u8; 20] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::email.eq(payload.email.to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .map_err(|_| {
            warn!(email = %payload.email, "Login attempt for unknown email");
            ApiError::bad_request("Invalid credentials", "INVALID_CREDENTIALS")
        })?;

    let is_valid = PasswordService::verify_password(&payload.password, &user.password_hash)
        .map_err(|e| {
            error!(error = %e, "Password verification error");
            ApiError::internal("Password verification error", "PASSWORD_VERIFY_ERROR")
        })?;

    if !is_valid {
        warn!(user_id = %user.id, "Failed login attempt");
        return Err(ApiError::bad_request(
            "Invalid credentials",
            "INVALID_CREDENTIALS",
        ));
    }

    let role_names: Vec<String> = user_roles::table
        .inner_join(roles::table)
        .filter(user_roles::user_id.eq(user.id))
        .select(roles::name)
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    let token = state
        .jwt_config
        .generate_token(user.id, &user.email, role_names)
        .map_err(|e| {
            error!(error = %e, "Token generation failed");
            ApiError::internal("Token generation failed", "TOKEN_GENERATION_ERROR")
        })?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse { token }))
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    tag = "Authentication",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Recovery email sent", body = MessageResponse),
        (status = 404, description = "Unknown email", body = ApiError),
        (status = 500, description = "Mail not configured or delivery failed", body = ApiError)
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: Option<User> = users::table
        .filter(users::email.eq(payload.email.to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?;

    let Some(user) = user else {
        return Err(ApiError::not_found("User not found", "USER_NOT_FOUND"));
    };

    let token = generate_reset_token();
    let token_hash = hash_token(&token);
    let expires_at =
        (Utc::now() + Duration::minutes(state.reset_token_expiry_mins)).naive_utc();

    diesel::update(users::table.filter(users::id.eq(user.id)))
        .set((
            users::reset_token_hash.eq(Some(token_hash)),
            users::reset_token_expires_at.eq(Some(expires_at)),
        ))
        .execute(&mut conn)
        .map_err(|e| {
            error!(error = %e, "Failed to store reset token");
            ApiError::internal("Failed to initiate password reset", "RESET_TOKEN_ERROR")
        })?;

    let Some(mailer) = &state.mailer else {
        error!("Password recovery requested but SMTP is not configured");
        return Err(ApiError::internal(
            "Mail configuration missing",
            "MAIL_CONFIG_ERROR",
        ));
    };

    let reset_link = format!("{}/reset/{}", state.frontend_url, token);
    mailer
        .send_password_recovery(&user.email, &reset_link)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to send recovery email");
            ApiError::internal("Failed to send recovery email", "MAIL_SEND_ERROR")
        })?;

    info!(user_id = %user.id, "Recovery email sent");
    Ok(Json(MessageResponse {
        message: "Recovery email sent".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/reset/{token}",
    tag = "Authentication",
    params(("token" = String, Path, description = "Password reset token")),
    responses(
        (status = 200, description = "Token is valid", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ApiError)
    )
)]
pub async fn check_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    find_user_by_reset_token(&mut conn, &token)?;

    Ok(Json(MessageResponse {
        message: "Token is valid".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/reset/{token}",
    tag = "Authentication",
    params(("token" = String, Path, description = "Password reset token")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Mismatch, weak password or invalid token", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if payload.password != payload.confirm_password {
        return Err(ApiError::bad_request(
            "Passwords do not match",
            "PASSWORD_MISMATCH",
        ));
    }

    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(
            e.to_string(),
            "PASSWORD_POLICY_VIOLATION",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let user = find_user_by_reset_token(&mut conn, &token)?;

    let password_hash =
        PasswordService::hash_password_with_cost(&payload.password, state.password_hash_cost)
            .map_err(|e| {
                error!(error = %e, "Password hashing failed");
                ApiError::internal("Failed to process password", "PASSWORD_HASH_ERROR")
            })?;

    diesel::update(users::table.filter(users::id.eq(user.id)))
        .set((
            users::password_hash.eq(password_hash),
            users::reset_token_hash.eq(None::<String>),
            users::reset_token_expires_at.eq(None::<chrono::NaiveDateTime>),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
        .map_err(|e| {
            error!(error = %e, "Failed to update password");
            ApiError::internal("Failed to reset password", "PASSWORD_UPDATE_ERROR")
        })?;

    info!(user_id = %user.id, "Password reset completed");
    Ok(Json(MessageResponse {
        message: "Password has been updated".to_string(),
    }))
}

fn find_user_by_reset_token(
    conn: &mut PgConnection,
    token: &str,
) -> Result<User, (axum::http::StatusCode, Json<ApiError>)> {
    let token_hash = hash_token(token);
    let now = Utc::now().naive_utc();

    users::table
        .filter(users::reset_token_hash.eq(&token_hash))
        .filter(users::reset_token_expires_at.gt(now))
        .select(User::as_select())
        .first(conn)
        .optional()
        .map_err(|_| ApiError::db_error())?
        .ok_or_else(|| {
            ApiError::bad_request(
                "Password reset token is invalid or has expired",
                "INVALID_RESET_TOKEN",
            )
        })
}
