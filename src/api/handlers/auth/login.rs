//! Login endpoint.
//!
//! Flow Overview:
//! 1) Verify the submitted password against the stored hash.
//! 2) Revoke every prior token, then mint the replacement (one transaction).
//! 3) Return the user, the raw token, and the role.
//!
//! Unknown emails and wrong passwords produce the identical 401 so callers
//! cannot probe which accounts exist.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use secrecy::ExposeSecret;
use sqlx::PgPool;

use super::password::{verify_dummy, verify_password};
use super::storage::{fetch_user, lookup_credentials, rotate_tokens};
use super::types::{AuthData, AuthResponse, LoginRequest, MessageResponse, ServiceError};
use super::utils::normalize_email;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded; prior tokens are revoked", body = AuthResponse),
        (status = 401, description = "Unknown email or wrong password", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    match handle_login(&pool, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_login(pool: &PgPool, payload: LoginRequest) -> Result<AuthResponse, ServiceError> {
    let email = normalize_email(&payload.email);
    let password = payload.password.expose_secret();

    let Some(record) = lookup_credentials(pool, &email).await? else {
        verify_dummy(password);
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_password(password, &record.password_hash) {
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS));
    }

    let token = rotate_tokens(pool, record.user_id, record.role).await?;

    // The account was live a moment ago; treat a vanishing row as a failed login.
    let Some(user) = fetch_user(pool, record.user_id).await? else {
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS));
    };

    Ok(AuthResponse {
        message: "Login successful".to_string(),
        data: AuthData {
            user,
            token,
            role: record.role,
        },
    })
}
