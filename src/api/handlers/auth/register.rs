//! Registration endpoint.
//!
//! Flow Overview:
//! 1) Validate the payload and resolve the requested role.
//! 2) Enforce the single-administrator policy server side.
//! 3) Hash the password, insert the user, and mint the first token.

use anyhow::Context;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;

use super::password::hash_password;
use super::session::authenticate_token;
use super::state::AuthState;
use super::storage::{admin_exists, create_user, issue_token, CreateOutcome};
use super::types::{
    AuthData, AuthResponse, RegisterRequest, Role, ServiceError, ValidationErrorResponse,
    ValidationErrors,
};
use super::utils::{normalize_email, valid_email};

const MAX_FIELD_CHARS: usize = 255;

#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created; the token authenticates subsequent requests", body = AuthResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    match handle_register(&headers, &pool, &auth_state, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn handle_register(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
    payload: RegisterRequest,
) -> Result<AuthResponse, ServiceError> {
    let mut errors = ValidationErrors::default();

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        errors.add("name", "The name field is required.");
    } else if name.chars().count() > MAX_FIELD_CHARS {
        errors.add("name", "The name may not be greater than 255 characters.");
    }

    let email = normalize_email(&payload.email);
    if email.is_empty() {
        errors.add("email", "The email field is required.");
    } else if !valid_email(&email) || email.chars().count() > MAX_FIELD_CHARS {
        errors.add("email", "The email must be a valid email address.");
    }

    let password = payload.password.expose_secret();
    let min_length = state.config().password_min_length();
    if password.chars().count() < min_length {
        errors.add(
            "password",
            format!("The password must be at least {min_length} characters."),
        );
    }
    if password != payload.password_confirmation.expose_secret() {
        errors.add("password", "The password confirmation does not match.");
    }

    let office_id = match payload
        .office_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        None => None,
        Some(value) => match uuid::Uuid::parse_str(value) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("office_id", "The selected office is invalid.");
                None
            }
        },
    };

    // Defaults to the lowest-privilege role when omitted.
    let role = match payload.role.as_deref() {
        None => Some(Role::User),
        Some(value) => {
            let parsed = Role::parse(value);
            if parsed.is_none() {
                errors.add("role", "The selected role is invalid.");
            }
            parsed
        }
    };

    if role == Some(Role::Admin) && admin_exists(pool).await? {
        // Once an administrator exists, only an administrator may add another.
        let requester = authenticate_token(headers, pool, state).await?;
        if requester.map(|identity| identity.role) != Some(Role::Admin) {
            errors.add("role", "An administrator account already exists.");
        }
    }

    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    let role = role.unwrap_or(Role::User);
    let password_hash = hash_password(password)?;

    let user = match create_user(pool, &name, &email, &password_hash, role, office_id).await? {
        CreateOutcome::Created(user) => user,
        CreateOutcome::EmailTaken => {
            let mut errors = ValidationErrors::default();
            errors.add("email", "The email has already been taken.");
            return Err(ServiceError::Validation(errors));
        }
    };

    let user_id = uuid::Uuid::parse_str(&user.id).context("invalid user id")?;
    let token = issue_token(pool, user_id, role).await?;

    Ok(AuthResponse {
        message: "User registered successfully".to_string(),
        data: AuthData { user, token, role },
    })
}
