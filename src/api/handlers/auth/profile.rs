//! Authenticated self-service endpoints.
//!
//! Flow Overview:
//! 1) Authenticate via bearer token.
//! 2) Resolve the current user from the database.
//! 3) Apply allow-listed updates or rewrite the password hash.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;

use super::password::{hash_password, verify_password};
use super::principal::require_auth;
use super::state::AuthState;
use super::storage::{
    fetch_password_hash, fetch_user, update_password_hash, update_profile as store_profile,
    UpdateOutcome,
};
use super::types::{
    ChangePasswordRequest, MessageResponse, ProfileData, ProfileResponse, ServiceError,
    UpdateProfileRequest, ValidationErrorResponse, ValidationErrors,
};
use super::utils::{normalize_email, valid_email};

const MAX_FIELD_CHARS: usize = 255;

#[utoipa::path(
    get,
    path = "/api/v1/profile",
    responses(
        (status = 200, description = "Return the authenticated user", body = ProfileResponse),
        (status = 401, description = "Missing or invalid bearer token", body = MessageResponse)
    ),
    tag = "profile"
)]
pub async fn profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    match handle_profile(&headers, &pool, &auth_state).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_profile(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<ProfileResponse, ServiceError> {
    let principal = require_auth(headers, pool, state).await?;

    let Some(user) = fetch_user(pool, principal.user_id).await? else {
        return Err(ServiceError::Unauthorized("Unauthenticated."));
    };

    Ok(ProfileResponse {
        message: "User profile retrieved successfully".to_string(),
        data: ProfileData { user },
    })
}

#[utoipa::path(
    put,
    path = "/api/v1/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 401, description = "Missing or invalid bearer token", body = MessageResponse),
        (status = 422, description = "Validation failed", body = ValidationErrorResponse)
    ),
    tag = "profile"
)]
pub async fn update_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<UpdateProfileRequest>,
) -> impl IntoResponse {
    match handle_update_profile(&headers, &pool, &auth_state, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_update_profile(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
    payload: UpdateProfileRequest,
) -> Result<ProfileResponse, ServiceError> {
    let principal = require_auth(headers, pool, state).await?;

    let mut errors = ValidationErrors::default();

    let name = payload.name.map(|name| name.trim().to_string());
    if let Some(name) = &name {
        if name.is_empty() {
            errors.add("name", "The name field is required.");
        } else if name.chars().count() > MAX_FIELD_CHARS {
            errors.add("name", "The name may not be greater than 255 characters.");
        }
    }

    let email = payload.email.map(|email| normalize_email(&email));
    if let Some(email) = &email {
        if !valid_email(email) || email.chars().count() > MAX_FIELD_CHARS {
            errors.add("email", "The email must be a valid email address.");
        }
    }

    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    let user = match store_profile(pool, principal.user_id, name, email).await? {
        UpdateOutcome::Updated(user) => user,
        UpdateOutcome::EmailTaken => {
            let mut errors = ValidationErrors::default();
            errors.add("email", "The email has already been taken.");
            return Err(ServiceError::Validation(errors));
        }
        UpdateOutcome::NotFound => {
            return Err(ServiceError::Unauthorized("Unauthenticated."));
        }
    };

    Ok(ProfileResponse {
        message: "Profile updated successfully".to_string(),
        data: ProfileData { user },
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password rewritten", body = MessageResponse),
        (status = 401, description = "Missing or invalid bearer token", body = MessageResponse),
        (status = 422, description = "Wrong current password or policy failure", body = ValidationErrorResponse)
    ),
    tag = "profile"
)]
pub async fn change_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    match handle_change_password(&headers, &pool, &auth_state, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_change_password(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
    payload: ChangePasswordRequest,
) -> Result<MessageResponse, ServiceError> {
    let principal = require_auth(headers, pool, state).await?;

    let mut errors = ValidationErrors::default();

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

    if !errors.is_empty() {
        return Err(ServiceError::Validation(errors));
    }

    let Some(stored_hash) = fetch_password_hash(pool, principal.user_id).await? else {
        return Err(ServiceError::Unauthorized("Unauthenticated."));
    };

    // The stored hash stays untouched unless the current password matches.
    if !verify_password(payload.current_password.expose_secret(), &stored_hash) {
        return Err(ServiceError::Unprocessable("Current password is incorrect"));
    }

    let new_hash = hash_password(password)?;
    update_password_hash(pool, principal.user_id, &new_hash).await?;

    Ok(MessageResponse {
        message: "Password changed successfully".to_string(),
    })
}
