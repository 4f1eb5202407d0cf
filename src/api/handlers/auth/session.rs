//! Logout endpoint and bearer-token resolution.

use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use super::state::AuthState;
use super::storage::{delete_token, lookup_token, TokenIdentity};
use super::types::{MessageResponse, ServiceError};
use super::utils::hash_token;

/// Resolve the `Authorization: Bearer` header into a token owner, if any.
///
/// Returns `Ok(None)` when the header is missing or the token is unknown,
/// expired, or belongs to a soft-deleted account.
pub(super) async fn authenticate_token(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<Option<TokenIdentity>, ServiceError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Ok(None);
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_token(&token);
    let identity = lookup_token(pool, &token_hash, state.config().token_max_age_seconds()).await?;
    Ok(identity)
}

#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses(
        (status = 200, description = "Token revoked", body = MessageResponse),
        (status = 401, description = "Missing or invalid bearer token", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    match handle_logout(&headers, &pool, &auth_state).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_logout(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<MessageResponse, ServiceError> {
    if authenticate_token(headers, pool, state).await?.is_none() {
        return Err(ServiceError::Unauthorized("Unauthenticated."));
    }

    // The guard above ensures the header is present.
    if let Some(token) = extract_bearer_token(headers) {
        let token_hash = hash_token(&token);
        delete_token(pool, &token_hash).await?;
    }

    Ok(MessageResponse {
        message: "Successfully logged out".to_string(),
    })
}

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
