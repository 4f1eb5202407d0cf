//! Authenticated principal extraction for protected routes.
//!
//! Flow Overview: read the bearer token, resolve it to a user, and return a
//! principal that downstream handlers can use.

use axum::http::HeaderMap;
use sqlx::PgPool;
use uuid::Uuid;

use super::session::authenticate_token;
use super::state::AuthState;
use super::types::{Role, ServiceError};

/// Authenticated user context derived from the bearer token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Resolve a bearer token into a principal, or return 401 for missing tokens.
pub(super) async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<Principal, ServiceError> {
    match authenticate_token(headers, pool, state).await? {
        Some(identity) => Ok(Principal {
            user_id: identity.user_id,
            email: identity.email,
            role: identity.role,
        }),
        None => Err(ServiceError::Unauthorized("Unauthenticated.")),
    }
}
