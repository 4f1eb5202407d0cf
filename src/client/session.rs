//! The client-side auth state manager.
//!
//! One `AuthSession` holds the current token + user, mirrors them into the
//! durable [`SessionStore`], and is the only place that decides when the
//! session is live. State transitions:
//! unauthenticated → (login | register) → authenticated →
//! (logout | 401 on any protected call | failed startup verification) →
//! unauthenticated.

use super::api::ApiClient;
use super::errors::AppError;
use super::permissions::{role_allows, Permission};
use super::store::SessionStore;
use crate::api::handlers::auth::{AuthResponse, MessageResponse, ProfileResponse, Role, UserBody};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// User-facing failure classes. Callers decide presentation; nothing here
/// panics or throws.
#[derive(Debug, Clone)]
pub enum AuthFailure {
    /// The server could not be reached (includes timeouts).
    Network(String),
    /// 422 with field-level messages.
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },
    /// 401: wrong credentials, or a revoked/expired token.
    Credentials(String),
    /// Anything else the server answered with.
    Server { status: u16, message: String },
    /// A malformed response or request body.
    Unexpected(String),
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(message)
            | Self::Credentials(message)
            | Self::Unexpected(message) => formatter.write_str(message),
            Self::Validation { message, .. } => formatter.write_str(message),
            Self::Server { status, message } => {
                write!(formatter, "Request failed ({status}): {message}")
            }
        }
    }
}

/// Registration form payload.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    /// `None` lets the server apply its lowest-privilege default.
    pub role: Option<Role>,
}

pub struct AuthSession {
    api: ApiClient,
    store: SessionStore,
    token: Option<String>,
    user: Option<UserBody>,
}

impl AuthSession {
    #[must_use]
    pub fn new(api: ApiClient, store: SessionStore) -> Self {
        Self {
            api,
            store,
            token: None,
            user: None,
        }
    }

    /// Hydrate from the durable cache, then verify with the server.
    ///
    /// The cached user is applied first so the UI can paint immediately; any
    /// failure of the verification call clears both memory and cache. No
    /// retry.
    pub async fn restore(&mut self) -> bool {
        let cached = self.store.load();
        let (Some(token), Some(user)) = (cached.auth_token, cached.user) else {
            return false;
        };

        self.token = Some(token);
        self.user = Some(user);

        match self
            .api
            .get_json::<ProfileResponse>("/api/v1/profile", self.token.as_deref())
            .await
        {
            Ok(response) => {
                let user = response.data.user;
                if let Some(token) = &self.token {
                    if let Err(err) = self.store.save(token, &user) {
                        warn!("Failed to refresh session cache: {err}");
                    }
                }
                self.user = Some(user);
                true
            }
            Err(err) => {
                debug!("Startup session verification failed: {err}");
                self.clear_local();
                false
            }
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), AuthFailure> {
        let payload = json!({ "email": email, "password": password });
        let response = self
            .api
            .post_json::<_, AuthResponse>("/api/v1/login", &payload, None)
            .await
            .map_err(map_failure)?;

        self.adopt(response);
        Ok(())
    }

    pub async fn register(&mut self, account: NewAccount) -> Result<(), AuthFailure> {
        let payload = json!({
            "name": account.name,
            "email": account.email,
            "password": account.password,
            "password_confirmation": account.password_confirmation,
            "role": account.role.map(Role::as_str),
        });
        let response = self
            .api
            .post_json::<_, AuthResponse>("/api/v1/register", &payload, None)
            .await
            .map_err(map_failure)?;

        self.adopt(response);
        Ok(())
    }

    /// Best-effort server-side revocation followed by an unconditional local
    /// clear. Logout always succeeds from the caller's point of view.
    pub async fn logout(&mut self) {
        if let Some(token) = self.token.clone() {
            if let Err(err) = self
                .api
                .post_empty::<MessageResponse>("/api/v1/logout", Some(&token))
                .await
            {
                debug!("Logout request failed: {err}");
            }
        }
        self.clear_local();
    }

    /// Refresh the current user from the server and update the cache.
    pub async fn profile(&mut self) -> Result<UserBody, AuthFailure> {
        let response = self
            .api
            .get_json::<ProfileResponse>("/api/v1/profile", self.token.as_deref())
            .await
            .map_err(|err| self.protected_failure(err))?;

        self.refresh_user(response.data.user.clone());
        Ok(response.data.user)
    }

    pub async fn update_profile(
        &mut self,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<UserBody, AuthFailure> {
        let payload = json!({ "name": name, "email": email });
        let response = self
            .api
            .put_json::<_, ProfileResponse>("/api/v1/profile", &payload, self.token.as_deref())
            .await
            .map_err(|err| self.protected_failure(err))?;

        self.refresh_user(response.data.user.clone());
        Ok(response.data.user)
    }

    pub async fn change_password(
        &mut self,
        current_password: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<(), AuthFailure> {
        let payload = json!({
            "current_password": current_password,
            "password": password,
            "password_confirmation": password_confirmation,
        });
        self.api
            .post_json::<_, MessageResponse>(
                "/api/v1/change-password",
                &payload,
                self.token.as_deref(),
            )
            .await
            .map_err(|err| self.protected_failure(err))?;
        Ok(())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<&UserBody> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|user| user.role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    #[must_use]
    pub fn has_role(&self, roles: &[Role]) -> bool {
        self.role().is_some_and(|role| roles.contains(&role))
    }

    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.role()
            .is_some_and(|role| role_allows(role, permission))
    }

    #[must_use]
    pub fn can_manage_users(&self) -> bool {
        self.can(Permission::ManageUsers)
    }

    fn adopt(&mut self, response: AuthResponse) {
        let token = response.data.token;
        let user = response.data.user;
        if let Err(err) = self.store.save(&token, &user) {
            warn!("Failed to persist session cache: {err}");
        }
        self.token = Some(token);
        self.user = Some(user);
    }

    fn refresh_user(&mut self, user: UserBody) {
        if let Some(token) = &self.token {
            if let Err(err) = self.store.save(token, &user) {
                warn!("Failed to refresh session cache: {err}");
            }
        }
        self.user = Some(user);
    }

    /// A 401 on any protected call invalidates the whole session before the
    /// failure is surfaced, mirroring a global response interceptor.
    fn protected_failure(&mut self, err: AppError) -> AuthFailure {
        if matches!(err, AppError::Http { status: 401, .. }) {
            self.clear_local();
        }
        map_failure(err)
    }

    fn clear_local(&mut self) {
        self.token = None;
        self.user = None;
        self.store.clear();
    }
}

fn map_failure(err: AppError) -> AuthFailure {
    match err {
        AppError::Network(_) | AppError::Timeout(_) => {
            AuthFailure::Network("Network error: Cannot connect to server".to_string())
        }
        AppError::Http {
            status: 401,
            message,
            ..
        } => AuthFailure::Credentials(message),
        AppError::Http {
            status: 422,
            message,
            errors,
        } => AuthFailure::Validation { message, errors },
        AppError::Http {
            status, message, ..
        } => AuthFailure::Server { status, message },
        AppError::Parse(message) | AppError::Serialization(message) => {
            AuthFailure::Unexpected(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_failure_classifies_statuses() {
        let failure = map_failure(AppError::Http {
            status: 401,
            message: "Invalid email or password".to_string(),
            errors: BTreeMap::new(),
        });
        assert!(matches!(failure, AuthFailure::Credentials(_)));

        let mut errors = BTreeMap::new();
        errors.insert(
            "email".to_string(),
            vec!["The email has already been taken.".to_string()],
        );
        let failure = map_failure(AppError::Http {
            status: 422,
            message: "The given data was invalid.".to_string(),
            errors,
        });
        match failure {
            AuthFailure::Validation { errors, .. } => {
                assert!(errors.contains_key("email"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }

        let failure = map_failure(AppError::Timeout("slow".to_string()));
        assert!(matches!(failure, AuthFailure::Network(_)));

        let failure = map_failure(AppError::Http {
            status: 500,
            message: "Internal server error".to_string(),
            errors: BTreeMap::new(),
        });
        assert!(matches!(failure, AuthFailure::Server { status: 500, .. }));
    }

    #[test]
    fn failure_display_is_user_facing() {
        let failure = AuthFailure::Network("Network error: Cannot connect to server".to_string());
        assert_eq!(
            failure.to_string(),
            "Network error: Cannot connect to server"
        );
    }
}
