//! Request/response types for account endpoints.
//!
//! Every response uses the `{message, data}` envelope; failures carry
//! `{message}` plus, for validation problems, a `errors` map of field
//! messages. Serialized users never include password material.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;
use utoipa::ToSchema;

/// Closed role set; one role per user, decided per deployment.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Parse a role label as sent by clients or stored in the database.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user as serialized to clients. No password field exists on purpose.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct UserBody {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub office_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
    #[schema(value_type = String, format = Password)]
    pub password_confirmation: SecretString,
    /// Defaults to the lowest-privilege role when omitted.
    pub role: Option<String>,
    pub office_id: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ChangePasswordRequest {
    #[schema(value_type = String, format = Password)]
    pub current_password: SecretString,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString,
    #[schema(value_type = String, format = Password)]
    pub password_confirmation: SecretString,
}

/// Payload returned by register and login.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthData {
    pub user: UserBody,
    pub token: String,
    pub role: Role,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub message: String,
    pub data: AuthData,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileData {
    pub user: UserBody,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileResponse {
    pub message: String,
    pub data: ProfileData,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ValidationErrorResponse {
    pub message: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

/// Field-level validation messages accumulated during request checks.
#[derive(Debug, Default)]
pub(super) struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub(super) fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub(super) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(super) fn into_fields(self) -> BTreeMap<String, Vec<String>> {
        self.fields
    }
}

/// Handler-boundary error converted into the uniform envelope.
#[derive(Debug)]
pub(super) enum ServiceError {
    Validation(ValidationErrors),
    /// 422 with a bare message, e.g. a wrong current password.
    Unprocessable(&'static str),
    /// 401 with the given message; login failures use the uniform
    /// credentials message so the cause stays unguessable.
    Unauthorized(&'static str),
    Database(anyhow::Error),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationErrorResponse {
                    message: "The given data was invalid.".to_string(),
                    errors: errors.into_fields(),
                }),
            )
                .into_response(),
            Self::Unprocessable(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(MessageResponse {
                    message: message.to_string(),
                }),
            )
                .into_response(),
            Self::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                Json(MessageResponse {
                    message: message.to_string(),
                }),
            )
                .into_response(),
            Self::Database(err) => {
                error!("Failed to handle account request: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(MessageResponse {
                        message: "Internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn role_parse_accepts_known_labels() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse(" User "), Some(Role::User));
        assert_eq!(Role::parse("supervisor"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn role_serializes_lowercase() -> Result<()> {
        assert_eq!(serde_json::to_value(Role::Admin)?, "admin");
        assert_eq!(serde_json::to_value(Role::User)?, "user");
        let decoded: Role = serde_json::from_str("\"admin\"")?;
        assert_eq!(decoded, Role::Admin);
        Ok(())
    }

    #[test]
    fn user_body_never_serializes_password() -> Result<()> {
        let user = UserBody {
            id: "00000000-0000-0000-0000-000000000000".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::User,
            office_id: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&user)?;
        let object = value.as_object().context("user should be an object")?;
        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("password_hash"));
        assert_eq!(
            object.get("email").and_then(serde_json::Value::as_str),
            Some("alice@example.com")
        );
        Ok(())
    }

    #[test]
    fn register_request_debug_hides_password() {
        let request = RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: SecretString::from("password1"),
            password_confirmation: SecretString::from("password1"),
            role: None,
            office_id: None,
        };
        let debug = format!("{request:?}");
        assert!(!debug.contains("password1"));
    }

    #[test]
    fn validation_errors_accumulate_per_field() {
        let mut errors = ValidationErrors::default();
        assert!(errors.is_empty());
        errors.add("email", "The email field is required.");
        errors.add("email", "The email must be a valid email address.");
        errors.add("name", "The name field is required.");

        let fields = errors.into_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("email").map(Vec::len), Some(2));
    }

    #[test]
    fn message_response_round_trips() -> Result<()> {
        let response = MessageResponse {
            message: "Successfully logged out".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value
                .get("message")
                .and_then(serde_json::Value::as_str),
            Some("Successfully logged out")
        );
        assert!(value.get("data").is_none());
        Ok(())
    }
}
