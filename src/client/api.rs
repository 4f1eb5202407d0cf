//! HTTP helpers for the JSON API with a fixed timeout and consistent error
//! handling. The helpers do not hold tokens; callers attach one per request,
//! which keeps the session the single owner of credentials.

use super::errors::AppError;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default request timeout applied to every call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

/// Shape of error bodies produced by the API envelope.
#[derive(serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client against a base URL like `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| AppError::Serialization(format!("Failed to build client: {err}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Fetches JSON, optionally authenticated with a bearer token.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<T, AppError> {
        let mut request = self.http.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(map_request_error)?;
        handle_json_response(response).await
    }

    /// Posts JSON and parses a JSON response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T, AppError> {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(map_request_error)?;
        handle_json_response(response).await
    }

    /// Puts JSON and parses a JSON response.
    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T, AppError> {
        let mut request = self.http.put(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(map_request_error)?;
        handle_json_response(response).await
    }

    /// Posts an empty body, used to revoke the current token.
    pub async fn post_empty<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<T, AppError> {
        let mut request = self.http.post(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(map_request_error)?;
        handle_json_response(response).await
    }

    /// Builds a URL from the base URL and the provided path.
    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        let path = path.trim();

        if base.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", base, path.trim_start_matches('/'))
        }
    }
}

/// Maps transport errors into user-facing variants with timeout detection.
fn map_request_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout("Request timed out. Please try again.".to_string())
    } else {
        AppError::Network(format!("Unable to reach the server: {err}"))
    }
}

/// Parses JSON responses and surfaces HTTP errors with sanitized bodies.
async fn handle_json_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| AppError::Parse(format!("Failed to decode response: {err}")))
    } else {
        let body = response.text().await.unwrap_or_default();
        let (message, errors) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => (
                parsed
                    .message
                    .unwrap_or_else(|| "Request failed.".to_string()),
                parsed.errors,
            ),
            Err(_) => (sanitize_body(body), BTreeMap::new()),
        };
        Err(AppError::Http {
            status: status.as_u16(),
            message,
            errors,
        })
    }
}

/// Sanitizes non-JSON error bodies by trimming and truncating.
fn sanitize_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let client = ApiClient::new("http://localhost:8080/").unwrap();
        assert_eq!(
            client.url("/api/v1/login"),
            "http://localhost:8080/api/v1/login"
        );
        assert_eq!(
            client.url("api/v1/login"),
            "http://localhost:8080/api/v1/login"
        );
    }

    #[test]
    fn url_with_empty_base_keeps_path() {
        let client = ApiClient::new("").unwrap();
        assert_eq!(client.url("/api/v1/login"), "/api/v1/login");
    }

    #[test]
    fn sanitize_body_truncates_and_defaults() {
        assert_eq!(sanitize_body("  ".to_string()), "Request failed.");
        let long = "x".repeat(500);
        assert_eq!(sanitize_body(long).chars().count(), MAX_ERROR_CHARS);
    }
}
