//! Durable session cache: one JSON document holding `auth_token` and the
//! last-known `user`. The path is supplied by the application shell, so the
//! cache has an explicit owner and an explicit clear.

use crate::api::handlers::auth::UserBody;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CachedSession {
    pub auth_token: Option<String>,
    pub user: Option<UserBody>,
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the cached session. A missing or unreadable file is an empty
    /// session, not an error; stale caches get cleared on the next verify.
    #[must_use]
    pub fn load(&self) -> CachedSession {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                debug!("Discarding unreadable session cache: {err}");
                CachedSession::default()
            }),
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    debug!("Failed to read session cache: {err}");
                }
                CachedSession::default()
            }
        }
    }

    /// Persist the token and user after a successful login or verification.
    pub fn save(&self, auth_token: &str, user: &UserBody) -> Result<()> {
        let cached = CachedSession {
            auth_token: Some(auth_token.to_string()),
            user: Some(user.clone()),
        };
        let contents =
            serde_json::to_string(&cached).context("failed to serialize session cache")?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("failed to create session cache directory")?;
        }
        fs::write(&self.path, contents).context("failed to write session cache")?;
        Ok(())
    }

    /// Remove the cache. Clearing an already-empty cache is a no-op.
    pub fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                debug!("Failed to remove session cache: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::Role;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("custodia-store-{}.json", ulid::Ulid::new()))
    }

    fn sample_user() -> UserBody {
        UserBody {
            id: "5f3c71aa-1111-2222-3333-444455556666".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role: Role::User,
            office_id: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn load_missing_file_is_empty() {
        let store = SessionStore::new(scratch_path());
        let cached = store.load();
        assert!(cached.auth_token.is_none());
        assert!(cached.user.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = scratch_path();
        let store = SessionStore::new(&path);
        store.save("token-123", &sample_user()).unwrap();

        let cached = store.load();
        assert_eq!(cached.auth_token.as_deref(), Some("token-123"));
        assert_eq!(
            cached.user.map(|user| user.email),
            Some("alice@example.com".to_string())
        );

        store.clear();
        assert!(store.load().auth_token.is_none());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn corrupt_cache_is_discarded() {
        let path = scratch_path();
        std::fs::write(&path, "{not json").unwrap();
        let store = SessionStore::new(&path);
        let cached = store.load();
        assert!(cached.auth_token.is_none());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn clear_twice_is_harmless() {
        let store = SessionStore::new(scratch_path());
        store.clear();
        store.clear();
    }
}
