//! # Custodia (User Accounts & Token Authentication)
//!
//! `custodia` is a user account service: registration, login, logout,
//! profile management, and password changes over a uniform JSON envelope,
//! plus a native client that owns the session cache and role checks.
//!
//! ## Authentication
//!
//! Credentials are verified against Argon2id hashes; nothing stores or logs
//! a plaintext password. Successful logins mint an opaque bearer token whose
//! SHA-256 digest is persisted, never the raw value. A login revokes every
//! prior token for the account before issuing the replacement, so at most
//! one token stays live per user going forward.
//!
//! ## Authorization & Roles
//!
//! Every user carries exactly one role (`admin` or `user`). Tokens capture
//! the role at issue time, and the registration endpoint enforces the
//! single-administrator policy server side: an `admin` registration is only
//! accepted for the first administrator or when requested by an existing
//! one.
//!
//! ## Soft Deletes
//!
//! Accounts are never hard-deleted. A `deleted_at` marker hides them from
//! login, token authentication, and email uniqueness.

pub mod api;
pub mod cli;
pub mod client;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
