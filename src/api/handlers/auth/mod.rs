//! Account and session handlers.
//!
//! This module covers the whole account lifecycle: registration, login,
//! logout, profile reads/updates, and password changes.
//!
//! ## Tokens
//!
//! Bearer tokens are opaque random values; only their SHA-256 digest is
//! stored. A login deletes every token the user holds and mints the
//! replacement inside one transaction: either the rotation completes or the
//! prior tokens stay valid.
//!
//! ## Single-administrator policy
//!
//! `role=admin` registrations are accepted only while no live administrator
//! exists, or when the request is authenticated as an administrator. The
//! check lives here, server side; any client-side gating is cosmetic.

pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod profile;
pub(crate) mod register;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState};
pub use types::{
    AuthData, AuthResponse, MessageResponse, ProfileData, ProfileResponse, Role, UserBody,
    ValidationErrorResponse,
};

#[cfg(test)]
mod tests;
