//! Native client for the custodia API.
//!
//! The application shell builds one [`AuthSession`] at startup from an
//! [`ApiClient`] and a [`SessionStore`], calls
//! [`AuthSession::restore`](session::AuthSession::restore) once, and passes
//! the session into its views. The session owns the token + user cache;
//! there is no ambient global state.

pub mod api;
pub mod errors;
pub mod permissions;
pub mod session;
pub mod store;

pub use api::ApiClient;
pub use errors::AppError;
pub use permissions::Permission;
pub use session::{AuthFailure, AuthSession, NewAccount};
pub use store::SessionStore;
