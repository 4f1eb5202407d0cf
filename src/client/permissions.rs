//! Centralized role→permission mapping plus the display strings the profile
//! and registration views need. Every role check in client code goes through
//! this table; nothing else matches on role strings.

use crate::api::handlers::auth::{Role, UserBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageUsers,
    ConfigureSystem,
    ViewAllData,
    ManageOwnProfile,
    StandardOperations,
}

/// The single source of truth for what a role may do.
#[must_use]
pub fn role_allows(role: Role, permission: Permission) -> bool {
    match role {
        Role::Admin => true,
        Role::User => matches!(
            permission,
            Permission::ManageOwnProfile | Permission::StandardOperations
        ),
    }
}

#[must_use]
pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "Administrator",
        Role::User => "User",
    }
}

#[must_use]
pub fn role_description(role: Role) -> &'static str {
    match role {
        Role::Admin => "Full system administrator with all privileges",
        Role::User => "Regular user with basic access rights",
    }
}

/// Human-readable permission list rendered on the profile screen.
#[must_use]
pub fn permission_descriptions(role: Role) -> &'static [&'static str] {
    match role {
        Role::Admin => &[
            "Manage all users and accounts",
            "Full system configuration access",
            "View and manage all data",
            "System administration privileges",
            "Complete system control",
        ],
        Role::User => &[
            "Basic system access",
            "Personal profile management",
            "Standard user operations",
            "Access to user features",
        ],
    }
}

/// Roles offered by the registration form's selector.
///
/// UX-only guard: the admin option disappears once an administrator is known
/// to exist, unless the current user is one. Real enforcement lives on the
/// API.
#[must_use]
pub fn registration_role_options(
    current_user: Option<&UserBody>,
    admin_known_to_exist: bool,
) -> Vec<Role> {
    let is_admin = current_user.is_some_and(|user| user.role == Role::Admin);
    if is_admin || !admin_known_to_exist {
        vec![Role::User, Role::Admin]
    } else {
        vec![Role::User]
    }
}
