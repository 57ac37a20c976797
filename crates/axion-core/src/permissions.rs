//! Role, resource, and action vocabulary for the access-control engine.
//!
//! A permission is the flat string `"<resource>:<action>"`. Roles map to
//! unordered permission sets; there is no hierarchy beyond the single
//! school scope.
//!
//! # Example
//!
//! ```ignore
//! use axion_core::permissions::{self, permission_key};
//!
//! assert_eq!(permission_key(permissions::RESOURCE_SCHOOL, permissions::ACTION_READ), "school:read");
//! assert_eq!(permissions::SCHOOL_READ, "school:read");
//! ```

// =============================================================================
// Roles
// =============================================================================

pub const ROLE_SUPERADMIN: &str = "superadmin";
pub const ROLE_SCHOOL_ADMIN: &str = "school_admin";

/// Roles the engine seeds defaults for and accepts in policy writes.
pub const KNOWN_ROLES: &[&str] = &[ROLE_SUPERADMIN, ROLE_SCHOOL_ADMIN];

// =============================================================================
// Resources and actions
// =============================================================================

pub const RESOURCE_SCHOOL: &str = "school";
pub const RESOURCE_CLASSROOM: &str = "classroom";
pub const RESOURCE_STUDENT: &str = "student";
pub const RESOURCE_USER: &str = "user";

pub const RESOURCES: &[&str] = &[
    RESOURCE_SCHOOL,
    RESOURCE_CLASSROOM,
    RESOURCE_STUDENT,
    RESOURCE_USER,
];

pub const ACTION_READ: &str = "read";
pub const ACTION_CREATE: &str = "create";
pub const ACTION_CONFIG: &str = "config";

pub const ACTIONS: &[&str] = &[ACTION_READ, ACTION_CREATE, ACTION_CONFIG];

// =============================================================================
// Permission keys
// =============================================================================

pub const SCHOOL_READ: &str = "school:read";
pub const SCHOOL_CREATE: &str = "school:create";
pub const SCHOOL_CONFIG: &str = "school:config";

pub const CLASSROOM_READ: &str = "classroom:read";
pub const CLASSROOM_CREATE: &str = "classroom:create";
pub const CLASSROOM_CONFIG: &str = "classroom:config";

pub const STUDENT_READ: &str = "student:read";
pub const STUDENT_CREATE: &str = "student:create";
pub const STUDENT_CONFIG: &str = "student:config";

pub const USER_READ: &str = "user:read";
pub const USER_CREATE: &str = "user:create";
pub const USER_CONFIG: &str = "user:config";

/// Default grant for school admins: everything inside their school, no global writes.
pub const SCHOOL_ADMIN_DEFAULTS: &[&str] = &[
    SCHOOL_READ,
    SCHOOL_CONFIG,
    CLASSROOM_READ,
    CLASSROOM_CREATE,
    CLASSROOM_CONFIG,
    STUDENT_READ,
    STUDENT_CREATE,
    STUDENT_CONFIG,
    USER_READ,
];

pub fn permission_key(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Every resource × action pair, in declaration order.
pub fn all_permissions() -> Vec<String> {
    RESOURCES
        .iter()
        .flat_map(|resource| ACTIONS.iter().map(move |action| permission_key(resource, action)))
        .collect()
}

/// Built-in permissions for a role, or `None` for roles without defaults.
pub fn default_permissions(role: &str) -> Option<Vec<String>> {
    match role {
        ROLE_SUPERADMIN => Some(all_permissions()),
        ROLE_SCHOOL_ADMIN => Some(SCHOOL_ADMIN_DEFAULTS.iter().map(|p| p.to_string()).collect()),
        _ => None,
    }
}

pub fn is_known_role(role: &str) -> bool {
    KNOWN_ROLES.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_key_format() {
        assert_eq!(permission_key(RESOURCE_STUDENT, ACTION_CONFIG), STUDENT_CONFIG);
    }

    #[test]
    fn test_superadmin_defaults_cover_every_pair() {
        let perms = default_permissions(ROLE_SUPERADMIN).unwrap();
        assert_eq!(perms.len(), RESOURCES.len() * ACTIONS.len());
        assert!(perms.contains(&SCHOOL_CREATE.to_string()));
        assert!(perms.contains(&USER_CONFIG.to_string()));
    }

    #[test]
    fn test_school_admin_defaults_exclude_global_writes() {
        let perms = default_permissions(ROLE_SCHOOL_ADMIN).unwrap();
        assert!(!perms.contains(&SCHOOL_CREATE.to_string()));
        assert!(!perms.contains(&USER_CREATE.to_string()));
        assert!(perms.contains(&CLASSROOM_CREATE.to_string()));
    }

    #[test]
    fn test_unknown_role_has_no_defaults() {
        assert!(default_permissions("teacher").is_none());
        assert!(!is_known_role("teacher"));
        assert!(is_known_role(ROLE_SCHOOL_ADMIN));
    }
}
