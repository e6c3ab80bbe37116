//! Role-derived permission defaults.

use keyward_core::Role;

use crate::permission::Permission;
use crate::set::PermissionSet;

/// Scoped grants for a newly created store key when none are supplied.
pub fn default_scopes(role: Role) -> PermissionSet {
    match role {
        Role::Admin => [Permission::scoped("*", "*")].into_iter().collect(),
        Role::Analyst => [
            Permission::scoped("analysis", "read"),
            Permission::scoped("analysis", "write"),
            Permission::scoped("reports", "read"),
        ]
        .into_iter()
        .collect(),
        Role::Client => [
            Permission::scoped("analysis", "submit"),
            Permission::scoped("analysis", "read"),
        ]
        .into_iter()
        .collect(),
    }
}

/// Fixed flat tags carried by a legacy key of `role`.
pub fn legacy_tags(role: Role) -> PermissionSet {
    let tags: &[&str] = match role {
        Role::Admin => &["admin"],
        Role::Analyst => &["analyze", "reports"],
        Role::Client => &["submit"],
    };
    tags.iter().map(|t| Permission::flat(*t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_defaults_are_superuser() {
        let required = Permission::scoped("billing", "delete");
        assert!(default_scopes(Role::Admin).allows(&required));
        assert!(legacy_tags(Role::Admin).allows(&required));
    }

    #[test]
    fn test_client_cannot_write_analysis() {
        let scopes = default_scopes(Role::Client);
        assert!(scopes.allows(&Permission::scoped("analysis", "read")));
        assert!(!scopes.allows(&Permission::scoped("analysis", "write")));
    }

    #[test]
    fn test_legacy_tags_are_flat() {
        for role in Role::ALL {
            assert!(legacy_tags(role)
                .iter()
                .all(|p| matches!(p, Permission::Flat(_))));
        }
    }
}
