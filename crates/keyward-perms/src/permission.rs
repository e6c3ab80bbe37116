//! Permission grants.
//!
//! A permission is either a legacy flat tag (`"admin"`, `"analyze"`) or a
//! scoped `resource:action` string. Both shapes are parsed into
//! [`Permission`] at ingestion and compared through one canonical
//! `(resource, action)` pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PermsError, Result};

/// Wildcard segment.
pub const WILDCARD: &str = "*";

/// Legacy flat tag that grants everything.
pub const LEGACY_ADMIN_TAG: &str = "admin";

/// Separator between resource and action.
pub const SCOPE_SEPARATOR: char = ':';

/// A single permission grant or requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    /// Legacy flat tag. `T` is treated as `T:*`; `admin` as `*:*`.
    Flat(String),
    /// Scoped `resource:action`.
    Scoped { resource: String, action: String },
}

impl Permission {
    /// Parse a permission string.
    ///
    /// Rejects empty strings, empty segments, whitespace and more than one
    /// separator.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |why: &str| PermsError::InvalidPermission(format!("{s:?}: {why}"));

        if s.is_empty() {
            return Err(invalid("empty"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }

        match s.split_once(SCOPE_SEPARATOR) {
            None => Ok(Permission::Flat(s.to_string())),
            Some((resource, action)) => {
                if resource.is_empty() || action.is_empty() {
                    return Err(invalid("empty segment"));
                }
                if action.contains(SCOPE_SEPARATOR) {
                    return Err(invalid("more than one separator"));
                }
                Ok(Permission::Scoped {
                    resource: resource.to_string(),
                    action: action.to_string(),
                })
            }
        }
    }

    /// Build a scoped permission.
    pub fn scoped(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Permission::Scoped {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Build a flat legacy tag.
    pub fn flat(tag: impl Into<String>) -> Self {
        Permission::Flat(tag.into())
    }

    /// The canonical `(resource, action)` pair used for comparison.
    pub fn canonical(&self) -> (&str, &str) {
        match self {
            Permission::Flat(tag) if tag == LEGACY_ADMIN_TAG => (WILDCARD, WILDCARD),
            Permission::Flat(tag) => (tag.as_str(), WILDCARD),
            Permission::Scoped { resource, action } => (resource.as_str(), action.as_str()),
        }
    }

    /// Whether this grant matches everything.
    pub fn is_superuser(&self) -> bool {
        self.canonical() == (WILDCARD, WILDCARD)
    }

    /// Whether holding `self` satisfies `required`.
    ///
    /// A `*` in the grant matches any segment. A `*` in the requirement is
    /// a literal and is only satisfied by a wildcard grant.
    pub fn grants(&self, required: &Permission) -> bool {
        let (grant_resource, grant_action) = self.canonical();
        let (req_resource, req_action) = required.canonical();

        segment_matches(grant_resource, req_resource) && segment_matches(grant_action, req_action)
    }
}

fn segment_matches(granted: &str, required: &str) -> bool {
    granted == WILDCARD || granted == required
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Flat(tag) => f.write_str(tag),
            Permission::Scoped { resource, action } => {
                write!(f, "{resource}{SCOPE_SEPARATOR}{action}")
            }
        }
    }
}

impl FromStr for Permission {
    type Err = PermsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Permission {
    type Error = PermsError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Permission {
        Permission::parse(s).unwrap()
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(p("analyze"), Permission::flat("analyze"));
        assert_eq!(p("analysis:read"), Permission::scoped("analysis", "read"));
        assert_eq!(p("*:*"), Permission::scoped("*", "*"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", ":", "a:", ":b", "a:b:c", "a b", " admin"] {
            assert!(Permission::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_resource_wildcard() {
        assert!(p("admin:*").grants(&p("admin:anything")));
        assert!(!p("admin:*").grants(&p("analysis:read")));
    }

    #[test]
    fn test_exact_action_only() {
        assert!(p("analysis:read").grants(&p("analysis:read")));
        assert!(!p("analysis:read").grants(&p("analysis:write")));
        assert!(!p("analysis:read").grants(&p("analysis:reader")));
    }

    #[test]
    fn test_flat_tag_is_resource_wildcard() {
        assert!(p("analyze").grants(&p("analyze:submit")));
        assert!(!p("analyze").grants(&p("reports:read")));
    }

    #[test]
    fn test_superusers() {
        assert!(p("admin").grants(&p("anything:anything")));
        assert!(p("*:*").grants(&p("anything:anything")));
        assert!(p("admin").is_superuser());
        assert!(!p("admin:*").is_superuser());
    }

    #[test]
    fn test_any_resource_grant() {
        assert!(p("*:read").grants(&p("reports:read")));
        assert!(!p("*:read").grants(&p("reports:write")));
    }

    #[test]
    fn test_required_wildcard_is_literal() {
        assert!(!p("admin:read").grants(&p("admin:*")));
        assert!(p("admin:*").grants(&p("admin:*")));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(!p("Analysis:read").grants(&p("analysis:read")));
        assert!(!p("ADMIN").grants(&p("x:y")));
    }

    #[test]
    fn test_display_and_serde() {
        assert_eq!(p("analysis:read").to_string(), "analysis:read");
        assert_eq!(p("admin").to_string(), "admin");

        let json = serde_json::to_string(&p("reports:read")).unwrap();
        assert_eq!(json, "\"reports:read\"");
        let back: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p("reports:read"));
        assert!(serde_json::from_str::<Permission>("\"a:b:c\"").is_err());
    }
}
