//! # Keyward Permissions
//!
//! Coarse `resource:action` permission matching.
//!
//! ## Overview
//!
//! Keys carry grants in one of two shapes:
//!
//! - **Flat tags** from the legacy configuration: `"admin"`, `"analyze"`
//! - **Scoped strings** from the key store: `"analysis:read"`, `"reports:*"`
//!
//! Both are parsed into [`Permission`] once, when a key is created or
//! loaded, and compared through a single canonical `(resource, action)`
//! form. The rules:
//!
//! - A flat tag `T` is treated as `T:*`
//! - `R:*` matches any required `R:x`
//! - `*:*` and the legacy `admin` tag match everything
//! - Segments compare case-sensitively and exactly, no prefix matching
//!
//! ## Usage
//!
//! ```rust
//! use keyward_perms::{Permission, PermissionSet};
//!
//! let granted = PermissionSet::parse(["analysis:read", "reports:*"]).unwrap();
//! assert!(granted.allows(&Permission::parse("reports:export").unwrap()));
//! assert!(!granted.allows(&Permission::parse("analysis:write").unwrap()));
//! ```

pub mod error;
pub mod permission;
pub mod roles;
pub mod set;

pub use error::{PermsError, Result};
pub use permission::{Permission, LEGACY_ADMIN_TAG, SCOPE_SEPARATOR, WILDCARD};
pub use roles::{default_scopes, legacy_tags};
pub use set::{matches, PermissionSet};
