//! # Keyward
//!
//! API key validation for service requests, backed by a revocable,
//! permission-scoped key store with a fallback to statically configured
//! legacy keys.
//!
//! ## Overview
//!
//! A presented key flows one way:
//!
//! - **Hasher**: raw key to SHA-256 fingerprint ([`core::KeyFingerprint`])
//! - **Key store**: fingerprint lookup, bounded by a timeout ([`store::KeyStore`])
//! - **Legacy registry**: raw-value match when the store misses or is down
//! - **Permission resolver**: `resource:action` checks on the [`Principal`]
//!
//! A store that is slow or unreachable never turns into an authentication
//! failure on its own: it sends validation to the legacy registry.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keyward::{CreateOptions, KeyLifecycle, LegacyConfig, LegacyRegistry};
//! use keyward::core::Role;
//! use keyward::store::SqliteStore;
//!
//! async fn example() {
//!     let store = Arc::new(SqliteStore::open("keys.db").unwrap());
//!     let legacy = Arc::new(LegacyRegistry::from_config(&LegacyConfig::from_env()));
//!     let keys = KeyLifecycle::new(store, legacy);
//!
//!     // Issue a key; the raw value is only available here
//!     let created = keys
//!         .create(Role::Analyst, "user-42", CreateOptions::default().expires_in_days(30))
//!         .await
//!         .unwrap();
//!
//!     // Validate it
//!     let principal = keys.validate(&created.raw).await.unwrap();
//!     assert!(principal.allows_str("analysis:read").unwrap());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `keyward::core` - Raw keys, fingerprints, ids, roles, audit events, clock
//! - `keyward::perms` - Permission parsing and matching
//! - `keyward::store` - Storage abstraction, SQLite and in-memory stores

pub mod error;
pub mod header;
pub mod legacy;
pub mod lifecycle;
pub mod principal;
pub mod rate_limit;
pub mod validator;

// Re-export component crates
pub use keyward_core as core;
pub use keyward_perms as perms;
pub use keyward_store as store;

// Re-export main types for convenience
pub use error::{LifecycleError, Rejection, Result};
pub use header::{extract_presented_key, API_KEY_HEADER, AUTHORIZATION_HEADER};
pub use legacy::{LegacyConfig, LegacyKeyEntry, LegacyRegistry};
pub use lifecycle::{
    CreateOptions, CreatedKey, KeyLifecycle, KeyRef, KeySummary, LifecycleConfig, RevokeAck,
};
pub use principal::Principal;
pub use rate_limit::RateLimiter;
pub use validator::{Validator, ValidatorConfig, ANONYMOUS_ACTOR, AUDIT_TARGET};

// Re-export commonly used core types
pub use keyward_core::{Clock, KeyFingerprint, KeyId, KeySource, RawKey, Role, SystemClock};
pub use keyward_perms::{Permission, PermissionSet};
pub use keyward_store::ListFilter;
