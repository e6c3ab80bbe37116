//! # Keyward Core
//!
//! Pure primitives for Keyward: raw keys, fingerprints, identifiers, roles
//! and audit events.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`RawKey`] - A secret key as presented by a caller (redacted in `Debug`)
//! - [`KeyFingerprint`] - SHA-256 digest of a raw key, the only persisted form
//! - [`KeyId`] - Non-secret identifier administrators use to refer to a key
//! - [`Role`] - Coarse role (`adm`, `ana`, `cli`) a key is issued for
//! - [`AuditEvent`] - Append-only record of lifecycle and validation actions
//! - [`Clock`] - Injectable time source

pub mod audit;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod types;

pub use audit::{AuditAction, AuditEvent};
pub use clock::{Clock, SystemClock, MILLIS_PER_DAY};
pub use crypto::{
    constant_time_eq, KeyFingerprint, RawKey, DISPLAY_PREFIX_LEN, KEY_PAYLOAD_LEN, KEY_SEPARATOR,
};
pub use error::CoreError;
pub use types::{KeyId, KeySource, Role};
