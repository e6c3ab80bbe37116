//! # Keyward Testkit
//!
//! Testing utilities for Keyward.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Pinned fingerprints for known raw keys
//! - **Generators**: Proptest strategies for keys, roles and permissions
//! - **Fixtures**: A manual clock, stores that fail on demand, and a
//!   record builder
//!
//! ## Golden Vectors
//!
//! ```rust
//! use keyward_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, actual) in verify_all_vectors() {
//!     assert!(matches, "{name}: {actual}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use keyward_testkit::generators::raw_key;
//!
//! proptest! {
//!     #[test]
//!     fn fingerprint_is_deterministic(key in raw_key()) {
//!         prop_assert_eq!(key.fingerprint(), key.fingerprint());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use keyward_testkit::fixtures::{FaultyStore, LookupFault, ManualClock};
//!
//! let clock = ManualClock::default();
//! clock.advance_days(31);
//!
//! let store = FaultyStore::new();
//! store.set_lookup_fault(LookupFault::Stall);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    eventually, FaultyStore, LookupFault, ManualClock, RecordBuilder, TestFixture, UnavailableStore,
    EPOCH_2026,
};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
