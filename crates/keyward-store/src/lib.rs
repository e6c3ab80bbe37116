//! # Keyward Store
//!
//! Storage abstraction for Keyward. Provides a trait-based interface for
//! key record and audit persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The store module abstracts key storage behind the [`KeyStore`] trait,
//! so validation and lifecycle code is storage-agnostic. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`KeyStore`] - The async trait for all storage operations
//! - [`KeyRecord`] - A persisted key: fingerprint, owner, role, grants, status
//! - [`LookupOutcome`] - Found / NotFound / Unavailable, from [`StoreExt::lookup_within`]
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use keyward_core::RawKey;
//! use keyward_store::{LookupOutcome, SqliteStore, StoreExt};
//!
//! async fn example() {
//!     let store = SqliteStore::open("keys.db").unwrap();
//!
//!     let presented = RawKey::new("ana_zyxwvutsrqponmlkjihgfedcbaZYXWVUTSRQPONM");
//!     match store
//!         .lookup_within(&presented.fingerprint(), Duration::from_millis(250))
//!         .await
//!     {
//!         LookupOutcome::Found(record) => println!("owner {}", record.user_id),
//!         LookupOutcome::NotFound => println!("unknown key"),
//!         LookupOutcome::Unavailable(why) => println!("store down: {why}"),
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Fingerprints only**: the raw key never reaches the store
//! - **No deletes**: revocation flips `active`, the row stays for audit
//! - **Append-only audit**: enforced by triggers in SQLite

pub mod error;
pub mod memory;
pub mod migration;
pub mod record;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use record::{KeyRecord, KeyStatus, ListFilter};
pub use sqlite::{SqliteStore, DEFAULT_BUSY_TIMEOUT};
pub use traits::{InsertResult, KeyStore, LookupOutcome, StoreExt};
