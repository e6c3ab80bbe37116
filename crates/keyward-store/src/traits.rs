//! KeyStore trait: the abstract interface for key persistence.
//!
//! The validator and lifecycle manager are storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::time::Duration;

use async_trait::async_trait;
use keyward_core::{AuditEvent, KeyFingerprint, KeyId};

use crate::error::Result;
use crate::record::{KeyRecord, ListFilter};

/// Result of inserting a key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// A record with the same fingerprint already exists. Nothing was written.
    DuplicateFingerprint,
}

/// Outcome of a bounded fingerprint lookup.
///
/// Availability failures are a distinct variant so callers cannot mistake
/// an unreachable store for a missing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(KeyRecord),
    NotFound,
    /// The store failed or did not answer in time.
    Unavailable(String),
}

/// The KeyStore trait: async interface for key persistence.
///
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the
/// runtime.
///
/// # Design Notes
///
/// - **Fingerprint uniqueness**: `insert` never overwrites; a second record
///   with the same fingerprint returns `DuplicateFingerprint`.
/// - **No deletes**: revocation only flips the `active` flag.
/// - **Append-only audit**: events can be added and read, never changed.
#[async_trait]
pub trait KeyStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Key Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Find a record by fingerprint, active or not.
    async fn lookup(&self, fingerprint: &KeyFingerprint) -> Result<Option<KeyRecord>>;

    /// Find a record by id.
    async fn get(&self, id: &KeyId) -> Result<Option<KeyRecord>>;

    /// Insert a new record.
    async fn insert(&self, record: &KeyRecord) -> Result<InsertResult>;

    /// Mark a record inactive.
    ///
    /// Idempotent: revoking an already revoked key keeps the first
    /// `revoked_at` and reason. Fails with `NotFound` if the id is unknown.
    async fn mark_revoked(&self, id: &KeyId, reason: &str, at: i64) -> Result<()>;

    /// Bump `usage_count` and `last_used_at`.
    async fn record_usage(&self, id: &KeyId, at: i64) -> Result<()>;

    /// List records matching `filter`, newest first.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<KeyRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Audit Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an audit event.
    async fn append_audit(&self, event: &AuditEvent) -> Result<()>;

    /// The most recent `limit` events, newest first.
    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEvent>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: KeyStore {
    /// Look up a fingerprint, giving up after `timeout`.
    ///
    /// Errors and timeouts both become [`LookupOutcome::Unavailable`].
    fn lookup_within(
        &self,
        fingerprint: &KeyFingerprint,
        timeout: Duration,
    ) -> impl std::future::Future<Output = LookupOutcome> + Send;
}

impl<S: KeyStore + ?Sized> StoreExt for S {
    async fn lookup_within(
        &self,
        fingerprint: &KeyFingerprint,
        timeout: Duration,
    ) -> LookupOutcome {
        match tokio::time::timeout(timeout, self.lookup(fingerprint)).await {
            Ok(Ok(Some(record))) => LookupOutcome::Found(record),
            Ok(Ok(None)) => LookupOutcome::NotFound,
            Ok(Err(e)) => LookupOutcome::Unavailable(e.to_string()),
            Err(_) => LookupOutcome::Unavailable(format!(
                "lookup timed out after {}ms",
                timeout.as_millis()
            )),
        }
    }
}
