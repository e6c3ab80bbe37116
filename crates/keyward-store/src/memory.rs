//! In-memory implementation of the KeyStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use keyward_core::{AuditEvent, KeyFingerprint, KeyId};

use crate::error::{Result, StoreError};
use crate::record::{KeyRecord, ListFilter};
use crate::traits::{InsertResult, KeyStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Records indexed by id.
    records: HashMap<KeyId, KeyRecord>,

    /// Fingerprint index: fingerprint -> id.
    fingerprints: HashMap<KeyFingerprint, KeyId>,

    /// Audit events in append order.
    audit: Vec<AuditEvent>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn lookup(&self, fingerprint: &KeyFingerprint) -> Result<Option<KeyRecord>> {
        let inner = self.read()?;
        Ok(inner
            .fingerprints
            .get(fingerprint)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn get(&self, id: &KeyId) -> Result<Option<KeyRecord>> {
        Ok(self.read()?.records.get(id).cloned())
    }

    async fn insert(&self, record: &KeyRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.fingerprints.contains_key(&record.fingerprint) {
            return Ok(InsertResult::DuplicateFingerprint);
        }
        if inner.records.contains_key(&record.id) {
            return Err(StoreError::InvalidData(format!("duplicate key id {}", record.id)));
        }

        inner.fingerprints.insert(record.fingerprint, record.id);
        inner.records.insert(record.id, record.clone());
        Ok(InsertResult::Inserted)
    }

    async fn mark_revoked(&self, id: &KeyId, reason: &str, at: i64) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_hex()))?;

        record.active = false;
        if record.revoked_at.is_none() {
            record.revoked_at = Some(at);
            record.revocation_reason = Some(reason.to_string());
        }
        Ok(())
    }

    async fn record_usage(&self, id: &KeyId, at: i64) -> Result<()> {
        let mut inner = self.write()?;
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_hex()))?;

        record.usage_count += 1;
        record.last_used_at = Some(record.last_used_at.map_or(at, |prev| prev.max(at)));
        Ok(())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<KeyRecord>> {
        let inner = self.read()?;
        let mut records: Vec<KeyRecord> = inner
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn append_audit(&self, event: &AuditEvent) -> Result<()> {
        self.write()?.audit.push(event.clone());
        Ok(())
    }

    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let inner = self.read()?;
        Ok(inner.audit.iter().rev().take(limit).cloned().collect())
    }
}
