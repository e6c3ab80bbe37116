//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a clock tests can move, stores
//! that fail in controlled ways, and a builder for key records.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use keyward_core::{AuditEvent, Clock, KeyFingerprint, KeyId, RawKey, Role, MILLIS_PER_DAY};
use keyward_perms::{default_scopes, PermissionSet};
use keyward_store::{
    InsertResult, KeyRecord, KeyStore, ListFilter, MemoryStore, Result as StoreResult, StoreError,
};

/// 2026-01-01T00:00:00Z in Unix ms.
pub const EPOCH_2026: i64 = 1_767_225_600_000;

// ─────────────────────────────────────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────────────────────────────────────

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.now.fetch_add(days * MILLIS_PER_DAY, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(EPOCH_2026)
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stores
// ─────────────────────────────────────────────────────────────────────────────

fn unavailable() -> StoreError {
    StoreError::Unavailable("simulated outage".into())
}

/// A store where every operation fails as unreachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

#[async_trait]
impl KeyStore for UnavailableStore {
    async fn lookup(&self, _fingerprint: &KeyFingerprint) -> StoreResult<Option<KeyRecord>> {
        Err(unavailable())
    }

    async fn get(&self, _id: &KeyId) -> StoreResult<Option<KeyRecord>> {
        Err(unavailable())
    }

    async fn insert(&self, _record: &KeyRecord) -> StoreResult<InsertResult> {
        Err(unavailable())
    }

    async fn mark_revoked(&self, _id: &KeyId, _reason: &str, _at: i64) -> StoreResult<()> {
        Err(unavailable())
    }

    async fn record_usage(&self, _id: &KeyId, _at: i64) -> StoreResult<()> {
        Err(unavailable())
    }

    async fn list(&self, _filter: &ListFilter) -> StoreResult<Vec<KeyRecord>> {
        Err(unavailable())
    }

    async fn append_audit(&self, _event: &AuditEvent) -> StoreResult<()> {
        Err(unavailable())
    }

    async fn audit_log(&self, _limit: usize) -> StoreResult<Vec<AuditEvent>> {
        Err(unavailable())
    }
}

/// How [`FaultyStore`] answers fingerprint lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LookupFault {
    /// Answer from the inner store.
    None = 0,
    /// Fail with `StoreError::Unavailable`.
    Fail = 1,
    /// Never answer.
    Stall = 2,
}

/// A [`MemoryStore`] with injectable lookup faults and insert collisions.
///
/// Reads other than `lookup` pass straight through, so audit events and
/// revocations can be inspected while lookups or writes misbehave.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    lookup_fault: AtomicU8,
    collisions: AtomicUsize,
    lookups: AtomicUsize,
    fail_audit: AtomicBool,
    stall_writes: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose lookups never complete.
    pub fn stalled() -> Self {
        let store = Self::new();
        store.set_lookup_fault(LookupFault::Stall);
        store
    }

    pub fn set_lookup_fault(&self, fault: LookupFault) {
        self.lookup_fault.store(fault as u8, Ordering::SeqCst);
    }

    /// Answer the next `n` inserts with `DuplicateFingerprint`.
    pub fn collide_next_inserts(&self, n: usize) {
        self.collisions.store(n, Ordering::SeqCst);
    }

    /// Make `append_audit` fail.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Make `record_usage` and `append_audit` hang, like a writer stuck
    /// behind another connection's lock.
    pub fn stall_writes(&self, stall: bool) {
        self.stall_writes.store(stall, Ordering::SeqCst);
    }

    /// Number of `lookup` calls received.
    pub fn lookup_calls(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn fault(&self) -> LookupFault {
        match self.lookup_fault.load(Ordering::SeqCst) {
            1 => LookupFault::Fail,
            2 => LookupFault::Stall,
            _ => LookupFault::None,
        }
    }
}

#[async_trait]
impl KeyStore for FaultyStore {
    async fn lookup(&self, fingerprint: &KeyFingerprint) -> StoreResult<Option<KeyRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        match self.fault() {
            LookupFault::None => self.inner.lookup(fingerprint).await,
            LookupFault::Fail => Err(unavailable()),
            LookupFault::Stall => std::future::pending().await,
        }
    }

    async fn get(&self, id: &KeyId) -> StoreResult<Option<KeyRecord>> {
        self.inner.get(id).await
    }

    async fn insert(&self, record: &KeyRecord) -> StoreResult<InsertResult> {
        let collide = self
            .collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collide {
            return Ok(InsertResult::DuplicateFingerprint);
        }
        self.inner.insert(record).await
    }

    async fn mark_revoked(&self, id: &KeyId, reason: &str, at: i64) -> StoreResult<()> {
        self.inner.mark_revoked(id, reason, at).await
    }

    async fn record_usage(&self, id: &KeyId, at: i64) -> StoreResult<()> {
        if self.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.record_usage(id, at).await
    }

    async fn list(&self, filter: &ListFilter) -> StoreResult<Vec<KeyRecord>> {
        self.inner.list(filter).await
    }

    async fn append_audit(&self, event: &AuditEvent) -> StoreResult<()> {
        if self.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.append_audit(event).await
    }

    async fn audit_log(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.inner.audit_log(limit).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`KeyRecord`]s seeded directly into a store.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: KeyRecord,
}

impl RecordBuilder {
    /// A record for `raw` with its role's default scopes.
    pub fn new(raw: &RawKey, role: Role) -> Self {
        Self {
            record: KeyRecord {
                id: KeyId::generate(),
                fingerprint: raw.fingerprint(),
                key_prefix: raw.display_prefix(),
                user_id: "test-user".into(),
                role,
                permissions: default_scopes(role),
                description: None,
                active: true,
                created_at: EPOCH_2026,
                expires_at: None,
                last_used_at: None,
                usage_count: 0,
                rate_limit: None,
                revoked_at: None,
                revocation_reason: None,
            },
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.record.user_id = user_id.into();
        self
    }

    pub fn permissions(mut self, permissions: PermissionSet) -> Self {
        self.record.permissions = permissions;
        self
    }

    pub fn created_at(mut self, at: i64) -> Self {
        self.record.created_at = at;
        self
    }

    pub fn expires_at(mut self, at: i64) -> Self {
        self.record.expires_at = Some(at);
        self
    }

    pub fn rate_limit(mut self, per_minute: u32) -> Self {
        self.record.rate_limit = Some(per_minute);
        self
    }

    pub fn revoked(mut self, at: i64, reason: impl Into<String>) -> Self {
        self.record.active = false;
        self.record.revoked_at = Some(at);
        self.record.revocation_reason = Some(reason.into());
        self
    }

    pub fn build(self) -> KeyRecord {
        self.record
    }
}

/// A memory store and a manual clock, shared by `Arc`.
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(ManualClock::default()),
        }
    }

    /// Generate a fresh raw key and store a record for it.
    pub async fn seed_key(&self, role: Role) -> (RawKey, KeyRecord) {
        self.seed_with(role, |b| b).await
    }

    /// Like [`seed_key`](Self::seed_key), customising the record first.
    pub async fn seed_with<F>(&self, role: Role, customize: F) -> (RawKey, KeyRecord)
    where
        F: FnOnce(RecordBuilder) -> RecordBuilder,
    {
        let raw = RawKey::generate(role, keyward_core::KEY_PAYLOAD_LEN);
        let builder = RecordBuilder::new(&raw, role).created_at(self.clock.now_millis());
        let record = customize(builder).build();
        let inserted = self
            .store
            .insert(&record)
            .await
            .expect("memory store insert");
        assert_eq!(inserted, InsertResult::Inserted);
        (raw, record)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Yield to the runtime until `check` passes or `attempts` run out.
///
/// Usage counters and validation audit events are written from spawned
/// tasks; tests use this to wait for them.
pub async fn eventually<F, Fut>(attempts: usize, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..attempts {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_store::{LookupOutcome, StoreExt};

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_millis(), 3_000);
        clock.advance_days(1);
        assert_eq!(clock.now_millis(), 3_000 + MILLIS_PER_DAY);
        clock.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[tokio::test]
    async fn test_stalled_lookup_times_out() {
        let store = FaultyStore::stalled();
        let outcome = store
            .lookup_within(&KeyFingerprint::of("xyz"), Duration::from_millis(20))
            .await;
        assert!(matches!(outcome, LookupOutcome::Unavailable(_)));
        assert_eq!(store.lookup_calls(), 1);
    }

    #[tokio::test]
    async fn test_collisions_then_insert() {
        let store = FaultyStore::new();
        store.collide_next_inserts(1);
        let record = RecordBuilder::new(&RawKey::new("ana_x"), Role::Analyst).build();

        assert_eq!(store.insert(&record).await.unwrap(), InsertResult::DuplicateFingerprint);
        assert_eq!(store.insert(&record).await.unwrap(), InsertResult::Inserted);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let outcome = UnavailableStore
            .lookup_within(&KeyFingerprint::of("xyz"), Duration::from_millis(20))
            .await;
        assert!(matches!(outcome, LookupOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_fixture_seed() {
        let fixture = TestFixture::new();
        let (raw, record) = fixture
            .seed_with(Role::Client, |b| b.user("u-1").rate_limit(5))
            .await;

        let stored = fixture.store.lookup(&raw.fingerprint()).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(stored.user_id, "u-1");
        assert_eq!(stored.created_at, EPOCH_2026);
    }
}
