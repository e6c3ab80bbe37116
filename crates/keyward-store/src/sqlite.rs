//! SQLite implementation of the KeyStore trait.
//!
//! This is the primary storage backend for Keyward. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use keyward_core::{AuditAction, AuditEvent, KeyFingerprint, KeyId, KeySource, Role};
use keyward_perms::PermissionSet;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::record::{KeyRecord, ListFilter};
use crate::traits::{InsertResult, KeyStore};

/// How long a write waits on a locked database before reporting
/// [`StoreError::Unavailable`].
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(100);

const RECORD_COLUMNS: &str = "key_id, fingerprint, key_prefix, user_id, role, permissions, \
     description, active, created_at, expires_at, last_used_at, usage_count, rate_limit, \
     revoked_at, revocation_reason";

const AUDIT_COLUMNS: &str = "timestamp, actor, action, key_prefix, outcome, detail, source";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
///
/// File databases get a second connection for reads. In WAL mode it keeps
/// answering lookups while the write connection waits on a lock.
pub struct SqliteStore {
    /// Connection for inserts, revocations, usage and audit writes.
    writer: Arc<Mutex<Connection>>,
    /// Connection for lookups and listings. Same as `writer` in memory.
    reader: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a SQLite database with an explicit busy timeout.
    pub fn open_with(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();

        let mut writer = Connection::open(path).map_err(classify_sqlite)?;
        writer.busy_timeout(busy_timeout)?;
        writer.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        migration::migrate(&mut writer)?;

        let reader = Connection::open(path).map_err(classify_sqlite)?;
        reader.busy_timeout(busy_timeout)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Arc::new(Mutex::new(reader)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self {
            writer: Arc::clone(&conn),
            reader: conn,
        })
    }

    /// Run a read against the read connection on the blocking pool.
    async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        Self::blocking(Arc::clone(&self.reader), f).await
    }

    /// Run a write against the write connection on the blocking pool.
    async fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        Self::blocking(Arc::clone(&self.writer), f).await
    }

    async fn blocking<F, T>(conn: Arc<Mutex<Connection>>, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
        .map_err(classify)
    }
}

/// Busy, locked and I/O failures become [`StoreError::Unavailable`].
fn classify(err: StoreError) -> StoreError {
    match err {
        StoreError::Unavailable(_) => err,
        other if other.is_unavailable() => StoreError::Unavailable(other.to_string()),
        other => other,
    }
}

fn classify_sqlite(err: rusqlite::Error) -> StoreError {
    classify(StoreError::Database(err))
}

/// A UNIQUE violation on `api_keys.fingerprint`, from this connection or
/// any other writer of the same file.
fn is_fingerprint_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("api_keys.fingerprint")
        }
        _ => false,
    }
}

fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

// Helper to convert a row selected with RECORD_COLUMNS to KeyRecord
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<KeyRecord> {
    let key_id: String = row.get(0)?;
    let fingerprint: String = row.get(1)?;
    let role: String = row.get(4)?;
    let permissions: String = row.get(5)?;
    let usage_count: i64 = row.get(11)?;

    Ok(KeyRecord {
        id: KeyId::from_hex(&key_id).map_err(|e| conversion_err(0, e))?,
        fingerprint: KeyFingerprint::from_hex(&fingerprint).map_err(|e| conversion_err(1, e))?,
        key_prefix: row.get(2)?,
        user_id: row.get(3)?,
        role: Role::from_str(&role).map_err(|e| conversion_err(4, e))?,
        permissions: serde_json::from_str::<PermissionSet>(&permissions)
            .map_err(|e| conversion_err(5, e))?,
        description: row.get(6)?,
        active: row.get(7)?,
        created_at: row.get(8)?,
        expires_at: row.get(9)?,
        last_used_at: row.get(10)?,
        usage_count: usage_count.max(0) as u64,
        rate_limit: row.get(12)?,
        revoked_at: row.get(13)?,
        revocation_reason: row.get(14)?,
    })
}

// Helper to convert a row selected with AUDIT_COLUMNS to AuditEvent
fn row_to_audit(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    let action: String = row.get(2)?;
    let source: Option<String> = row.get(6)?;

    Ok(AuditEvent {
        timestamp: row.get(0)?,
        actor: row.get(1)?,
        action: AuditAction::from_str(&action).map_err(|e| conversion_err(2, e))?,
        key_prefix: row.get(3)?,
        outcome: row.get(4)?,
        detail: row.get(5)?,
        source: source
            .map(|s| KeySource::from_str(&s))
            .transpose()
            .map_err(|e| conversion_err(6, e))?,
    })
}

#[async_trait]
impl KeyStore for SqliteStore {
    async fn lookup(&self, fingerprint: &KeyFingerprint) -> Result<Option<KeyRecord>> {
        let fingerprint = fingerprint.to_hex();

        self.read(move |conn| {
            conn.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM api_keys WHERE fingerprint = ?1"),
                params![fingerprint],
                row_to_record,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get(&self, id: &KeyId) -> Result<Option<KeyRecord>> {
        let id = id.to_hex();

        self.read(move |conn| {
            conn.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM api_keys WHERE key_id = ?1"),
                params![id],
                row_to_record,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn insert(&self, record: &KeyRecord) -> Result<InsertResult> {
        let record = record.clone();
        let permissions = serde_json::to_string(&record.permissions)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.write(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT INTO api_keys ({RECORD_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    record.id.to_hex(),
                    record.fingerprint.to_hex(),
                    record.key_prefix,
                    record.user_id,
                    record.role.as_str(),
                    permissions,
                    record.description,
                    record.active,
                    record.created_at,
                    record.expires_at,
                    record.last_used_at,
                    record.usage_count as i64,
                    record.rate_limit,
                    record.revoked_at,
                    record.revocation_reason,
                ],
            );

            match inserted {
                Ok(_) => Ok(InsertResult::Inserted),
                Err(e) if is_fingerprint_conflict(&e) => Ok(InsertResult::DuplicateFingerprint),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn mark_revoked(&self, id: &KeyId, reason: &str, at: i64) -> Result<()> {
        let id = id.to_hex();
        let reason = reason.to_string();

        self.write(move |conn| {
            let updated = conn.execute(
                "UPDATE api_keys SET
                    active = 0,
                    revocation_reason =
                        CASE WHEN revoked_at IS NULL THEN ?3 ELSE revocation_reason END,
                    revoked_at = COALESCE(revoked_at, ?2)
                 WHERE key_id = ?1",
                params![id, at, reason],
            )?;

            if updated == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn record_usage(&self, id: &KeyId, at: i64) -> Result<()> {
        let id = id.to_hex();

        self.write(move |conn| {
            let updated = conn.execute(
                "UPDATE api_keys SET
                    usage_count = usage_count + 1,
                    last_used_at = MAX(COALESCE(last_used_at, ?2), ?2)
                 WHERE key_id = ?1",
                params![id, at],
            )?;

            if updated == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<KeyRecord>> {
        let user_id = filter.user_id.clone();
        let role = filter.role.map(Role::as_str);
        let active_only = filter.active_only;

        self.read(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM api_keys
                 WHERE (?1 IS NULL OR user_id = ?1)
                   AND (?2 IS NULL OR role = ?2)
                   AND (?3 = 0 OR active = 1)
                 ORDER BY created_at DESC, key_id ASC"
            ))?;

            let records = stmt
                .query_map(params![user_id, role, active_only], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(records)
        })
        .await
    }

    async fn append_audit(&self, event: &AuditEvent) -> Result<()> {
        let event = event.clone();

        self.write(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO audit_events ({AUDIT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    event.timestamp,
                    event.actor,
                    event.action.as_str(),
                    event.key_prefix,
                    event.outcome,
                    event.detail,
                    event.source.map(KeySource::as_str),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn audit_log(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.read(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_events ORDER BY seq DESC LIMIT ?1"
            ))?;

            let events = stmt
                .query_map(params![limit], row_to_audit)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(events)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_record;

    const ANALYST_RAW: &str = "ana_zyxwvutsrqponmlkjihgfedcbaZYXWVUTSRQPONM";
    const ADMIN_RAW: &str = "adm_0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcd";

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = SqliteStore::open_memory().unwrap();
        let mut record = sample_record(ANALYST_RAW, "user-1", Role::Analyst, 1_000);
        record.description = Some("ci runner".into());
        record.expires_at = Some(5_000);
        record.rate_limit = Some(60);

        assert_eq!(store.insert(&record).await.unwrap(), InsertResult::Inserted);

        let found = store.lookup(&record.fingerprint).await.unwrap().unwrap();
        assert_eq!(found, record);
        assert_eq!(store.get(&record.id).await.unwrap().unwrap(), record);
        assert!(store
            .lookup(&KeyFingerprint::of("cli_missing"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_fingerprint() {
        let store = SqliteStore::open_memory().unwrap();
        let first = sample_record(ANALYST_RAW, "user-1", Role::Analyst, 1_000);
        let second = sample_record(ANALYST_RAW, "user-2", Role::Analyst, 2_000);

        store.insert(&first).await.unwrap();
        assert_eq!(
            store.insert(&second).await.unwrap(),
            InsertResult::DuplicateFingerprint
        );
        assert!(store.get(&second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_and_usage() {
        let store = SqliteStore::open_memory().unwrap();
        let record = sample_record(ANALYST_RAW, "user-1", Role::Analyst, 1_000);
        store.insert(&record).await.unwrap();

        store.record_usage(&record.id, 3_000).await.unwrap();
        store.record_usage(&record.id, 2_000).await.unwrap();
        store.mark_revoked(&record.id, "leaked", 4_000).await.unwrap();
        store.mark_revoked(&record.id, "second", 5_000).await.unwrap();

        let found = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(found.usage_count, 2);
        assert_eq!(found.last_used_at, Some(3_000));
        assert!(!found.active);
        assert_eq!(found.revoked_at, Some(4_000));
        assert_eq!(found.revocation_reason.as_deref(), Some("leaked"));

        let err = store
            .mark_revoked(&KeyId::from_bytes([7; 16]), "x", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let store = SqliteStore::open_memory().unwrap();
        let older = sample_record(ANALYST_RAW, "user-1", Role::Analyst, 1_000);
        let newer = sample_record(ADMIN_RAW, "user-2", Role::Admin, 2_000);
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();
        store.mark_revoked(&newer.id, "rotated", 3_000).await.unwrap();

        let all = store.list(&ListFilter::all()).await.unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        let active = store.list(&ListFilter::all().active_only()).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, older.id);

        let admins = store.list(&ListFilter::all().role(Role::Admin)).await.unwrap();
        assert_eq!(admins.len(), 1);

        let user = store.list(&ListFilter::all().user("user-1")).await.unwrap();
        assert_eq!(user.len(), 1);
        assert_eq!(user[0].user_id, "user-1");
    }

    #[tokio::test]
    async fn test_audit_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let created = AuditEvent::success(1, "admin", AuditAction::Create, "ana_zyxw");
        let failed =
            AuditEvent::failure(2, "anonymous", AuditAction::ValidateFailure, "ana_zyxw", "revoked")
                .with_source(KeySource::Store)
                .with_detail("leaked");
        store.append_audit(&created).await.unwrap();
        store.append_audit(&failed).await.unwrap();

        let log = store.audit_log(10).await.unwrap();
        assert_eq!(log, vec![failed, created]);
        assert_eq!(store.audit_log(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");
        let record = sample_record(ANALYST_RAW, "user-1", Role::Analyst, 1_000);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&record).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.lookup(&record.fingerprint).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_locked_database_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");
        let store = SqliteStore::open_with(&path, Duration::from_millis(10)).unwrap();

        let other = Connection::open(&path).unwrap();
        other.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let record = sample_record(ANALYST_RAW, "user-1", Role::Analyst, 1_000);
        let err = store.insert(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");

        other.execute_batch("ROLLBACK").unwrap();
        assert_eq!(store.insert(&record).await.unwrap(), InsertResult::Inserted);
    }

    #[tokio::test]
    async fn test_reads_proceed_while_writer_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");
        let store = SqliteStore::open_with(&path, Duration::from_millis(200)).unwrap();
        let record = sample_record(ANALYST_RAW, "user-1", Role::Analyst, 1_000);
        store.insert(&record).await.unwrap();

        let other = Connection::open(&path).unwrap();
        other.execute_batch("BEGIN EXCLUSIVE").unwrap();

        // Park a write on the write connection behind the lock.
        let event = AuditEvent::success(1, "admin", AuditAction::Create, "ana_zyxw");
        let store = Arc::new(store);
        let blocked = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.append_audit(&event).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = std::time::Instant::now();
        let found = store.lookup(&record.fingerprint).await.unwrap();
        assert_eq!(found, Some(record));
        assert!(started.elapsed() < Duration::from_millis(150));

        assert!(matches!(blocked.await.unwrap(), Err(StoreError::Unavailable(_))));
        other.execute_batch("ROLLBACK").unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_from_another_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");
        let first = SqliteStore::open(&path).unwrap();
        let second = SqliteStore::open(&path).unwrap();

        let original = sample_record(ANALYST_RAW, "user-1", Role::Analyst, 1_000);
        let copy = sample_record(ANALYST_RAW, "user-2", Role::Analyst, 2_000);
        assert_eq!(first.insert(&original).await.unwrap(), InsertResult::Inserted);
        assert_eq!(
            second.insert(&copy).await.unwrap(),
            InsertResult::DuplicateFingerprint
        );

        // A reused id is a data error, not a fingerprint collision.
        let mut same_id = sample_record(ADMIN_RAW, "user-3", Role::Admin, 3_000);
        same_id.id = original.id;
        assert!(matches!(
            second.insert(&same_id).await,
            Err(StoreError::Database(_))
        ));
    }
}
