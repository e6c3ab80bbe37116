//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use keyward_core::{Clock, SystemClock};

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, SystemClock.now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: key records and the audit trail.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Stored API keys. The raw key is never persisted.
        CREATE TABLE api_keys (
            key_id TEXT PRIMARY KEY,              -- 32 hex chars
            fingerprint TEXT NOT NULL UNIQUE,     -- 64 hex chars, SHA-256 of raw key
            key_prefix TEXT NOT NULL,             -- display prefix, e.g. ana_x7Qp
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,                   -- admin | analyst | client
            permissions TEXT NOT NULL,            -- JSON array of permission strings
            description TEXT,
            active INTEGER NOT NULL DEFAULT 1,    -- 0 once revoked
            created_at INTEGER NOT NULL,          -- Unix ms
            expires_at INTEGER,                   -- Unix ms, NULL never expires
            last_used_at INTEGER,
            usage_count INTEGER NOT NULL DEFAULT 0,
            revoked_at INTEGER,
            revocation_reason TEXT
        );

        -- Append-only audit trail
        CREATE TABLE audit_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            key_prefix TEXT NOT NULL,
            outcome TEXT NOT NULL,
            detail TEXT,
            source TEXT                           -- store | legacy
        );

        CREATE TRIGGER audit_events_no_update BEFORE UPDATE ON audit_events
        BEGIN
            SELECT RAISE(ABORT, 'audit_events is append-only');
        END;

        CREATE TRIGGER audit_events_no_delete BEFORE DELETE ON audit_events
        BEGIN
            SELECT RAISE(ABORT, 'audit_events is append-only');
        END;

        -- Indexes for common queries
        CREATE INDEX idx_api_keys_user ON api_keys(user_id);
        CREATE INDEX idx_api_keys_created ON api_keys(created_at);
        CREATE INDEX idx_audit_events_timestamp ON audit_events(timestamp);
        "#,
    )?;

    Ok(())
}

/// Migration v2: per-key rate limits.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE api_keys ADD COLUMN rate_limit INTEGER;  -- requests per minute, NULL unlimited
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"api_keys".to_string()));
        assert!(tables.contains(&"audit_events".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_audit_events_append_only() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO audit_events (timestamp, actor, action, key_prefix, outcome)
             VALUES (1, 'admin', 'create', 'ana_abcd', 'success')",
            [],
        )
        .unwrap();

        assert!(conn.execute("UPDATE audit_events SET outcome = 'x'", []).is_err());
        assert!(conn.execute("DELETE FROM audit_events", []).is_err());
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
