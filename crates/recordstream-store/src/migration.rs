//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

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

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, crate::now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per ingested record file
        CREATE TABLE record_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,        -- file name, also the ordering key
            file_hash TEXT,                   -- hex SHA-384 computed on ingest
            prev_hash TEXT,                   -- hex previous hash accepted on ingest
            load_start INTEGER NOT NULL,      -- local time ingestion began (Unix ms)
            load_end INTEGER                  -- local time of commit (Unix ms)
        );

        -- Transactions in consensus order
        CREATE TABLE transactions (
            file_id INTEGER NOT NULL REFERENCES record_files(id),
            seq INTEGER NOT NULL,             -- 1-based position within the file
            consensus_ns INTEGER NOT NULL,    -- consensus timestamp, ns since epoch
            transaction_bytes BLOB NOT NULL,
            record_bytes BLOB NOT NULL,
            PRIMARY KEY (file_id, seq)
        );

        -- File signatures as written by the node
        CREATE TABLE record_file_signatures (
            file_id INTEGER NOT NULL REFERENCES record_files(id),
            signature_hex TEXT NOT NULL
        );

        -- Cursor and operator settings
        CREATE TABLE application_status (
            status_key TEXT PRIMARY KEY,
            status_value TEXT
        );

        CREATE INDEX idx_transactions_consensus ON transactions(consensus_ns);
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

        assert!(tables.contains(&"record_files".to_string()));
        assert!(tables.contains(&"transactions".to_string()));
        assert!(tables.contains(&"record_file_signatures".to_string()));
        assert!(tables.contains(&"application_status".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }
}
