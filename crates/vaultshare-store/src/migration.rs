//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration is a SQL batch that
//! transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: it can be called on every open.
pub fn migrate(conn: &mut Connection, now: i64) -> Result<()> {
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
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now],
            )?;
            tracing::info!(version, "applied schema migration");
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
        -- Files: identity and metadata; content lives in the current version
        CREATE TABLE files (
            file_id BLOB PRIMARY KEY,         -- 16 bytes, public id
            name TEXT NOT NULL,
            owner INTEGER NOT NULL,
            content_type TEXT NOT NULL,
            created_at INTEGER NOT NULL,      -- Unix ms
            current_version INTEGER NOT NULL  -- non-owning pointer into versions
        );

        -- Versions: immutable snapshots, gapless numbers per file
        CREATE TABLE versions (
            file_id BLOB NOT NULL,
            number INTEGER NOT NULL,
            blob_id BLOB NOT NULL UNIQUE,     -- 16 bytes, unrelated to file_id
            key_material BLOB NOT NULL,       -- CBOR KeyMaterial
            size INTEGER NOT NULL,            -- plaintext bytes
            created_by INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            comment TEXT NOT NULL,

            PRIMARY KEY (file_id, number)
        );

        -- Sealed content
        CREATE TABLE blobs (
            blob_id BLOB PRIMARY KEY,
            format INTEGER NOT NULL,          -- EncryptionFormat tag
            nonce BLOB NOT NULL,              -- 12 bytes
            ciphertext BLOB NOT NULL          -- includes the auth tag
        );

        -- Shares: kind 0 = link (no recipient), 1 = user (recipient set)
        CREATE TABLE shares (
            share_id BLOB PRIMARY KEY,
            file_id BLOB NOT NULL,
            kind INTEGER NOT NULL,
            recipient INTEGER,
            created_by INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER,               -- NULL never expires

            CHECK ((kind = 0 AND recipient IS NULL) OR (kind = 1 AND recipient IS NOT NULL))
        );

        -- Permission entries
        CREATE TABLE permissions (
            permission_id BLOB PRIMARY KEY,
            file_id BLOB NOT NULL,
            user_id INTEGER NOT NULL,
            kind TEXT NOT NULL,               -- READ | WRITE | SHARE
            granted_by INTEGER NOT NULL,
            granted_at INTEGER NOT NULL,
            expires_at INTEGER,               -- NULL never expires

            UNIQUE(file_id, user_id, kind)
        );

        CREATE UNIQUE INDEX idx_shares_user ON shares(file_id, recipient) WHERE kind = 1;
        CREATE INDEX idx_shares_file ON shares(file_id);
        CREATE INDEX idx_files_owner ON files(owner);
        CREATE INDEX idx_permissions_expiry ON permissions(expires_at);
        CREATE INDEX idx_shares_expiry ON shares(expires_at);
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
        migrate(&mut conn, 0).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in ["blobs", "files", "permissions", "schema_migrations", "shares", "versions"] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn, 0).unwrap();
        migrate(&mut conn, 1).unwrap();
        migrate(&mut conn, 2).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn, 0).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(
            migrate(&mut conn, 0),
            Err(StoreError::Migration(_))
        ));
    }
}
