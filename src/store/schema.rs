// src/store/schema.rs

use crate::error::StoreError;
use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS commits (
    id        TEXT PRIMARY KEY NOT NULL,
    timestamp INTEGER NOT NULL,
    author    TEXT NOT NULL,
    message   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS ix_commit_timestamp ON commits (timestamp);

CREATE TABLE IF NOT EXISTS files (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS snapshots (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    commit_id     TEXT NOT NULL REFERENCES commits (id),
    file_id       INTEGER NOT NULL REFERENCES files (id),
    churn         INTEGER NOT NULL CHECK (churn >= 0),
    hotspot_score REAL NOT NULL CHECK (hotspot_score >= 0.0 AND hotspot_score <= 1.0),
    label         INTEGER CHECK (label IN (0, 1)),
    features      TEXT NOT NULL,
    CONSTRAINT uq_snapshot_commit_file UNIQUE (commit_id, file_id)
);

CREATE INDEX IF NOT EXISTS ix_snapshot_commit ON snapshots (commit_id);
CREATE INDEX IF NOT EXISTS ix_snapshot_file ON snapshots (file_id);
";

/// Applies pragmas and creates any missing tables.
pub fn init(conn: &Connection, on_disk: bool) -> Result<(), StoreError> {
    if on_disk {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(|e| StoreError::query("init sqlite pragmas", e))?;
    }
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| StoreError::query("enable foreign keys", e))?;

    let found: i64 = conn
        .query_row("SELECT user_version FROM pragma_user_version", [], |row| row.get(0))
        .map_err(|e| StoreError::query("read sqlite user_version", e))?;
    if found > SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| StoreError::query("ensure schema", e))?;
    if found < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| StoreError::query("set sqlite user_version", e))?;
    }
    Ok(())
}
