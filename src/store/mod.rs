// src/store/mod.rs

//! SQLite persistence for commits, files and snapshots.
//!
//! [`Store`] is the handle the caller constructs and passes down. Writes go
//! through a [`Batch`], one transaction per history commit, so an interrupted
//! run always stops on a commit boundary.

mod schema;

use crate::error::StoreError;
use crate::model::{CommitInfo, FeatureVector, FileId, NewSnapshot, StoredCommit, StoredSnapshot, TableCounts};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::fmt;
use std::path::{Path, PathBuf};

pub use schema::SCHEMA_VERSION;

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl StoreLocation {
    /// Accepts a plain path, a `sqlite://` URL or `:memory:`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let stripped = raw
            .strip_prefix("sqlite:///")
            .or_else(|| raw.strip_prefix("sqlite://"))
            .unwrap_or(raw);
        if stripped.is_empty() || stripped == ":memory:" {
            Self::Memory
        } else {
            Self::File(PathBuf::from(stripped))
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str(":memory:"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Lookup the feature extractor needs: when was this file last snapshotted
/// strictly before a given instant.
pub trait SnapshotHistory {
    fn last_edit_before(&self, file_id: FileId, timestamp: i64) -> Result<Option<i64>, StoreError>;
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(location: &StoreLocation) -> Result<Self, StoreError> {
        match location {
            StoreLocation::Memory => Self::open_in_memory(),
            StoreLocation::File(path) => Self::open_path(path),
        }
    }

    pub fn open_path(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::query(format!("open sqlite {}", path.display()), e))?;
        schema::init(&conn, true)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::query("open sqlite in memory", e))?;
        schema::init(&conn, false)?;
        Ok(Self { conn })
    }

    /// Starts the unit of work for one history commit.
    pub fn begin(&mut self) -> Result<Batch<'_>, StoreError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StoreError::query("begin transaction", e))?;
        Ok(Batch { tx })
    }

    pub fn counts(&self) -> Result<TableCounts, StoreError> {
        let count = |table: &str| -> Result<u64, StoreError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .map_err(|e| StoreError::query(format!("count {table}"), e))?;
            Ok(n.max(0) as u64)
        };
        Ok(TableCounts {
            commits: count("commits")?,
            files: count("files")?,
            snapshots: count("snapshots")?,
        })
    }

    /// All commits ordered by timestamp, ties broken by insertion order.
    pub fn commits(&self) -> Result<Vec<StoredCommit>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, timestamp, author, message FROM commits ORDER BY timestamp, rowid")
            .map_err(|e| StoreError::query("list commits", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredCommit {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    author: row.get(2)?,
                    message: row.get(3)?,
                })
            })
            .map_err(|e| StoreError::query("list commits", e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::query("list commits", e))
    }

    pub fn file_id(&self, path: &str) -> Result<Option<FileId>, StoreError> {
        self.conn
            .query_row("SELECT id FROM files WHERE path = ?1", params![path], |row| row.get(0))
            .optional()
            .map_err(|e| StoreError::query(format!("look up file {path}"), e))
    }

    pub fn snapshots_for_commit(&self, commit_id: &str) -> Result<Vec<StoredSnapshot>, StoreError> {
        self.query_snapshots(
            &format!("{SNAPSHOT_SELECT} WHERE s.commit_id = ?1 ORDER BY f.path"),
            params![commit_id],
            &format!("snapshots of commit {commit_id}"),
        )
    }

    /// Timeline of one file, oldest snapshot first.
    pub fn snapshots_for_file(&self, path: &str) -> Result<Vec<StoredSnapshot>, StoreError> {
        self.query_snapshots(
            &format!("{SNAPSHOT_SELECT} WHERE f.path = ?1 ORDER BY c.timestamp, s.id"),
            params![path],
            &format!("snapshots of file {path}"),
        )
    }

    /// Snapshots that carry a label, in ingestion order.
    pub fn labeled_snapshots(&self) -> Result<Vec<StoredSnapshot>, StoreError> {
        self.query_snapshots(
            &format!("{SNAPSHOT_SELECT} WHERE s.label IS NOT NULL ORDER BY s.id"),
            params![],
            "labeled snapshots",
        )
    }

    fn query_snapshots(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        context: &str,
    ) -> Result<Vec<StoredSnapshot>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| StoreError::query(context, e))?;
        let rows = stmt
            .query_map(params, snapshot_from_row)
            .map_err(|e| StoreError::query(context, e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::query(context, e))
    }
}

impl SnapshotHistory for Store {
    fn last_edit_before(&self, file_id: FileId, timestamp: i64) -> Result<Option<i64>, StoreError> {
        last_edit_before(&self.conn, file_id, timestamp)
    }
}

/// Writes for a single history commit. Dropping a batch without calling
/// [`Batch::commit`] rolls every write back.
pub struct Batch<'a> {
    tx: Transaction<'a>,
}

impl Batch<'_> {
    /// Inserts the commit unless its id is already stored. Returns whether a
    /// row was added.
    pub fn insert_commit(&self, commit: &CommitInfo) -> Result<bool, StoreError> {
        let changed = self
            .tx
            .execute(
                "INSERT INTO commits (id, timestamp, author, message) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (id) DO NOTHING",
                params![commit.id, commit.timestamp, commit.author, commit.message.trim_end()],
            )
            .map_err(|e| StoreError::query(format!("insert commit {}", commit.id), e))?;
        Ok(changed > 0)
    }

    /// Returns the id for `path`, creating the row on first sight. A single
    /// statement, so there is no window between lookup and insert.
    pub fn upsert_file(&self, path: &str) -> Result<FileId, StoreError> {
        self.tx
            .query_row(
                "INSERT INTO files (path) VALUES (?1)
                 ON CONFLICT (path) DO UPDATE SET path = excluded.path
                 RETURNING id",
                params![path],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::query(format!("upsert file {path}"), e))
    }

    pub fn snapshot_exists(&self, commit_id: &str, file_id: FileId) -> Result<bool, StoreError> {
        self.tx
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM snapshots WHERE commit_id = ?1 AND file_id = ?2)",
                params![commit_id, file_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::query(format!("check snapshot {commit_id}/{file_id}"), e))
    }

    /// Inserts the snapshot unless `(commit_id, file_id)` is already present.
    /// Returns whether a row was added.
    pub fn insert_snapshot(&self, snapshot: &NewSnapshot) -> Result<bool, StoreError> {
        let churn = i64::try_from(snapshot.churn).map_err(|_| StoreError::OutOfRange {
            column: "churn",
            value: snapshot.churn.to_string(),
        })?;
        if !(0.0..=1.0).contains(&snapshot.hotspot_score) {
            return Err(StoreError::OutOfRange {
                column: "hotspot_score",
                value: snapshot.hotspot_score.to_string(),
            });
        }
        let features = serde_json::to_string(&snapshot.features)?;
        let changed = self
            .tx
            .execute(
                "INSERT INTO snapshots (commit_id, file_id, churn, hotspot_score, label, features)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (commit_id, file_id) DO NOTHING",
                params![
                    snapshot.commit_id,
                    snapshot.file_id,
                    churn,
                    snapshot.hotspot_score,
                    snapshot.label,
                    features
                ],
            )
            .map_err(|e| {
                StoreError::query(
                    format!("insert snapshot {}/{}", snapshot.commit_id, snapshot.file_id),
                    e,
                )
            })?;
        Ok(changed > 0)
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .map_err(|e| StoreError::query("commit transaction", e))
    }
}

impl SnapshotHistory for Batch<'_> {
    fn last_edit_before(&self, file_id: FileId, timestamp: i64) -> Result<Option<i64>, StoreError> {
        last_edit_before(&self.tx, file_id, timestamp)
    }
}

const SNAPSHOT_SELECT: &str = "SELECT s.id, s.commit_id, s.file_id, f.path, c.timestamp, s.churn, \
     s.hotspot_score, s.label, s.features \
     FROM snapshots s \
     JOIN commits c ON c.id = s.commit_id \
     JOIN files f ON f.id = s.file_id";

fn last_edit_before(conn: &Connection, file_id: FileId, timestamp: i64) -> Result<Option<i64>, StoreError> {
    conn.query_row(
        "SELECT MAX(c.timestamp) FROM snapshots s
         JOIN commits c ON c.id = s.commit_id
         WHERE s.file_id = ?1 AND c.timestamp < ?2",
        params![file_id, timestamp],
        |row| row.get::<_, Option<i64>>(0),
    )
    .map_err(|e| StoreError::query(format!("last edit of file {file_id}"), e))
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSnapshot> {
    let churn: i64 = row.get(5)?;
    let raw_features: String = row.get(8)?;
    let features: FeatureVector = serde_json::from_str(&raw_features)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
    Ok(StoredSnapshot {
        id: row.get(0)?,
        commit_id: row.get(1)?,
        file_id: row.get(2)?,
        path: row.get(3)?,
        timestamp: row.get(4)?,
        churn: churn.max(0) as u64,
        hotspot_score: row.get(6)?,
        label: row.get(7)?,
        features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(id: &str, timestamp: i64) -> CommitInfo {
        CommitInfo {
            id: id.to_string(),
            timestamp,
            author: "Ada".to_string(),
            message: format!("commit {id}\n\n"),
        }
    }

    fn snapshot(commit_id: &str, file_id: FileId, label: Option<u8>) -> NewSnapshot {
        NewSnapshot {
            commit_id: commit_id.to_string(),
            file_id,
            churn: 4,
            hotspot_score: 0.25,
            label,
            features: FeatureVector::new(4.0, 1.0, 0.0, 0.0),
        }
    }

    #[test]
    fn location_accepts_urls_and_paths() {
        assert_eq!(StoreLocation::parse(":memory:"), StoreLocation::Memory);
        assert_eq!(StoreLocation::parse("sqlite://"), StoreLocation::Memory);
        assert_eq!(
            StoreLocation::parse("sqlite:///tmp/hot.db"),
            StoreLocation::File(PathBuf::from("tmp/hot.db"))
        );
        assert_eq!(
            StoreLocation::parse("sqlite:////tmp/hot.db"),
            StoreLocation::File(PathBuf::from("/tmp/hot.db"))
        );
        assert_eq!(
            StoreLocation::parse("data/hot.db"),
            StoreLocation::File(PathBuf::from("data/hot.db"))
        );
    }

    #[test]
    fn commit_insert_is_idempotent_and_trims_message() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = store.begin().unwrap();
        assert!(batch.insert_commit(&commit("c1", 10)).unwrap());
        assert!(!batch.insert_commit(&commit("c1", 10)).unwrap());
        batch.commit().unwrap();

        let commits = store.commits().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "commit c1");
    }

    #[test]
    fn upsert_file_returns_the_same_id_for_a_path() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = store.begin().unwrap();
        let a = batch.upsert_file("src/a.rs").unwrap();
        let b = batch.upsert_file("src/b.rs").unwrap();
        assert_ne!(a, b);
        assert_eq!(batch.upsert_file("src/a.rs").unwrap(), a);
        batch.commit().unwrap();

        assert_eq!(store.counts().unwrap().files, 2);
        assert_eq!(store.file_id("src/a.rs").unwrap(), Some(a));
        assert_eq!(store.file_id("missing").unwrap(), None);
    }

    #[test]
    fn duplicate_snapshot_is_a_no_op() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = store.begin().unwrap();
        batch.insert_commit(&commit("c1", 10)).unwrap();
        let file = batch.upsert_file("a.txt").unwrap();
        assert!(!batch.snapshot_exists("c1", file).unwrap());
        assert!(batch.insert_snapshot(&snapshot("c1", file, Some(1))).unwrap());
        assert!(batch.snapshot_exists("c1", file).unwrap());
        assert!(!batch.insert_snapshot(&snapshot("c1", file, Some(0))).unwrap());
        batch.commit().unwrap();

        let rows = store.snapshots_for_commit("c1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, Some(1));
        assert_eq!(rows[0].path, "a.txt");
        assert_eq!(rows[0].features, FeatureVector::new(4.0, 1.0, 0.0, 0.0));
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = store.begin().unwrap();
        batch.insert_commit(&commit("c1", 10)).unwrap();
        let file = batch.upsert_file("a.txt").unwrap();
        let mut bad = snapshot("c1", file, None);
        bad.hotspot_score = 1.5;
        assert!(matches!(
            batch.insert_snapshot(&bad),
            Err(StoreError::OutOfRange { column: "hotspot_score", .. })
        ));
    }

    #[test]
    fn snapshot_requires_known_commit() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = store.begin().unwrap();
        let file = batch.upsert_file("a.txt").unwrap();
        let err = batch.insert_snapshot(&snapshot("nope", file, None)).unwrap_err();
        assert!(matches!(err, StoreError::Query { .. }));
        assert!(err.to_string().starts_with("insert snapshot nope/"));
    }

    #[test]
    fn dropped_batch_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();
        {
            let batch = store.begin().unwrap();
            batch.insert_commit(&commit("c1", 10)).unwrap();
            batch.upsert_file("a.txt").unwrap();
        }
        assert_eq!(store.counts().unwrap(), TableCounts::default());
    }

    #[test]
    fn last_edit_only_looks_strictly_backwards() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = store.begin().unwrap();
        let file = batch.upsert_file("a.txt").unwrap();
        for (id, ts) in [("c1", 100), ("c2", 200), ("c3", 300)] {
            batch.insert_commit(&commit(id, ts)).unwrap();
            batch.insert_snapshot(&snapshot(id, file, None)).unwrap();
        }
        batch.commit().unwrap();

        assert_eq!(store.last_edit_before(file, 100).unwrap(), None);
        assert_eq!(store.last_edit_before(file, 200).unwrap(), Some(100));
        assert_eq!(store.last_edit_before(file, 250).unwrap(), Some(200));
        assert_eq!(store.last_edit_before(file, 1_000).unwrap(), Some(300));
        assert_eq!(store.last_edit_before(file + 1, 1_000).unwrap(), None);

        let timeline = store.snapshots_for_file("a.txt").unwrap();
        let stamps: Vec<i64> = timeline.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[test]
    fn labeled_snapshots_skip_unlabeled_rows() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = store.begin().unwrap();
        let file = batch.upsert_file("a.txt").unwrap();
        batch.insert_commit(&commit("c1", 1)).unwrap();
        batch.insert_commit(&commit("c2", 2)).unwrap();
        batch.insert_snapshot(&snapshot("c1", file, Some(0))).unwrap();
        batch.insert_snapshot(&snapshot("c2", file, None)).unwrap();
        batch.commit().unwrap();

        let labeled = store.labeled_snapshots().unwrap();
        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].commit_id, "c1");
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hot.db");
        drop(Store::open_path(&path).unwrap());
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1).unwrap();
        }
        assert!(matches!(
            Store::open_path(&path),
            Err(StoreError::SchemaTooNew { .. })
        ));
    }
}
