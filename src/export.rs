// src/export.rs

//! Training-set export: every labeled snapshot as one JSON line.

use crate::error::StoreError;
use crate::model::FeatureVector;
use crate::store::Store;
use serde::Serialize;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("write: {0}")]
    Io(#[from] io::Error),

    #[error("encode: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct TrainingRow<'a> {
    commit_id: &'a str,
    path: &'a str,
    features: FeatureVector,
    label: u8,
}

/// Writes labeled snapshots and returns how many rows were written.
pub fn write_training_set<W: Write>(store: &Store, out: &mut W) -> Result<usize, ExportError> {
    let rows = store.labeled_snapshots()?;
    let mut written = 0;
    for snapshot in &rows {
        let Some(label) = snapshot.label else {
            continue;
        };
        let row = TrainingRow {
            commit_id: &snapshot.commit_id,
            path: &snapshot.path,
            features: snapshot.features,
            label,
        };
        serde_json::to_writer(&mut *out, &row)?;
        writeln!(out)?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommitInfo, NewSnapshot};

    #[test]
    fn writes_one_line_per_labeled_snapshot() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = store.begin().unwrap();
        let file = batch.upsert_file("src/a.rs").unwrap();
        for (id, ts, label) in [("c1", 1, Some(1)), ("c2", 2, None)] {
            batch
                .insert_commit(&CommitInfo {
                    id: id.to_string(),
                    timestamp: ts,
                    author: "Lin".to_string(),
                    message: "msg".to_string(),
                })
                .unwrap();
            batch
                .insert_snapshot(&NewSnapshot {
                    commit_id: id.to_string(),
                    file_id: file,
                    churn: 2,
                    hotspot_score: 0.5,
                    label,
                    features: FeatureVector::new(2.0, 2.0, 0.0, 0.0),
                })
                .unwrap();
        }
        batch.commit().unwrap();

        let mut out = Vec::new();
        assert_eq!(write_training_set(&store, &mut out).unwrap(), 1);
        let text = String::from_utf8(out).unwrap();
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["commit_id"], "c1");
        assert_eq!(value["path"], "src/a.rs");
        assert_eq!(value["label"], 1);
        assert_eq!(value["features"], serde_json::json!([2.0, 2.0, 0.0, 0.0]));
    }
}
