// src/model.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Surrogate key of a row in the `files` table
pub type FileId = i64;

/// Number of entries in a feature vector
pub const FEATURE_COUNT: usize = 4;

/// One commit of the walked history, as read from the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    /// Seconds since the Unix epoch, as recorded in the commit
    pub timestamp: i64,
    pub author: String,
    pub message: String,
}

/// Lines added and removed for one file in one commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    pub insertions: u32,
    pub deletions: u32,
}

impl LineStats {
    pub fn new(insertions: u32, deletions: u32) -> Self {
        Self { insertions, deletions }
    }

    pub fn churn(&self) -> u64 {
        u64::from(self.insertions) + u64::from(self.deletions)
    }
}

/// Paths touched by a commit, ordered by path
pub type TouchedFiles = BTreeMap<String, LineStats>;

/// Ordered model input: churn, path depth, test flag, seconds since last edit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(churn: f64, path_depth: f64, is_test_file: f64, time_since_last_edit: f64) -> Self {
        Self([churn, path_depth, is_test_file, time_since_last_edit])
    }

    pub fn churn(&self) -> f64 {
        self.0[0]
    }

    pub fn path_depth(&self) -> f64 {
        self.0[1]
    }

    pub fn is_test_file(&self) -> f64 {
        self.0[2]
    }

    pub fn time_since_last_edit(&self) -> f64 {
        self.0[3]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// A snapshot ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub commit_id: String,
    pub file_id: FileId,
    pub churn: u64,
    pub hotspot_score: f64,
    pub label: Option<u8>,
    pub features: FeatureVector,
}

/// A persisted commit row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredCommit {
    pub id: String,
    pub timestamp: i64,
    pub author: String,
    pub message: String,
}

/// A persisted snapshot joined to its commit timestamp and file path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSnapshot {
    pub id: i64,
    pub commit_id: String,
    pub file_id: FileId,
    pub path: String,
    pub timestamp: i64,
    pub churn: u64,
    pub hotspot_score: f64,
    pub label: Option<u8>,
    pub features: FeatureVector,
}

/// Row counts of the three tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub commits: u64,
    pub files: u64,
    pub snapshots: u64,
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub commits_seen: usize,
    pub commits_added: usize,
    pub snapshots_added: usize,
    /// Snapshots already present from an earlier run
    pub snapshots_skipped: usize,
    /// Snapshots dropped because the scorer rejected their features
    pub score_failures: usize,
    /// Commits whose diff could not be read and were treated as empty
    pub degraded_commits: usize,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.score_failures == 0 && self.degraded_commits == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn churn_sums_both_directions() {
        assert_eq!(LineStats::new(3, 4).churn(), 7);
        assert_eq!(LineStats::default().churn(), 0);
        assert_eq!(LineStats::new(u32::MAX, u32::MAX).churn(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn feature_vector_serializes_as_plain_array() {
        let features = FeatureVector::new(5.0, 2.0, 1.0, 60.0);
        let json = serde_json::to_string(&features).unwrap();
        assert_eq!(json, "[5.0,2.0,1.0,60.0]");
        let back: FeatureVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back.time_since_last_edit(), 60.0);
        assert_eq!(back.path_depth(), 2.0);
    }
}
