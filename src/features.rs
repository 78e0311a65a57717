// src/features.rs

use crate::error::StoreError;
use crate::model::{FeatureVector, FileId};
use crate::store::SnapshotHistory;

/// Builds the feature vector for `path` at a commit.
///
/// Only snapshots of strictly earlier commits are consulted, so nothing
/// recorded at or after `commit_timestamp` can leak into the result.
pub fn extract<H: SnapshotHistory + ?Sized>(
    history: &H,
    file_id: FileId,
    commit_timestamp: i64,
    churn: u64,
    path: &str,
) -> Result<FeatureVector, StoreError> {
    let time_since_last_edit = history
        .last_edit_before(file_id, commit_timestamp)?
        .map_or(0.0, |previous| (commit_timestamp - previous) as f64);

    Ok(FeatureVector::new(
        churn as f64,
        path_depth(path),
        is_test_file(path),
        time_since_last_edit,
    ))
}

/// Separator count plus one; a root-level file has depth 1.
pub fn path_depth(path: &str) -> f64 {
    (path.matches('/').count() + 1) as f64
}

pub fn is_test_file(path: &str) -> f64 {
    if path.to_lowercase().contains("test") {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Per-file edit timestamps standing in for persisted snapshots.
    struct Edits(HashMap<FileId, Vec<i64>>);

    impl SnapshotHistory for Edits {
        fn last_edit_before(&self, file_id: FileId, timestamp: i64) -> Result<Option<i64>, StoreError> {
            Ok(self
                .0
                .get(&file_id)
                .and_then(|stamps| stamps.iter().copied().filter(|&t| t < timestamp).max()))
        }
    }

    #[test]
    fn depth_counts_separators() {
        assert_eq!(path_depth("README.md"), 1.0);
        assert_eq!(path_depth("src/main.rs"), 2.0);
        assert_eq!(path_depth("a/b/c/d.txt"), 4.0);
    }

    #[test]
    fn test_flag_is_case_insensitive_substring() {
        assert_eq!(is_test_file("tests/ingest.rs"), 1.0);
        assert_eq!(is_test_file("src/TestUtils.java"), 1.0);
        assert_eq!(is_test_file("src/attestation.rs"), 1.0);
        assert_eq!(is_test_file("src/main.rs"), 0.0);
    }

    #[test]
    fn first_edit_has_zero_gap() {
        let history = Edits(HashMap::new());
        let features = extract(&history, 1, 500, 7, "src/lib.rs").unwrap();
        assert_eq!(features, FeatureVector::new(7.0, 2.0, 0.0, 0.0));
    }

    #[test]
    fn gap_uses_latest_strictly_earlier_edit() {
        let history = Edits(HashMap::from([(1, vec![100, 400, 500, 900])]));
        let features = extract(&history, 1, 500, 0, "a.txt").unwrap();
        assert_eq!(features.time_since_last_edit(), 100.0);
    }

    #[test]
    fn same_instant_edit_is_ignored() {
        let history = Edits(HashMap::from([(1, vec![500])]));
        let features = extract(&history, 1, 500, 0, "a.txt").unwrap();
        assert_eq!(features.time_since_last_edit(), 0.0);
    }
}
