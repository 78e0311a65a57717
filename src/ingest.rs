// src/ingest.rs

use crate::error::{IngestError, ScoreError};
use crate::features;
use crate::label::{self, Lookahead};
use crate::model::{CommitInfo, FeatureVector, FileId, IngestReport, NewSnapshot, TouchedFiles};
use crate::reader::HistorySource;
use crate::scorer::HotspotScorer;
use crate::store::Store;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Knobs for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Draw a progress bar over commits on stderr.
    pub show_progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { show_progress: true }
    }
}

/// A touched file whose features and label are known but not yet scored.
struct Pending<'a> {
    path: &'a str,
    file_id: FileId,
    churn: u64,
    features: FeatureVector,
    label: Option<u8>,
}

/// Walks the history oldest-first and writes one snapshot per touched file.
///
/// Each history commit is written as one transaction. Rows that already
/// exist are skipped, so running twice over the same history adds nothing
/// the second time.
///
/// Snapshots are never updated, so the last commit of a run keeps an empty
/// label even after later runs ingest its successors, and is never exported
/// as training data.
pub fn ingest<H>(
    history: &H,
    store: &mut Store,
    scorer: &dyn HotspotScorer,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError>
where
    H: HistorySource + ?Sized,
{
    // 1. The whole ordered history stays in memory for the lookahead
    let commits = history.list_commits()?;
    info!(commits = commits.len(), "walking history");

    let mut report = IngestReport {
        commits_seen: commits.len(),
        ..IngestReport::default()
    };

    let bar = if options.show_progress {
        ProgressBar::new(commits.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} commits {msg}") {
        bar.set_style(style);
    }

    // 2. Touched sets are read once: commit i+1's set is the lookahead for i
    //    and becomes the working set on the next iteration.
    let mut current = match commits.first() {
        Some(first) => touched_or_empty(history, first, &mut report),
        None => TouchedFiles::new(),
    };

    for (i, commit) in commits.iter().enumerate() {
        let next = match commits.get(i + 1) {
            Some(next_commit) => Some((next_commit, touched_or_empty(history, next_commit, &mut report))),
            None => None,
        };
        let lookahead = next.as_ref().map(|(next_commit, touched)| Lookahead {
            message: &next_commit.message,
            touched,
        });

        ingest_commit(store, scorer, commit, &current, lookahead, &mut report)?;

        current = next.map(|(_, touched)| touched).unwrap_or_default();
        bar.inc(1);
    }
    bar.finish_with_message("done");

    info!(
        commits_added = report.commits_added,
        snapshots_added = report.snapshots_added,
        snapshots_skipped = report.snapshots_skipped,
        score_failures = report.score_failures,
        degraded_commits = report.degraded_commits,
        "ingestion finished"
    );
    Ok(report)
}

fn ingest_commit(
    store: &mut Store,
    scorer: &dyn HotspotScorer,
    commit: &CommitInfo,
    touched: &TouchedFiles,
    lookahead: Option<Lookahead<'_>>,
    report: &mut IngestReport,
) -> Result<(), IngestError> {
    let batch = store
        .begin()
        .map_err(|e| IngestError::store(&commit.id, None, e))?;

    if batch
        .insert_commit(commit)
        .map_err(|e| IngestError::store(&commit.id, None, e))?
    {
        report.commits_added += 1;
    }

    // Plan: register files and derive features from strictly earlier snapshots
    let mut pending = Vec::with_capacity(touched.len());
    for (path, stats) in touched {
        let wrap = |e| IngestError::store(&commit.id, Some(path.as_str()), e);
        let file_id = batch.upsert_file(path).map_err(wrap)?;
        if batch.snapshot_exists(&commit.id, file_id).map_err(wrap)? {
            report.snapshots_skipped += 1;
            continue;
        }
        let churn = stats.churn();
        let features = features::extract(&batch, file_id, commit.timestamp, churn, path).map_err(wrap)?;
        pending.push(Pending {
            path: path.as_str(),
            file_id,
            churn,
            features,
            label: label::label(lookahead, path),
        });
    }

    // Score: files of one commit are independent of each other
    let scores: Vec<Result<f64, ScoreError>> = pending
        .par_iter()
        .map(|p| scorer.score(&p.features))
        .collect();

    // Write
    for (p, score) in pending.into_iter().zip(scores) {
        let hotspot_score = match score {
            Ok(score) => score,
            Err(e) => {
                warn!(commit = %commit.id, path = p.path, error = %e, "scoring failed, snapshot not written");
                report.score_failures += 1;
                continue;
            }
        };
        let snapshot = NewSnapshot {
            commit_id: commit.id.clone(),
            file_id: p.file_id,
            churn: p.churn,
            hotspot_score,
            label: p.label,
            features: p.features,
        };
        let added = batch
            .insert_snapshot(&snapshot)
            .map_err(|e| IngestError::store(&commit.id, Some(p.path), e))?;
        if added {
            report.snapshots_added += 1;
        } else {
            report.snapshots_skipped += 1;
        }
    }

    batch
        .commit()
        .map_err(|e| IngestError::store(&commit.id, None, e))?;
    debug!(commit = %commit.id, files = touched.len(), "commit ingested");
    Ok(())
}

/// Per-commit read failures degrade to an empty diff instead of aborting.
fn touched_or_empty<H: HistorySource + ?Sized>(
    history: &H,
    commit: &CommitInfo,
    report: &mut IngestReport,
) -> TouchedFiles {
    match history.files_touched(&commit.id) {
        Ok(touched) => touched,
        Err(e) => {
            warn!(commit = %commit.id, error = %e, "diff unavailable, treating commit as empty");
            report.degraded_commits += 1;
            TouchedFiles::new()
        }
    }
}
