// src/reader.rs

use crate::error::ReaderError;
use crate::model::{CommitInfo, LineStats, TouchedFiles};
use git2::{Commit, DiffFindOptions, DiffOptions, ErrorCode, ObjectType, Oid, Patch, Repository, Sort};
use std::path::Path;
use tracing::{debug, warn};

/// Read access to a repository's commit history.
///
/// The orchestrator only depends on this trait, so tests can feed it an
/// in-memory history instead of a real repository.
pub trait HistorySource {
    /// Commits of the primary branch, oldest first.
    fn list_commits(&self) -> Result<Vec<CommitInfo>, ReaderError>;

    /// Paths changed by `commit_id` relative to its first parent.
    fn files_touched(&self, commit_id: &str) -> Result<TouchedFiles, ReaderError>;

    /// Contents of `path` as of `commit_id`, `None` if it is not a file there.
    fn read_blob(&self, commit_id: &str, path: &str) -> Result<Option<Vec<u8>>, ReaderError>;
}

/// `HistorySource` backed by a git repository on disk.
pub struct GitHistory {
    repo: Repository,
}

impl GitHistory {
    pub fn open(repo_path: &Path) -> Result<Self, ReaderError> {
        let repo = Repository::open(repo_path).map_err(|source| ReaderError::Open {
            path: repo_path.to_path_buf(),
            source,
        })?;
        debug!(path = %repo_path.display(), "opened repository");
        Ok(Self { repo })
    }

    fn find_commit(&self, commit_id: &str) -> Result<Commit<'_>, ReaderError> {
        let oid = Oid::from_str(commit_id).map_err(|e| ReaderError::commit(commit_id, e))?;
        self.repo
            .find_commit(oid)
            .map_err(|e| ReaderError::commit(commit_id, e))
    }
}

impl HistorySource for GitHistory {
    fn list_commits(&self) -> Result<Vec<CommitInfo>, ReaderError> {
        match self.repo.head() {
            Ok(_) => {}
            Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        // Linear first-parent ancestry of HEAD, walked from the root forward
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.simplify_first_parent()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            commits.push(commit_info(&commit));
        }
        Ok(commits)
    }

    fn files_touched(&self, commit_id: &str) -> Result<TouchedFiles, ReaderError> {
        let commit = self.find_commit(commit_id)?;
        let wrap = |e| ReaderError::commit(commit_id, e);

        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0).and_then(|p| p.tree()).map_err(wrap)?)
        } else {
            None
        };
        let current_tree = commit.tree().map_err(wrap)?;

        let mut diff_opts = DiffOptions::new();
        diff_opts.ignore_filemode(true);

        let mut diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&current_tree), Some(&mut diff_opts))
            .map_err(wrap)?;
        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        diff.find_similar(Some(&mut find_opts)).map_err(wrap)?;

        let mut touched = TouchedFiles::new();
        for (idx, delta) in diff.deltas().enumerate() {
            // Deleted files only carry the old side
            let Some(path) = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().into_owned())
            else {
                continue;
            };

            let stats = match Patch::from_diff(&diff, idx) {
                Ok(Some(patch)) => match patch.line_stats() {
                    Ok((_, additions, deletions)) => LineStats::new(saturate(additions), saturate(deletions)),
                    Err(e) => {
                        warn!(commit = commit_id, path = %path, error = %e, "line stats unavailable, using zero churn");
                        LineStats::default()
                    }
                },
                // Binary content has no line-level patch
                Ok(None) => LineStats::default(),
                Err(e) => {
                    warn!(commit = commit_id, path = %path, error = %e, "patch unavailable, using zero churn");
                    LineStats::default()
                }
            };

            let entry = touched.entry(path).or_default();
            entry.insertions = entry.insertions.saturating_add(stats.insertions);
            entry.deletions = entry.deletions.saturating_add(stats.deletions);
        }
        Ok(touched)
    }

    fn read_blob(&self, commit_id: &str, path: &str) -> Result<Option<Vec<u8>>, ReaderError> {
        let commit = self.find_commit(commit_id)?;
        let tree = commit.tree().map_err(|e| ReaderError::commit(commit_id, e))?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(ReaderError::commit(commit_id, e)),
        };
        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(None);
        }
        let blob = self
            .repo
            .find_blob(entry.id())
            .map_err(|e| ReaderError::commit(commit_id, e))?;
        Ok(Some(blob.content().to_vec()))
    }
}

fn commit_info(commit: &Commit<'_>) -> CommitInfo {
    let author = commit.author();
    CommitInfo {
        id: commit.id().to_string(),
        timestamp: commit.time().seconds(),
        author: author.name().unwrap_or("Unknown").to_string(),
        message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
    }
}

fn saturate(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
