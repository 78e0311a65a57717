// src/error.rs

//! Error types for each layer of the pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("open repository {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("commit {commit}: {source}")]
    Commit {
        commit: String,
        #[source]
        source: git2::Error,
    },

    #[error("git: {0}")]
    Git(#[from] git2::Error),
}

impl ReaderError {
    pub fn commit(commit: &str, source: git2::Error) -> Self {
        Self::Commit {
            commit: commit.to_string(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database schema version {found} is newer than supported {supported}")]
    SchemaTooNew { found: i64, supported: i64 },

    #[error("encode features: {0}")]
    Features(#[from] serde_json::Error),

    #[error("value out of range for column {column}: {value}")]
    OutOfRange { column: &'static str, value: String },
}

impl StoreError {
    pub fn query(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Query {
            context: context.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("feature {index} is not finite ({value})")]
    NonFiniteInput { index: usize, value: f64 },

    #[error("model produced a non-finite score")]
    NonFiniteOutput,

    #[error("read model {path}: {source}")]
    ModelRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse model: {0}")]
    ModelFormat(#[from] serde_json::Error),

    #[error("model shape: {0}")]
    ModelShape(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("read history: {0}")]
    History(#[from] ReaderError),

    #[error("store at commit {commit}{}: {source}", path_suffix(.path))]
    Store {
        commit: String,
        path: Option<String>,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    pub fn store(commit: &str, path: Option<&str>, source: StoreError) -> Self {
        Self::Store {
            commit: commit.to_string(),
            path: path.map(str::to_string),
            source,
        }
    }
}

fn path_suffix(path: &Option<String>) -> String {
    path.as_deref().map(|p| format!(" ({p})")).unwrap_or_default()
}
