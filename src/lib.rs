// src/lib.rs

//! Mines a git repository's history into a (commit, file) snapshot table with
//! per-file features, a hotspot score and a look-ahead bug-fix label.

pub mod error;
pub mod export;
pub mod features;
pub mod ingest;
pub mod label;
pub mod model;
pub mod reader;
pub mod scorer;
pub mod store;

pub use error::{IngestError, ReaderError, ScoreError, StoreError};
pub use ingest::{ingest, IngestOptions};
pub use model::{CommitInfo, FeatureVector, IngestReport, LineStats, TouchedFiles};
pub use reader::{GitHistory, HistorySource};
pub use scorer::{HotspotScorer, LogisticScorer, MlpScorer};
pub use store::{Store, StoreLocation};
