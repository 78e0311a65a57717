// src/scorer.rs

use crate::error::ScoreError;
use crate::model::{FeatureVector, FEATURE_COUNT};
use serde::Deserialize;
use std::fs;
use std::path::Path;

const HIDDEN_UNITS: usize = 16;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Maps a feature vector to a probability in [0, 1].
///
/// Implementations must be pure: the same model state and input always give
/// the same score. They are shared across threads while a commit's files are
/// scored.
pub trait HotspotScorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoreError>;
}

/// Built-in scorer: logistic regression over log-scaled churn and edit gap.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticScorer {
    /// Weights for ln(1+churn), depth, test flag, ln(1+days since last edit)
    pub weights: [f64; FEATURE_COUNT],
    pub bias: f64,
}

impl Default for LogisticScorer {
    fn default() -> Self {
        Self {
            weights: [0.55, 0.08, -0.9, -0.35],
            bias: -2.0,
        }
    }
}

impl HotspotScorer for LogisticScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        check_finite(features)?;
        let inputs = [
            features.churn().max(0.0).ln_1p(),
            features.path_depth(),
            features.is_test_file(),
            (features.time_since_last_edit().max(0.0) / SECONDS_PER_DAY).ln_1p(),
        ];
        let z = self.bias + dot(&self.weights, &inputs);
        finish(sigmoid(z))
    }
}

/// 4-16-1 feed-forward network: ReLU hidden layer, sigmoid output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MlpScorer {
    /// Hidden layer weights, one row of 4 per hidden unit
    w1: Vec<Vec<f64>>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: f64,
}

impl MlpScorer {
    pub fn from_path(path: &Path) -> Result<Self, ScoreError> {
        let raw = fs::read_to_string(path).map_err(|source| ScoreError::ModelRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ScoreError> {
        let model: Self = serde_json::from_str(raw)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ScoreError> {
        if self.w1.len() != HIDDEN_UNITS {
            return Err(ScoreError::ModelShape(format!(
                "w1 has {} rows, expected {HIDDEN_UNITS}",
                self.w1.len()
            )));
        }
        if let Some(row) = self.w1.iter().position(|row| row.len() != FEATURE_COUNT) {
            return Err(ScoreError::ModelShape(format!(
                "w1 row {row} has {} columns, expected {FEATURE_COUNT}",
                self.w1[row].len()
            )));
        }
        if self.b1.len() != HIDDEN_UNITS || self.w2.len() != HIDDEN_UNITS {
            return Err(ScoreError::ModelShape(format!(
                "b1/w2 have {}/{} entries, expected {HIDDEN_UNITS}",
                self.b1.len(),
                self.w2.len()
            )));
        }
        let all_finite = self
            .w1
            .iter()
            .flatten()
            .chain(&self.b1)
            .chain(&self.w2)
            .chain(std::iter::once(&self.b2))
            .all(|w| w.is_finite());
        if !all_finite {
            return Err(ScoreError::ModelShape("non-finite weight".to_string()));
        }
        Ok(())
    }
}

impl HotspotScorer for MlpScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoreError> {
        check_finite(features)?;
        let hidden = self
            .w1
            .iter()
            .zip(&self.b1)
            .map(|(row, bias)| (dot(row, features.as_slice()) + bias).max(0.0));
        let z = self.b2 + hidden.zip(&self.w2).map(|(h, w)| h * w).sum::<f64>();
        finish(sigmoid(z))
    }
}

fn check_finite(features: &FeatureVector) -> Result<(), ScoreError> {
    match features.as_slice().iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ScoreError::NonFiniteInput {
            index,
            value: features.as_slice()[index],
        }),
        None => Ok(()),
    }
}

fn finish(score: f64) -> Result<f64, ScoreError> {
    if score.is_finite() {
        Ok(score.clamp(0.0, 1.0))
    } else {
        Err(ScoreError::NonFiniteOutput)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
