//! Offline training pipeline
//!
//! This module provides:
//! - Feature table construction with the training lag policy
//! - Time-based train/eval split (trailing holdout, positional fallback)
//! - Fitting and persisting the boosted model artifact

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::features::{build_feature_table, LagPolicy};
use crate::gbdt::GradientBoostedModel;
use crate::models::{FeatureRow, UsageRecord};

/// How the feature table was split into train and eval rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    /// Eval rows are the trailing holdout window
    Holdout,
    /// Holdout left a side empty; positional split over time-ordered rows
    Positional,
}

impl SplitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitKind::Holdout => "holdout",
            SplitKind::Positional => "positional",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "holdout" => Some(SplitKind::Holdout),
            "positional" => Some(SplitKind::Positional),
            _ => None,
        }
    }
}

impl std::fmt::Display for SplitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Train and eval partitions of a feature table
#[derive(Debug, Clone)]
pub struct TrainEvalSplit {
    pub kind: SplitKind,
    pub train: Vec<FeatureRow>,
    pub eval: Vec<FeatureRow>,
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Usage records given to the pipeline
    pub records: usize,
    /// Rows left after feature engineering
    pub feature_rows: usize,
    pub train_rows: usize,
    pub eval_rows: usize,
    pub split: SplitKind,
    pub rounds_run: usize,
    pub best_iteration: usize,
    pub best_eval_mae: Option<f64>,
    pub train_mae: f64,
    pub artifact_path: PathBuf,
    /// SHA-256 of the artifact bytes
    pub artifact_version: String,
}

/// Split rows by time: everything within `holdout_days` of the newest row is
/// held out, unless that leaves either side empty.
pub fn split_train_eval(rows: &[FeatureRow], config: &TrainingConfig) -> TrainEvalSplit {
    let Some(max_date) = rows.iter().map(|r| r.date).max() else {
        return TrainEvalSplit {
            kind: SplitKind::Holdout,
            train: Vec::new(),
            eval: Vec::new(),
        };
    };
    let cutoff = max_date - Duration::days(config.holdout_days);

    let (eval, train): (Vec<FeatureRow>, Vec<FeatureRow>) =
        rows.iter().cloned().partition(|r| r.date >= cutoff);
    if !train.is_empty() && !eval.is_empty() {
        return TrainEvalSplit {
            kind: SplitKind::Holdout,
            train,
            eval,
        };
    }

    let mut ordered = rows.to_vec();
    ordered.sort_by_key(|r| r.date);
    let at = ((ordered.len() as f64 * config.fallback_train_fraction).floor() as usize)
        .clamp(1, ordered.len());
    let eval = ordered.split_off(at);
    tracing::debug!(
        train = ordered.len(),
        eval = eval.len(),
        "Holdout window left a side empty, using positional split"
    );
    TrainEvalSplit {
        kind: SplitKind::Positional,
        train: ordered,
        eval,
    }
}

/// Training pipeline manager
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new() -> Self {
        Self {
            config: TrainingConfig::default(),
        }
    }

    pub fn with_config(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Engineer features, split and fit without persisting anything
    pub fn fit(&self, records: &[UsageRecord]) -> Result<(GradientBoostedModel, TrainEvalSplit)> {
        let table = build_feature_table(records, LagPolicy::Training);
        if table.is_empty() {
            return Err(Error::DataInsufficiency(format!(
                "No feature rows from {} records; every entity needs more than 30 days of history",
                records.len()
            )));
        }

        let split = split_train_eval(&table, &self.config);
        tracing::info!(
            rows = table.len(),
            train = split.train.len(),
            eval = split.eval.len(),
            split = %split.kind,
            "Training gradient-boosted model"
        );

        let model = GradientBoostedModel::fit(&split.train, &split.eval, &self.config)?;
        Ok((model, split))
    }

    /// Full offline run: fit and write the artifact to `output`
    pub fn run(&self, records: &[UsageRecord], output: &Path) -> Result<TrainingReport> {
        let (mut model, split) = self.fit(records)?;
        let version = model.save(output)?;

        Ok(TrainingReport {
            records: records.len(),
            feature_rows: split.train.len() + split.eval.len(),
            train_rows: split.train.len(),
            eval_rows: split.eval.len(),
            split: split.kind,
            rounds_run: model.metrics.rounds_run,
            best_iteration: model.best_iteration,
            best_eval_mae: model.metrics.best_eval_mae,
            train_mae: model.metrics.train_mae,
            artifact_path: output.to_path_buf(),
            artifact_version: version,
        })
    }
}

impl Default for TrainingPipeline {
    fn default() -> Self {
        Self::new()
    }
}
