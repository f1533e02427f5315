//! Boosting loop and the persisted model artifact

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::features::{CATEGORICAL_FEATURES, FEATURE_NAMES, NUMERIC_FEATURE_COUNT};
use crate::models::FeatureRow;
use crate::regressor::Regressor;

use super::encoding::CategoricalEncoder;
use super::tree::{median, FeatureVector, RegressionTree, TreeParams};
use super::FEATURE_COUNT;

/// Bumped whenever the JSON layout changes incompatibly
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Figures recorded while fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub train_rows: usize,
    pub eval_rows: usize,
    /// Rounds actually run before stopping
    pub rounds_run: usize,
    pub train_mae: f64,
    /// MAE on the evaluation rows at the best round (`None` without eval rows)
    pub best_eval_mae: Option<f64>,
}

/// A trained, immutable boosted model.
///
/// The JSON encoding carries no timestamps, so the same data and seed always
/// produce the same bytes and therefore the same [`version`](Self::version).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedModel {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub categorical_features: Vec<String>,
    pub encoder: CategoricalEncoder,
    pub init_score: f64,
    pub learning_rate: f64,
    pub best_iteration: usize,
    pub metrics: TrainingMetrics,
    trees: Vec<RegressionTree>,
    /// SHA-256 of the artifact bytes, set by save/load
    #[serde(skip)]
    version: Option<String>,
}

/// Negative gradient of |y - p| with respect to p
fn l1_gradient(residual: f64) -> f64 {
    if residual > 0.0 {
        1.0
    } else if residual < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn mean_absolute_error(targets: &[f64], predictions: &[f64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let total: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(y, p)| (y - p).abs())
        .sum();
    total / targets.len() as f64
}

fn targets_of(rows: &[FeatureRow]) -> Result<Vec<f64>> {
    rows.iter()
        .map(|row| {
            row.volume_gb.ok_or_else(|| {
                Error::Training(format!(
                    "Row for {} on {} has no target value",
                    row.entity_id, row.date
                ))
            })
        })
        .collect()
}

fn sample_size(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction).round() as usize).clamp(1, total.max(1))
}

pub(crate) fn artifact_version(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl GradientBoostedModel {
    /// Fit on `train`, early-stopping on `eval` when it is non-empty
    pub fn fit(train: &[FeatureRow], eval: &[FeatureRow], config: &TrainingConfig) -> Result<Self> {
        if train.is_empty() {
            return Err(Error::DataInsufficiency(
                "No training rows to fit a model on".into(),
            ));
        }

        let encoder = CategoricalEncoder::fit(train);
        let x_train: Vec<FeatureVector> = train.iter().map(|r| encoder.encode(r)).collect();
        let y_train = targets_of(train)?;
        let x_eval: Vec<FeatureVector> = eval.iter().map(|r| encoder.encode(r)).collect();
        let y_eval = targets_of(eval)?;

        let init_score = median(&mut y_train.clone()).unwrap_or(0.0);
        let mut pred_train = vec![init_score; y_train.len()];
        let mut pred_eval = vec![init_score; y_eval.len()];

        let mut categorical = [false; FEATURE_COUNT];
        for flag in categorical.iter_mut().skip(NUMERIC_FEATURE_COUNT) {
            *flag = true;
        }
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf,
            shrinkage: config.learning_rate,
        };

        let n = y_train.len();
        let bag_size = sample_size(n, config.bagging_fraction);
        let feature_count = sample_size(FEATURE_COUNT, config.feature_fraction);
        let bagging = config.bagging_freq > 0 && bag_size < n;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut bag: Vec<usize> = (0..n).collect();
        let mut trees: Vec<RegressionTree> = Vec::new();
        let mut best_eval: Option<f64> = None;
        let mut best_iteration = 0;
        let mut since_best = 0;
        let mut rounds_run = 0;

        for round in 0..config.n_estimators {
            if bagging && round % config.bagging_freq == 0 {
                bag = index::sample(&mut rng, n, bag_size).into_vec();
                bag.sort_unstable();
            }
            let mut allowed = index::sample(&mut rng, FEATURE_COUNT, feature_count).into_vec();
            allowed.sort_unstable();

            let residuals: Vec<f64> = y_train
                .iter()
                .zip(&pred_train)
                .map(|(y, p)| y - p)
                .collect();
            let gradients: Vec<f64> = residuals.iter().map(|r| l1_gradient(*r)).collect();

            let tree = RegressionTree::fit(
                &x_train,
                &gradients,
                &residuals,
                bag.clone(),
                &allowed,
                &categorical,
                params,
            );
            for (p, x) in pred_train.iter_mut().zip(&x_train) {
                *p += tree.predict(x);
            }
            for (p, x) in pred_eval.iter_mut().zip(&x_eval) {
                *p += tree.predict(x);
            }
            trees.push(tree);
            rounds_run = round + 1;

            if y_eval.is_empty() {
                best_iteration = rounds_run;
            } else {
                let mae = mean_absolute_error(&y_eval, &pred_eval);
                if best_eval.map_or(true, |best| mae < best) {
                    best_eval = Some(mae);
                    best_iteration = rounds_run;
                    since_best = 0;
                } else {
                    since_best += 1;
                }
            }

            if config.log_period > 0 && rounds_run % config.log_period == 0 {
                tracing::info!(
                    round = rounds_run,
                    train_mae = mean_absolute_error(&y_train, &pred_train),
                    eval_mae = ?best_eval,
                    "Boosting progress"
                );
            }

            if !y_eval.is_empty() && since_best >= config.early_stopping_rounds {
                tracing::info!(
                    round = rounds_run,
                    best_iteration,
                    "Early stopping, no eval improvement"
                );
                break;
            }
        }

        trees.truncate(best_iteration);

        let mut model = Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            categorical_features: CATEGORICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
            encoder,
            init_score,
            learning_rate: config.learning_rate,
            best_iteration,
            metrics: TrainingMetrics {
                train_rows: n,
                eval_rows: y_eval.len(),
                rounds_run,
                train_mae: 0.0,
                best_eval_mae: best_eval,
            },
            trees,
            version: None,
        };
        let final_train: Vec<f64> = x_train.iter().map(|x| model.predict_encoded(x)).collect();
        model.metrics.train_mae = mean_absolute_error(&y_train, &final_train);
        Ok(model)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Artifact identifier, available once the model was saved or loaded
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn predict_encoded(&self, x: &FeatureVector) -> f64 {
        self.init_score + self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Write the artifact and return its version
    pub fn save(&mut self, path: &Path) -> Result<String> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, &bytes)?;

        let version = artifact_version(&bytes);
        tracing::info!(path = %path.display(), %version, trees = self.trees.len(), "Saved model artifact");
        self.version = Some(version.clone());
        Ok(version)
    }

    /// Load an artifact written by [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self> {
        let unavailable = |reason: String| Error::ArtifactUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = fs::read(path).map_err(|e| unavailable(e.to_string()))?;
        let mut model: Self = serde_json::from_slice(&bytes)
            .map_err(|e| unavailable(format!("corrupt artifact: {}", e)))?;

        if model.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(unavailable(format!(
                "unsupported format version {}",
                model.format_version
            )));
        }
        if model.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(unavailable("feature contract mismatch".into()));
        }

        for (i, tree) in model.trees.iter().enumerate() {
            tree.validate()
                .map_err(|e| unavailable(format!("corrupt tree {}: {}", i, e)))?;
        }

        let version = artifact_version(&bytes);
        tracing::debug!(path = %path.display(), %version, "Loaded model artifact");
        model.version = Some(version);
        Ok(model)
    }
}

impl Regressor for GradientBoostedModel {
    fn predict(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter()
            .map(|row| self.predict_encoded(&self.encoder.encode(row)))
            .collect()
    }
}
