//! Gradient-boosted regression trees with an absolute-error objective
//!
//! This is the shipped [`Regressor`](crate::regressor::Regressor): trained
//! offline by the training pipeline, persisted as a JSON artifact and loaded
//! read-only by the CLI before forecasting.

pub mod encoding;
pub mod model;
pub mod tree;

pub use encoding::CategoricalEncoder;
pub use model::{GradientBoostedModel, TrainingMetrics, ARTIFACT_FORMAT_VERSION};
pub use tree::{FeatureVector, RegressionTree, TreeParams};

/// Width of an encoded feature vector (numeric fields then categorical codes)
pub const FEATURE_COUNT: usize = 16;
