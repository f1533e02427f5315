//! Simcast Core Library
//!
//! Forecasting and diagnosis of mobile-data consumption per role/cohort:
//! - Temporal feature engineering shared by training and inference
//! - Gradient-boosted regression trees with a JSON model artifact
//! - Recursive multi-step forecaster with seedable Gaussian noise
//! - Cohort aggregation into daily and monthly series
//! - Severity classification and contributing-factor ranking
//! - CSV import of usage logs and layered TOML configuration

pub mod aggregate;
pub mod config;
pub mod diagnosis;
pub mod engine;
pub mod error;
pub mod features;
pub mod forecaster;
pub mod gbdt;
pub mod import;
pub mod models;
pub mod regressor;
pub mod report;
pub mod summary;
pub mod training_pipeline;

pub use config::{DiagnosisConfig, ForecastConfig, SimcastConfig, TrainingConfig};
pub use diagnosis::{
    ContributingFactor, DiagnosisEngine, DiagnosisResult, FactorKind, Severity, Thresholds,
};
pub use engine::{EmptyReason, ForecastBundle, ForecastEngine, ForecastOutcome, SeriesPair};
pub use error::{Error, Result};
pub use features::{build_feature_table, LagPolicy, FEATURE_NAMES};
pub use forecaster::{CohortForecast, EntityForecast, RecursiveForecaster, SkippedEntity};
pub use gbdt::GradientBoostedModel;
pub use import::{load_usage_file, parse_usage_csv};
pub use models::{
    CohortFilter, FeatureRow, ForecastSeries, Granularity, SeriesKind, SeriesPoint, UsageRecord,
};
pub use regressor::Regressor;
pub use report::TrendReport;
pub use summary::{DepartmentTotal, UsageSummary};
pub use training_pipeline::{SplitKind, TrainingPipeline, TrainingReport};
