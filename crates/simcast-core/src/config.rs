//! Configuration for forecasting, diagnosis and training
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/simcast/config/simcast.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Override files may be partial; absent keys keep their default values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/simcast.toml");

/// Recursive forecaster settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Minimum observed days for an entity to be forecast
    pub min_history: usize,
    /// Trailing observed values used to seed the recursion
    pub buffer_len: usize,
    /// Days projected per requested month
    pub days_per_month: u32,
    /// Noise scale multiplier applied to the buffer std
    pub noise_factor: f64,
    /// Noise scale used when the std is zero or undefined
    pub noise_floor: f64,
    /// Multiplicative adjustment applied to every projected day
    pub drift: f64,
    pub max_horizon_months: u32,
    /// Fixed seed for the noise generator; a fresh one per run when unset
    pub seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_history: 15,
            buffer_len: 60,
            days_per_month: 30,
            noise_factor: 0.6,
            noise_floor: 1.0,
            drift: 1.001,
            max_horizon_months: 12,
            seed: None,
        }
    }
}

/// Diagnosis thresholds and factor rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    /// Warning threshold = mean + warning_sigma * std
    pub warning_sigma: f64,
    /// Critical threshold = mean + critical_sigma * std
    pub critical_sigma: f64,
    /// Used when the historical std is zero or undefined
    pub sigma_floor: f64,
    /// How many top entities are considered for contributor statements
    pub top_entities: usize,
    pub principal_share_pct: f64,
    pub device_share_pct: f64,
    pub risk_share_pct: f64,
    pub weekend_share_pct: f64,
    /// Case-insensitive substrings marking a risky line status
    pub risk_keywords: Vec<String>,
    /// Event tags that mean "no event" (case-insensitive)
    pub no_event_markers: Vec<String>,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            warning_sigma: 1.2,
            critical_sigma: 2.0,
            sigma_floor: 1.0,
            top_entities: 3,
            principal_share_pct: 20.0,
            device_share_pct: 30.0,
            risk_share_pct: 1.0,
            weekend_share_pct: 20.0,
            risk_keywords: vec![
                "roaming".to_string(),
                "excesso".to_string(),
                "excess".to_string(),
                "bloqueado".to_string(),
                "blocked".to_string(),
            ],
            no_event_markers: vec!["none".to_string(), "nenhum".to_string()],
        }
    }
}

/// Gradient boosting and split settings for the offline training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Trailing days of the table held out for evaluation
    pub holdout_days: i64,
    /// Positional split used when the holdout leaves either side empty
    pub fallback_train_fraction: f64,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Share of features sampled per tree
    pub feature_fraction: f64,
    /// Share of rows sampled when bagging
    pub bagging_fraction: f64,
    /// Re-draw the bag every N rounds (0 disables bagging)
    pub bagging_freq: usize,
    /// Stop after this many rounds without eval improvement
    pub early_stopping_rounds: usize,
    /// Log progress every N rounds
    pub log_period: usize,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout_days: 30,
            fallback_train_fraction: 0.8,
            n_estimators: 2000,
            learning_rate: 0.02,
            max_depth: 5,
            min_samples_leaf: 20,
            feature_fraction: 0.9,
            bagging_fraction: 0.8,
            bagging_freq: 5,
            early_stopping_rounds: 100,
            log_period: 100,
            seed: 42,
        }
    }
}

/// Full simcast configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimcastConfig {
    pub forecast: ForecastConfig,
    pub diagnosis: DiagnosisConfig,
    pub training: TrainingConfig,
}

impl SimcastConfig {
    /// Load configuration (override first, then embedded default)
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = match override_path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };

        let content = match path {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "Loading config override");
                fs::read_to_string(&path)
                    .map_err(|e| Error::InvalidData(format!("Failed to read config: {}", e)))?
            }
            _ => DEFAULT_CONFIG.to_string(),
        };

        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config from TOML content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::InvalidData(format!("Invalid config TOML: {}", e)))
    }

    /// Reject values the algorithms cannot work with
    pub fn validate(&self) -> Result<()> {
        let f = &self.forecast;
        if f.min_history == 0 || f.buffer_len == 0 || f.days_per_month == 0 {
            return Err(Error::InvalidData(
                "forecast.min_history, buffer_len and days_per_month must be positive".into(),
            ));
        }
        if f.max_horizon_months == 0
            || f.max_horizon_months.checked_mul(f.days_per_month).is_none()
        {
            return Err(Error::InvalidData(format!(
                "forecast horizon of {} months x {} days is out of range",
                f.max_horizon_months, f.days_per_month
            )));
        }
        if f.noise_factor < 0.0 || f.noise_floor <= 0.0 {
            return Err(Error::InvalidData(
                "forecast.noise_factor must be >= 0 and noise_floor > 0".into(),
            ));
        }

        let d = &self.diagnosis;
        if d.critical_sigma < d.warning_sigma {
            return Err(Error::InvalidData(
                "diagnosis.critical_sigma must not be below warning_sigma".into(),
            ));
        }
        if d.sigma_floor <= 0.0 {
            return Err(Error::InvalidData("diagnosis.sigma_floor must be > 0".into()));
        }

        let t = &self.training;
        if !(0.0..1.0).contains(&t.fallback_train_fraction) || t.fallback_train_fraction == 0.0 {
            return Err(Error::InvalidData(
                "training.fallback_train_fraction must be in (0, 1)".into(),
            ));
        }
        if t.learning_rate <= 0.0 || t.n_estimators == 0 {
            return Err(Error::InvalidData(
                "training.learning_rate and n_estimators must be positive".into(),
            ));
        }
        for (name, value) in [
            ("feature_fraction", t.feature_fraction),
            ("bagging_fraction", t.bagging_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::InvalidData(format!(
                    "training.{} must be in (0, 1]",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Render as TOML (used by `simcast config show`)
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidData(format!("Failed to render config: {}", e)))
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("simcast").join("config").join("simcast.toml"))
}
