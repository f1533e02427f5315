//! Domain models for simcast

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One day of mobile-data usage for a single line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub date: NaiveDate,
    /// Line/user identifier (the unit of forecasting)
    pub entity_id: String,
    /// Consumed volume in gigabytes (never negative)
    pub volume_gb: f64,
    pub role: String,
    pub department: String,
    pub device_type: String,
    /// Line status (e.g. "Active", "Roaming")
    pub status: String,
    /// Special event tag, empty or "None" when there was no event
    pub event: String,
}

impl UsageRecord {
    /// Categorical context carried into feature rows
    pub fn context(&self) -> CategoricalContext {
        CategoricalContext {
            role: self.role.clone(),
            department: self.department.clone(),
            event: self.event.clone(),
            device: self.device_type.clone(),
            status: self.status.clone(),
        }
    }
}

/// Categorical columns of the feature contract, in artifact order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoricalContext {
    pub role: String,
    pub department: String,
    pub event: String,
    pub device: String,
    pub status: String,
}

/// A single row of the feature table.
///
/// Lag and rolling fields only ever look at earlier records of the same
/// entity. `volume_gb` is the observed target and is `None` for rows built
/// for future dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub entity_id: String,
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Day of week, Monday = 0
    pub dayofweek: u32,
    /// ISO week number
    pub weekofyear: u32,
    pub is_weekend: bool,
    pub lag_1: f64,
    pub lag_7: f64,
    pub lag_30: f64,
    pub rolling_7: f64,
    pub rolling_30: f64,
    pub role: String,
    pub department: String,
    pub event: String,
    pub device: String,
    pub status: String,
    pub volume_gb: Option<f64>,
}

impl FeatureRow {
    /// Categorical values in artifact column order
    pub fn categorical_values(&self) -> [&str; 5] {
        [
            &self.role,
            &self.department,
            &self.event,
            &self.device,
            &self.status,
        ]
    }

    /// Numeric values in artifact column order
    pub fn numeric_values(&self) -> [f64; 11] {
        [
            self.year as f64,
            self.month as f64,
            self.day as f64,
            self.dayofweek as f64,
            self.weekofyear as f64,
            if self.is_weekend { 1.0 } else { 0.0 },
            self.lag_1,
            self.lag_7,
            self.lag_30,
            self.rolling_7,
            self.rolling_30,
        ]
    }
}

/// Whether a series comes from observed data or from the forecaster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Historical,
    Projected,
}

impl SeriesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Historical => "historical",
            Self::Projected => "projected",
        }
    }
}

impl std::fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Time granularity of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            _ => Err(format!(
                "Unknown granularity: {} (valid: daily, monthly)",
                s
            )),
        }
    }
}

/// A point of a series. Monthly points are dated on the first of the month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ordered (date, value) series tagged as historical or projected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub kind: SeriesKind,
    pub granularity: Granularity,
    pub points: Vec<SeriesPoint>,
}

impl ForecastSeries {
    pub fn new(kind: SeriesKind, granularity: Granularity, points: Vec<SeriesPoint>) -> Self {
        Self {
            kind,
            granularity,
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }

    /// Mean of the values, `None` for an empty series
    pub fn mean(&self) -> Option<f64> {
        if self.points.is_empty() {
            None
        } else {
            Some(self.total() / self.points.len() as f64)
        }
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }
}

/// Cohort selection: one role within one or more departments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortFilter {
    pub departments: Vec<String>,
    pub role: String,
}

impl CohortFilter {
    pub fn new(departments: Vec<String>, role: impl Into<String>) -> Self {
        Self {
            departments,
            role: role.into(),
        }
    }

    /// Reject selections that cannot define a cohort
    pub fn validate(&self) -> Result<()> {
        if self.role.trim().is_empty() {
            return Err(Error::InvalidData("A role must be selected".into()));
        }
        if self.departments.is_empty() {
            return Err(Error::InvalidData(
                "At least one department must be selected".into(),
            ));
        }
        Ok(())
    }

    pub fn matches(&self, record: &UsageRecord) -> bool {
        record.role == self.role && self.departments.iter().any(|d| *d == record.department)
    }

    /// Records belonging to this cohort, in input order
    pub fn select(&self, records: &[UsageRecord]) -> Vec<UsageRecord> {
        records
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}
