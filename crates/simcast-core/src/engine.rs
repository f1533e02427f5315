//! Forecast engine - one request from cohort selection to diagnosis
//!
//! Records and the model are materialized by the caller; the engine itself
//! does no I/O and keeps no state between calls.

use serde::{Deserialize, Serialize};

use crate::aggregate::{cohort_daily, historical_daily, resample_monthly};
use crate::config::SimcastConfig;
use crate::diagnosis::{DiagnosisEngine, DiagnosisResult};
use crate::error::{Error, Result};
use crate::features::group_by_entity;
use crate::forecaster::{EntityForecast, RecursiveForecaster, SkippedEntity};
use crate::models::{CohortFilter, ForecastSeries, Granularity, UsageRecord};
use crate::regressor::Regressor;
use crate::report::TrendReport;

/// Why a request produced no forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// No record matches the cohort filter
    NoRecords,
    /// Every entity in the cohort has too little history
    NoQualifyingEntities,
}

impl EmptyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmptyReason::NoRecords => "no_records",
            EmptyReason::NoQualifyingEntities => "no_qualifying_entities",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            EmptyReason::NoRecords => "No usage records match the selected role and departments",
            EmptyReason::NoQualifyingEntities => {
                "No line in the selection has enough history to forecast"
            }
        }
    }
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Daily and monthly renditions of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPair {
    pub daily: ForecastSeries,
    pub monthly: ForecastSeries,
}

impl SeriesPair {
    fn from_daily(daily: ForecastSeries) -> Self {
        let monthly = resample_monthly(&daily);
        Self { daily, monthly }
    }

    pub fn at(&self, granularity: Granularity) -> &ForecastSeries {
        match granularity {
            Granularity::Daily => &self.daily,
            Granularity::Monthly => &self.monthly,
        }
    }
}

/// Everything the presentation layer needs for one cohort request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub filter: CohortFilter,
    pub horizon_months: u32,
    pub historical: SeriesPair,
    pub projected: SeriesPair,
    pub diagnosis: DiagnosisResult,
    pub trend: TrendReport,
    pub entities_forecast: Vec<EntityForecast>,
    pub entities_skipped: Vec<SkippedEntity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Ready(Box<ForecastBundle>),
    Empty(EmptyReason),
}

impl ForecastOutcome {
    pub fn bundle(&self) -> Option<&ForecastBundle> {
        match self {
            ForecastOutcome::Ready(bundle) => Some(bundle),
            ForecastOutcome::Empty(_) => None,
        }
    }
}

pub struct ForecastEngine {
    forecaster: RecursiveForecaster,
    diagnosis: DiagnosisEngine,
    max_horizon_months: u32,
}

impl ForecastEngine {
    pub fn new(config: &SimcastConfig) -> Result<Self> {
        Ok(Self {
            forecaster: RecursiveForecaster::new(config.forecast.clone()),
            diagnosis: DiagnosisEngine::new(config.diagnosis.clone())?,
            max_horizon_months: config.forecast.max_horizon_months,
        })
    }

    pub fn diagnosis(&self) -> &DiagnosisEngine {
        &self.diagnosis
    }

    /// Forecast and diagnose one cohort
    pub fn run(
        &self,
        records: &[UsageRecord],
        filter: &CohortFilter,
        horizon_months: u32,
        model: &dyn Regressor,
    ) -> Result<ForecastOutcome> {
        filter.validate()?;
        if horizon_months == 0 || horizon_months > self.max_horizon_months {
            return Err(Error::InvalidData(format!(
                "Horizon must be between 1 and {} months, got {}",
                self.max_horizon_months, horizon_months
            )));
        }

        let cohort = filter.select(records);
        if cohort.is_empty() {
            tracing::warn!(role = %filter.role, departments = ?filter.departments, "Empty cohort");
            return Ok(ForecastOutcome::Empty(EmptyReason::NoRecords));
        }

        let entities = group_by_entity(&cohort);
        let forecast = self
            .forecaster
            .forecast_cohort(&entities, model, horizon_months)?;
        if forecast.forecasts.is_empty() {
            tracing::warn!(
                entities = entities.len(),
                "No entity in the cohort qualifies for forecasting"
            );
            return Ok(ForecastOutcome::Empty(EmptyReason::NoQualifyingEntities));
        }

        let historical = SeriesPair::from_daily(historical_daily(&cohort));
        let projected = SeriesPair::from_daily(cohort_daily(&forecast.forecasts));

        let forecast_mean = projected.monthly.mean().unwrap_or(0.0);
        let diagnosis = self
            .diagnosis
            .diagnose(&historical.monthly, forecast_mean, &cohort);
        let trend = TrendReport::build(&historical.monthly, &projected.monthly);

        tracing::info!(
            role = %filter.role,
            records = cohort.len(),
            forecast = forecast.forecasts.len(),
            skipped = forecast.skipped.len(),
            horizon_months,
            severity = %diagnosis.severity,
            "Forecast request complete"
        );

        Ok(ForecastOutcome::Ready(Box::new(ForecastBundle {
            filter: filter.clone(),
            horizon_months,
            historical,
            projected,
            diagnosis,
            trend,
            entities_forecast: forecast.forecasts,
            entities_skipped: forecast.skipped,
        })))
    }
}
