//! Statistical classification of a forecast and root-cause ranking
//!
//! The projected monthly mean is compared against bands built from the
//! historical monthly series (mean plus a multiple of the sample standard
//! deviation). Independently, the raw cohort records are scanned for
//! concentrations that explain the volume: dominant lines, a dominant device
//! type, risky line statuses, special events and weekend usage.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::DiagnosisConfig;
use crate::error::Result;
use crate::features::is_weekend;
use crate::models::{ForecastSeries, UsageRecord};

/// Severity of a projected deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Projection within the usual range
    Normal,
    /// Above mean + warning_sigma * std
    Warning,
    /// Above mean + critical_sigma * std
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Numeric priority for sorting (higher = more urgent)
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Normal => 1,
            Severity::Warning => 2,
            Severity::Critical => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Severity::Normal),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Which rule produced a factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    SoleContributor,
    PrincipalContributor,
    DeviceProfile,
    RiskStatus,
    SpecialEvents,
    WeekendPattern,
    OrganicGrowth,
}

/// A human-readable explanation of the cohort's volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub kind: FactorKind,
    /// Entity or device the statement is about
    pub subject: Option<String>,
    /// Share of total context volume, in percent
    pub share_pct: Option<f64>,
    pub statement: String,
}

/// Statistics the severity bands are built from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub mean: f64,
    /// Sample std (n - 1), after flooring
    pub std: f64,
    pub warning: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub severity: Severity,
    /// Headline for the presentation layer
    pub message: String,
    /// (forecast_mean / max(mean, 1) - 1) * 100
    pub deviation_pct: f64,
    pub forecast_mean: f64,
    pub historical_mean: f64,
    pub historical_std: f64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub factors: Vec<ContributingFactor>,
}

/// Severity classifier and factor ranker
pub struct DiagnosisEngine {
    config: DiagnosisConfig,
    risk_pattern: Option<Regex>,
}

/// Sort (name, volume) pairs by volume descending, then name ascending
fn rank_by_volume(totals: BTreeMap<&str, f64>) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

fn share_pct(part: f64, total: f64) -> f64 {
    part / total * 100.0
}

impl DiagnosisEngine {
    pub fn new(config: DiagnosisConfig) -> Result<Self> {
        let keywords: Vec<String> = config
            .risk_keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        let risk_pattern = if keywords.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?i){}", keywords.join("|")))?)
        };
        Ok(Self {
            config,
            risk_pattern,
        })
    }

    pub fn config(&self) -> &DiagnosisConfig {
        &self.config
    }

    /// Mean, floored sample std and both bands for a historical series
    pub fn thresholds(&self, historical: &[f64]) -> Thresholds {
        let n = historical.len();
        let mean = if n == 0 {
            0.0
        } else {
            historical.iter().sum::<f64>() / n as f64
        };
        let std = if n < 2 {
            f64::NAN
        } else {
            let ss: f64 = historical.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        };
        let std = if std == 0.0 || !std.is_finite() {
            self.config.sigma_floor
        } else {
            std
        };

        Thresholds {
            mean,
            std,
            warning: mean + self.config.warning_sigma * std,
            critical: mean + self.config.critical_sigma * std,
        }
    }

    pub fn classify(&self, forecast_mean: f64, thresholds: &Thresholds) -> Severity {
        if forecast_mean > thresholds.critical {
            Severity::Critical
        } else if forecast_mean > thresholds.warning {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }

    /// Classify `forecast_mean` against the historical monthly series and
    /// explain the volume of the `context` records.
    pub fn diagnose(
        &self,
        historical_monthly: &ForecastSeries,
        forecast_mean: f64,
        context: &[UsageRecord],
    ) -> DiagnosisResult {
        let thresholds = self.thresholds(&historical_monthly.values());
        let severity = self.classify(forecast_mean, &thresholds);
        let deviation_pct = (forecast_mean / thresholds.mean.max(1.0) - 1.0) * 100.0;

        let message = match severity {
            Severity::Critical => format!("Critical anomaly ({:+.1}% vs mean)", deviation_pct),
            Severity::Warning => format!("Upward trend ({:+.1}%)", deviation_pct),
            Severity::Normal => "Projected consumption within normal range".to_string(),
        };

        let factors = self.rank_factors(context);
        tracing::debug!(
            %severity,
            forecast_mean,
            mean = thresholds.mean,
            std = thresholds.std,
            factors = factors.len(),
            "Diagnosis complete"
        );

        DiagnosisResult {
            severity,
            message,
            deviation_pct,
            forecast_mean,
            historical_mean: thresholds.mean,
            historical_std: thresholds.std,
            warning_threshold: thresholds.warning,
            critical_threshold: thresholds.critical,
            factors,
        }
    }

    /// Whether a line status contains one of the risk keywords
    pub fn is_risky(&self, status: &str) -> bool {
        self.risk_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(status))
    }

    fn is_event(&self, event: &str) -> bool {
        let event = event.trim();
        !event.is_empty()
            && !self
                .config
                .no_event_markers
                .iter()
                .any(|marker| marker.eq_ignore_ascii_case(event))
    }

    /// Contributing factors in rule order; empty when the context has no volume
    pub fn rank_factors(&self, context: &[UsageRecord]) -> Vec<ContributingFactor> {
        let total: f64 = context.iter().map(|r| r.volume_gb).sum();
        if total <= 0.0 {
            return Vec::new();
        }
        let cfg = &self.config;
        let mut factors = Vec::new();

        // Top entities
        let mut per_entity: BTreeMap<&str, f64> = BTreeMap::new();
        for r in context {
            *per_entity.entry(r.entity_id.as_str()).or_insert(0.0) += r.volume_gb;
        }
        let entities = rank_by_volume(per_entity);
        let sole = entities.iter().skip(1).all(|(_, volume)| *volume == 0.0);
        if let (true, Some(&(entity, _))) = (sole, entities.first()) {
            factors.push(ContributingFactor {
                kind: FactorKind::SoleContributor,
                subject: Some(entity.to_string()),
                share_pct: Some(100.0),
                statement: format!(
                    "{} is the only line with usage in this selection (100% of volume).",
                    entity
                ),
            });
        } else {
            for &(entity, volume) in entities.iter().take(cfg.top_entities) {
                let share = share_pct(volume, total);
                if share <= cfg.principal_share_pct {
                    break;
                }
                factors.push(ContributingFactor {
                    kind: FactorKind::PrincipalContributor,
                    subject: Some(entity.to_string()),
                    share_pct: Some(share),
                    statement: format!(
                        "{} accounts for {:.1}% of the analysed usage.",
                        entity, share
                    ),
                });
            }
        }

        // Dominant device type
        let mut per_device: BTreeMap<&str, f64> = BTreeMap::new();
        for r in context {
            *per_device.entry(r.device_type.as_str()).or_insert(0.0) += r.volume_gb;
        }
        if let Some(&(device, volume)) = rank_by_volume(per_device).first() {
            let share = share_pct(volume, total);
            if share > cfg.device_share_pct {
                factors.push(ContributingFactor {
                    kind: FactorKind::DeviceProfile,
                    subject: Some(device.to_string()),
                    share_pct: Some(share),
                    statement: format!(
                        "Most traffic comes from {} devices ({:.0}%).",
                        device, share
                    ),
                });
            }
        }

        // Risky line status
        let risk_volume: f64 = context
            .iter()
            .filter(|r| self.is_risky(&r.status))
            .map(|r| r.volume_gb)
            .sum();
        let risk_share = share_pct(risk_volume, total);
        if risk_share > cfg.risk_share_pct {
            factors.push(ContributingFactor {
                kind: FactorKind::RiskStatus,
                subject: None,
                share_pct: Some(risk_share),
                statement: format!(
                    "Usage under roaming/excess/blocked status represents {:.1}% of the total.",
                    risk_share
                ),
            });
        }

        // Special events
        let event_volume: f64 = context
            .iter()
            .filter(|r| self.is_event(&r.event))
            .map(|r| r.volume_gb)
            .sum();
        if event_volume > 0.0 {
            factors.push(ContributingFactor {
                kind: FactorKind::SpecialEvents,
                subject: None,
                share_pct: Some(share_pct(event_volume, total)),
                statement: "History contains special events that influence the projection."
                    .to_string(),
            });
        }

        // Weekend usage
        let weekend_volume: f64 = context
            .iter()
            .filter(|r| is_weekend(r.date))
            .map(|r| r.volume_gb)
            .sum();
        let weekend_share = share_pct(weekend_volume, total);
        if weekend_share > cfg.weekend_share_pct {
            factors.push(ContributingFactor {
                kind: FactorKind::WeekendPattern,
                subject: None,
                share_pct: Some(weekend_share),
                statement: format!("{:.0}% of usage happens on weekends.", weekend_share),
            });
        }

        if factors.is_empty() {
            factors.push(ContributingFactor {
                kind: FactorKind::OrganicGrowth,
                subject: None,
                share_pct: None,
                statement: "Organic growth: volume is spread out with no single offender."
                    .to_string(),
            });
        }
        factors
    }
}
