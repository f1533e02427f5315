//! Trend report over projected monthly totals

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::ForecastSeries;

/// Below this month-over-month change (%) a reduction is significant
pub const SIGNIFICANT_REDUCTION_PCT: f64 = -5.0;
/// Changes strictly within +/- this band (%) count as stable
pub const STABLE_BAND_PCT: f64 = 1.0;

/// Change of one projected month against the month before it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthChange {
    pub month: NaiveDate,
    pub value: f64,
    pub previous: f64,
    pub change_pct: f64,
}

/// A projected month against the historical monthly mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanComparison {
    pub month: NaiveDate,
    pub value: f64,
    pub difference: f64,
    pub above_mean: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    /// Month-over-month changes; the first projected month is compared with
    /// the last historical one
    pub changes: Vec<MonthChange>,
    /// Largest increase, when any month increases
    pub peak_acceleration: Option<MonthChange>,
    /// Largest decrease, when it is below the significant-reduction mark
    pub significant_reduction: Option<MonthChange>,
    pub stable: bool,
    pub historical_mean: f64,
    pub vs_mean: Vec<MeanComparison>,
    pub projected_total: f64,
    pub historical_total: f64,
}

impl TrendReport {
    pub fn build(historical_monthly: &ForecastSeries, projected_monthly: &ForecastSeries) -> Self {
        let mut changes = Vec::new();
        let mut previous = historical_monthly.last().map(|p| p.value);
        for point in &projected_monthly.points {
            if let Some(base) = previous.filter(|b| *b != 0.0) {
                changes.push(MonthChange {
                    month: point.date,
                    value: point.value,
                    previous: base,
                    change_pct: (point.value / base - 1.0) * 100.0,
                });
            }
            previous = Some(point.value);
        }

        let peak_acceleration = changes
            .iter()
            .copied()
            // Reversed min_by: ties resolve to the earliest month
            .min_by(|a, b| b.change_pct.total_cmp(&a.change_pct))
            .filter(|c| c.change_pct > 0.0);
        let significant_reduction = changes
            .iter()
            .copied()
            .min_by(|a, b| a.change_pct.total_cmp(&b.change_pct))
            .filter(|c| c.change_pct < SIGNIFICANT_REDUCTION_PCT);
        let stable = !changes.is_empty()
            && changes
                .iter()
                .all(|c| c.change_pct.abs() < STABLE_BAND_PCT);

        let historical_mean = historical_monthly.mean().unwrap_or(0.0);
        let vs_mean = projected_monthly
            .points
            .iter()
            .map(|p| MeanComparison {
                month: p.date,
                value: p.value,
                difference: p.value - historical_mean,
                above_mean: p.value > historical_mean,
            })
            .collect();

        Self {
            changes,
            peak_acceleration,
            significant_reduction,
            stable,
            historical_mean,
            vs_mean,
            projected_total: projected_monthly.total(),
            historical_total: historical_monthly.total(),
        }
    }

    /// Short narrative lines for display
    pub fn highlights(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match &self.peak_acceleration {
            Some(peak) => lines.push(format!(
                "Peak acceleration expected in {} ({:+.1}%)",
                peak.month.format("%B %Y"),
                peak.change_pct
            )),
            None if !self.changes.is_empty() => {
                lines.push("Trend is mostly flat or decreasing".to_string())
            }
            None => {}
        }
        if let Some(drop) = &self.significant_reduction {
            lines.push(format!(
                "Significant reduction of {:.1}% in {}",
                drop.change_pct,
                drop.month.format("%B %Y")
            ));
        } else if self.stable {
            lines.push("Consumption is practically stable".to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Granularity, SeriesKind, SeriesPoint};

    fn monthly(kind: SeriesKind, start_month: u32, values: &[f64]) -> ForecastSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint {
                date: NaiveDate::from_ymd_opt(2024, start_month + i as u32, 1).unwrap(),
                value: *v,
            })
            .collect();
        ForecastSeries::new(kind, Granularity::Monthly, points)
    }

    #[test]
    fn test_changes_start_from_last_historical_month() {
        let hist = monthly(SeriesKind::Historical, 1, &[80.0, 100.0]);
        let proj = monthly(SeriesKind::Projected, 3, &[110.0, 99.0, 120.0]);

        let report = TrendReport::build(&hist, &proj);
        let pct: Vec<f64> = report.changes.iter().map(|c| c.change_pct).collect();
        assert_eq!(pct.len(), 3);
        assert!((pct[0] - 10.0).abs() < 1e-9);
        assert!((pct[1] + 10.0).abs() < 1e-9);
        assert!((pct[2] - 21.212121).abs() < 1e-4);

        let peak = report.peak_acceleration.unwrap();
        assert_eq!(peak.month, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(report.significant_reduction.is_some());
        assert!(!report.stable);
        assert_eq!(report.highlights().len(), 2);
    }

    #[test]
    fn test_ties_resolve_to_earliest_month() {
        let hist = monthly(SeriesKind::Historical, 1, &[64.0]);
        let proj = monthly(SeriesKind::Projected, 2, &[128.0, 256.0, 128.0, 64.0]);

        let report = TrendReport::build(&hist, &proj);
        let peak = report.peak_acceleration.unwrap();
        assert_eq!(peak.change_pct, 100.0);
        assert_eq!(peak.month, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let drop = report.significant_reduction.unwrap();
        assert_eq!(drop.change_pct, -50.0);
        assert_eq!(drop.month, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    }

    #[test]
    fn test_zero_base_is_skipped() {
        let hist = monthly(SeriesKind::Historical, 1, &[0.0]);
        let proj = monthly(SeriesKind::Projected, 2, &[5.0, 5.02]);

        let report = TrendReport::build(&hist, &proj);
        assert_eq!(report.changes.len(), 1);
        assert!(report.stable);
        assert_eq!(
            report.highlights(),
            vec![
                "Peak acceleration expected in March 2024 (+0.4%)".to_string(),
                "Consumption is practically stable".to_string()
            ]
        );
    }

    #[test]
    fn test_vs_mean_and_totals() {
        let hist = monthly(SeriesKind::Historical, 1, &[10.0, 30.0]);
        let proj = monthly(SeriesKind::Projected, 3, &[25.0, 15.0]);

        let report = TrendReport::build(&hist, &proj);
        assert_eq!(report.historical_mean, 20.0);
        assert_eq!(report.vs_mean[0].difference, 5.0);
        assert!(report.vs_mean[0].above_mean);
        assert!(!report.vs_mean[1].above_mean);
        assert_eq!(report.projected_total, 40.0);
        assert_eq!(report.historical_total, 40.0);
        assert!(report.peak_acceleration.is_none());
        assert_eq!(report.highlights()[0], "Trend is mostly flat or decreasing");
    }
}
