//! Cohort aggregation and monthly resampling

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};

use crate::forecaster::EntityForecast;
use crate::models::{ForecastSeries, Granularity, SeriesKind, SeriesPoint, UsageRecord};

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Sum values sharing a date; output is date-ordered
fn sum_by_date(points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Vec<SeriesPoint> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in points {
        *totals.entry(date).or_insert(0.0) += value;
    }
    totals
        .into_iter()
        .map(|(date, value)| SeriesPoint { date, value })
        .collect()
}

/// Projected cohort daily series: entity forecasts joined on date.
///
/// An entity only contributes to the dates it has a value for.
pub fn cohort_daily(forecasts: &[EntityForecast]) -> ForecastSeries {
    let points = sum_by_date(
        forecasts
            .iter()
            .flat_map(|f| f.daily.iter().map(|p| (p.date, p.value))),
    );
    ForecastSeries::new(SeriesKind::Projected, Granularity::Daily, points)
}

/// Historical cohort daily series: total volume per observed date
pub fn historical_daily(records: &[UsageRecord]) -> ForecastSeries {
    let points = sum_by_date(records.iter().map(|r| (r.date, r.volume_gb)));
    ForecastSeries::new(SeriesKind::Historical, Granularity::Daily, points)
}

/// Calendar-month totals keyed on the first of the month.
///
/// Months between the first and last observed month with no data are
/// present with a total of 0. A monthly input is returned unchanged.
pub fn resample_monthly(series: &ForecastSeries) -> ForecastSeries {
    if series.granularity == Granularity::Monthly {
        return series.clone();
    }

    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for point in &series.points {
        *totals.entry(month_start(point.date)).or_insert(0.0) += point.value;
    }

    let mut points = Vec::with_capacity(totals.len());
    if let (Some(&first), Some(&last)) = (totals.keys().next(), totals.keys().next_back()) {
        let mut month = first;
        while month <= last {
            points.push(SeriesPoint {
                date: month,
                value: totals.get(&month).copied().unwrap_or(0.0),
            });
            match month.checked_add_months(Months::new(1)) {
                Some(next) => month = next,
                None => break,
            }
        }
    }
    ForecastSeries::new(series.kind, Granularity::Monthly, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn forecast(entity: &str, start: NaiveDate, values: &[f64]) -> EntityForecast {
        EntityForecast {
            entity_id: entity.to_string(),
            daily: values
                .iter()
                .enumerate()
                .map(|(i, v)| SeriesPoint {
                    date: start + Duration::days(i as i64),
                    value: *v,
                })
                .collect(),
            noise_scale: 1.0,
        }
    }

    #[test]
    fn test_cohort_daily_joins_on_date() {
        let a = forecast("a", date(2024, 3, 1), &[1.0, 2.0, 3.0]);
        let b = forecast("b", date(2024, 3, 2), &[10.0, 20.0, 30.0]);

        let series = cohort_daily(&[a, b]);
        assert_eq!(series.kind, SeriesKind::Projected);
        assert_eq!(series.values(), vec![1.0, 12.0, 23.0, 30.0]);
        assert_eq!(series.points[0].date, date(2024, 3, 1));
        assert_eq!(series.points[3].date, date(2024, 3, 4));
    }

    #[test]
    fn test_constant_month_total() {
        let feb = forecast("a", date(2024, 2, 1), &[2.5; 29]);
        let monthly = resample_monthly(&cohort_daily(&[feb]));

        assert_eq!(monthly.granularity, Granularity::Monthly);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly.points[0].date, date(2024, 2, 1));
        assert!((monthly.points[0].value - 2.5 * 29.0).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_gap_filled_with_zero() {
        let series = ForecastSeries::new(
            SeriesKind::Historical,
            Granularity::Daily,
            vec![
                SeriesPoint { date: date(2023, 11, 20), value: 4.0 },
                SeriesPoint { date: date(2024, 2, 3), value: 6.0 },
                SeriesPoint { date: date(2024, 2, 28), value: 1.0 },
            ],
        );

        let monthly = resample_monthly(&series);
        assert_eq!(monthly.kind, SeriesKind::Historical);
        assert_eq!(monthly.values(), vec![4.0, 0.0, 0.0, 7.0]);
        assert_eq!(monthly.points[1].date, date(2023, 12, 1));
        assert_eq!(monthly.points[2].date, date(2024, 1, 1));
    }

    #[test]
    fn test_historical_daily_sums_records() {
        let record = |entity: &str, d: NaiveDate, v: f64| UsageRecord {
            date: d,
            entity_id: entity.to_string(),
            volume_gb: v,
            role: "Analyst".to_string(),
            department: "Sales".to_string(),
            device_type: "Smartphone".to_string(),
            status: "Active".to_string(),
            event: "None".to_string(),
        };
        let records = vec![
            record("b", date(2024, 1, 2), 1.0),
            record("a", date(2024, 1, 1), 2.0),
            record("a", date(2024, 1, 2), 3.0),
        ];

        let series = historical_daily(&records);
        assert_eq!(series.values(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_empty_series() {
        let empty = ForecastSeries::new(SeriesKind::Projected, Granularity::Daily, vec![]);
        assert!(resample_monthly(&empty).is_empty());
        assert!(cohort_daily(&[]).is_empty());
    }
}
