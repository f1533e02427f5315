//! Temporal feature engineering shared by training and inference
//!
//! Turns per-entity usage records into [`FeatureRow`]s with:
//! - calendar fields (year, month, day, weekday, ISO week, weekend flag)
//! - lag fields (value 1, 7 and 30 steps earlier)
//! - rolling means over the trailing 7 and 30 steps
//! - the categorical context of the source record
//!
//! Every lag/rolling value is computed from earlier records of the same
//! entity only. The two callers disagree on what to do when a lag offset is
//! not available yet, see [`LagPolicy`].

use std::io::Write;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::Result;
use crate::models::{CategoricalContext, FeatureRow, UsageRecord};

/// Feature names in the order the model artifact expects them
pub const FEATURE_NAMES: [&str; 16] = [
    "year",
    "month",
    "day",
    "dayofweek",
    "weekofyear",
    "is_weekend",
    "lag_1",
    "lag_7",
    "lag_30",
    "rolling_7",
    "rolling_30",
    "role",
    "department",
    "event",
    "device",
    "status",
];

/// Categorical subset of [`FEATURE_NAMES`], in the same order
pub const CATEGORICAL_FEATURES: [&str; 5] = ["role", "department", "event", "device", "status"];

/// Number of leading numeric features in [`FEATURE_NAMES`]
pub const NUMERIC_FEATURE_COUNT: usize = 11;

pub const LAG_OFFSETS: [usize; 3] = [1, 7, 30];
pub const SHORT_WINDOW: usize = 7;
pub const LONG_WINDOW: usize = 30;

/// How rows with unavailable lag offsets are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagPolicy {
    /// Drop the row: a model must never learn from fabricated lags
    Training,
    /// Fall back to the most recent value so a prediction can still be made
    Inference,
}

/// Calendar fields of a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFields {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub dayofweek: u32,
    pub weekofyear: u32,
    pub is_weekend: bool,
}

impl CalendarFields {
    pub fn from_date(date: NaiveDate) -> Self {
        let weekday = date.weekday();
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            dayofweek: weekday.num_days_from_monday(),
            weekofyear: date.iso_week().week(),
            is_weekend: is_weekend(date),
        }
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// All records of one entity, sorted by date (ties keep input order)
#[derive(Debug, Clone)]
pub struct EntitySeries {
    pub entity_id: String,
    pub records: Vec<UsageRecord>,
}

impl EntitySeries {
    pub fn values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.volume_gb).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// Context of the most recent record
    pub fn latest_context(&self) -> Option<CategoricalContext> {
        self.records.last().map(UsageRecord::context)
    }
}

/// Stable-sort records by entity then date and split them per entity.
///
/// Entities come out in ascending id order.
pub fn group_by_entity(records: &[UsageRecord]) -> Vec<EntitySeries> {
    let mut sorted: Vec<&UsageRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.entity_id.cmp(&b.entity_id).then(a.date.cmp(&b.date)));

    let mut groups: Vec<EntitySeries> = Vec::new();
    for record in sorted {
        match groups.last_mut() {
            Some(group) if group.entity_id == record.entity_id => {
                group.records.push(record.clone());
            }
            _ => groups.push(EntitySeries {
                entity_id: record.entity_id.clone(),
                records: vec![record.clone()],
            }),
        }
    }
    groups
}

/// Value `offset` steps before the end of `history`, if there is one
pub fn lag(history: &[f64], offset: usize) -> Option<f64> {
    if offset == 0 || history.len() < offset {
        None
    } else {
        Some(history[history.len() - offset])
    }
}

/// Lag with the inference fallback to the most recent value
pub fn lag_or_latest(history: &[f64], offset: usize) -> Option<f64> {
    lag(history, offset).or_else(|| history.last().copied())
}

/// Mean of the trailing `window` values; partial windows use what is there
pub fn trailing_mean(history: &[f64], window: usize) -> Option<f64> {
    if history.is_empty() || window == 0 {
        return None;
    }
    let start = history.len().saturating_sub(window);
    let tail = &history[start..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Build a row for `date` from the values strictly before it.
///
/// Returns `None` when `history` is empty, or when a lag offset is missing
/// under [`LagPolicy::Training`].
pub fn row_from_history(
    entity_id: &str,
    date: NaiveDate,
    history: &[f64],
    context: &CategoricalContext,
    target: Option<f64>,
    policy: LagPolicy,
) -> Option<FeatureRow> {
    let lags = match policy {
        LagPolicy::Training => [lag(history, 1)?, lag(history, 7)?, lag(history, 30)?],
        LagPolicy::Inference => [
            lag_or_latest(history, 1)?,
            lag_or_latest(history, 7)?,
            lag_or_latest(history, 30)?,
        ],
    };
    let calendar = CalendarFields::from_date(date);

    Some(FeatureRow {
        entity_id: entity_id.to_string(),
        date,
        year: calendar.year,
        month: calendar.month,
        day: calendar.day,
        dayofweek: calendar.dayofweek,
        weekofyear: calendar.weekofyear,
        is_weekend: calendar.is_weekend,
        lag_1: lags[0],
        lag_7: lags[1],
        lag_30: lags[2],
        rolling_7: trailing_mean(history, SHORT_WINDOW)?,
        rolling_30: trailing_mean(history, LONG_WINDOW)?,
        role: context.role.clone(),
        department: context.department.clone(),
        event: context.event.clone(),
        device: context.device.clone(),
        status: context.status.clone(),
        volume_gb: target,
    })
}

/// Feature rows for one entity's observed records
pub fn entity_feature_rows(series: &EntitySeries, policy: LagPolicy) -> Vec<FeatureRow> {
    let values = series.values();
    series
        .records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| {
            row_from_history(
                &series.entity_id,
                record.date,
                &values[..i],
                &record.context(),
                Some(record.volume_gb),
                policy,
            )
        })
        .collect()
}

/// Build the feature table for any number of entities.
///
/// Rows are ordered by entity, then date. Empty input gives an empty table.
pub fn build_feature_table(records: &[UsageRecord], policy: LagPolicy) -> Vec<FeatureRow> {
    let groups = group_by_entity(records);
    let rows: Vec<FeatureRow> = groups
        .iter()
        .flat_map(|series| entity_feature_rows(series, policy))
        .collect();

    tracing::debug!(
        entities = groups.len(),
        records = records.len(),
        rows = rows.len(),
        ?policy,
        "Built feature table"
    );
    rows
}

/// Write a feature table as CSV with a header row
pub fn write_feature_csv<W: Write>(rows: &[FeatureRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn daily_records(entity: &str, start: NaiveDate, values: &[f64]) -> Vec<UsageRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| UsageRecord {
                date: start + Duration::days(i as i64),
                entity_id: entity.to_string(),
                volume_gb: *v,
                role: "Analyst".to_string(),
                department: "Sales".to_string(),
                device_type: "Smartphone".to_string(),
                status: "Active".to_string(),
                event: "None".to_string(),
            })
            .collect()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_calendar_fields() {
        // 2024-01-06 is a Saturday in ISO week 1
        let cal = CalendarFields::from_date(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        assert_eq!(cal.year, 2024);
        assert_eq!(cal.month, 1);
        assert_eq!(cal.day, 6);
        assert_eq!(cal.dayofweek, 5);
        assert_eq!(cal.weekofyear, 1);
        assert!(cal.is_weekend);

        // 2021-01-01 belongs to ISO week 53 of 2020
        let cal = CalendarFields::from_date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(cal.weekofyear, 53);
        assert_eq!(cal.dayofweek, 4);
        assert!(!cal.is_weekend);
    }

    #[test]
    fn test_lag_helpers() {
        let history = [1.0, 2.0, 3.0];
        assert_eq!(lag(&history, 1), Some(3.0));
        assert_eq!(lag(&history, 3), Some(1.0));
        assert_eq!(lag(&history, 7), None);
        assert_eq!(lag_or_latest(&history, 7), Some(3.0));
        assert_eq!(lag_or_latest(&[], 1), None);
    }

    #[test]
    fn test_trailing_mean_partial_window() {
        let history = [2.0, 4.0, 6.0];
        assert_eq!(trailing_mean(&history, 7), Some(4.0));
        assert_eq!(trailing_mean(&history, 2), Some(5.0));
        assert_eq!(trailing_mean(&[], 7), None);
    }

    #[test]
    fn test_training_policy_drops_rows_without_lag_30() {
        let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let records = daily_records("u1", start(), &values);

        let rows = build_feature_table(&records, LagPolicy::Training);
        assert_eq!(rows.len(), 10);

        let first = &rows[0];
        assert_eq!(first.date, start() + Duration::days(30));
        assert_eq!(first.lag_1, 29.0);
        assert_eq!(first.lag_7, 23.0);
        assert_eq!(first.lag_30, 0.0);
        // Mean of 23..=29
        assert_eq!(first.rolling_7, 26.0);
        // Mean of 0..=29
        assert_eq!(first.rolling_30, 14.5);
        assert_eq!(first.volume_gb, Some(30.0));
    }

    #[test]
    fn test_inference_policy_falls_back_to_latest() {
        let records = daily_records("u1", start(), &[5.0, 7.0, 9.0]);
        let rows = build_feature_table(&records, LagPolicy::Inference);

        // The first record has nothing before it
        assert_eq!(rows.len(), 2);
        let row = &rows[1];
        assert_eq!(row.lag_1, 7.0);
        assert_eq!(row.lag_7, 7.0);
        assert_eq!(row.lag_30, 7.0);
        assert_eq!(row.rolling_7, 6.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_feature_table(&[], LagPolicy::Training).is_empty());
        assert!(build_feature_table(&[], LagPolicy::Inference).is_empty());
    }

    #[test]
    fn test_no_cross_entity_leakage() {
        let mut records = daily_records("a", start(), &[100.0; 35]);
        records.extend(daily_records("b", start(), &[1.0; 35]));

        let rows = build_feature_table(&records, LagPolicy::Training);
        for row in rows.iter().filter(|r| r.entity_id == "b") {
            assert_eq!(row.lag_1, 1.0);
            assert_eq!(row.lag_30, 1.0);
            assert_eq!(row.rolling_30, 1.0);
        }
    }

    #[test]
    fn test_group_by_entity_is_stable() {
        let day = start();
        let mut records = daily_records("b", day, &[1.0]);
        records.extend(daily_records("a", day, &[2.0]));
        // Same entity and date: input order must be preserved
        records.extend(daily_records("a", day, &[3.0]));

        let groups = group_by_entity(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].entity_id, "a");
        assert_eq!(groups[0].values(), vec![2.0, 3.0]);
        assert_eq!(groups[1].entity_id, "b");
    }

    #[test]
    fn test_categoricals_pass_through_unmodified() {
        let mut records = daily_records("u1", start(), &[1.0, 2.0]);
        records[1].event = String::new();
        records[1].status = "Roaming".to_string();

        let rows = build_feature_table(&records, LagPolicy::Inference);
        assert_eq!(rows[0].event, "");
        assert_eq!(rows[0].status, "Roaming");
    }

    #[test]
    fn test_write_feature_csv() {
        let records = daily_records("u1", start(), &[1.0, 2.0, 3.0]);
        let rows = build_feature_table(&records, LagPolicy::Inference);

        let mut out = Vec::new();
        write_feature_csv(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let header = text.lines().next().unwrap();
        assert!(header.starts_with("entity_id,date,year,month,day,dayofweek"));
        assert_eq!(text.lines().count(), 3);
    }

    proptest! {
        #[test]
        fn prop_rows_never_look_ahead(values in prop::collection::vec(0.0f64..50.0, 1..80)) {
            let records = daily_records("u1", start(), &values);
            for policy in [LagPolicy::Training, LagPolicy::Inference] {
                for row in build_feature_table(&records, policy) {
                    let i = (row.date - start()).num_days() as usize;
                    let past = &values[..i];
                    prop_assert!(past.contains(&row.lag_1));
                    prop_assert!(past.contains(&row.lag_7));
                    prop_assert!(past.contains(&row.lag_30));
                    prop_assert_eq!(row.rolling_7, trailing_mean(past, 7).unwrap());
                    prop_assert_eq!(row.rolling_30, trailing_mean(past, 30).unwrap());
                }
            }
        }

        #[test]
        fn prop_partial_window_is_mean_of_all(values in prop::collection::vec(0.0f64..50.0, 1..30)) {
            let expected = values.iter().sum::<f64>() / values.len() as f64;
            let got = trailing_mean(&values, LONG_WINDOW).unwrap();
            prop_assert!((got - expected).abs() < 1e-9);
            if values.len() < SHORT_WINDOW {
                let short = trailing_mean(&values, SHORT_WINDOW).unwrap();
                prop_assert!((short - expected).abs() < 1e-9);
            }
        }
    }
}
