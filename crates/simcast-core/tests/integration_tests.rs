//! Integration tests for simcast-core
//!
//! These tests exercise the full import → train → forecast → diagnose workflow.

use std::fmt::Write as _;

use chrono::{Duration, NaiveDate};
use simcast_core::{
    build_feature_table, features::write_feature_csv, load_usage_file, parse_usage_csv,
    CohortFilter, EmptyReason, ForecastEngine, ForecastOutcome, GradientBoostedModel, LagPolicy,
    Regressor, SimcastConfig, SplitKind, TrainingConfig, TrainingPipeline, UsageSummary,
};

/// Usage log with a weekly rhythm:
/// - u1..u3 are Sales analysts with 120 days of history
/// - u4 is a Field analyst with 120 days
/// - u5 is a Sales analyst with only 10 days (too short to forecast)
fn usage_csv() -> String {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut csv = String::from("date,entity_id,volume_gb,role,department,device_type,status,event\n");
    let lines = [
        ("u1", "Sales", 3.0, "Smartphone", 120),
        ("u2", "Sales", 1.5, "Smartphone", 120),
        ("u3", "Sales", 1.0, "Tablet", 120),
        ("u4", "Field", 6.0, "Modem", 120),
        ("u5", "Sales", 0.5, "Smartphone", 10),
    ];
    for (entity, department, base, device, days) in lines {
        for i in 0..days {
            let date = start + Duration::days(i);
            let weekend = simcast_core::features::is_weekend(date);
            let volume = if weekend { base * 0.25 } else { base };
            let status = if entity == "u1" && i % 10 == 0 { "Roaming" } else { "Active" };
            let event = if i == 45 { "Quarterly summit" } else { "None" };
            writeln!(
                csv,
                "{},{},{:.3},Analyst,{},{},{},{}",
                date.format("%Y-%m-%d"),
                entity,
                volume,
                department,
                device,
                status,
                event
            )
            .unwrap();
        }
    }
    csv
}

fn quick_training() -> TrainingConfig {
    TrainingConfig {
        n_estimators: 80,
        learning_rate: 0.2,
        max_depth: 4,
        min_samples_leaf: 5,
        early_stopping_rounds: 20,
        log_period: 0,
        ..TrainingConfig::default()
    }
}

fn seeded_config() -> SimcastConfig {
    let mut config = SimcastConfig::default();
    config.forecast.seed = Some(2024);
    config.training = quick_training();
    config
}

fn sales_analysts() -> CohortFilter {
    CohortFilter::new(vec!["Sales".to_string()], "Analyst")
}

// =============================================================================
// Workflow Tests
// =============================================================================

#[test]
fn test_full_forecast_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("usage.csv");
    std::fs::write(&data_path, usage_csv()).unwrap();
    let records = load_usage_file(&data_path).expect("Failed to load usage log");
    assert_eq!(records.len(), 490);

    let config = seeded_config();
    let artifact = dir.path().join("model.json");
    let report = TrainingPipeline::with_config(config.training.clone())
        .run(&records, &artifact)
        .expect("Training failed");
    assert_eq!(report.split, SplitKind::Holdout);
    assert_eq!(report.feature_rows, 4 * 90);

    let model = GradientBoostedModel::load(&artifact).expect("Failed to load artifact");
    let engine = ForecastEngine::new(&config).unwrap();
    let outcome = engine
        .run(&records, &sales_analysts(), 3, &model)
        .expect("Forecast failed");

    let bundle = outcome.bundle().expect("Expected a forecast");
    assert_eq!(bundle.entities_forecast.len(), 3);
    assert_eq!(bundle.entities_skipped.len(), 1);
    assert_eq!(bundle.entities_skipped[0].entity_id, "u5");
    assert_eq!(bundle.projected.daily.len(), 90);
    assert!(bundle.projected.daily.points.iter().all(|p| p.value >= 0.0));

    // Projection starts the day after the last observation (2024-04-29)
    assert_eq!(
        bundle.projected.daily.points[0].date,
        NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()
    );
    assert!(!bundle.diagnosis.factors.is_empty());
    assert_eq!(
        bundle.trend.projected_total,
        bundle.projected.monthly.total()
    );
}

#[test]
fn test_seeded_forecast_is_reproducible() {
    let records = parse_usage_csv(usage_csv().as_bytes()).unwrap();
    let config = seeded_config();
    let (model, _) = TrainingPipeline::with_config(config.training.clone())
        .fit(&records)
        .unwrap();
    let engine = ForecastEngine::new(&config).unwrap();

    let first = engine.run(&records, &sales_analysts(), 2, &model).unwrap();
    let second = engine.run(&records, &sales_analysts(), 2, &model).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_artifact_round_trip_keeps_predictions() {
    let records = parse_usage_csv(usage_csv().as_bytes()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");

    let (mut model, _) = TrainingPipeline::with_config(quick_training())
        .fit(&records)
        .unwrap();
    let version = model.save(&path).unwrap();
    let loaded = GradientBoostedModel::load(&path).unwrap();

    let rows = build_feature_table(&records, LagPolicy::Inference);
    assert_eq!(model.predict(&rows), loaded.predict(&rows));
    assert_eq!(loaded.version(), Some(version.as_str()));
}

#[test]
fn test_empty_outcomes() {
    let records = parse_usage_csv(usage_csv().as_bytes()).unwrap();
    let (model, _) = TrainingPipeline::with_config(quick_training())
        .fit(&records)
        .unwrap();
    let engine = ForecastEngine::new(&seeded_config()).unwrap();

    let managers = CohortFilter::new(vec!["Sales".to_string()], "Manager");
    assert_eq!(
        engine.run(&records, &managers, 1, &model).unwrap(),
        ForecastOutcome::Empty(EmptyReason::NoRecords)
    );

    let short: Vec<_> = records
        .iter()
        .filter(|r| r.entity_id == "u5")
        .cloned()
        .collect();
    assert_eq!(
        engine.run(&short, &sales_analysts(), 1, &model).unwrap(),
        ForecastOutcome::Empty(EmptyReason::NoQualifyingEntities)
    );
}

#[test]
fn test_feature_export_and_summary() {
    let records = parse_usage_csv(usage_csv().as_bytes()).unwrap();

    let rows = build_feature_table(&records, LagPolicy::Training);
    let mut out = Vec::new();
    write_feature_csv(&rows, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), rows.len() + 1);

    let engine = ForecastEngine::new(&SimcastConfig::default()).unwrap();
    let summary = UsageSummary::build(&records, engine.diagnosis());
    assert_eq!(summary.entities, 5);
    assert_eq!(summary.risk_records, 12);
    // Field (6.0 base) outweighs the three Sales analysts combined (5.5)
    assert_eq!(summary.departments[0].department, "Field");
}
