//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use clap::Parser;
use simcast_core::{ForecastOutcome, GradientBoostedModel, Granularity, SimcastConfig};
use tempfile::TempDir;

use crate::cli::{Cli, Commands, ConfigAction};
use crate::commands::{self, truncate, ForecastRequest};

/// Write a 90-day usage log for two Sales analysts and one Field manager
fn write_usage_log(dir: &TempDir) -> PathBuf {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut csv = String::from("date,entity_id,volume_gb,role,department,device_type,status,event\n");
    for (entity, role, department, base) in [
        ("a1", "Analyst", "Sales", 2.0),
        ("a2", "Analyst", "Sales", 1.0),
        ("m1", "Manager", "Field", 4.0),
    ] {
        for i in 0..90 {
            let volume = base + (i % 7) as f64 * 0.1;
            writeln!(
                csv,
                "{},{},{:.2},{},{},Smartphone,Active,None",
                start + Duration::days(i),
                entity,
                volume,
                role,
                department
            )
            .unwrap();
        }
    }
    let path = dir.path().join("usage.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn test_config() -> SimcastConfig {
    let mut config = SimcastConfig::default();
    config.training.n_estimators = 30;
    config.training.learning_rate = 0.3;
    config.training.min_samples_leaf = 5;
    config.training.log_period = 0;
    config
}

fn trained_model(dir: &TempDir, data: &Path) -> PathBuf {
    let model = dir.path().join("model.json");
    commands::cmd_train(&test_config(), data, &model).unwrap();
    model
}

fn request<'a>(data: &'a Path, model: &'a Path) -> ForecastRequest<'a> {
    ForecastRequest {
        data,
        model,
        departments: vec!["Sales".to_string()],
        role: "Analyst".to_string(),
        horizon: 2,
        seed: Some(11),
        granularity: Granularity::Monthly,
        json: false,
    }
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_forecast_args() {
    let cli = Cli::try_parse_from([
        "simcast",
        "forecast",
        "--data",
        "usage.csv",
        "--department",
        "Sales",
        "--department",
        "Field",
        "--role",
        "Analyst",
        "--horizon",
        "6",
        "--json",
    ])
    .unwrap();

    match cli.command {
        Commands::Forecast {
            departments,
            role,
            horizon,
            seed,
            granularity,
            json,
            model,
            ..
        } => {
            assert_eq!(departments, vec!["Sales", "Field"]);
            assert_eq!(role, "Analyst");
            assert_eq!(horizon, 6);
            assert_eq!(seed, None);
            assert_eq!(granularity, "monthly");
            assert!(json);
            assert_eq!(model, PathBuf::from("simcast-model.json"));
        }
        _ => panic!("expected forecast command"),
    }
}

#[test]
fn test_parse_requires_department() {
    let result = Cli::try_parse_from(["simcast", "forecast", "--data", "x.csv", "--role", "A"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["simcast", "config", "show", "--config", "alt.toml", "-v"])
        .unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    assert!(matches!(
        cli.command,
        Commands::Config {
            action: ConfigAction::Show
        }
    ));
}

// ========== Train Command Tests ==========

#[test]
fn test_cmd_train_writes_artifact() {
    let dir = TempDir::new().unwrap();
    let data = write_usage_log(&dir);
    let model = trained_model(&dir, &data);

    let loaded = GradientBoostedModel::load(&model).unwrap();
    assert!(loaded.tree_count() > 0);
    assert!(loaded.version().is_some());
}

#[test]
fn test_cmd_train_missing_data() {
    let dir = TempDir::new().unwrap();
    let result = commands::cmd_train(
        &test_config(),
        &dir.path().join("absent.csv"),
        &dir.path().join("model.json"),
    );
    let err = result.unwrap_err();
    assert!(err.to_string().contains("Failed to read usage log"));
}

#[test]
fn test_cmd_train_short_history() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("short.csv");
    std::fs::write(
        &data,
        "date,entity_id,volume_gb,role,department\n2024-01-01,u1,1.0,Analyst,Sales\n",
    )
    .unwrap();

    let result = commands::cmd_train(&test_config(), &data, &dir.path().join("model.json"));
    assert!(result.is_err());
    assert!(!dir.path().join("model.json").exists());
}

// ========== Forecast Command Tests ==========

#[test]
fn test_run_forecast_ready() {
    let dir = TempDir::new().unwrap();
    let data = write_usage_log(&dir);
    let model = trained_model(&dir, &data);

    let outcome = commands::run_forecast(&test_config(), &request(&data, &model)).unwrap();
    let bundle = outcome.bundle().expect("expected a forecast");
    assert_eq!(bundle.entities_forecast.len(), 2);
    assert_eq!(bundle.projected.daily.len(), 60);
}

#[test]
fn test_run_forecast_seed_is_reproducible() {
    let dir = TempDir::new().unwrap();
    let data = write_usage_log(&dir);
    let model = trained_model(&dir, &data);

    let first = commands::run_forecast(&test_config(), &request(&data, &model)).unwrap();
    let second = commands::run_forecast(&test_config(), &request(&data, &model)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_run_forecast_unknown_cohort_is_empty() {
    let dir = TempDir::new().unwrap();
    let data = write_usage_log(&dir);
    let model = trained_model(&dir, &data);

    let mut req = request(&data, &model);
    req.role = "Director".to_string();
    let outcome = commands::run_forecast(&test_config(), &req).unwrap();
    assert!(matches!(outcome, ForecastOutcome::Empty(_)));
}

#[test]
fn test_cmd_forecast_missing_model() {
    let dir = TempDir::new().unwrap();
    let data = write_usage_log(&dir);
    let model = dir.path().join("missing.json");

    let err = commands::cmd_forecast(&test_config(), request(&data, &model)).unwrap_err();
    assert!(err.to_string().contains("Failed to load model"));
}

#[test]
fn test_cmd_forecast_prints_json_and_table() {
    let dir = TempDir::new().unwrap();
    let data = write_usage_log(&dir);
    let model = trained_model(&dir, &data);

    let mut req = request(&data, &model);
    req.json = true;
    assert!(commands::cmd_forecast(&test_config(), req).is_ok());

    let mut req = request(&data, &model);
    req.granularity = Granularity::Daily;
    assert!(commands::cmd_forecast(&test_config(), req).is_ok());
}

#[test]
fn test_cmd_forecast_rejects_horizon() {
    let dir = TempDir::new().unwrap();
    let data = write_usage_log(&dir);
    let model = trained_model(&dir, &data);

    let mut req = request(&data, &model);
    req.horizon = 13;
    assert!(commands::cmd_forecast(&test_config(), req).is_err());
}

// ========== Features / Summary Command Tests ==========

#[test]
fn test_cmd_features_writes_csv() {
    let dir = TempDir::new().unwrap();
    let data = write_usage_log(&dir);
    let output = dir.path().join("features.csv");

    commands::cmd_features(&data, Some(&output)).unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    let mut lines = content.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("entity_id,date"));
    assert!(header.contains("lag_30"));
    // 3 lines x (90 - 30) days with a full lag history
    assert_eq!(lines.count(), 180);
}

#[test]
fn test_cmd_summary() {
    let dir = TempDir::new().unwrap();
    let data = write_usage_log(&dir);
    assert!(commands::cmd_summary(&test_config(), &data).is_ok());
}

#[test]
fn test_empty_usage_log_rejected() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("empty.csv");
    std::fs::write(&data, "date,entity_id,volume_gb,role,department\n").unwrap();

    let err = commands::load_records(&data).unwrap_err();
    assert!(err.to_string().contains("no records"));
}

// ========== Config Command Tests ==========

#[test]
fn test_load_config_override() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("simcast.toml");
    std::fs::write(&path, "[forecast]\nnoise_factor = 0.25\n").unwrap();

    let config = commands::load_config(Some(&path)).unwrap();
    assert_eq!(config.forecast.noise_factor, 0.25);
    assert_eq!(config.forecast.buffer_len, 60);
}

#[test]
fn test_load_config_missing_explicit_path() {
    let dir = TempDir::new().unwrap();
    let result = commands::load_config(Some(&dir.path().join("nope.toml")));
    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[test]
fn test_cmd_config_show_and_path() {
    assert!(commands::cmd_config_show(&SimcastConfig::default()).is_ok());
    assert!(commands::cmd_config_path(None).is_ok());
    assert!(commands::cmd_config_path(Some(Path::new("alt.toml"))).is_ok());
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a-very-long-line-id", 10), "a-very-...");
    assert_eq!(truncate("linha-ção-longa", 8), "linha...");
}
