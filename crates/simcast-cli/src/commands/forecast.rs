//! Forecast command implementation

use std::path::Path;

use anyhow::{Context, Result};
use simcast_core::{
    CohortFilter, ForecastBundle, ForecastEngine, ForecastOutcome, GradientBoostedModel,
    Granularity, Severity, SimcastConfig,
};

use super::{load_records, truncate};

/// Historical points shown before the projection
const HISTORY_ROWS: usize = 6;
/// Skipped lines listed by name
const SKIPPED_ROWS: usize = 10;

/// Arguments of `simcast forecast`
pub struct ForecastRequest<'a> {
    pub data: &'a Path,
    pub model: &'a Path,
    pub departments: Vec<String>,
    pub role: String,
    pub horizon: u32,
    pub seed: Option<u64>,
    pub granularity: Granularity,
    pub json: bool,
}

/// Load inputs, run the engine and return its outcome
pub fn run_forecast(config: &SimcastConfig, request: &ForecastRequest<'_>) -> Result<ForecastOutcome> {
    let records = load_records(request.data)?;
    let model = GradientBoostedModel::load(request.model).context("Failed to load model")?;

    let mut config = config.clone();
    if request.seed.is_some() {
        config.forecast.seed = request.seed;
    }
    let engine = ForecastEngine::new(&config).context("Invalid configuration")?;

    let filter = CohortFilter::new(request.departments.clone(), request.role.clone());
    engine
        .run(&records, &filter, request.horizon, &model)
        .context("Forecast failed")
}

pub fn cmd_forecast(config: &SimcastConfig, request: ForecastRequest<'_>) -> Result<()> {
    let outcome = run_forecast(config, &request)?;

    if request.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match &outcome {
        ForecastOutcome::Ready(bundle) => print_bundle(bundle, request.granularity),
        ForecastOutcome::Empty(reason) => {
            println!();
            println!("ℹ️  {}", reason.describe());
            println!(
                "   Role: {}    Departments: {}",
                request.role,
                request.departments.join(", ")
            );
        }
    }
    Ok(())
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Normal => "✅",
        Severity::Warning => "⚠️ ",
        Severity::Critical => "🚨",
    }
}

fn print_bundle(bundle: &ForecastBundle, granularity: Granularity) {
    let diagnosis = &bundle.diagnosis;

    println!();
    println!(
        "📶 Forecast: {} in {} ({} month(s))",
        bundle.filter.role,
        bundle.filter.departments.join(", "),
        bundle.horizon_months
    );
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {} {}",
        severity_icon(diagnosis.severity),
        diagnosis.message
    );
    println!(
        "   Projected mean: {:.2} GB    Historical mean: {:.2} GB (σ {:.2})",
        diagnosis.forecast_mean, diagnosis.historical_mean, diagnosis.historical_std
    );
    println!(
        "   Warning above {:.2} GB    Critical above {:.2} GB",
        diagnosis.warning_threshold, diagnosis.critical_threshold
    );

    if !diagnosis.factors.is_empty() {
        println!();
        println!("   Contributing factors:");
        for factor in &diagnosis.factors {
            println!("      • {}", factor.statement);
        }
    }

    let historical = bundle.historical.at(granularity);
    let projected = bundle.projected.at(granularity);
    let date_format = match granularity {
        Granularity::Daily => "%Y-%m-%d",
        Granularity::Monthly => "%Y-%m",
    };

    println!();
    println!("   {:12} │ {:>12} │ {:10}", "Period", "Volume (GB)", "Kind");
    println!("   ─────────────┼──────────────┼───────────");
    let skip = historical.len().saturating_sub(HISTORY_ROWS);
    for point in historical.points.iter().skip(skip) {
        println!(
            "   {:12} │ {:>12.2} │ {:10}",
            point.date.format(date_format).to_string(),
            point.value,
            historical.kind.as_str()
        );
    }
    for point in &projected.points {
        println!(
            "   {:12} │ {:>12.2} │ {:10}",
            point.date.format(date_format).to_string(),
            point.value,
            projected.kind.as_str()
        );
    }

    let highlights = bundle.trend.highlights();
    if !highlights.is_empty() {
        println!();
        for line in highlights {
            println!("   📈 {}", line);
        }
    }
    println!(
        "   Projected total: {:.2} GB",
        bundle.trend.projected_total
    );

    println!();
    println!(
        "   Lines forecast: {}    Skipped (short history): {}",
        bundle.entities_forecast.len(),
        bundle.entities_skipped.len()
    );
    for skipped in bundle.entities_skipped.iter().take(SKIPPED_ROWS) {
        println!(
            "      {} ({} day(s))",
            truncate(&skipped.entity_id, 24),
            skipped.observations
        );
    }
    if bundle.entities_skipped.len() > SKIPPED_ROWS {
        println!(
            "      ... and {} more",
            bundle.entities_skipped.len() - SKIPPED_ROWS
        );
    }
}
