//! Summary command implementation

use std::path::Path;

use anyhow::{Context, Result};
use simcast_core::{DiagnosisEngine, SimcastConfig, UsageSummary};

use super::{load_records, truncate};

pub fn cmd_summary(config: &SimcastConfig, data: &Path) -> Result<()> {
    let records = load_records(data)?;
    let diagnosis =
        DiagnosisEngine::new(config.diagnosis.clone()).context("Invalid diagnosis config")?;
    let summary = UsageSummary::build(&records, &diagnosis);

    println!();
    println!("📊 Usage Summary");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Records:        {}", summary.records);
    println!("   Lines:          {}", summary.entities);
    if let Some(date) = summary.latest_date {
        println!(
            "   Latest day:     {} ({:.2} GB)",
            date, summary.latest_volume_gb
        );
    }
    println!("   Total volume:   {:.2} GB", summary.total_volume_gb);
    if summary.risk_records > 0 {
        println!("   ⚠️  Risk status records: {}", summary.risk_records);
    }

    if !summary.departments.is_empty() {
        println!();
        println!("   {:24} │ {:>12} │ {:>6}", "Department", "Volume (GB)", "Share");
        println!("   ─────────────────────────┼──────────────┼────────");
        for dept in &summary.departments {
            let share = if summary.total_volume_gb > 0.0 {
                dept.volume_gb / summary.total_volume_gb * 100.0
            } else {
                0.0
            };
            println!(
                "   {:24} │ {:>12.2} │ {:>5.1}%",
                truncate(&dept.department, 24),
                dept.volume_gb,
                share
            );
        }
    }

    Ok(())
}
