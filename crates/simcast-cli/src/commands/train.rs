//! Training command implementation

use std::path::Path;

use anyhow::{Context, Result};
use simcast_core::{SimcastConfig, TrainingPipeline, TrainingReport};

use super::load_records;

pub fn cmd_train(config: &SimcastConfig, data: &Path, output: &Path) -> Result<()> {
    let records = load_records(data)?;
    println!(
        "🧠 Training on {} records from {}...",
        records.len(),
        data.display()
    );

    let report = TrainingPipeline::with_config(config.training.clone())
        .run(&records, output)
        .context("Training failed")?;

    print_training_report(&report);
    Ok(())
}

fn print_training_report(report: &TrainingReport) {
    println!();
    println!("✅ Model trained");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Feature rows:   {}", report.feature_rows);
    println!(
        "   Split:          {} ({} train / {} eval)",
        report.split, report.train_rows, report.eval_rows
    );
    println!(
        "   Rounds:         {} (best iteration {})",
        report.rounds_run, report.best_iteration
    );
    println!("   Train MAE:      {:.4}", report.train_mae);
    match report.best_eval_mae {
        Some(mae) => println!("   Eval MAE:       {:.4}", mae),
        None => println!("   Eval MAE:       (no evaluation rows)"),
    }
    println!("   Artifact:       {}", report.artifact_path.display());
    println!("   Version:        {}", report.artifact_version);
    println!();
    println!("Next: simcast forecast --model {} ...", report.artifact_path.display());
}
