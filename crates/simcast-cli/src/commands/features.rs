//! Feature export command implementation

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use simcast_core::{build_feature_table, features::write_feature_csv, LagPolicy};

use super::load_records;

/// Write the training feature table (rows with full lag history) as CSV
pub fn cmd_features(data: &Path, output: Option<&Path>) -> Result<()> {
    let records = load_records(data)?;
    let rows = build_feature_table(&records, LagPolicy::Training);

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_feature_csv(&rows, BufWriter::new(file))
                .context("Failed to write feature table")?;
            println!(
                "📄 Wrote {} feature rows ({} records) to {}",
                rows.len(),
                records.len(),
                path.display()
            );
        }
        None => {
            write_feature_csv(&rows, io::stdout().lock())
                .context("Failed to write feature table")?;
        }
    }
    Ok(())
}
