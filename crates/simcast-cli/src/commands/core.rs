//! Shared utilities for commands
//!
//! This module contains:
//! - `load_config` - Resolve the effective configuration
//! - `load_records` - Read a usage log CSV

use std::path::Path;

use anyhow::{Context, Result};
use simcast_core::{load_usage_file, SimcastConfig, UsageRecord};

/// Load config from an explicit path, the data-dir override, or the built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<SimcastConfig> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
    }
    SimcastConfig::load(path).context("Failed to load configuration")
}

/// Read a usage log, refusing an empty one
pub fn load_records(data: &Path) -> Result<Vec<UsageRecord>> {
    let records = load_usage_file(data)
        .with_context(|| format!("Failed to read usage log {}", data.display()))?;
    if records.is_empty() {
        anyhow::bail!("Usage log {} has no records", data.display());
    }
    Ok(records)
}
