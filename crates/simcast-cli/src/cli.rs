//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Simcast - Forecast and diagnose mobile-data consumption
#[derive(Parser)]
#[command(name = "simcast")]
#[command(about = "Mobile-data consumption forecasting per role and department", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the override in the data dir, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the consumption model from a usage log
    Train {
        /// Usage log CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Where to write the model artifact
        #[arg(short, long, default_value = "simcast-model.json")]
        output: PathBuf,
    },

    /// Forecast and diagnose one cohort
    Forecast {
        /// Usage log CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Model artifact produced by `simcast train`
        #[arg(short, long, default_value = "simcast-model.json")]
        model: PathBuf,

        /// Department to include (repeat for several)
        #[arg(long = "department", required = true)]
        departments: Vec<String>,

        /// Role to forecast
        #[arg(short, long)]
        role: String,

        /// Months to project
        #[arg(long, default_value = "3")]
        horizon: u32,

        /// Seed for reproducible noise (overrides forecast.seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Series granularity to print: daily, monthly
        #[arg(short, long, default_value = "monthly")]
        granularity: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the engineered feature table as CSV
    Features {
        /// Usage log CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show headline figures of a usage log
    Summary {
        /// Usage log CSV
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the override file location
    Path,
}
