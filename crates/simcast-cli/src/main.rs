//! Simcast CLI - Mobile-data consumption forecasting
//!
//! Usage:
//!   simcast train --data usage.csv                         Train the model
//!   simcast forecast --data usage.csv --department Sales --role Analyst
//!   simcast features --data usage.csv --output features.csv
//!   simcast summary --data usage.csv

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Train { data, output } => commands::cmd_train(&config, &data, &output),
        Commands::Forecast {
            data,
            model,
            departments,
            role,
            horizon,
            seed,
            granularity,
            json,
        } => {
            let granularity: simcast_core::Granularity = granularity
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let request = commands::ForecastRequest {
                data: &data,
                model: &model,
                departments,
                role,
                horizon,
                seed,
                granularity,
                json,
            };
            commands::cmd_forecast(&config, request)
        }
        Commands::Features { data, output } => commands::cmd_features(&data, output.as_deref()),
        Commands::Summary { data } => commands::cmd_summary(&config, &data),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::cmd_config_show(&config),
            ConfigAction::Path => commands::cmd_config_path(cli.config.as_deref()),
        },
    }
}
