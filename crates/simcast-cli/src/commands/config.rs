//! Configuration inspection commands

use std::path::Path;

use anyhow::{Context, Result};
use simcast_core::{config::default_config_path, SimcastConfig};

pub fn cmd_config_show(config: &SimcastConfig) -> Result<()> {
    let rendered = config
        .to_toml_string()
        .context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

pub fn cmd_config_path(explicit: Option<&Path>) -> Result<()> {
    if let Some(path) = explicit {
        println!("{}", path.display());
        return Ok(());
    }

    match default_config_path() {
        Some(path) if path.exists() => println!("{}", path.display()),
        Some(path) => {
            println!("{}", path.display());
            println!("   (not present; built-in defaults are in use)");
        }
        None => println!("No data directory on this platform; built-in defaults are in use"),
    }
    Ok(())
}
