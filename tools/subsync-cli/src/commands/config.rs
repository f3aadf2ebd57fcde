//! Show or initialize the configuration file.

use anyhow::Context;
use subsync_common::config::{config_file_path, AppConfig};

pub fn run(init: bool, path_only: bool) -> anyhow::Result<()> {
    let path = config_file_path();
    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    if init {
        if path.exists() {
            println!("Config already exists at {}", path.display());
        } else {
            let written = AppConfig::default()
                .save()
                .context("Failed to write default config")?;
            println!("Default config written to {}", written.display());
        }
        return Ok(());
    }

    let config = if path.exists() {
        AppConfig::load_from(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
    } else {
        tracing::info!(path = %path.display(), "No config file, showing defaults");
        AppConfig::default()
    };
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
