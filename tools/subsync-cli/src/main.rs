//! Subsync CLI: drive the subtitle compositor without a player.
//!
//! Usage:
//!   subsync simulate <CUES> [OPTIONS]   Play a cue sheet through the overlay
//!   subsync config [--init] [--path]    Show or create the configuration file

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use subsync_common::config::{AppConfig, LoggingConfig};

mod commands;
mod cues;
mod headless;

#[derive(Parser)]
#[command(
    name = "subsync",
    about = "Frame-synchronized subtitle compositing",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a JSON cue sheet through a subtitle overlay and report what happened
    Simulate {
        /// Path to the cue sheet (JSON)
        cues: PathBuf,

        /// Initial video width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Initial video height
        #[arg(long, default_value = "720")]
        height: u32,

        /// Frames per second
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Playback length in milliseconds (default: end of the last cue)
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Change the video size at this time
        #[arg(long, requires = "resize_to")]
        resize_at_ms: Option<u64>,

        /// New video size, as WIDTHxHEIGHT
        #[arg(long, requires = "resize_at_ms")]
        resize_to: Option<String>,

        /// Presentation backend: cpu or gpu (default: from config)
        #[arg(long)]
        backend: Option<String>,

        /// Config file to use instead of the standard location
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Blend every CPU overlay onto a blank frame
        #[arg(long)]
        composite: bool,
    },

    /// Show or initialize the configuration file
    Config {
        /// Write the default configuration if none exists
        #[arg(long)]
        init: bool,

        /// Print the configuration file location only
        #[arg(long)]
        path: bool,
    },
}

/// Logging settings from the config file, with `--verbose` forcing debug.
///
/// An unreadable explicit config falls back to defaults here; the command
/// itself reports the error once logging is up.
fn logging_config(verbose: bool, config_path: Option<&Path>) -> LoggingConfig {
    let mut logging = match config_path {
        Some(path) => AppConfig::load_from(path)
            .map(|config| config.logging)
            .unwrap_or_default(),
        None => AppConfig::load().logging,
    };
    if verbose {
        logging.level = "debug".to_string();
    }
    logging
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Simulate { config, .. } => config.as_deref(),
        Commands::Config { .. } => None,
    };
    subsync_common::logging::init_logging(&logging_config(cli.verbose, config_path));

    match cli.command {
        Commands::Simulate {
            cues,
            width,
            height,
            fps,
            duration_ms,
            resize_at_ms,
            resize_to,
            backend,
            config,
            output,
            composite,
        } => commands::simulate::run(commands::simulate::SimulateArgs {
            cues,
            width,
            height,
            fps,
            duration_ms,
            resize_at_ms,
            resize_to,
            backend,
            config,
            output,
            composite,
        }),
        Commands::Config { init, path } => commands::config::run(init, path),
    }
}
