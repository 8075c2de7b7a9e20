// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "edgecam")]
#[command(about = "Live camera edge detection with a real-time display pipeline")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras and their capture sizes
    List,

    /// Run the live pipeline
    Run {
        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Draw with the CPU backend instead of the GPU
        #[arg(long)]
        software: bool,

        /// Save the last processed frame as PNG on exit
        /// (default: ~/Pictures/Edgecam/edges_TIMESTAMP.png)
        #[arg(long, value_name = "PATH")]
        snapshot: Option<Option<PathBuf>>,
    },

    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=edgecam=trace, RUST_LOG=warn
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List => cli::list_cameras(&config),
        Commands::Run {
            duration,
            software,
            snapshot,
        } => cli::run(&config, duration, software, snapshot),
        Commands::Config { save } => cli::show_config(&config, cli.config.as_deref(), save),
    }
}
