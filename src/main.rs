// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "vcam-host")]
#[command(about = "Host for a privileged virtual camera driver")]
#[command(version = env!("BUILD_VERSION"))]
struct Cli {
    /// Configuration file (default: the user configuration directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install, stream to a client and uninstall against the simulated system
    Simulate {
        /// Number of frames to push
        #[arg(short, long, default_value = "30")]
        frames: u32,
    },

    /// Show the extension menu items for a state (e.g. needs_update)
    Menu {
        state: String,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=vcam_host=debug, RUST_LOG=camera_extension=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { frames } => cli::simulate(cli.config, frames),
        Commands::Menu { state } => cli::show_menu(&state, cli.config),
        Commands::Config => cli::print_config(cli.config),
    }
}
