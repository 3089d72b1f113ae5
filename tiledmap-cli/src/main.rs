//! TiledMap CLI - Command-line interface
//!
//! Exposes the tile cache and map service of the `tiledmap` library for
//! inspecting tile coverage and loading viewports from JSON datasets.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tiledmap::logging::{default_log_dir, default_log_file, init_logging};

use commands::load::LoadArgs;
use commands::tiles::TilesArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tiledmap")]
#[command(version, about = "Tile based map data cache and loader", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.tiledmap/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the log file (default: ~/.tiledmap/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tiles covering a bounding box
    Tiles(TilesArgs),

    /// Load the data of a viewport from a JSON dataset
    Load(LoadArgs),

    /// Print the effective configuration as INI
    Config,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let log_dir = cli.log_dir.unwrap_or_else(default_log_dir);
    let _logging = init_logging(&log_dir, default_log_file()).map_err(CliError::LoggingInit)?;

    let config_path = cli.config.as_deref();
    match &cli.command {
        Commands::Tiles(args) => commands::tiles::run(args),
        Commands::Load(args) => commands::load::run(args, config_path),
        Commands::Config => commands::config::run(config_path),
    }
}
