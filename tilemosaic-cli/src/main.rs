//! tilemosaic CLI - Command-line interface
//!
//! This binary provides a command-line interface to the tilemosaic library.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::download::DownloadArgs;
use commands::extent::ExtentCommandArgs;
use commands::plan::PlanArgs;
use error::CliError;
use runner::GlobalOptions;

#[derive(Parser)]
#[command(name = "tilemosaic")]
#[command(version = tilemosaic::VERSION)]
#[command(about = "Download slippy-map tiles and stitch them into a GeoTIFF", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.tilemosaic/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the tiles covering an extent into one GeoTIFF mosaic
    Download(DownloadArgs),

    /// Show the tile range an extent covers at a zoom level
    Plan(PlanArgs),

    /// Print the EPSG:4326 extent of a boundary file
    Extent(ExtentCommandArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalOptions {
        config: cli.config,
        debug: cli.debug,
    };

    if let Err(e) = dispatch(&global, cli.command) {
        e.exit();
    }
}

fn dispatch(global: &GlobalOptions, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Download(args) => commands::download::run(global, args),
        Commands::Plan(args) => commands::plan::run(global, args),
        Commands::Extent(args) => commands::extent::run(global, args),
        Commands::Config(command) => commands::config::run(global, command),
    }
}
