//! Storyline CLI: command-line interface for screenplays.
//!
//! Usage:
//!   storyline validate <PATH>    Validate and compile a screenplay
//!   storyline info <PATH>        Show screenplay information
//!   storyline preview <PATH>     Play a screenplay in real time (headless)
//!   storyline export <PATH>      Export a screenplay to video
//!   storyline check              Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storyline_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "storyline",
    about = "Frame-accurate screenplay performer and exporter",
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
    /// Validate a screenplay and compile every scene
    Validate {
        /// Path to the screenplay JSON file
        path: PathBuf,

        /// Asset root (defaults to the screenplay's directory)
        #[arg(long)]
        assets: Option<PathBuf>,
    },

    /// Show screenplay information
    Info {
        /// Path to the screenplay JSON file
        path: PathBuf,

        /// Asset root (defaults to the screenplay's directory)
        #[arg(long)]
        assets: Option<PathBuf>,
    },

    /// Play a screenplay in real time without a display
    Preview {
        /// Path to the screenplay JSON file
        path: PathBuf,

        /// Asset root (defaults to the screenplay's directory)
        #[arg(long)]
        assets: Option<PathBuf>,
    },

    /// Export a screenplay to video
    Export {
        /// Path to the screenplay JSON file
        path: PathBuf,

        /// Output file path (.mp4, .mov or .mkv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export video only
        #[arg(long)]
        no_audio: bool,

        /// Write subtitles to this path (.srt or .vtt)
        #[arg(long)]
        subtitles: Option<PathBuf>,

        /// Asset root (defaults to the screenplay's directory)
        #[arg(long)]
        assets: Option<PathBuf>,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    storyline_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Validate { path, assets } => commands::validate::run(path, assets, &config).await,
        Commands::Info { path, assets } => commands::info::run(path, assets, &config).await,
        Commands::Preview { path, assets } => commands::preview::run(path, assets, &config).await,
        Commands::Export {
            path,
            output,
            no_audio,
            subtitles,
            assets,
        } => commands::export::run(path, output, no_audio, subtitles, assets, &config).await,
        Commands::Check => commands::check::run().await,
    }
}
