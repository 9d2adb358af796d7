//! imagerow CLI — lay out images side by side and export the strip.
//!
//! Usage:
//!   imagerow stitch <FILES>...   Composite the files left to right and save
//!   imagerow plan <FILES>...     Show widths and offsets without exporting

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use imagerow_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "imagerow",
    about = "Stitch images into one horizontal strip at native resolution",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/imagerow/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite images left to right and save the result
    Stitch {
        /// Images, in layout order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file name
        #[arg(long)]
        name: Option<String>,

        /// Canvas height; defaults to the tallest image and may not be shorter
        #[arg(long)]
        height: Option<u32>,
    },

    /// Resolve widths and print the layout without exporting
    Plan {
        /// Images, in layout order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    imagerow_common::logging::init_logging(&config.logging);
    tracing::debug!(?config, "Loaded configuration");

    match cli.command {
        Commands::Stitch {
            files,
            output,
            name,
            height,
        } => {
            if let Some(output) = output {
                config.export.output_dir = output;
            }
            if let Some(name) = name {
                config.export.output_name = name;
            }
            if height.is_some() {
                config.export.height = height;
            }
            commands::stitch::run(files, config).await
        }
        Commands::Plan { files, json } => commands::plan::run(files, config, json).await,
    }
}
