//! Folio CLI - reproducible static-site package builds.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Reproducible static-site package builds")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to folio.toml descriptor
    #[arg(short, long, default_value = "folio.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, build and install the package (default)
    Build,

    /// Re-resolve the toolchain and rewrite folio.lock
    Lock,

    /// Scaffold a package in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the content hash of a directory
    Hash {
        /// Directory to hash
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match cli.command.unwrap_or(Commands::Build) {
        Commands::Build => commands::build::run(&cli.config)?,
        Commands::Lock => commands::lock::run(&cli.config)?,
        Commands::Init { yes } => commands::init::run(&cli.config, yes)?,
        Commands::Hash { dir } => commands::hash::run(&dir)?,
    }

    Ok(())
}
