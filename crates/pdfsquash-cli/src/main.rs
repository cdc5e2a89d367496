//! pdfsquash - batch PDF compression through Ghostscript
//!
//! Mirrors a folder of PDFs into a `Compressed` sibling folder, one
//! subfolder at a time, with a pool of parallel Ghostscript workers.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "pdfsquash")]
#[command(about = "Batch-compress a folder tree of PDFs with Ghostscript")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./pdfsquash.toml or ~/.config/pdfsquash/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Compress every PDF under a folder
    Compress(cmd::compress::CompressArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(pdfsquash_core::ProgressContext::new());

    let multi = progress.is_tty().then(|| progress.multi());
    let verbosity = pdfsquash_core::Verbosity::from_flags(cli.quiet, cli.debug);
    pdfsquash_core::init_logging(verbosity, multi)?;

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Compress(args) => cmd::compress::run(args, &config, &progress),
        Command::Config => {
            cmd::show_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}
