//! Compress subcommand - run the pipeline and present its progress

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color};
use pdfsquash_core::progress::fmt_num;
use pdfsquash_core::{
    ChannelObserver, Ghostscript, LogObserver, ObserverEvent, Pipeline, ProgressContext,
    ProgressObserver, RunConfig, SharedProgress, ShutdownFlag, Summary,
};

use crate::config::Config;

/// Folder-status prefix emitted by the pipeline before each folder
const FOLDER_PREFIX: &str = "Processing folder: ";

#[derive(Args, Debug)]
pub struct CompressArgs {
    /// Folder containing the PDFs to compress
    pub root: PathBuf,

    /// Output folder (default: "Compressed" next to ROOT)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of parallel Ghostscript workers per folder
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Conversion attempts per file
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Kill a single conversion after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Ghostscript executable (name on PATH or full path)
    #[arg(long = "gs")]
    pub program: Option<String>,

    /// Skip files whose compressed output already exists
    #[arg(long)]
    pub skip_existing: bool,
}

/// Merge CLI flags over config file values
fn run_config(args: &CompressArgs, config: &Config) -> RunConfig {
    RunConfig {
        output_root: args.output.clone(),
        output_dir_name: config.output.dir_name.clone(),
        workers: args.workers.unwrap_or(config.workers.default).max(1),
        max_attempts: args.max_attempts.unwrap_or(config.retry.max_attempts),
        skip_existing: args.skip_existing,
        ..RunConfig::new(&args.root)
    }
}

fn converter(args: &CompressArgs, config: &Config) -> Ghostscript {
    let program = args
        .program
        .as_deref()
        .unwrap_or_else(|| config.ghostscript.program());
    let timeout = args
        .timeout
        .or(config.ghostscript.timeout_secs)
        .filter(|s| *s > 0)
        .map(Duration::from_secs);
    Ghostscript::new(program).with_timeout(timeout)
}

pub fn run(args: CompressArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let shutdown = ShutdownFlag::new();
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, shutdown.as_arc())
            .context("Failed to register signal handler")?;
    }

    let run_config = run_config(&args, config);
    let pipeline = Pipeline::new(converter(&args, config)).with_shutdown(shutdown);

    log::info!("Compression started: {}", run_config.root.display());

    let (observer, events) = ChannelObserver::new();
    let presenter = std::thread::Builder::new()
        .name("progress-ui".into())
        .spawn({
            let progress = Arc::clone(progress);
            move || present(events, &progress)
        })
        .context("Failed to spawn progress thread")?;

    let result = pipeline.run(&run_config, &observer);

    // Drop sender → channel closes → presenter drains remaining events
    drop(observer);
    if presenter.join().is_err() {
        log::warn!("Progress display panicked");
    }

    let summary = match result.context("Compression aborted")? {
        Some(summary) => summary,
        None => return Ok(ExitCode::SUCCESS),
    };

    if progress.is_tty() {
        print_summary(&summary);
    } else {
        summary.log();
    }

    if summary.cancelled {
        log::warn!("Shutdown requested, stopped early");
        return Ok(ExitCode::from(130));
    }
    if summary.failed_files() > 0 {
        log::error!("{} files failed to compress", summary.failed_files());
        return Ok(ExitCode::from(1));
    }
    log::info!("Compression completed");
    Ok(ExitCode::SUCCESS)
}

/// Consume pipeline events until the channel closes.
///
/// TTY: overall bar plus a folder status line, messages printed above them.
/// Non-TTY: every message logged.
fn present(events: Receiver<ObserverEvent>, progress: &ProgressContext) {
    let bar = progress.overall_bar();
    let folder = progress.status_line("folder");

    for event in events {
        match event {
            ObserverEvent::Progress { percent, message } => {
                if let Some(p) = percent {
                    bar.set_position(u64::from(p));
                }
                if let Some(dir) = message.strip_prefix(FOLDER_PREFIX) {
                    folder.set_message(dir.to_string());
                }
                if progress.is_tty() {
                    progress.println(&message);
                } else {
                    LogObserver.on_progress(percent, &message);
                }
            }
            ObserverEvent::Finished(_) => {
                bar.finish_and_clear();
                folder.finish_and_clear();
            }
            ObserverEvent::Fatal(_) => {
                bar.abandon();
                folder.finish_and_clear();
            }
        }
    }
}

/// Print summary table (TTY mode).
fn print_summary(summary: &Summary) {
    let mut table = super::table(["Compression", "Value"]);

    table.add_row(vec!["Input", &summary.root.display().to_string()]);
    table.add_row(vec!["Output", &summary.output_root.display().to_string()]);
    table.add_row(vec![
        "Compressed",
        &format!(
            "{} / {}",
            fmt_num(summary.completed_files),
            fmt_num(summary.total_files)
        ),
    ]);
    if summary.skipped_files > 0 {
        table.add_row(vec!["Skipped", &fmt_num(summary.skipped_files)]);
    }
    table.add_row(vec!["Folders", &fmt_num(summary.folders)]);
    table.add_row(vec!["Workers", &summary.workers.to_string()]);
    table.add_row(vec![
        "Time",
        &format!("{:.1}s", summary.elapsed.as_secs_f64()),
    ]);

    let failed = summary.failed_files();
    let failed_cell = if failed > 0 {
        Cell::new(fmt_num(failed)).fg(Color::Red)
    } else {
        Cell::new("0").fg(Color::Green)
    };
    table.add_row(vec![Cell::new("Failed"), failed_cell]);

    eprintln!("\n{table}");

    for file in &summary.failed {
        eprintln!("  ✘ {}", file.display());
    }
    if summary.cancelled {
        eprintln!("  (cancelled before all files were processed)");
    }
}
