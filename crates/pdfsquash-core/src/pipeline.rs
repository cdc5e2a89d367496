//! Folder-by-folder compression pipeline
//!
//! Folders run one after another. Inside a folder, a fixed number of workers
//! drain a shared [`WorkQueue`] on a rayon pool, and the scope joins them all
//! before the next folder starts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use crate::converter::Converter;
use crate::discover::discover;
use crate::error::PipelineError;
use crate::observer::ProgressObserver;
use crate::path_map::{OUTPUT_DIR_NAME, PathMapper, sibling_output_root};
use crate::progress::{Progress, fmt_num};
use crate::retry::{DEFAULT_MAX_ATTEMPTS, RetryingConverter};
use crate::shutdown::ShutdownFlag;
use crate::work_queue::WorkQueue;

/// Default worker count: twice the available parallelism, at least 2
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus * 2).max(2)
}

/// Parameters for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Input folder
    pub root: PathBuf,
    /// Explicit output folder; defaults to a sibling of `root`
    pub output_root: Option<PathBuf>,
    /// Name of the sibling output folder when `output_root` is unset
    pub output_dir_name: String,
    /// Workers per folder
    pub workers: usize,
    /// Converter attempts per file
    pub max_attempts: u32,
    /// Skip files that already have non-empty output
    pub skip_existing: bool,
}

impl RunConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_root: None,
            output_dir_name: OUTPUT_DIR_NAME.to_string(),
            workers: default_workers(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            skip_existing: false,
        }
    }
}

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub root: PathBuf,
    pub output_root: PathBuf,
    pub total_files: usize,
    pub completed_files: usize,
    pub failed: Vec<PathBuf>,
    pub skipped_files: usize,
    pub folders: usize,
    pub workers: usize,
    /// Shutdown was requested before every file was attempted
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl Summary {
    pub fn failed_files(&self) -> usize {
        self.failed.len()
    }

    /// Every discovered file was compressed
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.failed.is_empty() && self.completed_files == self.total_files
    }

    /// Log summary lines (non-TTY mode).
    pub fn log(&self) {
        log::info!("=== Compression Summary ===");
        log::info!(
            "Files: {}/{} compressed ({} failed, {} skipped)",
            fmt_num(self.completed_files),
            fmt_num(self.total_files),
            fmt_num(self.failed_files()),
            fmt_num(self.skipped_files)
        );
        log::info!("Folders: {}", fmt_num(self.folders));
        log::info!("Output: {}", self.output_root.display());
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        for file in &self.failed {
            log::warn!("Failed: {}", file.display());
        }
        if self.cancelled {
            log::warn!("Run was cancelled before all files were processed");
        }
    }
}

/// Shared per-run state handed to every worker
struct RunContext<'a, C> {
    mapper: &'a PathMapper,
    converter: &'a RetryingConverter<C>,
    progress: &'a Progress,
    failed: &'a Mutex<Vec<PathBuf>>,
    observer: &'a dyn ProgressObserver,
    shutdown: &'a ShutdownFlag,
}

/// Compression pipeline over one converter.
///
/// At most one run is active at a time; see [`Pipeline::run`].
pub struct Pipeline<C> {
    converter: C,
    state: AtomicU8,
    shutdown: ShutdownFlag,
}

impl<C: Converter> Pipeline<C> {
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            state: AtomicU8::new(RunState::Idle as u8),
            shutdown: ShutdownFlag::new(),
        }
    }

    /// Use `flag` for cooperative cancellation (e.g. one wired to SIGINT).
    ///
    /// A request stops the current run, or the next one if none is active.
    /// The flag is cleared when that run ends.
    pub fn with_shutdown(mut self, flag: ShutdownFlag) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Run the pipeline to completion on the calling thread.
    ///
    /// Returns `Ok(None)` without side effects if a run is already active.
    /// Fatal errors are reported to `observer.on_fatal` and returned; they
    /// always happen before the first folder starts.
    pub fn run(
        &self,
        config: &RunConfig,
        observer: &dyn ProgressObserver,
    ) -> Result<Option<Summary>, PipelineError> {
        let running = RunState::Running as u8;
        if self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                (s != running).then_some(running)
            })
            .is_err()
        {
            log::debug!("Run already in progress, ignoring start request");
            return Ok(None);
        }

        let result = self.execute(config, observer);
        // A cancellation ends this run only; the next run starts fresh
        self.shutdown.clear();
        match result {
            Ok(summary) => {
                self.state
                    .store(RunState::Completed as u8, Ordering::SeqCst);
                observer.on_finished(&summary);
                Ok(Some(summary))
            }
            Err(e) => {
                log::error!("Run aborted: {e}");
                self.state.store(RunState::Failed as u8, Ordering::SeqCst);
                observer.on_fatal(&e);
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        config: &RunConfig,
        observer: &dyn ProgressObserver,
    ) -> Result<Summary, PipelineError> {
        let start = Instant::now();

        self.converter.ensure_available()?;

        let root_err = |source| PipelineError::Discovery {
            path: config.root.clone(),
            source,
        };
        let root = fs::canonicalize(&config.root).map_err(root_err)?;
        // Checked before the output root exists, so a bad root leaves nothing behind
        if !root.is_dir() {
            return Err(root_err(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                "not a directory",
            )));
        }
        let output_root = prepare_output_root(&root, config)?;
        let mapper = PathMapper::new(&root, &output_root);

        let mut discovery = discover(&root, &output_root)?;
        if config.skip_existing {
            discovery.skip_existing(&mapper);
        }
        let total = discovery.total();

        let workers = config.workers.max(1);
        log::info!(
            "Compressing {} files in {} folders with {} workers",
            fmt_num(total),
            fmt_num(discovery.groups.len()),
            workers
        );
        log::info!("Output folder: {}", output_root.display());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("compress-{i}"))
            .build()
            .map_err(|e| {
                PipelineError::Configuration(format!("failed to create thread pool: {e}"))
            })?;

        let converter = RetryingConverter::new(&self.converter, config.max_attempts);
        let progress = Progress::new(total);
        let failed = Mutex::new(Vec::new());
        let ctx = RunContext {
            mapper: &mapper,
            converter: &converter,
            progress: &progress,
            failed: &failed,
            observer,
            shutdown: &self.shutdown,
        };

        let mut folders = 0usize;
        for group in &discovery.groups {
            if self.shutdown.is_requested() {
                log::warn!("Shutdown requested, skipping remaining folders");
                break;
            }
            folders += 1;
            observer.on_progress(
                None,
                &format!("Processing folder: {}", mapper.display_relative(&group.dir)),
            );

            let queue = WorkQueue::new(group.files.iter().collect::<Vec<_>>());
            let group_workers = workers.min(queue.total());
            pool.scope(|s| {
                for _ in 0..group_workers {
                    s.spawn(|_| drain(&queue, &ctx));
                }
            });
        }

        let failed = failed.into_inner().expect("worker thread panicked");
        let completed = progress.completed();
        let cancelled = self.shutdown.is_requested() && completed + failed.len() < total;

        let summary = Summary {
            root,
            output_root,
            total_files: total,
            completed_files: completed,
            failed,
            skipped_files: discovery.skipped,
            folders,
            workers,
            cancelled,
            elapsed: start.elapsed(),
        };
        Ok(summary)
    }
}

/// Resolve, create and canonicalize the output root
fn prepare_output_root(root: &Path, config: &RunConfig) -> Result<PathBuf, PipelineError> {
    let output_root = match &config.output_root {
        Some(path) => path.clone(),
        None => sibling_output_root(root, &config.output_dir_name)?,
    };
    let output_err = |source| PipelineError::OutputRoot {
        path: output_root.clone(),
        source,
    };
    fs::create_dir_all(&output_root).map_err(output_err)?;
    let output_root = fs::canonicalize(&output_root).map_err(output_err)?;

    if root.starts_with(&output_root) {
        return Err(PipelineError::Configuration(format!(
            "input folder {} is inside the output folder {}",
            root.display(),
            output_root.display()
        )));
    }
    Ok(output_root)
}

/// Worker loop: claim files until the queue is empty or shutdown is requested
fn drain<C: Converter>(queue: &WorkQueue<&PathBuf>, ctx: &RunContext<'_, C>) {
    while !ctx.shutdown.is_requested() {
        let Some(file) = queue.next() else {
            break;
        };
        process_file(file, ctx);
    }
}

fn process_file<C: Converter>(file: &Path, ctx: &RunContext<'_, C>) {
    let output = match ctx.mapper.prepare(file) {
        Ok(output) => output,
        Err(e) => {
            log::warn!("{}: cannot prepare output: {e}", file.display());
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ctx.observer.on_progress(None, &format!("✘ Failed: {name}"));
            ctx.failed
                .lock()
                .expect("worker thread panicked")
                .push(file.to_path_buf());
            return;
        }
    };

    let outcome = ctx.converter.convert_with_retry(file, &output, ctx.observer);
    if outcome.success {
        let percent = ctx.progress.record_success();
        ctx.observer
            .on_progress(percent, &format!("✔ {}", ctx.mapper.display_relative(file)));
    } else {
        ctx.failed
            .lock()
            .expect("worker thread panicked")
            .push(outcome.file);
    }
}
