//! Progress tracking and reporting for TTY and non-TTY environments.
//!
//! [`Progress`] is the run-wide completion counter shared by all workers.
//! [`ProgressContext`] renders it: indicatif bars on a TTY, log lines otherwise.

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Completed-file counter paired with the total fixed at discovery time.
#[derive(Debug)]
pub struct Progress {
    completed: AtomicUsize,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Count one successful file and return the new percent of the grand total.
    ///
    /// Returns `None` when the total is zero. Clamped to 100 in case the
    /// filesystem changed under discovery.
    pub fn record_success(&self) -> Option<u8> {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        percent(done, self.total)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// `floor(done * 100 / total)`, clamped to 100; `None` for an empty run
pub fn percent(done: usize, total: usize) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = (done.saturating_mul(100) / total).min(100);
    Some(pct as u8)
}

/// Overall bar: green, 0..=100 percent
fn overall_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<10.cyan.bold} {bar:40.green/dim} {pos:>3}% {elapsed_precise:.dim}")
        .expect("invalid template")
        .progress_chars("━━─")
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Create the overall percent bar.
    ///
    /// TTY: visible bar with length 100.
    /// Non-TTY: hidden (no-op).
    pub fn overall_bar(&self) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(100));
        pb.set_style(overall_style());
        pb.set_prefix("compress");
        pb
    }

    /// Create a status line with a spinner, e.g. for the folder being processed.
    ///
    /// Update with `pb.set_message(...)`, call `pb.finish_and_clear()` when done.
    pub fn status_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Print a line above managed progress bars (avoids interference).
    ///
    /// Use this instead of `eprintln!` when progress bars are active.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
