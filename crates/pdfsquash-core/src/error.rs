//! Error types for the compression pipeline
//!
//! [`PipelineError`] is fatal and aborts a run before any folder starts.
//! [`ConversionError`] belongs to a single attempt on a single file and only
//! ever reaches the retry loop.

use std::path::PathBuf;
use std::time::Duration;

/// Fatal error that aborts a whole run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Input root is missing, not a directory, or unreadable
    #[error("cannot read input folder {}: {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing external tool or an unusable run configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Output root could not be created
    #[error("cannot create output folder {}: {source}", .path.display())]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of one conversion attempt. Always retryable.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("failed to start converter: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("converter exited with {}: {stderr}", fmt_code(.code))]
    Exit { code: Option<i32>, stderr: String },

    #[error("converter produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("converter timed out after {:.1}s", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("{} is outside the input folder", .0.display())]
    OutsideRoot(PathBuf),
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}
