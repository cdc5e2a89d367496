//! pdfsquash core - concurrent folder-batch PDF compression
//!
//! Discovers PDFs under an input folder, mirrors them into a `Compressed`
//! sibling folder through an external Ghostscript process, and reports
//! progress to a [`ProgressObserver`].

pub mod converter;
pub mod discover;
pub mod error;
pub mod logging;
pub mod observer;
pub mod path_map;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod work_queue;

// Re-exports for convenience
pub use converter::{Converter, Ghostscript, default_program};
pub use discover::{DirectoryGroup, Discovery, discover};
pub use error::{ConversionError, PipelineError};
pub use logging::{IndicatifLogger, Verbosity, init_logging};
pub use observer::{ChannelObserver, LogObserver, ObserverEvent, ProgressObserver};
pub use path_map::{OUTPUT_DIR_NAME, PathMapper, default_output_root};
pub use pipeline::{Pipeline, RunConfig, RunState, Summary, default_workers};
pub use progress::{Progress, ProgressContext, SharedProgress};
pub use retry::{ConversionOutcome, DEFAULT_MAX_ATTEMPTS, RetryingConverter};
pub use shutdown::ShutdownFlag;
pub use work_queue::WorkQueue;
