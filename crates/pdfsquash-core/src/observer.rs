//! Progress observer — the boundary between the pipeline and whatever presents it
//!
//! Observers are called concurrently from worker threads. Implementations must
//! not block on a UI thread: [`ChannelObserver`] forwards events over an
//! unbounded channel so a presenter can consume them at its own pace.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::PipelineError;
use crate::pipeline::Summary;

/// Receives status updates from a running pipeline.
pub trait ProgressObserver: Send + Sync {
    /// `percent` is set only when the completed count changed.
    fn on_progress(&self, percent: Option<u8>, message: &str);

    /// Run finished (possibly with per-file failures or cancelled)
    fn on_finished(&self, _summary: &Summary) {}

    /// Run aborted before any folder was processed
    fn on_fatal(&self, _error: &PipelineError) {}
}

/// Event forwarded by [`ChannelObserver`].
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    Progress {
        percent: Option<u8>,
        message: String,
    },
    Finished(Summary),
    Fatal(String),
}

/// Observer that marshals every call onto a channel.
///
/// Sending never blocks. Events are dropped silently once the receiver is gone.
#[derive(Debug)]
pub struct ChannelObserver {
    sender: Sender<ObserverEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<ObserverEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, percent: Option<u8>, message: &str) {
        let _ = self.sender.send(ObserverEvent::Progress {
            percent,
            message: message.to_string(),
        });
    }

    fn on_finished(&self, summary: &Summary) {
        let _ = self.sender.send(ObserverEvent::Finished(summary.clone()));
    }

    fn on_fatal(&self, error: &PipelineError) {
        let _ = self.sender.send(ObserverEvent::Fatal(error.to_string()));
    }
}

/// Observer that writes every message to the log (non-TTY / headless use).
#[derive(Debug, Default)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_progress(&self, percent: Option<u8>, message: &str) {
        match percent {
            Some(p) => log::info!("[{p:>3}%] {message}"),
            None => log::info!("{message}"),
        }
    }

    fn on_fatal(&self, error: &PipelineError) {
        log::error!("{error}");
    }
}
