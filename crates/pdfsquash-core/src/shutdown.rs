//! Cooperative cancellation via a shared atomic flag

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shutdown flag shared between a signal handler and pipeline workers.
///
/// Workers check it before claiming the next file; work in flight finishes.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown was requested
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Request shutdown
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Withdraw a request, re-arming the flag for the next run
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Underlying flag, for `signal_hook::flag::register`
    pub fn as_arc(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = ShutdownFlag::new();
        let other = flag.clone();
        assert!(!other.is_requested());
        flag.request();
        assert!(other.is_requested());
    }

    #[test]
    fn clear_rearms_flag() {
        let flag = ShutdownFlag::new();
        flag.request();
        flag.clear();
        assert!(!flag.is_requested());
    }

    #[test]
    fn raw_handle_sets_flag() {
        let flag = ShutdownFlag::new();
        flag.as_arc().store(true, Ordering::Relaxed);
        assert!(flag.is_requested());
    }
}
