//! Bounded retry around a [`Converter`]

use std::path::{Path, PathBuf};

use crate::converter::Converter;
use crate::observer::ProgressObserver;

/// Attempts per file unless configured otherwise
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Final result for one file after all attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub file: PathBuf,
    pub success: bool,
    /// Last attempt's error, if it failed
    pub error_detail: Option<String>,
    pub attempts: u32,
}

/// Converter wrapper that retries immediately on failure.
///
/// No backoff: failures here are transient resource contention between
/// sibling workers, not rate limiting.
#[derive(Debug, Clone)]
pub struct RetryingConverter<C> {
    inner: C,
    max_attempts: u32,
}

impl<C: Converter> RetryingConverter<C> {
    /// `max_attempts` below 1 is raised to 1.
    pub fn new(inner: C, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Convert `input` into `output`, stopping at the first success.
    ///
    /// After the last failed attempt, exactly one failure message naming the
    /// file goes to `observer`. Never returns an error.
    pub fn convert_with_retry(
        &self,
        input: &Path,
        output: &Path,
        observer: &dyn ProgressObserver,
    ) -> ConversionOutcome {
        let name = file_name(input);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.inner.convert(input, output) {
                Ok(()) => {
                    return ConversionOutcome {
                        file: input.to_path_buf(),
                        success: true,
                        error_detail: None,
                        attempts: attempt,
                    };
                }
                Err(e) if attempt < self.max_attempts => {
                    log::debug!(
                        "{name}: attempt {attempt}/{} failed: {e}, retrying...",
                        self.max_attempts
                    );
                }
                Err(e) => {
                    log::warn!("{name}: failed permanently after {attempt} attempts: {e}");
                    observer.on_progress(None, &format!("✘ Failed: {name}"));
                    return ConversionOutcome {
                        file: input.to_path_buf(),
                        success: false,
                        error_detail: Some(e.to_string()),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then succeeds
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl Converter for Flaky {
        fn convert(&self, _input: &Path, _output: &Path) -> Result<(), ConversionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ConversionError::Exit {
                    code: Some(1),
                    stderr: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Option<u8>, String)>>);

    impl ProgressObserver for Recorder {
        fn on_progress(&self, percent: Option<u8>, message: &str) {
            self.0.lock().unwrap().push((percent, message.to_string()));
        }
    }

    #[test]
    fn first_try_success() {
        let retry = RetryingConverter::new(Flaky::new(0), 2);
        let rec = Recorder::default();
        let outcome = retry.convert_with_retry(Path::new("/r/a.pdf"), Path::new("/o/a.pdf"), &rec);

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 1);
        assert!(rec.0.lock().unwrap().is_empty());
    }

    #[test]
    fn fail_once_then_succeed() {
        let retry = RetryingConverter::new(Flaky::new(1), 2);
        let rec = Recorder::default();
        let outcome = retry.convert_with_retry(Path::new("/r/a.pdf"), Path::new("/o/a.pdf"), &rec);

        assert!(outcome.success);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 2);
        assert!(rec.0.lock().unwrap().is_empty());
    }

    #[test]
    fn always_fail_notifies_once() {
        let retry = RetryingConverter::new(Flaky::new(u32::MAX), 2);
        let rec = Recorder::default();
        let outcome =
            retry.convert_with_retry(Path::new("/r/sub/bad.pdf"), Path::new("/o/bad.pdf"), &rec);

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.error_detail.unwrap().contains("boom"));
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 2);

        let events = rec.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], (None, "✘ Failed: bad.pdf".to_string()));
    }

    #[test]
    fn zero_attempts_means_one() {
        let retry = RetryingConverter::new(Flaky::new(u32::MAX), 0);
        assert_eq!(retry.max_attempts(), 1);
        let rec = Recorder::default();
        let outcome = retry.convert_with_retry(Path::new("/r/a.pdf"), Path::new("/o/a.pdf"), &rec);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 1);
    }
}
