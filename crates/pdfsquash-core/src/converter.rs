//! Single-file conversion through an external Ghostscript process

use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::{ConversionError, PipelineError};

/// Interval between exit checks while a timeout is armed
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lines of converter stderr kept for error reports
const STDERR_TAIL_LINES: usize = 5;

/// Converts one input file into one output file.
///
/// Implementations hold no per-file state and are called concurrently.
pub trait Converter: Send + Sync {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError>;

    /// Preflight check run once before any file is touched.
    fn ensure_available(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

impl<C: Converter + ?Sized> Converter for &C {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        (**self).convert(input, output)
    }

    fn ensure_available(&self) -> Result<(), PipelineError> {
        (**self).ensure_available()
    }
}

/// Default Ghostscript executable name for this platform
pub fn default_program() -> &'static str {
    if cfg!(windows) {
        "gswin64c.exe"
    } else {
        "gs"
    }
}

/// Fixed Ghostscript argument template: PDF 1.4 `/screen` preset,
/// color/gray images downsampled to 120 dpi, mono to 300 dpi.
pub fn compression_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-sDEVICE=pdfwrite",
        "-dCompatibilityLevel=1.4",
        "-dNOPAUSE",
        "-dBATCH",
        "-dQUIET",
        "-dPDFSETTINGS=/screen",
        "-dDetectDuplicateImages=true",
        "-dCompressFonts=true",
        "-dSubsetFonts=true",
        "-dDownsampleColorImages=true",
        "-dColorImageResolution=120",
        "-dDownsampleGrayImages=true",
        "-dGrayImageResolution=120",
        "-dDownsampleMonoImages=true",
        "-dMonoImageResolution=300",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    let mut output_arg = OsString::from("-sOutputFile=");
    output_arg.push(output.as_os_str());
    args.push(output_arg);
    args.push(input.as_os_str().to_owned());
    args
}

/// Temporary path the converter writes to before the final rename
pub fn staged_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Locate an executable `program`.
///
/// Bare names are searched in `PATH`; names with a directory are resolved
/// against the working directory. Files without execute permission never match.
pub fn resolve_program(program: &Path) -> Result<PathBuf, which::Error> {
    which::which(program)
}

/// Ghostscript-backed converter
#[derive(Debug, Clone)]
pub struct Ghostscript {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Ghostscript {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    /// Kill the process if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run the process once, writing to `target`.
    fn invoke(&self, input: &Path, target: &Path) -> Result<(), ConversionError> {
        let mut child = Command::new(&self.program)
            .args(compression_args(input, target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ConversionError::Spawn)?;

        // Both pipes are drained concurrently with the wait, or a chatty
        // process stalls once the pipe buffer fills.
        let stdout = child.stdout.take();
        let out = std::thread::spawn(move || {
            if let Some(mut out) = stdout {
                let _ = std::io::copy(&mut out, &mut std::io::sink());
            }
        });
        let stderr = child.stderr.take();
        let err = std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut err) = stderr {
                let _ = err.read_to_end(&mut buf);
            }
            tail_lines(&buf, STDERR_TAIL_LINES)
        });

        let status = wait_with_timeout(&mut child, self.timeout);
        // After a timeout kill, a forked helper may still hold the pipes open.
        // The drain threads are detached then and exit when it does.
        let stderr_tail = match &status {
            Ok(_) => {
                let _ = out.join();
                err.join().unwrap_or_default()
            }
            Err(_) => String::new(),
        };

        let status = status?;
        if !status.success() {
            return Err(ConversionError::Exit {
                code: status.code(),
                stderr: stderr_tail,
            });
        }
        Ok(())
    }
}

impl Converter for Ghostscript {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        let staged = staged_path(output);
        if staged.exists() {
            fs::remove_file(&staged)?;
        }

        let result = self
            .invoke(input, &staged)
            .and_then(|()| verify_output(&staged, output));
        match result {
            Ok(()) => {
                fs::rename(&staged, output)?;
                Ok(())
            }
            Err(e) => {
                // Partial output from a failed attempt is never trusted
                let _ = fs::remove_file(&staged);
                Err(e)
            }
        }
    }

    fn ensure_available(&self) -> Result<(), PipelineError> {
        let path = resolve_program(&self.program).map_err(|e| {
            PipelineError::Configuration(format!(
                "Ghostscript not found: {} ({e})",
                self.program.display()
            ))
        })?;
        log::debug!("Using Ghostscript at {}", path.display());
        Ok(())
    }
}

/// Output must exist and be non-empty after a zero exit
fn verify_output(staged: &Path, output: &Path) -> Result<(), ConversionError> {
    match fs::metadata(staged) {
        Ok(m) if m.is_file() && m.len() > 0 => Ok(()),
        _ => Err(ConversionError::MissingOutput(output.to_path_buf())),
    }
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<ExitStatus, ConversionError> {
    let Some(timeout) = timeout else {
        return Ok(child.wait()?);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ConversionError::TimedOut(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Last `n` non-empty lines, joined with `"; "`
fn tail_lines(buf: &[u8], n: usize) -> String {
    let text = String::from_utf8_lossy(buf);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("; ")
}
