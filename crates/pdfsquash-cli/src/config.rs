//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for pdfsquash
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub ghostscript: GhostscriptConfig,
    pub workers: WorkersConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
    /// File this config was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GhostscriptConfig {
    /// Executable name or path; `${VAR}` is expanded
    #[serde(deserialize_with = "deserialize_env_var")]
    pub program: Option<String>,
    /// Kill a single conversion after this many seconds
    pub timeout_secs: Option<u64>,
}

impl Default for GhostscriptConfig {
    fn default() -> Self {
        Self {
            program: std::env::var("PDFSQUASH_GS").ok(),
            timeout_secs: None,
        }
    }
}

impl GhostscriptConfig {
    /// Configured program, or the platform default
    pub fn program(&self) -> &str {
        self.program
            .as_deref()
            .unwrap_or_else(|| pdfsquash_core::default_program())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            default: pdfsquash_core::default_workers(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: pdfsquash_core::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Name of the output folder created next to the input folder
    pub dir_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir_name: pdfsquash_core::OUTPUT_DIR_NAME.to_string(),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./pdfsquash.toml (current directory)
    /// 2. ~/.config/pdfsquash/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("pdfsquash.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "pdfsquash") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.workers.default >= 2);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.output.dir_name, "Compressed");
        assert!(config.ghostscript.timeout_secs.is_none());
        assert!(config.source.is_none());
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("PDFSQUASH_TEST_VAR", "/opt/gs/bin/gs");
        assert_eq!(
            expand_env_var("${PDFSQUASH_TEST_VAR}"),
            Some("/opt/gs/bin/gs".to_string())
        );
        std::env::remove_var("PDFSQUASH_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("gswin64c.exe"), Some("gswin64c.exe".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[ghostscript]
program = "/usr/local/bin/gs"
timeout_secs = 120

[workers]
default = 6

[retry]
max_attempts = 3

[output]
dir_name = "Small"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.ghostscript.program(), "/usr/local/bin/gs");
        assert_eq!(config.ghostscript.timeout_secs, Some(120));
        assert_eq!(config.workers.default, 6);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.output.dir_name, "Small");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[retry]\nmax_attempts = 5\n").unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.output.dir_name, "Compressed");
    }

    #[test]
    fn from_file_records_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pdfsquash.toml");
        std::fs::write(&path, "[workers]\ndefault = 3\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.workers.default, 3);
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[workers\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
