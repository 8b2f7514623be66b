//! geomerge configuration (`geomerge.toml`).
//!
//! Defines the typed configuration for merge behaviour, the task directory
//! and report output. Every field has a default.

use std::fmt;
use std::path::{Path, PathBuf};

use geomerge_core::MergeOptions;
use serde::Deserialize;

use crate::format::OutputFormat;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "geomerge.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level geomerge configuration.
///
/// Missing fields use defaults. Missing file → all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeomergeConfig {
    /// Merge engine settings.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Where tasks live.
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Report rendering.
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// MergeConfig
// ---------------------------------------------------------------------------

/// Merge engine settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Append the source's download extents to the target (default: `true`).
    #[serde(default = "default_true")]
    pub merge_bounds: bool,

    /// Let an upstream primitive claim an equal locally created one
    /// (default: `true`).
    #[serde(default = "default_true")]
    pub adopt_local_matches: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            merge_bounds: true,
            adopt_local_matches: true,
        }
    }
}

impl MergeConfig {
    /// Engine options for these settings.
    #[must_use]
    pub const fn options(&self) -> MergeOptions {
        MergeOptions {
            merge_bounds: self.merge_bounds,
            adopt_local_matches: self.adopt_local_matches,
        }
    }
}

const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// TasksConfig
// ---------------------------------------------------------------------------

/// Task source settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TasksConfig {
    /// Root of the task directory (default: `"tasks"`).
    #[serde(default = "default_task_directory")]
    pub directory: PathBuf,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            directory: default_task_directory(),
        }
    }
}

fn default_task_directory() -> PathBuf {
    PathBuf::from("tasks")
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

/// Report rendering settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// `"text"` or `"json"` (default: `"text"`).
    #[serde(default)]
    pub format: OutputFormat,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a geomerge configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl GeomergeConfig {
    /// Load configuration from a TOML file.
    ///
    /// - File not found → defaults.
    /// - File exists but is invalid → [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
