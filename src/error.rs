//! Error types for geomerge.
//!
//! Defines [`GeomergeError`], the unified error type for document, task and
//! session operations. Each variant says what went wrong and what to do
//! about it, so that a person or a script reading stderr can act on it
//! without further context.
//!
//! Merge conflicts are not errors. They are reported in the merge outcome.

use std::fmt;
use std::path::PathBuf;

use geomerge_core::MergeError;

use crate::task::TaskStatus;

// ---------------------------------------------------------------------------
// GeomergeError
// ---------------------------------------------------------------------------

/// Unified error type for geomerge operations.
#[derive(Debug)]
pub enum GeomergeError {
    /// A graph document could not be read or decoded.
    Document {
        /// The document path, empty for in-memory documents.
        path: PathBuf,
        /// What was wrong with it.
        detail: String,
    },

    /// The task source has no task with this id.
    TaskNotFound {
        /// The requested task id.
        id: u64,
    },

    /// The task's files exist but cannot be read as a task.
    TaskCorrupted {
        /// The task id.
        id: u64,
        /// What was wrong.
        detail: String,
    },

    /// The task has no suggested edit to apply.
    SuggestionMissing {
        /// The task id.
        id: u64,
    },

    /// Someone else holds the task lock.
    TaskLocked {
        /// The task id.
        id: u64,
    },

    /// The task's status can no longer change.
    TaskStatusFrozen {
        /// The task id.
        id: u64,
        /// Its current status.
        status: TaskStatus,
    },

    /// Another merge holds the session graph.
    MergeInProgress,

    /// The merge engine aborted. The target graph must be discarded.
    Merge(MergeError),

    /// A configuration file could not be loaded or parsed.
    ConfigError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// An I/O error occurred.
    Io(std::io::Error),
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for GeomergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document { path, detail } => {
                write!(
                    f,
                    "could not load graph document '{}': {detail}\n  To fix: check that the file is a geomerge JSON document:\n    geomerge inspect {}",
                    path.display(),
                    path.display()
                )
            }
            Self::TaskNotFound { id } => {
                write!(
                    f,
                    "task {id} not found.\n  To fix: check the task directory configured in geomerge.toml ([tasks] directory)."
                )
            }
            Self::TaskCorrupted { id, detail } => {
                write!(
                    f,
                    "task {id} is corrupted: {detail}\n  To fix: download the task again."
                )
            }
            Self::SuggestionMissing { id } => {
                write!(
                    f,
                    "task {id} has no suggested edit.\n  To fix: review the task manually:\n    geomerge task show {id}"
                )
            }
            Self::TaskLocked { id } => {
                write!(
                    f,
                    "task {id} is locked by another session.\n  To fix: wait for the other session to finish, or remove a stale lock file after checking no session is running."
                )
            }
            Self::TaskStatusFrozen { id, status } => {
                write!(
                    f,
                    "task {id} is {status} and its status cannot change.\n  To fix: pick another task."
                )
            }
            Self::MergeInProgress => {
                write!(
                    f,
                    "a merge is already in progress on this session.\n  To fix: wait for the current merge to finish before starting a new one."
                )
            }
            Self::Merge(err) => {
                write!(
                    f,
                    "merge aborted: {err}\n  To fix: discard the target graph and reload it; the input data is inconsistent."
                )
            }
            Self::ConfigError { path, detail } => {
                write!(
                    f,
                    "configuration error in '{}': {}\n  To fix: edit the config file and correct the issue.",
                    path.display(),
                    detail
                )
            }
            Self::Io(err) => {
                write!(
                    f,
                    "I/O error: {err}\n  To fix: check file permissions and disk space."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for GeomergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Merge(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<std::io::Error> for GeomergeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<crate::config::ConfigError> for GeomergeError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::ConfigError {
            path: err.path.unwrap_or_default(),
            detail: err.message,
        }
    }
}

impl From<crate::document::DocumentError> for GeomergeError {
    fn from(err: crate::document::DocumentError) -> Self {
        Self::Document {
            path: err.path.unwrap_or_default(),
            detail: err.message,
        }
    }
}

impl From<MergeError> for GeomergeError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::MergeInProgress => Self::MergeInProgress,
            other => Self::Merge(other),
        }
    }
}
