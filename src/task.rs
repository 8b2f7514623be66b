//! Remotely hosted tasks.
//!
//! A task is a unit of review work: some metadata, the extent it covers and,
//! optionally, a suggested edit in the form of a source graph. The
//! [`TaskSource`] trait is the seam to whatever hosts the tasks; the only
//! implementation shipped here reads a local directory laid out as
//!
//! ```text
//! <root>/<id>/task.json         task metadata
//! <root>/<id>/suggestion.json   suggested edit (graph document), optional
//! <root>/<id>/.lock             present while a session holds the task
//! ```

use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use geomerge_core::Graph;
use geomerge_core::model::Bounds;
use serde::{Deserialize, Serialize};

use crate::document::load_graph;
use crate::error::GeomergeError;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// Review status, stored as the task service's numeric code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaskStatus {
    /// Not reviewed yet.
    #[default]
    Created,
    /// The reviewer fixed the issue.
    Fixed,
    /// Not an issue.
    FalsePositive,
    /// Left for someone else.
    Skipped,
    /// Removed by the task service.
    Deleted,
    /// Fixed before the reviewer got to it.
    AlreadyFixed,
    /// Beyond what the reviewer could fix.
    TooHard,
    /// A question task that was answered.
    Answered,
    /// A fix confirmed by a second reviewer.
    Validated,
    /// Withdrawn by the task service.
    Disabled,
}

impl TaskStatus {
    /// Every status, in code order.
    pub const ALL: [Self; 10] = [
        Self::Created,
        Self::Fixed,
        Self::FalsePositive,
        Self::Skipped,
        Self::Deleted,
        Self::AlreadyFixed,
        Self::TooHard,
        Self::Answered,
        Self::Validated,
        Self::Disabled,
    ];

    /// Numeric code used by the task service.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Status for a numeric code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Returns `true` if a task in this status can move to another one.
    #[must_use]
    pub const fn is_mutable(self) -> bool {
        !matches!(self, Self::Deleted | Self::Disabled)
    }

    /// Stable lowercase name, as accepted on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Fixed => "fixed",
            Self::FalsePositive => "false-positive",
            Self::Skipped => "skipped",
            Self::Deleted => "deleted",
            Self::AlreadyFixed => "already-fixed",
            Self::TooHard => "too-hard",
            Self::Answered => "answered",
            Self::Validated => "validated",
            Self::Disabled => "disabled",
        }
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown task status code {code}"))
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|st| st.as_str()).collect();
                format!("unknown task status '{s}'. Use one of: {}", names.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One task as described by the task service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task id.
    pub id: u64,
    /// Id of the challenge (task collection) this task belongs to.
    #[serde(default)]
    pub challenge_id: u64,
    /// Short name.
    #[serde(default)]
    pub name: String,
    /// What the reviewer is asked to do.
    #[serde(default)]
    pub instruction: String,
    /// Review status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Extent the task covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl Task {
    /// Move to `status`, honouring frozen statuses.
    ///
    /// # Errors
    /// [`GeomergeError::TaskStatusFrozen`] for deleted or disabled tasks.
    pub fn set_status(&mut self, status: TaskStatus) -> Result<(), GeomergeError> {
        if !self.status.is_mutable() {
            return Err(GeomergeError::TaskStatusFrozen {
                id: self.id,
                status: self.status,
            });
        }
        self.status = status;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TaskSource
// ---------------------------------------------------------------------------

/// Where tasks come from.
pub trait TaskSource {
    /// Held while a session works on a task; releases the lock on drop.
    type Lock;

    /// Fetch task metadata.
    ///
    /// # Errors
    /// [`GeomergeError::TaskNotFound`] or a read/parse error.
    fn task(&self, id: u64) -> Result<Task, GeomergeError>;

    /// Fetch the suggested edit as a source graph.
    ///
    /// # Errors
    /// [`GeomergeError::SuggestionMissing`] if the task has none.
    fn suggestion(&self, id: u64) -> Result<Graph, GeomergeError>;

    /// Change the task status and return the updated task.
    ///
    /// # Errors
    /// [`GeomergeError::TaskStatusFrozen`] for deleted or disabled tasks.
    fn update_status(&self, id: u64, status: TaskStatus) -> Result<Task, GeomergeError>;

    /// Take the task exclusively.
    ///
    /// # Errors
    /// [`GeomergeError::TaskLocked`] if another holder has it.
    fn lock(&self, id: u64) -> Result<Self::Lock, GeomergeError>;
}

// ---------------------------------------------------------------------------
// DirectoryTaskSource
// ---------------------------------------------------------------------------

/// Tasks stored one directory per task under a root directory.
#[derive(Clone, Debug)]
pub struct DirectoryTaskSource {
    root: PathBuf,
}

const TASK_FILE: &str = "task.json";
const SUGGESTION_FILE: &str = "suggestion.json";
const LOCK_FILE: &str = ".lock";

impl DirectoryTaskSource {
    /// Serve tasks from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn task_dir(&self, id: u64) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn write_task(&self, task: &Task) -> Result<(), GeomergeError> {
        let dir = self.task_dir(task.id);
        let json = serde_json::to_string_pretty(task).map_err(|e| GeomergeError::TaskCorrupted {
            id: task.id,
            detail: e.to_string(),
        })?;
        // Replaced atomically.
        let tmp = dir.join(format!("{TASK_FILE}.tmp"));
        std::fs::write(&tmp, json + "\n")?;
        std::fs::rename(&tmp, dir.join(TASK_FILE))?;
        Ok(())
    }
}

impl TaskSource for DirectoryTaskSource {
    type Lock = TaskLock;

    fn task(&self, id: u64) -> Result<Task, GeomergeError> {
        let path = self.task_dir(id).join(TASK_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(GeomergeError::TaskNotFound { id });
            }
            Err(e) => return Err(e.into()),
        };
        let task: Task = serde_json::from_str(&text).map_err(|e| GeomergeError::TaskCorrupted {
            id,
            detail: format!("{}: {e}", path.display()),
        })?;
        if task.id != id {
            return Err(GeomergeError::TaskCorrupted {
                id,
                detail: format!("{} describes task {}", path.display(), task.id),
            });
        }
        Ok(task)
    }

    fn suggestion(&self, id: u64) -> Result<Graph, GeomergeError> {
        let path = self.task_dir(id).join(SUGGESTION_FILE);
        if !path.exists() {
            // A missing task wins over a missing suggestion.
            self.task(id)?;
            return Err(GeomergeError::SuggestionMissing { id });
        }
        Ok(load_graph(&path)?)
    }

    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    fn update_status(&self, id: u64, status: TaskStatus) -> Result<Task, GeomergeError> {
        let mut task = self.task(id)?;
        let previous = task.status;
        task.set_status(status)?;
        if previous != status {
            self.write_task(&task)?;
            tracing::info!(%previous, %status, "task status updated");
        }
        Ok(task)
    }

    fn lock(&self, id: u64) -> Result<TaskLock, GeomergeError> {
        let dir = self.task_dir(id);
        if !dir.join(TASK_FILE).exists() {
            return Err(GeomergeError::TaskNotFound { id });
        }
        let path = dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(GeomergeError::TaskLocked { id });
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(task = id, "task locked");
        Ok(TaskLock { id, path })
    }
}

/// Exclusive hold on one task of a [`DirectoryTaskSource`]. The lock file is
/// removed on drop.
#[derive(Debug)]
pub struct TaskLock {
    id: u64,
    path: PathBuf,
}

impl TaskLock {
    /// Id of the locked task.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TaskLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(task = self.id, error = %e, "could not release task lock");
        } else {
            tracing::debug!(task = self.id, "task unlocked");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
