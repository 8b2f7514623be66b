//! Edit session: the locally edited graph plus the lock that serializes
//! merges into it.
//!
//! The session owns its graph behind `Arc<Mutex<_>>`. A merge takes the lock
//! with `try_lock` and fails fast with [`GeomergeError::MergeInProgress`]
//! when anything else holds it. A merge that aborts restores the graph to
//! its state before the call.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use geomerge_core::Graph;
use geomerge_core::merge::{GraphMerger, MergeOptions, MergeOutcome, ProgressCounter};
use tracing::instrument;

use crate::error::GeomergeError;
use crate::task::{Task, TaskSource};

/// A task whose suggestion was merged into the session graph.
#[derive(Debug)]
pub struct AppliedTask {
    /// Task metadata at the time it was applied.
    pub task: Task,
    /// Changes and conflicts from the merge.
    pub outcome: MergeOutcome,
}

/// The graph being edited, shared with whoever needs to read it.
#[derive(Clone, Debug)]
pub struct EditSession {
    graph: Arc<Mutex<Graph>>,
    options: MergeOptions,
    progress: ProgressCounter,
}

impl EditSession {
    /// Start a session over `graph`.
    #[must_use]
    pub fn new(graph: Graph, options: MergeOptions) -> Self {
        Self {
            graph: Arc::new(Mutex::new(graph)),
            options,
            progress: ProgressCounter::new(),
        }
    }

    /// Shared handle to the session graph.
    #[must_use]
    pub fn graph(&self) -> Arc<Mutex<Graph>> {
        Arc::clone(&self.graph)
    }

    /// Copy of the current graph. Blocks while a merge runs.
    #[must_use]
    pub fn snapshot(&self) -> Graph {
        self.graph
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Progress of merges run through this session.
    #[must_use]
    pub fn progress(&self) -> ProgressCounter {
        self.progress.clone()
    }

    /// Merge options used by this session.
    #[must_use]
    pub const fn options(&self) -> MergeOptions {
        self.options
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, Graph>, GeomergeError> {
        match self.graph.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(GeomergeError::MergeInProgress),
            Err(TryLockError::Poisoned(poisoned)) => {
                tracing::warn!("session graph lock was poisoned; continuing with its contents");
                Ok(poisoned.into_inner())
            }
        }
    }

    /// Merge `source` into the session graph.
    ///
    /// # Errors
    /// - [`GeomergeError::MergeInProgress`] if the graph is locked elsewhere.
    /// - [`GeomergeError::Merge`] if the engine aborts; the graph is rolled
    ///   back first.
    #[instrument(skip_all, fields(source_len = source.len()))]
    pub fn merge(&self, source: &Graph) -> Result<MergeOutcome, GeomergeError> {
        let mut graph = self.try_lock()?;
        let backup = graph.clone();
        let result = GraphMerger::new(&mut graph, source, self.options)
            .with_progress(self.progress.clone())
            .run();
        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if !err.is_contract_violation() {
                    tracing::warn!(error = %err, "merge aborted; restoring session graph");
                    *graph = backup;
                }
                Err(err.into())
            }
        }
    }

    /// Lock task `id`, fetch its suggestion and merge it.
    ///
    /// The task lock is held for the duration of the merge and released
    /// before returning.
    ///
    /// # Errors
    /// Task lookup and lock errors from `tasks`,
    /// [`GeomergeError::TaskStatusFrozen`] for deleted or disabled tasks, and
    /// everything [`EditSession::merge`] returns.
    #[instrument(skip(self, tasks))]
    pub fn apply_task<S: TaskSource>(
        &self,
        tasks: &S,
        id: u64,
    ) -> Result<AppliedTask, GeomergeError> {
        let _lock = tasks.lock(id)?;
        let task = tasks.task(id)?;
        if !task.status.is_mutable() {
            return Err(GeomergeError::TaskStatusFrozen {
                id,
                status: task.status,
            });
        }
        let suggestion = tasks.suggestion(id)?;
        let outcome = self.merge(&suggestion)?;
        tracing::info!(
            task = id,
            changes = outcome.changes.len(),
            conflicts = outcome.conflicts.len(),
            "task applied"
        );
        Ok(AppliedTask { task, outcome })
    }
}
