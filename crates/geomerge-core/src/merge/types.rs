//! Core types for the merge engine.
//!
//! Options going in, outcome and statistics coming out, and the progress
//! counter shared with an external reporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::PrimitiveRef;

use super::changeset::ChangeSet;
use super::conflict::ConflictLedger;
use super::identity::IdentityMap;

// ---------------------------------------------------------------------------
// MergeOptions
// ---------------------------------------------------------------------------

/// Knobs for one merge call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    /// Append the source graph's bounds to the target's.
    pub merge_bounds: bool,
    /// Let an assigned source primitive without an identity match adopt a
    /// semantically equal local target primitive.
    pub adopt_local_matches: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            merge_bounds: true,
            adopt_local_matches: true,
        }
    }
}

// ---------------------------------------------------------------------------
// MergeStats
// ---------------------------------------------------------------------------

/// Counters collected during a merge, for logging and reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Source primitives visited by the primary pass.
    pub processed: usize,
    /// Source primitives cloned into the target.
    pub cloned: usize,
    /// Unassigned source primitives matched semantically.
    pub matched: usize,
    /// Local target primitives that adopted a source identity.
    pub adopted: usize,
    /// Identity matches where the source state was merged in.
    pub merged: usize,
    /// Identity matches left untouched (target newer, source incomplete, ...).
    pub kept: usize,
    /// Paths and groups whose references were rebuilt.
    pub fixed_up: usize,
    /// Primitives deleted by the cascade, forced ones included.
    pub deleted: usize,
    /// Deletions forced because of cross references among deletion candidates.
    pub forced_deletions: usize,
}

// ---------------------------------------------------------------------------
// DeletionCandidate
// ---------------------------------------------------------------------------

/// A target primitive scheduled for cascading deletion, with the deleted
/// source revision that asked for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeletionCandidate {
    /// Target handle.
    pub target: PrimitiveRef,
    /// Source handle.
    pub source: PrimitiveRef,
}

// ---------------------------------------------------------------------------
// MergeOutcome
// ---------------------------------------------------------------------------

/// What one merge call produced. The target graph itself was mutated in place.
#[derive(Clone, Debug, Default)]
pub struct MergeOutcome {
    /// Added, modified and deleted target primitives.
    pub changes: ChangeSet,
    /// Conflicts left for manual resolution.
    pub conflicts: ConflictLedger,
    /// Source → target correspondence established by the primary pass.
    pub identity_map: IdentityMap,
    /// Counters.
    pub stats: MergeStats,
}

impl MergeOutcome {
    /// Returns `true` if no conflicts were recorded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ProgressCounter
// ---------------------------------------------------------------------------

/// Monotonic count of processed source primitives, readable from another
/// thread. Advisory only.
#[derive(Clone, Debug, Default)]
pub struct ProgressCounter {
    inner: Arc<ProgressState>,
}

#[derive(Debug, Default)]
struct ProgressState {
    processed: AtomicUsize,
    total: AtomicUsize,
}

impl ProgressCounter {
    /// Create a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Primitives processed so far, across every merge that used this counter.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.inner.processed.load(Ordering::Relaxed)
    }

    /// Primitives announced so far, across every merge that used this counter.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inner.total.load(Ordering::Relaxed)
    }

    pub(crate) fn announce(&self, primitives: usize) {
        self.inner.total.fetch_add(primitives, Ordering::Relaxed);
    }

    pub(crate) fn advance(&self) {
        self.inner.processed.fetch_add(1, Ordering::Relaxed);
    }
}
