//! Conflict ledger.
//!
//! A conflict pairs a target primitive with the source primitive the engine
//! could not reconcile automatically. Both sides are snapshotted when the
//! conflict is detected, so later mutations of the target graph (undeletion,
//! for example) do not change what the resolver UI is shown.
//!
//! | Reason | Raised by |
//! |--------|-----------|
//! | [`ConflictReason::ModifiedUpstreamDeletedLocally`] | primary pass, deleted target vs modified source |
//! | [`ConflictReason::ReferencedUpstreamDeletedLocally`] | primary pass, source referrer unknown to target |
//! | [`ConflictReason::DeletionMismatch`] | primary pass, one side deleted |
//! | [`ConflictReason::DivergentEdits`] | primary pass, both sides edited |
//! | [`ConflictReason::RequiredByMergedReference`] | fix-up, merged reference revives a deleted target |
//! | [`ConflictReason::StillReferenced`] | cascade, deletion blocked by a live referrer |

use std::fmt;

use crate::model::{Primitive, PrimitiveRef};

/// Why a pair could not be reconciled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConflictReason {
    /// Target deleted locally, source modified at the same version.
    ModifiedUpstreamDeletedLocally,
    /// Target deleted locally, but something upstream that the target does
    /// not know about still references it.
    ReferencedUpstreamDeletedLocally,
    /// Exactly one side is deleted.
    DeletionMismatch,
    /// Both sides differ semantically.
    DivergentEdits,
    /// A merged path or group references a target primitive that was deleted
    /// locally; the reference forces it back into existence.
    RequiredByMergedReference,
    /// Upstream deleted it, but a live target primitive still references it.
    StillReferenced,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModifiedUpstreamDeletedLocally => {
                write!(f, "deleted locally, modified upstream")
            }
            Self::ReferencedUpstreamDeletedLocally => {
                write!(f, "deleted locally, still referenced upstream")
            }
            Self::DeletionMismatch => write!(f, "deleted on one side only"),
            Self::DivergentEdits => write!(f, "edited differently on both sides"),
            Self::RequiredByMergedReference => {
                write!(f, "deleted locally, required by a merged reference")
            }
            Self::StillReferenced => write!(f, "deleted upstream, still referenced locally"),
        }
    }
}

/// One unresolved divergence.
#[derive(Clone, Debug, PartialEq)]
pub struct Conflict {
    /// Handle of the target ("my") primitive.
    pub target: PrimitiveRef,
    /// Handle of the source ("their") primitive.
    pub source: PrimitiveRef,
    /// Target state when the conflict was detected.
    pub mine: Primitive,
    /// Source state when the conflict was detected.
    pub theirs: Primitive,
    /// `true` when the conflict was raised on behalf of the source side,
    /// i.e. the local deletion is what is being questioned.
    pub from_theirs: bool,
    /// Classification.
    pub reason: ConflictReason,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.mine.label(), self.reason)
    }
}

/// Ordered collection of conflicts from one merge call.
///
/// An empty ledger means the merge was fully automatic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConflictLedger {
    conflicts: Vec<Conflict>,
}

impl ConflictLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a conflict unless the same (target, source) pair is already
    /// recorded. Returns `true` if it was appended.
    pub fn record(&mut self, conflict: Conflict) -> bool {
        if self
            .conflicts
            .iter()
            .any(|c| c.target == conflict.target && c.source == conflict.source)
        {
            return false;
        }
        tracing::warn!(
            primitive = %conflict.mine.label(),
            reason = %conflict.reason,
            "conflict recorded"
        );
        self.conflicts.push(conflict);
        true
    }

    /// Returns `true` if any conflict involves this target primitive.
    #[must_use]
    pub fn has_conflict_for_target(&self, target: PrimitiveRef) -> bool {
        self.conflicts.iter().any(|c| c.target == target)
    }

    /// The conflict recorded for a target primitive, if any.
    #[must_use]
    pub fn for_target(&self, target: PrimitiveRef) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.target == target)
    }

    /// Number of conflicts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Returns `true` if the merge was fully automatic.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Conflicts in detection order.
    pub fn iter(&self) -> std::slice::Iter<'_, Conflict> {
        self.conflicts.iter()
    }
}

impl<'a> IntoIterator for &'a ConflictLedger {
    type Item = &'a Conflict;
    type IntoIter = std::slice::Iter<'a, Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
