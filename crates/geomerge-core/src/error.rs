//! Merge error taxonomy.
//!
//! Conflicts are not errors: they are recorded in the
//! [`ConflictLedger`](crate::merge::conflict::ConflictLedger) and the merge
//! carries on. Everything here aborts the merge call.

use std::fmt;

use crate::model::{GraphError, Identity, PrimitiveKind};

/// Which graph of a merge call a problem was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphSide {
    /// The graph being merged into.
    Target,
    /// The graph being merged from.
    Source,
}

impl fmt::Display for GraphSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target => f.write_str("target"),
            Self::Source => f.write_str("source"),
        }
    }
}

/// Fatal data-integrity problems. The target graph must be discarded or
/// rolled back by the caller.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    /// Same version, opposite visibility, and neither side modified.
    #[error(
        "{kind} {identity} v{version}: visibility differs between target and source at the same version"
    )]
    VisibilityMismatch {
        /// Kind of the primitive.
        kind: PrimitiveKind,
        /// Its identity.
        identity: Identity,
        /// The shared version.
        version: u64,
    },

    /// A source reference was never mapped during the primary pass.
    #[error("{from} references {to_kind} {to_identity}, which was not merged")]
    UnmappedReference {
        /// Label of the referring source primitive.
        from: String,
        /// Kind of the unmapped source primitive.
        to_kind: PrimitiveKind,
        /// Identity of the unmapped source primitive.
        to_identity: Identity,
    },

    /// A primitive scheduled for fix-up has no counterpart in the target.
    #[error("{0} was scheduled for reference fix-up but has no target counterpart")]
    MissingCounterpart(String),

    /// A primitive deleted by the cascade still has a live referrer.
    #[error("{deleted} was deleted but is still referenced by {referrer}")]
    OrphanedDeletion {
        /// Label of the deleted primitive.
        deleted: String,
        /// Label of the live referrer.
        referrer: String,
    },

    /// The target graph rejected an insertion or identity assignment.
    #[error("target graph rejected an update: {0}")]
    TargetGraph(#[from] GraphError),
}

/// Error returned by a merge call.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Fatal data-integrity problem; see [`IntegrityError`].
    #[error("data integrity violation: {0}")]
    DataIntegrity(#[from] IntegrityError),

    /// An input graph is not closed. Raised before any mutation.
    #[error("{side} graph is invalid: {source}")]
    InvalidGraph {
        /// Which input failed validation.
        side: GraphSide,
        /// What was wrong with it.
        source: GraphError,
    },

    /// Another merge holds the target graph.
    #[error("a merge is already in progress on the target graph")]
    MergeInProgress,
}

impl MergeError {
    /// Returns `true` for errors raised before the target was touched.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::InvalidGraph { .. } | Self::MergeInProgress)
    }
}
