//! Reconciliation table for identity matches.
//!
//! When a source primitive with an assigned identity has a counterpart in the
//! target, the action is picked from an ordered table. The first matching row
//! wins:
//!
//! | # | Condition | Decision |
//! |---|-----------|----------|
//! | 1 | target version newer | [`Decision::KeepTarget`] |
//! | 2 | target unmodified, source deleted | [`Decision::ScheduleDeletion`] |
//! | 3 | source incomplete | [`Decision::Nothing`] |
//! | 4 | target incomplete | [`Decision::Merge`] |
//! | 5 | both deleted, versions differ | [`Decision::Merge`] |
//! | 6a | target deleted, source live and modified, same version | conflict |
//! | 6b | target deleted, source live and unmodified, same version | [`Decision::CheckUpstreamReferrers`] |
//! | 7 | target unmodified, source modified | [`Decision::Merge`] |
//! | 8 | neither modified | [`Decision::MergeUnmodified`] |
//! | 9 | target modified, source not, same version, semantically equal | [`Decision::ClearModified`] |
//! | 10 | deleted flags differ | conflict |
//! | 11 | not semantically equal | conflict |
//! | 12 | otherwise | [`Decision::Merge`] |
//!
//! The table is a single `match` over a tuple of precomputed booleans so the
//! row order can be read off directly.

use crate::model::{Graph, PrimitiveRef};

use super::conflict::ConflictReason;
use super::identity::semantically_equal;

/// Everything the table looks at, computed up front.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Facts {
    /// `target.version > source.version`.
    pub target_newer: bool,
    /// Target carries local edits.
    pub target_modified: bool,
    /// Target is locally deleted.
    pub target_deleted: bool,
    /// Target has only its identity loaded.
    pub target_incomplete: bool,
    /// Source carries edits.
    pub source_modified: bool,
    /// Source is deleted.
    pub source_deleted: bool,
    /// Source has only its identity loaded.
    pub source_incomplete: bool,
    /// Versions are equal.
    pub same_version: bool,
    /// Tags and references are semantically equal.
    pub semantically_equal: bool,
}

impl Facts {
    /// Gather the facts for a `(target, source)` pair. `None` if either
    /// handle is unknown to its graph.
    #[must_use]
    pub fn gather(
        target_graph: &Graph,
        target: PrimitiveRef,
        source_graph: &Graph,
        source: PrimitiveRef,
    ) -> Option<Self> {
        let t = target_graph.get(target)?;
        let s = source_graph.get(source)?;
        Some(Self {
            target_newer: t.version > s.version,
            target_modified: t.modified,
            target_deleted: t.deleted,
            target_incomplete: t.incomplete,
            source_modified: s.modified,
            source_deleted: s.deleted,
            source_incomplete: s.incomplete,
            same_version: t.version == s.version,
            semantically_equal: semantically_equal(target_graph, target, source_graph, source),
        })
    }
}

/// What to do with an identity match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Target is newer; leave it alone.
    KeepTarget,
    /// Hand the target to the cascading-deletion pass.
    ScheduleDeletion,
    /// Source has nothing to contribute.
    Nothing,
    /// Merge source state into the target.
    Merge,
    /// Merge with neither side modified; same-version visibility must agree.
    MergeUnmodified,
    /// Local edit turned out to match upstream; drop the modified flag.
    ClearModified,
    /// Locally deleted at the same version: conflict only if an upstream
    /// referrer is unknown to the target.
    CheckUpstreamReferrers,
    /// Record a conflict.
    Conflict(ConflictReason),
}

/// Apply the table.
#[must_use]
pub const fn decide(f: &Facts) -> Decision {
    match (
        f.target_newer,
        f.target_modified,
        f.source_deleted,
        f.source_incomplete,
        f.target_incomplete,
        f.target_deleted,
        f.same_version,
        f.source_modified,
        f.semantically_equal,
    ) {
        // newer, t_mod, s_del, s_inc, t_inc, t_del, same, s_mod, equal
        (true, ..) => Decision::KeepTarget,
        (_, false, true, ..) => Decision::ScheduleDeletion,
        (_, _, _, true, ..) => Decision::Nothing,
        (_, _, _, _, true, ..) => Decision::Merge,
        (_, _, true, _, _, true, false, ..) => Decision::Merge,
        (_, _, false, _, _, true, true, true, _) => {
            Decision::Conflict(ConflictReason::ModifiedUpstreamDeletedLocally)
        }
        (_, _, false, _, _, true, true, false, _) => Decision::CheckUpstreamReferrers,
        (_, false, _, _, _, _, _, true, _) => Decision::Merge,
        (_, false, _, _, _, _, _, false, _) => Decision::MergeUnmodified,
        (_, true, _, _, _, _, true, false, true) => Decision::ClearModified,
        (_, _, s_del, _, _, t_del, ..) if s_del != t_del => {
            Decision::Conflict(ConflictReason::DeletionMismatch)
        }
        (.., false) => Decision::Conflict(ConflictReason::DivergentEdits),
        _ => Decision::Merge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Facts {
        Facts {
            same_version: true,
            semantically_equal: true,
            ..Facts::default()
        }
    }

    #[test]
    fn newer_target_wins_over_everything() {
        let f = Facts {
            target_newer: true,
            same_version: false,
            source_deleted: true,
            source_modified: true,
            ..base()
        };
        assert_eq!(decide(&f), Decision::KeepTarget);
    }

    #[test]
    fn upstream_deletion_of_unmodified_target_is_scheduled() {
        let f = Facts {
            source_deleted: true,
            source_incomplete: true,
            ..base()
        };
        assert_eq!(decide(&f), Decision::ScheduleDeletion);
    }

    #[test]
    fn incomplete_source_is_a_no_op() {
        let f = Facts {
            target_modified: true,
            source_incomplete: true,
            target_incomplete: true,
            ..base()
        };
        assert_eq!(decide(&f), Decision::Nothing);
    }

    #[test]
    fn incomplete_target_takes_source() {
        let f = Facts {
            target_modified: true,
            target_incomplete: true,
            semantically_equal: false,
            ..base()
        };
        assert_eq!(decide(&f), Decision::Merge);
    }

    #[test]
    fn both_deleted_at_different_versions_merges() {
        let f = Facts {
            target_modified: true,
            target_deleted: true,
            source_deleted: true,
            same_version: false,
            ..base()
        };
        assert_eq!(decide(&f), Decision::Merge);
    }

    #[test]
    fn local_deletion_vs_upstream_modification() {
        let f = Facts {
            target_modified: true,
            target_deleted: true,
            source_modified: true,
            ..base()
        };
        assert_eq!(
            decide(&f),
            Decision::Conflict(ConflictReason::ModifiedUpstreamDeletedLocally)
        );

        let f = Facts {
            target_modified: true,
            target_deleted: true,
            ..base()
        };
        assert_eq!(decide(&f), Decision::CheckUpstreamReferrers);
    }

    #[test]
    fn unmodified_target_follows_source() {
        let f = Facts {
            source_modified: true,
            semantically_equal: false,
            ..base()
        };
        assert_eq!(decide(&f), Decision::Merge);
        assert_eq!(decide(&base()), Decision::MergeUnmodified);
    }

    #[test]
    fn matching_local_edit_is_confirmed() {
        let f = Facts {
            target_modified: true,
            ..base()
        };
        assert_eq!(decide(&f), Decision::ClearModified);
    }

    #[test]
    fn diverging_local_edit_conflicts() {
        let f = Facts {
            target_modified: true,
            semantically_equal: false,
            ..base()
        };
        assert_eq!(
            decide(&f),
            Decision::Conflict(ConflictReason::DivergentEdits)
        );
    }

    #[test]
    fn deletion_mismatch_beats_divergence() {
        // Target modified and deleted, source live, versions differ.
        let f = Facts {
            target_modified: true,
            target_deleted: true,
            same_version: false,
            semantically_equal: false,
            ..base()
        };
        assert_eq!(
            decide(&f),
            Decision::Conflict(ConflictReason::DeletionMismatch)
        );
    }

    #[test]
    fn both_modified_and_equal_falls_through_to_merge() {
        let f = Facts {
            target_modified: true,
            source_modified: true,
            ..base()
        };
        assert_eq!(decide(&f), Decision::Merge);
    }
}
