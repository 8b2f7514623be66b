//! Merge driver.
//!
//! [`GraphMerger`] owns the per-call state (identity map, ledger, change set,
//! fix-up and deletion queues) and runs the three phases in order. The
//! target graph is borrowed mutably for the whole call, so no other mutator
//! can observe it half-merged.

use tracing::instrument;

use crate::error::{GraphSide, IntegrityError, MergeError};
use crate::model::{Graph, PrimitiveKind, PrimitiveRef, ReferrerIndex};

use super::cascade::cascade_deletions;
use super::changeset::ChangeSet;
use super::conflict::{Conflict, ConflictLedger, ConflictReason};
use super::fixup::fix_references;
use super::identity::{IdentityMap, IdentityResolver, Resolution};
use super::reconcile::{Decision, Facts, decide};
use super::types::{DeletionCandidate, MergeOptions, MergeOutcome, MergeStats, ProgressCounter};

/// Merge `source` into `target` with the given options.
///
/// # Errors
/// See [`GraphMerger::run`].
pub fn merge_graphs(
    target: &mut Graph,
    source: &Graph,
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    GraphMerger::new(target, source, *options).run()
}

/// One merge call.
pub struct GraphMerger<'a> {
    target: &'a mut Graph,
    source: &'a Graph,
    options: MergeOptions,
    progress: ProgressCounter,
    map: IdentityMap,
    ledger: ConflictLedger,
    changes: ChangeSet,
    fixups: Vec<PrimitiveRef>,
    deletions: Vec<DeletionCandidate>,
    stats: MergeStats,
    source_referrers: Option<ReferrerIndex>,
}

impl<'a> GraphMerger<'a> {
    /// Prepare a merge of `source` into `target`.
    #[must_use]
    pub fn new(target: &'a mut Graph, source: &'a Graph, options: MergeOptions) -> Self {
        Self {
            target,
            source,
            options,
            progress: ProgressCounter::new(),
            map: IdentityMap::new(),
            ledger: ConflictLedger::new(),
            changes: ChangeSet::new(),
            fixups: Vec::new(),
            deletions: Vec::new(),
            stats: MergeStats::default(),
            source_referrers: None,
        }
    }

    /// Report progress through `counter` instead of a private one.
    #[must_use]
    pub fn with_progress(mut self, counter: ProgressCounter) -> Self {
        self.progress = counter;
        self
    }

    /// Run all phases.
    ///
    /// # Errors
    /// - [`MergeError::InvalidGraph`] if either input is not referentially
    ///   closed; nothing has been touched yet.
    /// - [`MergeError::DataIntegrity`] on a fatal inconsistency. Kinds
    ///   processed before the failure are fully merged, later ones are
    ///   untouched; the caller should discard the target.
    #[instrument(
        name = "merge",
        skip_all,
        fields(source_len = self.source.len(), target_len = self.target.len())
    )]
    pub fn run(mut self) -> Result<MergeOutcome, MergeError> {
        self.source
            .validate()
            .map_err(|source| MergeError::InvalidGraph {
                side: GraphSide::Source,
                source,
            })?;
        self.target
            .validate()
            .map_err(|source| MergeError::InvalidGraph {
                side: GraphSide::Target,
                source,
            })?;

        self.progress.announce(self.source.len());

        if self.options.merge_bounds {
            for bounds in self.source.bounds() {
                self.target.add_bounds(*bounds);
            }
        }

        for kind in PrimitiveKind::ALL {
            self.merge_kind(kind)?;
        }

        self.stats.fixed_up = fix_references(
            self.target,
            self.source,
            &self.map,
            &self.fixups,
            &mut self.ledger,
            &mut self.changes,
        )?;

        let report = cascade_deletions(
            self.target,
            self.source,
            &self.deletions,
            &mut self.ledger,
            &mut self.changes,
        )?;
        self.stats.deleted = report.deleted;
        self.stats.forced_deletions = report.forced;

        tracing::info!(
            added = self.changes.added().len(),
            modified = self.changes.modified().len(),
            deleted = self.changes.deleted().len(),
            conflicts = self.ledger.len(),
            "merge complete"
        );

        Ok(MergeOutcome {
            changes: self.changes,
            conflicts: self.ledger,
            identity_map: self.map,
            stats: self.stats,
        })
    }

    // -----------------------------------------------------------------------
    // Primary pass
    // -----------------------------------------------------------------------

    #[instrument(skip(self))]
    fn merge_kind(&mut self, kind: PrimitiveKind) -> Result<(), IntegrityError> {
        let adopt = self.options.adopt_local_matches;
        let candidates =
            IdentityResolver::new(&*self.target, self.source, adopt).local_candidates(kind);

        for s in self.source.refs_of_kind(kind) {
            let resolution = IdentityResolver::new(&*self.target, self.source, adopt)
                .resolve(s, &self.map, &candidates);
            match resolution {
                Resolution::Skip => {}
                Resolution::Clone => self.clone_into_target(s)?,
                Resolution::Semantic(t) => self.take_technical(s, t),
                Resolution::Adopt(t) => self.adopt(s, t)?,
                Resolution::Identity(t) => self.reconcile(s, t)?,
            }
            self.stats.processed += 1;
            self.progress.advance();
        }
        Ok(())
    }

    fn clone_into_target(&mut self, s: PrimitiveRef) -> Result<(), IntegrityError> {
        let Some(sp) = self.source.get(s) else {
            return Ok(());
        };
        let t = self.target.add(sp.detached())?;
        tracing::debug!(source = %sp.label(), "cloned into target");
        self.map.insert(s, t);
        self.changes.mark_added(t);
        self.schedule_fixup(s);
        self.stats.cloned += 1;
        Ok(())
    }

    fn take_technical(&mut self, s: PrimitiveRef, t: PrimitiveRef) {
        self.map.insert(s, t);
        self.stats.matched += 1;
        let (Some(sp), Some(tp)) = (self.source.get(s), self.target.get_mut(t)) else {
            return;
        };
        if tp.copy_technical_from(sp) {
            self.changes.mark_modified(t);
        }
        self.schedule_fixup(s);
    }

    fn adopt(&mut self, s: PrimitiveRef, t: PrimitiveRef) -> Result<(), IntegrityError> {
        let Some(sp) = self.source.get(s) else {
            return Ok(());
        };
        let Some(id) = sp.identity().id() else {
            return Ok(());
        };
        self.target.assign_identity(t, id)?;
        if let Some(tp) = self.target.get_mut(t) {
            tp.merge_from(sp);
        }
        tracing::debug!(source = %sp.label(), "local primitive adopted upstream identity");
        self.map.insert(s, t);
        self.changes.mark_modified(t);
        self.schedule_fixup(s);
        self.stats.adopted += 1;
        Ok(())
    }

    fn reconcile(&mut self, s: PrimitiveRef, t: PrimitiveRef) -> Result<(), IntegrityError> {
        self.map.insert(s, t);
        let (Some(sp), Some(tp)) = (self.source.get(s), self.target.get(t)) else {
            return Ok(());
        };
        let label = sp.label();
        let facts = Facts::gather(&*self.target, t, self.source, s)
            .ok_or_else(|| IntegrityError::MissingCounterpart(label.clone()))?;
        let decision = decide(&facts);
        tracing::debug!(primitive = %label, ?decision, "reconciled");

        match decision {
            Decision::KeepTarget | Decision::Nothing => self.stats.kept += 1,
            Decision::ScheduleDeletion => {
                self.deletions.push(DeletionCandidate {
                    target: t,
                    source: s,
                });
            }
            Decision::MergeUnmodified => {
                if facts.same_version && tp.visible != sp.visible {
                    return Err(IntegrityError::VisibilityMismatch {
                        kind: s.kind(),
                        identity: sp.identity(),
                        version: sp.version,
                    });
                }
                self.merge_into(s, t);
            }
            Decision::Merge => self.merge_into(s, t),
            Decision::ClearModified => {
                // Confirmed edits leave an unmodified primitive, which must
                // mirror the source at this version.
                if let Some(tp) = self.target.get_mut(t) {
                    tp.modified = false;
                }
                self.changes.mark_modified(t);
                if facts.source_deleted {
                    self.deletions.push(DeletionCandidate {
                        target: t,
                        source: s,
                    });
                } else {
                    self.merge_into(s, t);
                }
            }
            Decision::CheckUpstreamReferrers => {
                if self.referrer_missing_from_target(s) {
                    self.record_conflict(
                        t,
                        s,
                        true,
                        ConflictReason::ReferencedUpstreamDeletedLocally,
                    );
                    if let Some(tp) = self.target.get_mut(t) {
                        tp.deleted = false;
                    }
                    self.changes.mark_modified(t);
                } else {
                    self.stats.kept += 1;
                }
            }
            Decision::Conflict(reason) => self.record_conflict(t, s, false, reason),
        }
        Ok(())
    }

    fn merge_into(&mut self, s: PrimitiveRef, t: PrimitiveRef) {
        let (Some(sp), Some(tp)) = (self.source.get(s), self.target.get_mut(t)) else {
            return;
        };
        if tp.merge_from(sp) {
            self.changes.mark_modified(t);
        }
        self.schedule_fixup(s);
        self.stats.merged += 1;
    }

    fn record_conflict(
        &mut self,
        t: PrimitiveRef,
        s: PrimitiveRef,
        from_theirs: bool,
        reason: ConflictReason,
    ) {
        let (Some(mine), Some(theirs)) = (self.target.get(t), self.source.get(s)) else {
            return;
        };
        self.ledger.record(Conflict {
            target: t,
            source: s,
            mine: mine.clone(),
            theirs: theirs.clone(),
            from_theirs,
            reason,
        });
    }

    /// Whether some source primitive referencing `s` is unknown to the
    /// target. Unassigned source referrers never have a counterpart by
    /// identity and count as unknown.
    fn referrer_missing_from_target(&mut self, s: PrimitiveRef) -> bool {
        let source = self.source;
        let index = self
            .source_referrers
            .get_or_insert_with(|| ReferrerIndex::build(source));
        let target = &*self.target;
        index.referrers_of(s).any(|r| {
            source
                .get(r)
                .is_none_or(|p| target.lookup(r.kind(), p.identity()).is_none())
        })
    }

    fn schedule_fixup(&mut self, s: PrimitiveRef) {
        if s.kind() != PrimitiveKind::Point {
            self.fixups.push(s);
        }
    }
}
