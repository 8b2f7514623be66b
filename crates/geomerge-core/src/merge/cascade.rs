//! Cascading deletion (phase c).
//!
//! Candidates come from the primary pass: target primitives the source
//! deleted while the target had no local edits. Each round looks at the live
//! (non-deleted) referrers of every pending candidate:
//!
//! - none left → delete it;
//! - some referrer that is not itself pending → record a
//!   [`ConflictReason::StillReferenced`] conflict and drop the candidate;
//! - every live referrer is pending → wait for a later round.
//!
//! Rounds repeat until nothing changes. What is left can only be candidates
//! that reference each other; those are deleted together.

use std::collections::HashSet;

use crate::error::IntegrityError;
use crate::model::{Graph, PrimitiveRef, ReferrerIndex};

use super::changeset::ChangeSet;
use super::conflict::{Conflict, ConflictLedger, ConflictReason};
use super::types::DeletionCandidate;

/// Counts from one cascade run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Candidates deleted, forced ones included.
    pub deleted: usize,
    /// Candidates deleted while still referenced by other candidates.
    pub forced: usize,
    /// Candidates dropped because a live primitive still references them.
    pub blocked: usize,
}

/// Run the cascade over `candidates`.
///
/// # Errors
/// [`IntegrityError::OrphanedDeletion`] if a deleted candidate still has a
/// live referrer once the cascade is done.
pub fn cascade_deletions(
    target: &mut Graph,
    source: &Graph,
    candidates: &[DeletionCandidate],
    ledger: &mut ConflictLedger,
    changes: &mut ChangeSet,
) -> Result<CascadeReport, IntegrityError> {
    let mut report = CascadeReport::default();
    if candidates.is_empty() {
        return Ok(report);
    }

    let mut index = ReferrerIndex::build(target);
    let mut pending: Vec<DeletionCandidate> = candidates.to_vec();
    let mut deleted: Vec<PrimitiveRef> = Vec::new();

    loop {
        let mut progressed = false;
        let waiting: HashSet<PrimitiveRef> = pending.iter().map(|c| c.target).collect();
        let mut next = Vec::with_capacity(pending.len());

        for candidate in pending {
            let live: Vec<PrimitiveRef> = index
                .referrers_of(candidate.target)
                .filter(|r| target.get(*r).is_some_and(|p| !p.deleted))
                .collect();

            if live.is_empty() {
                delete(target, source, &mut index, candidate, changes);
                deleted.push(candidate.target);
                report.deleted += 1;
                progressed = true;
            } else if live.iter().any(|r| !waiting.contains(r)) {
                block(target, source, candidate, ledger);
                report.blocked += 1;
                progressed = true;
            } else {
                next.push(candidate);
            }
        }

        pending = next;
        if !progressed || pending.is_empty() {
            break;
        }
    }

    for candidate in pending {
        tracing::debug!(
            primitive = %candidate.target,
            "forcing deletion of cross-referenced candidate"
        );
        delete(target, source, &mut index, candidate, changes);
        deleted.push(candidate.target);
        report.deleted += 1;
        report.forced += 1;
    }

    for handle in deleted {
        if let Some(referrer) = index
            .referrers_of(handle)
            .find(|r| target.get(*r).is_some_and(|p| !p.deleted))
        {
            return Err(IntegrityError::OrphanedDeletion {
                deleted: label(target, handle),
                referrer: label(target, referrer),
            });
        }
    }

    Ok(report)
}

/// Take over the deleted source revision, drop outgoing references and mark
/// the target deleted. Records the change only if something moved.
fn delete(
    target: &mut Graph,
    source: &Graph,
    index: &mut ReferrerIndex,
    candidate: DeletionCandidate,
    changes: &mut ChangeSet,
) {
    let Some(p) = target.get_mut(candidate.target) else {
        return;
    };
    let mut changed = match source.get(candidate.source) {
        Some(s) => p.merge_from(s),
        None => false,
    };
    let old = p.body.references();
    if !old.is_empty() {
        p.body.clear_references();
        index.detach(candidate.target, &old);
        changed = true;
    }
    if !p.deleted {
        p.deleted = true;
        changed = true;
    }
    if changed {
        changes.mark_deleted(candidate.target);
    }
}

fn block(
    target: &Graph,
    source: &Graph,
    candidate: DeletionCandidate,
    ledger: &mut ConflictLedger,
) {
    let (Some(mine), Some(theirs)) = (target.get(candidate.target), source.get(candidate.source))
    else {
        return;
    };
    ledger.record(Conflict {
        target: candidate.target,
        source: candidate.source,
        mine: mine.clone(),
        theirs: theirs.clone(),
        from_theirs: false,
        reason: ConflictReason::StillReferenced,
    });
}

fn label(graph: &Graph, handle: PrimitiveRef) -> String {
    graph
        .get(handle)
        .map_or_else(|| handle.to_string(), |p| p.label())
}
