//! Reference fix-up (phase b).
//!
//! Paths and groups merged or cloned by the primary pass still carry their
//! old target references (or none, for fresh clones). Their reference lists
//! are rebuilt from the source through the identity map. Every source
//! reference must be mapped by now: points precede paths, and paths precede
//! groups, in the primary pass.
//!
//! Deleted primitives carry no references, so the counterpart of a deleted
//! source primitive has its reference list cleared instead.
//!
//! A rebuilt reference that lands on a locally deleted target primitive
//! brings it back, unless the referring primitive is itself deleted or a
//! conflict is already recorded for the child.

use crate::error::IntegrityError;
use crate::model::{Body, Graph, Identity, Member, PrimitiveKind, PrimitiveRef};

use super::changeset::ChangeSet;
use super::conflict::{Conflict, ConflictLedger, ConflictReason};
use super::identity::IdentityMap;

/// Rebuild the references of every pending source primitive's counterpart.
///
/// `pending` holds source handles in primary-pass order. Returns the number
/// of target primitives whose reference list actually changed.
///
/// # Errors
/// [`IntegrityError::UnmappedReference`] if a source reference was never
/// mapped, [`IntegrityError::MissingCounterpart`] if a pending primitive has
/// no target counterpart.
pub fn fix_references(
    target: &mut Graph,
    source: &Graph,
    map: &IdentityMap,
    pending: &[PrimitiveRef],
    ledger: &mut ConflictLedger,
    changes: &mut ChangeSet,
) -> Result<usize, IntegrityError> {
    let mut rebuilt = 0;
    for &s in pending {
        let Some(sp) = source.get(s) else {
            continue;
        };
        if sp.incomplete || s.kind() == PrimitiveKind::Point {
            continue;
        }
        let t = map
            .target_of(s)
            .ok_or_else(|| IntegrityError::MissingCounterpart(sp.label()))?;

        let body = if sp.deleted {
            sp.body.detached()
        } else {
            map_body(source, s, &sp.body, map)?
        };
        let children: Vec<(PrimitiveRef, PrimitiveRef)> =
            sp.body.references().into_iter().zip(body.references()).collect();

        let parent = target
            .get_mut(t)
            .ok_or_else(|| IntegrityError::MissingCounterpart(sp.label()))?;
        if parent.body != body {
            parent.body = body;
            changes.mark_modified(t);
            rebuilt += 1;
        }
        if parent.deleted {
            continue;
        }

        for (source_child, target_child) in children {
            revive_if_deleted(target, source, target_child, source_child, ledger, changes);
        }
    }
    Ok(rebuilt)
}

/// Translate a source body into target handle space.
fn map_body(
    source: &Graph,
    from: PrimitiveRef,
    body: &Body,
    map: &IdentityMap,
) -> Result<Body, IntegrityError> {
    let lookup = |r: PrimitiveRef| {
        map.target_of(r).ok_or_else(|| IntegrityError::UnmappedReference {
            from: source.get(from).map(|p| p.label()).unwrap_or_default(),
            to_kind: r.kind(),
            to_identity: source
                .get(r)
                .map_or(Identity::Unassigned, |p| p.identity()),
        })
    };

    Ok(match body {
        Body::Point { coord } => Body::Point { coord: *coord },
        Body::Path { points } => Body::Path {
            points: points.iter().map(|&r| lookup(r)).collect::<Result<_, _>>()?,
        },
        Body::Group { members } => Body::Group {
            members: members
                .iter()
                .map(|m| Ok(Member::new(m.role.clone(), lookup(m.target)?)))
                .collect::<Result<_, IntegrityError>>()?,
        },
    })
}

fn revive_if_deleted(
    target: &mut Graph,
    source: &Graph,
    child: PrimitiveRef,
    source_child: PrimitiveRef,
    ledger: &mut ConflictLedger,
    changes: &mut ChangeSet,
) {
    let Some(mine) = target.get(child) else {
        return;
    };
    if !mine.deleted || ledger.has_conflict_for_target(child) {
        return;
    }
    let Some(theirs) = source.get(source_child) else {
        return;
    };
    ledger.record(Conflict {
        target: child,
        source: source_child,
        mine: mine.clone(),
        theirs: theirs.clone(),
        from_theirs: true,
        reason: ConflictReason::RequiredByMergedReference,
    });
    if let Some(p) = target.get_mut(child) {
        p.deleted = false;
    }
    changes.mark_modified(child);
}
