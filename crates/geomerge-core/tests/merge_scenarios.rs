//! End-to-end merge scenarios against the public API.

use geomerge_core::error::{IntegrityError, MergeError};
use geomerge_core::merge::{ConflictReason, MergeOptions, MergeOutcome, merge_graphs};
use geomerge_core::model::{Graph, Identity, LatLon, Member, Primitive, PrimitiveKind, PrimitiveRef};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(lat: f64, lon: f64) -> Option<LatLon> {
    Some(LatLon::new(lat, lon))
}

fn point(id: u64, version: u64) -> Primitive {
    Primitive::point(Identity::Assigned(id), at(1.0, 1.0)).with_version(version)
}

fn path(id: u64, version: u64, points: Vec<PrimitiveRef>) -> Primitive {
    Primitive::path(Identity::Assigned(id), points).with_version(version)
}

fn group(id: u64, version: u64, members: Vec<Member>) -> Primitive {
    Primitive::group(Identity::Assigned(id), members).with_version(version)
}

fn merge(target: &mut Graph, source: &Graph) -> MergeOutcome {
    merge_graphs(target, source, &MergeOptions::default()).expect("merge should succeed")
}

fn handles(set: &std::collections::BTreeSet<PrimitiveRef>) -> Vec<PrimitiveRef> {
    set.iter().copied().collect()
}

// ---------------------------------------------------------------------------
// Concrete scenarios
// ---------------------------------------------------------------------------

#[test]
fn upstream_tag_change_is_taken_over() {
    let mut target = Graph::new();
    let p1 = target.add(point(1, 1)).unwrap();
    let mut source = Graph::new();
    source.add(point(1, 1).with_tag("amenity", "cafe")).unwrap();

    let outcome = merge(&mut target, &source);

    let merged = target.get(p1).unwrap();
    assert_eq!(merged.tags.get("amenity").map(String::as_str), Some("cafe"));
    assert_eq!(handles(outcome.changes.modified()), vec![p1]);
    assert!(outcome.changes.added().is_empty());
    assert!(outcome.changes.deleted().is_empty());
    assert!(outcome.is_clean());
}

#[test]
fn local_point_takes_over_upstream_identity() {
    let mut target = Graph::new();
    let n1 = target
        .add(Primitive::point(Identity::Unassigned, at(2.0, 3.0)))
        .unwrap();
    assert!(target.get(n1).unwrap().modified);
    let w1 = target.add(path(1, 1, vec![n1])).unwrap();

    let mut source = Graph::new();
    let sn = source
        .add(Primitive::point(Identity::Assigned(5), at(2.0, 3.0)).with_version(1))
        .unwrap();
    source.add(path(1, 1, vec![sn])).unwrap();

    let outcome = merge(&mut target, &source);

    assert_eq!(outcome.identity_map.target_of(sn), Some(n1));
    assert_eq!(target.get(w1).unwrap().points(), &[n1]);
    assert_eq!(target.get(n1).unwrap().identity(), Identity::Assigned(5));
    assert_eq!(target.find(PrimitiveKind::Point, 5), Some(n1));
    assert!(outcome.changes.added().is_empty());
    assert!(outcome.is_clean());
}

#[test]
fn upstream_deletion_of_unreferenced_group() {
    let mut target = Graph::new();
    let r1 = target.add(group(1, 2, vec![])).unwrap();
    let mut source = Graph::new();
    source.add(group(1, 2, vec![]).with_deleted(true)).unwrap();

    let outcome = merge(&mut target, &source);

    assert!(target.get(r1).unwrap().deleted);
    assert_eq!(handles(outcome.changes.deleted()), vec![r1]);
    assert!(outcome.changes.modified().is_empty());
    assert!(outcome.is_clean());
}

#[test]
fn upstream_deletion_of_referenced_group_is_a_conflict() {
    let mut target = Graph::new();
    let r1 = target.add(group(1, 2, vec![])).unwrap();
    let parent = target
        .add(Primitive::group(
            Identity::Unassigned,
            vec![Member::new("subarea", r1)],
        ))
        .unwrap();
    let mut source = Graph::new();
    let s1 = source.add(group(1, 2, vec![]).with_deleted(true)).unwrap();

    let outcome = merge(&mut target, &source);

    assert!(!target.get(r1).unwrap().deleted);
    assert_eq!(target.get(parent).unwrap().members(), &[Member::new("subarea", r1)]);
    assert_eq!(outcome.conflicts.len(), 1);
    let conflict = outcome.conflicts.iter().next().unwrap();
    assert_eq!(conflict.target, r1);
    assert_eq!(conflict.source, s1);
    assert_eq!(conflict.reason, ConflictReason::StillReferenced);
    assert!(outcome.changes.is_empty());
}

#[test]
fn same_version_visibility_mismatch_is_fatal() {
    let mut target = Graph::new();
    let p = target.add(point(1, 3)).unwrap();
    let before = target.get(p).unwrap().clone();
    let mut source = Graph::new();
    source
        .add(point(1, 3).with_visible(false).with_tag("changed", "yes"))
        .unwrap();

    let err = merge_graphs(&mut target, &source, &MergeOptions::default()).unwrap_err();

    assert!(matches!(
        err,
        MergeError::DataIntegrity(IntegrityError::VisibilityMismatch {
            kind: PrimitiveKind::Point,
            identity: Identity::Assigned(1),
            version: 3,
        })
    ));
    assert!(!err.is_contract_violation());
    assert_eq!(target.get(p).unwrap(), &before);
}

// ---------------------------------------------------------------------------
// Properties on hand-built graphs
// ---------------------------------------------------------------------------

#[test]
fn newer_target_is_left_byte_for_byte_unchanged() {
    let mut target = Graph::new();
    let n = target
        .add(point(1, 5).with_tag("name", "local").with_modified(true))
        .unwrap();
    target.add(path(2, 7, vec![n])).unwrap();
    let digest = target.digest();

    let mut source = Graph::new();
    let sn = source.add(point(1, 4).with_tag("name", "upstream")).unwrap();
    source.add(path(2, 6, vec![sn, sn]).with_deleted(true)).unwrap();

    let outcome = merge(&mut target, &source);

    assert_eq!(target.digest(), digest);
    assert!(outcome.changes.is_empty());
    assert!(outcome.is_clean());
    assert_eq!(outcome.stats.kept, 2);
}

#[test]
fn each_conflicting_pair_is_recorded_once() {
    let mut target = Graph::new();
    let divergent = target
        .add(point(1, 2).with_tag("name", "mine").with_modified(true))
        .unwrap();
    let mismatch = target
        .add(point(2, 1).with_tag("name", "x").with_modified(true))
        .unwrap();
    let deleted_here = target
        .add(point(3, 4).with_deleted(true).with_modified(true))
        .unwrap();
    let untouched = target.add(point(4, 1)).unwrap();

    let mut source = Graph::new();
    let s_divergent = source.add(point(1, 2).with_tag("name", "theirs")).unwrap();
    let s_mismatch = source
        .add(point(2, 2).with_tag("name", "x").with_deleted(true))
        .unwrap();
    let s_deleted_here = source
        .add(point(3, 4).with_tag("fixme", "yes").with_modified(true))
        .unwrap();
    source.add(point(4, 1)).unwrap();

    let outcome = merge(&mut target, &source);

    let pairs: Vec<_> = outcome
        .conflicts
        .iter()
        .map(|c| (c.target, c.source, c.reason))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (divergent, s_divergent, ConflictReason::DivergentEdits),
            (mismatch, s_mismatch, ConflictReason::DeletionMismatch),
            (
                deleted_here,
                s_deleted_here,
                ConflictReason::ModifiedUpstreamDeletedLocally
            ),
        ]
    );
    assert!(!outcome.conflicts.has_conflict_for_target(untouched));
    // Conflicting targets are left as they were.
    assert_eq!(
        target.get(divergent).unwrap().tags.get("name").map(String::as_str),
        Some("mine")
    );
    assert!(target.get(deleted_here).unwrap().deleted);
}

#[test]
fn confirmed_local_edit_takes_upstream_state() {
    let mut target = Graph::new();
    let n = target
        .add(
            Primitive::point(Identity::Assigned(1), at(9.0, 9.0))
                .with_version(3)
                .with_tag("shop", "bakery")
                .with_modified(true),
        )
        .unwrap();
    let mut source = Graph::new();
    source
        .add(
            Primitive::point(Identity::Assigned(1), at(1.0, 1.0))
                .with_version(3)
                .with_tag("shop", "bakery")
                .with_user("surveyor"),
        )
        .unwrap();

    let first = merge(&mut target, &source);
    let merged = target.get(n).unwrap();
    assert!(!merged.modified);
    assert_eq!(merged.coord(), at(1.0, 1.0));
    assert_eq!(merged.user.as_deref(), Some("surveyor"));
    assert_eq!(handles(first.changes.modified()), vec![n]);

    let second = merge(&mut target, &source);
    assert!(second.changes.is_empty());
}

#[test]
fn new_path_is_cloned_with_its_points() {
    let mut target = Graph::new();
    let mut source = Graph::new();
    let a = source.add(point(10, 1)).unwrap();
    let b = source
        .add(Primitive::point(Identity::Unassigned, at(5.0, 5.0)))
        .unwrap();
    let w = source
        .add(path(20, 1, vec![a, b, a]).with_tag("highway", "service"))
        .unwrap();

    let outcome = merge(&mut target, &source);

    assert_eq!(outcome.changes.added().len(), 3);
    let ta = outcome.identity_map.target_of(a).unwrap();
    let tb = outcome.identity_map.target_of(b).unwrap();
    let tw = outcome.identity_map.target_of(w).unwrap();
    assert_eq!(target.get(tw).unwrap().points(), &[ta, tb, ta]);
    assert!(target.get(tb).unwrap().is_new());
    assert!(target.validate().is_ok());
    // Added primitives are not also reported as modified by the fix-up.
    assert!(outcome.changes.modified().is_empty());
}

#[test]
fn unassigned_source_matches_equal_local_primitive() {
    let mut target = Graph::new();
    let local = target
        .add(Primitive::point(Identity::Unassigned, at(0.0, 0.0)).with_tag("k", "v"))
        .unwrap();
    let mut source = Graph::new();
    let s = source
        .add(Primitive::point(Identity::Unassigned, at(3.0, 3.0)).with_tag("k", "v"))
        .unwrap();

    let outcome = merge(&mut target, &source);

    assert_eq!(outcome.identity_map.target_of(s), Some(local));
    assert!(outcome.changes.is_empty());
    assert_eq!(target.len(), 1);
    // Only technical attributes are taken over.
    assert_eq!(target.get(local).unwrap().coord(), at(0.0, 0.0));
}

#[test]
fn upstream_deletion_cascades_through_path_and_points() {
    let mut target = Graph::new();
    let a = target.add(point(1, 2)).unwrap();
    let b = target.add(point(2, 2)).unwrap();
    let w = target.add(path(3, 2, vec![a, b])).unwrap();

    let mut source = Graph::new();
    let sa = source.add(point(1, 2).with_deleted(true)).unwrap();
    let sb = source.add(point(2, 2).with_deleted(true)).unwrap();
    source
        .add(path(3, 2, vec![sa, sb]).with_deleted(true))
        .unwrap();

    let outcome = merge(&mut target, &source);

    assert_eq!(handles(outcome.changes.deleted()), vec![a, b, w]);
    assert!(outcome.is_clean());
    assert!(target.get(w).unwrap().points().is_empty());
    for (_, p) in target.iter() {
        assert!(p.deleted);
    }
}

#[test]
fn merged_reference_revives_locally_deleted_point() {
    let mut target = Graph::new();
    let a = target.add(point(1, 1)).unwrap();
    let b = target
        .add(point(2, 1).with_deleted(true).with_modified(true))
        .unwrap();
    let w = target.add(path(3, 1, vec![a])).unwrap();

    let mut source = Graph::new();
    let sa = source.add(point(1, 1)).unwrap();
    let sb = source.add(point(2, 1)).unwrap();
    source.add(path(3, 2, vec![sa, sb])).unwrap();

    let outcome = merge(&mut target, &source);

    assert_eq!(target.get(w).unwrap().points(), &[a, b]);
    assert!(!target.get(b).unwrap().deleted);
    let conflict = outcome.conflicts.for_target(b).unwrap();
    assert!(conflict.from_theirs);
    assert!(conflict.mine.deleted);
    assert!(outcome.changes.modified().contains(&b));
    assert!(outcome.changes.modified().contains(&w));
}

#[test]
fn reference_to_skipped_primitive_is_fatal() {
    let mut source = Graph::new();
    let gone = source
        .add(Primitive::point(Identity::Unassigned, None).with_deleted(true))
        .unwrap();
    source.add(path(1, 1, vec![gone])).unwrap();
    let mut target = Graph::new();

    let err = merge_graphs(&mut target, &source, &MergeOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        MergeError::DataIntegrity(IntegrityError::UnmappedReference {
            to_kind: PrimitiveKind::Point,
            to_identity: Identity::Unassigned,
            ..
        })
    ));
}

#[test]
fn adoption_can_be_turned_off() {
    let mut target = Graph::new();
    let local = target
        .add(Primitive::point(Identity::Unassigned, at(2.0, 3.0)))
        .unwrap();
    let mut source = Graph::new();
    source
        .add(Primitive::point(Identity::Assigned(5), at(2.0, 3.0)).with_version(1))
        .unwrap();

    let options = MergeOptions {
        adopt_local_matches: false,
        ..MergeOptions::default()
    };
    let outcome = merge_graphs(&mut target, &source, &options).unwrap();

    assert!(target.get(local).unwrap().is_new());
    assert_eq!(outcome.changes.added().len(), 1);
    assert_eq!(target.count(PrimitiveKind::Point), 2);
}

#[test]
fn merging_twice_changes_nothing_the_second_time() {
    let mut target = Graph::new();
    let a = target.add(point(1, 1)).unwrap();
    target.add(path(2, 1, vec![a])).unwrap();
    target
        .add(Primitive::point(Identity::Unassigned, at(4.0, 4.0)).with_tag("k", "v"))
        .unwrap();

    let mut source = Graph::new();
    let sa = source.add(point(1, 2).with_tag("k", "v")).unwrap();
    let sn = source
        .add(Primitive::point(Identity::Unassigned, at(6.0, 6.0)))
        .unwrap();
    let sw = source.add(path(2, 2, vec![sa, sn])).unwrap();
    source
        .add(group(7, 1, vec![Member::new("outer", sw), Member::new("label", sa)]))
        .unwrap();

    let first = merge(&mut target, &source);
    assert!(!first.changes.is_empty());
    let digest = target.digest();

    let second = merge(&mut target, &source);
    assert!(second.changes.is_empty(), "{:?}", second.changes);
    assert!(second.is_clean());
    assert_eq!(target.digest(), digest);
}

#[test]
fn deleted_upstream_path_is_stable_across_merges() {
    // Upstream still lists the points of its deleted path.
    let mut source = Graph::new();
    let sn = source.add(point(1, 1)).unwrap();
    source
        .add(path(7, 2, vec![sn]).with_deleted(true).with_modified(true))
        .unwrap();

    // Path unknown to the target: cloned as deleted.
    let mut absent = Graph::new();
    absent.add(point(1, 1)).unwrap();
    let first = merge(&mut absent, &source);
    assert_eq!(first.changes.added().len(), 1);
    assert!(first.is_clean());
    let w = absent.find(PrimitiveKind::Path, 7).unwrap();
    assert!(absent.get(w).unwrap().deleted);
    assert!(absent.get(w).unwrap().points().is_empty());
    let digest = absent.digest();

    let second = merge(&mut absent, &source);
    assert!(second.changes.is_empty(), "{:?}", second.changes);
    assert!(second.conflicts.is_empty());
    assert_eq!(absent.digest(), digest);

    // Unmodified local copy: deleted by the cascade.
    let mut present = Graph::new();
    let n = present.add(point(1, 1)).unwrap();
    let w = present.add(path(7, 1, vec![n])).unwrap();
    let first = merge(&mut present, &source);
    assert_eq!(handles(first.changes.deleted()), vec![w]);
    assert!(first.is_clean());
    assert!(present.get(w).unwrap().points().is_empty());
    let digest = present.digest();

    let second = merge(&mut present, &source);
    assert!(second.changes.is_empty(), "{:?}", second.changes);
    assert!(second.conflicts.is_empty());
    assert_eq!(present.digest(), digest);
}
