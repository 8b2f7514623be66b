//! Identity resolution and semantic equality.
//!
//! Given a source primitive, find its counterpart in the target graph:
//!
//! 1. **Assigned identity** → look up `(kind, id)` in the target. Found means
//!    the reconciliation table decides what happens.
//! 2. **Unassigned identity** → skip deleted ones; otherwise take the first
//!    unassigned, undeleted, unclaimed target primitive of the same kind that
//!    is semantically equal, in target arena order.
//! 3. **Adoption** → an assigned source primitive without an identity match
//!    may be matched against local target primitives the same way as (2); the
//!    target then takes over the source identity. Points additionally need a
//!    coordinate on both sides, and the coordinates must be equal.
//! 4. Otherwise the source primitive is cloned.
//!
//! Resolution is a pure function of the source primitive, the target graph
//! and the identity map built so far.

use std::collections::{HashMap, HashSet};

use crate::model::{Body, Graph, Primitive, PrimitiveKind, PrimitiveRef};

// ---------------------------------------------------------------------------
// IdentityMap
// ---------------------------------------------------------------------------

/// Source handle → target handle, built during the primary pass and read-only
/// afterwards.
#[derive(Clone, Debug, Default)]
pub struct IdentityMap {
    forward: HashMap<PrimitiveRef, PrimitiveRef>,
    claimed: HashSet<PrimitiveRef>,
}

impl IdentityMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, source: PrimitiveRef, target: PrimitiveRef) {
        self.forward.insert(source, target);
        self.claimed.insert(target);
    }

    /// Target counterpart of a source handle.
    #[must_use]
    pub fn target_of(&self, source: PrimitiveRef) -> Option<PrimitiveRef> {
        self.forward.get(&source).copied()
    }

    /// Returns `true` if some source primitive already maps onto `target`.
    #[must_use]
    pub fn is_claimed(&self, target: PrimitiveRef) -> bool {
        self.claimed.contains(&target)
    }

    /// Number of mapped source primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns `true` if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// All `(source, target)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveRef, PrimitiveRef)> + '_ {
        self.forward.iter().map(|(s, t)| (*s, *t))
    }
}

// ---------------------------------------------------------------------------
// Semantic equality
// ---------------------------------------------------------------------------

/// Compare two primitives, possibly from different graphs, by tags and by
/// ordered references.
///
/// A referenced pair where both sides carry an assigned identity matches by
/// identity; otherwise the referenced primitives are compared recursively.
/// Geometry, versions, flags and technical metadata are ignored, except that
/// a deleted primitive counts as having no references. Incomplete
/// primitives compare equal only when they share an assigned identity. Group
/// cycles are handled co-inductively: a pair already under comparison counts
/// as equal.
#[must_use]
pub fn semantically_equal(
    a_graph: &Graph,
    a: PrimitiveRef,
    b_graph: &Graph,
    b: PrimitiveRef,
) -> bool {
    SemanticComparison {
        a_graph,
        b_graph,
        in_progress: HashSet::new(),
    }
    .equal(a, b)
}

struct SemanticComparison<'a> {
    a_graph: &'a Graph,
    b_graph: &'a Graph,
    in_progress: HashSet<(PrimitiveRef, PrimitiveRef)>,
}

impl SemanticComparison<'_> {
    fn equal(&mut self, a: PrimitiveRef, b: PrimitiveRef) -> bool {
        if a.kind() != b.kind() {
            return false;
        }
        let (a_graph, b_graph) = (self.a_graph, self.b_graph);
        let (Some(pa), Some(pb)) = (a_graph.get(a), b_graph.get(b)) else {
            return false;
        };
        if pa.incomplete || pb.incomplete {
            return !pa.is_new() && pa.identity() == pb.identity();
        }
        if pa.tags != pb.tags {
            return false;
        }
        if !self.in_progress.insert((a, b)) {
            return true;
        }

        let result = match (&pa.body, &pb.body) {
            (Body::Point { .. }, Body::Point { .. }) => true,
            (Body::Path { points: x }, Body::Path { points: y }) => {
                let (x, y) = (live_refs(pa, x), live_refs(pb, y));
                x.len() == y.len() && x.iter().zip(y).all(|(x, y)| self.equal_ref(*x, *y))
            }
            (Body::Group { members: x }, Body::Group { members: y }) => {
                let (x, y) = (live_refs(pa, x), live_refs(pb, y));
                x.len() == y.len()
                    && x
                        .iter()
                        .zip(y)
                        .all(|(x, y)| x.role == y.role && self.equal_ref(x.target, y.target))
            }
            _ => false,
        };

        self.in_progress.remove(&(a, b));
        result
    }

    fn equal_ref(&mut self, a: PrimitiveRef, b: PrimitiveRef) -> bool {
        let (Some(pa), Some(pb)) = (self.a_graph.get(a), self.b_graph.get(b)) else {
            return false;
        };
        if !pa.is_new() && !pb.is_new() {
            return a.kind() == b.kind() && pa.identity() == pb.identity();
        }
        self.equal(a, b)
    }
}

/// Deleted primitives carry no references once merged, whatever the source
/// still lists.
fn live_refs<'a, T>(p: &Primitive, refs: &'a [T]) -> &'a [T] {
    if p.deleted { &[] } else { refs }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Outcome of resolving one source primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Locally created and locally deleted upstream: nothing to merge.
    Skip,
    /// No counterpart: clone into the target.
    Clone,
    /// Counterpart with the same assigned identity.
    Identity(PrimitiveRef),
    /// Unassigned counterpart matched by semantic equality.
    Semantic(PrimitiveRef),
    /// Unassigned counterpart that takes over the source's assigned identity.
    Adopt(PrimitiveRef),
}

/// Finds target counterparts for source primitives.
#[derive(Clone, Copy, Debug)]
pub struct IdentityResolver<'a> {
    target: &'a Graph,
    source: &'a Graph,
    adopt_local_matches: bool,
}

impl<'a> IdentityResolver<'a> {
    /// Create a resolver over a target/source pair.
    #[must_use]
    pub const fn new(target: &'a Graph, source: &'a Graph, adopt_local_matches: bool) -> Self {
        Self {
            target,
            source,
            adopt_local_matches,
        }
    }

    /// Unassigned, undeleted target primitives of one kind, in arena order.
    ///
    /// Computed once per kind pass and handed to [`IdentityResolver::resolve`].
    #[must_use]
    pub fn local_candidates(&self, kind: PrimitiveKind) -> Vec<PrimitiveRef> {
        self.target
            .iter()
            .filter(|(r, p)| r.kind() == kind && p.is_new() && !p.deleted)
            .map(|(r, _)| r)
            .collect()
    }

    /// Resolve one source primitive. Unknown handles resolve to
    /// [`Resolution::Skip`].
    #[must_use]
    pub fn resolve(
        &self,
        source: PrimitiveRef,
        map: &IdentityMap,
        candidates: &[PrimitiveRef],
    ) -> Resolution {
        let Some(s) = self.source.get(source) else {
            return Resolution::Skip;
        };

        if !s.is_new() {
            if let Some(t) = self.target.lookup(source.kind(), s.identity()) {
                return Resolution::Identity(t);
            }
            if self.adopt_local_matches
                && !s.deleted
                && !s.incomplete
                && let Some(t) = self.first_local_match(source, map, candidates, true)
            {
                return Resolution::Adopt(t);
            }
            return Resolution::Clone;
        }

        if s.deleted {
            return Resolution::Skip;
        }
        match self.first_local_match(source, map, candidates, false) {
            Some(t) => Resolution::Semantic(t),
            None => Resolution::Clone,
        }
    }

    fn first_local_match(
        &self,
        source: PrimitiveRef,
        map: &IdentityMap,
        candidates: &[PrimitiveRef],
        same_location: bool,
    ) -> Option<PrimitiveRef> {
        let s = self.source.get(source)?;
        candidates.iter().copied().find(|&t| {
            if map.is_claimed(t) {
                return false;
            }
            let Some(tp) = self.target.get(t) else {
                return false;
            };
            if same_location && source.kind() == PrimitiveKind::Point {
                match (s.coord(), tp.coord()) {
                    (Some(a), Some(b)) if a == b => {}
                    _ => return false,
                }
            }
            semantically_equal(self.source, source, self.target, t)
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Identity, LatLon, Member, Primitive};

    fn local_point(g: &mut Graph, tags: &[(&str, &str)]) -> PrimitiveRef {
        let mut p = Primitive::point(Identity::Unassigned, Some(LatLon::new(1.0, 1.0)));
        for (k, v) in tags {
            p = p.with_tag(*k, *v);
        }
        g.add(p).unwrap()
    }

    #[test]
    fn paths_compare_points_transitively() {
        let mut a = Graph::new();
        let a1 = local_point(&mut a, &[("k", "1")]);
        let a2 = local_point(&mut a, &[]);
        let pa = a.add(Primitive::path(Identity::Unassigned, vec![a1, a2])).unwrap();

        let mut b = Graph::new();
        let b2 = local_point(&mut b, &[]);
        let b1 = local_point(&mut b, &[("k", "1")]);
        let pb = b.add(Primitive::path(Identity::Unassigned, vec![b1, b2])).unwrap();
        let reversed = b.add(Primitive::path(Identity::Unassigned, vec![b2, b1])).unwrap();

        assert!(semantically_equal(&a, pa, &b, pb));
        assert!(!semantically_equal(&a, pa, &b, reversed));
    }

    #[test]
    fn geometry_and_flags_do_not_matter() {
        let mut a = Graph::new();
        let x = a
            .add(
                Primitive::point(Identity::Assigned(1), Some(LatLon::new(0.0, 0.0)))
                    .with_version(4)
                    .with_tag("a", "b"),
            )
            .unwrap();
        let mut b = Graph::new();
        let y = b
            .add(
                Primitive::point(Identity::Unassigned, Some(LatLon::new(9.0, 9.0)))
                    .with_deleted(true)
                    .with_tag("a", "b"),
            )
            .unwrap();
        assert!(semantically_equal(&a, x, &b, y));
    }

    #[test]
    fn assigned_references_match_by_identity() {
        let mut a = Graph::new();
        let n = a
            .add(Primitive::point(Identity::Assigned(4), None).with_tag("name", "old"))
            .unwrap();
        let w = a.add(Primitive::path(Identity::Unassigned, vec![n])).unwrap();

        let mut b = Graph::new();
        let same_id = b
            .add(Primitive::point(Identity::Assigned(4), None).with_tag("name", "new"))
            .unwrap();
        let other_id = b
            .add(Primitive::point(Identity::Assigned(5), None).with_tag("name", "old"))
            .unwrap();
        let w_same = b.add(Primitive::path(Identity::Unassigned, vec![same_id])).unwrap();
        let w_other = b.add(Primitive::path(Identity::Unassigned, vec![other_id])).unwrap();

        assert!(semantically_equal(&a, w, &b, w_same));
        assert!(!semantically_equal(&a, w, &b, w_other));
    }

    #[test]
    fn group_cycles_terminate() {
        let mut g = Graph::new();
        let r1 = g.add(Primitive::group(Identity::Unassigned, vec![])).unwrap();
        let r2 = g
            .add(Primitive::group(Identity::Unassigned, vec![Member::new("a", r1)]))
            .unwrap();
        if let Some(Body::Group { members }) = g.get_mut(r1).map(|p| &mut p.body) {
            members.push(Member::new("a", r2));
        }
        let copy = g.clone();
        assert!(semantically_equal(&g, r1, &copy, r1));
        assert!(semantically_equal(&g, r1, &copy, r2));
    }

    #[test]
    fn deleted_primitives_compare_without_references() {
        let mut a = Graph::new();
        let n = local_point(&mut a, &[]);
        let listed = a
            .add(
                Primitive::path(Identity::Assigned(7), vec![n, n])
                    .with_deleted(true)
                    .with_tag("highway", "path"),
            )
            .unwrap();
        let live = a
            .add(Primitive::path(Identity::Assigned(8), vec![n, n]).with_tag("highway", "path"))
            .unwrap();

        let mut b = Graph::new();
        let cleared = b
            .add(
                Primitive::path(Identity::Assigned(7), vec![])
                    .with_deleted(true)
                    .with_tag("highway", "path"),
            )
            .unwrap();

        assert!(semantically_equal(&a, listed, &b, cleared));
        assert!(semantically_equal(&b, cleared, &a, listed));
        assert!(!semantically_equal(&a, live, &b, cleared));
        assert!(!semantically_equal(&a, live, &a, listed));
    }

    #[test]
    fn group_roles_matter() {
        let mut g = Graph::new();
        let n = local_point(&mut g, &[]);
        let outer = g
            .add(Primitive::group(Identity::Unassigned, vec![Member::new("outer", n)]))
            .unwrap();
        let inner = g
            .add(Primitive::group(Identity::Unassigned, vec![Member::new("inner", n)]))
            .unwrap();
        assert!(!semantically_equal(&g, outer, &g, inner));
    }

    #[test]
    fn incomplete_compares_by_identity() {
        let mut a = Graph::new();
        let x = a.add(Primitive::incomplete(PrimitiveKind::Path, 3)).unwrap();
        let mut b = Graph::new();
        let y = b.add(Primitive::incomplete(PrimitiveKind::Path, 3)).unwrap();
        let z = b.add(Primitive::incomplete(PrimitiveKind::Path, 4)).unwrap();
        assert!(semantically_equal(&a, x, &b, y));
        assert!(!semantically_equal(&a, x, &b, z));
    }

    #[test]
    fn resolves_assigned_by_identity() {
        let mut target = Graph::new();
        let t = target
            .add(Primitive::point(Identity::Assigned(8), None).with_version(1))
            .unwrap();
        let mut source = Graph::new();
        let s = source
            .add(Primitive::point(Identity::Assigned(8), None).with_version(1))
            .unwrap();
        let missing = source
            .add(Primitive::point(Identity::Assigned(9), None).with_version(1))
            .unwrap();

        let resolver = IdentityResolver::new(&target, &source, true);
        let map = IdentityMap::new();
        assert_eq!(resolver.resolve(s, &map, &[]), Resolution::Identity(t));
        assert_eq!(resolver.resolve(missing, &map, &[]), Resolution::Clone);
    }

    #[test]
    fn unassigned_first_match_wins_and_claims() {
        let mut target = Graph::new();
        let t1 = local_point(&mut target, &[("shop", "bakery")]);
        let t2 = local_point(&mut target, &[("shop", "bakery")]);
        let mut source = Graph::new();
        let s1 = local_point(&mut source, &[("shop", "bakery")]);
        let s2 = local_point(&mut source, &[("shop", "bakery")]);
        let s3 = local_point(&mut source, &[("shop", "bakery")]);

        let resolver = IdentityResolver::new(&target, &source, true);
        let candidates = resolver.local_candidates(PrimitiveKind::Point);
        let mut map = IdentityMap::new();

        assert_eq!(resolver.resolve(s1, &map, &candidates), Resolution::Semantic(t1));
        map.insert(s1, t1);
        assert_eq!(resolver.resolve(s2, &map, &candidates), Resolution::Semantic(t2));
        map.insert(s2, t2);
        assert_eq!(resolver.resolve(s3, &map, &candidates), Resolution::Clone);
    }

    #[test]
    fn deleted_unassigned_source_is_skipped() {
        let target = Graph::new();
        let mut source = Graph::new();
        let s = source
            .add(Primitive::point(Identity::Unassigned, None).with_deleted(true))
            .unwrap();
        let resolver = IdentityResolver::new(&target, &source, true);
        assert_eq!(resolver.resolve(s, &IdentityMap::new(), &[]), Resolution::Skip);
    }

    #[test]
    fn deleted_targets_are_not_candidates() {
        let mut target = Graph::new();
        target
            .add(Primitive::point(Identity::Unassigned, None).with_deleted(true))
            .unwrap();
        let live = local_point(&mut target, &[]);
        target
            .add(Primitive::point(Identity::Assigned(1), None))
            .unwrap();
        let source = Graph::new();
        let resolver = IdentityResolver::new(&target, &source, true);
        assert_eq!(resolver.local_candidates(PrimitiveKind::Point), vec![live]);
    }

    #[test]
    fn adoption_requires_same_location_and_can_be_disabled() {
        let mut target = Graph::new();
        let far = target
            .add(Primitive::point(Identity::Unassigned, Some(LatLon::new(5.0, 5.0))))
            .unwrap();
        let near = local_point(&mut target, &[]);
        let mut source = Graph::new();
        let s = source
            .add(Primitive::point(Identity::Assigned(5), Some(LatLon::new(1.0, 1.0))).with_version(1))
            .unwrap();

        let candidates = vec![far, near];
        let map = IdentityMap::new();
        let adopting = IdentityResolver::new(&target, &source, true);
        assert_eq!(adopting.resolve(s, &map, &candidates), Resolution::Adopt(near));
        let strict = IdentityResolver::new(&target, &source, false);
        assert_eq!(strict.resolve(s, &map, &candidates), Resolution::Clone);
    }

    #[test]
    fn adoption_needs_a_coordinate_on_both_sides() {
        let mut target = Graph::new();
        let placed = local_point(&mut target, &[]);
        let unplaced = target.add(Primitive::point(Identity::Unassigned, None)).unwrap();
        let mut source = Graph::new();
        let nowhere = source
            .add(Primitive::point(Identity::Assigned(5), None).with_version(1))
            .unwrap();
        let somewhere = source
            .add(Primitive::point(Identity::Assigned(6), Some(LatLon::new(3.0, 3.0))).with_version(1))
            .unwrap();

        let resolver = IdentityResolver::new(&target, &source, true);
        let map = IdentityMap::new();
        assert_eq!(resolver.resolve(nowhere, &map, &[placed, unplaced]), Resolution::Clone);
        assert_eq!(resolver.resolve(somewhere, &map, &[unplaced]), Resolution::Clone);
    }
}
