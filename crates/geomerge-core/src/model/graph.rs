//! Arena-backed primitive graph.
//!
//! The graph owns every primitive. References between primitives are
//! [`PrimitiveRef`] handles (kind + slot); a side index maps assigned
//! identities to handles. Slots are never reused, so a handle stays valid for
//! the lifetime of the graph even when the primitive it names is deleted.

use std::collections::HashMap;
use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use super::primitive::{Body, Primitive};
use super::types::{Bounds, Identity, PrimitiveKind, PrimitiveRef};

// ---------------------------------------------------------------------------
// GraphError
// ---------------------------------------------------------------------------

/// Structural problems detected while building or validating a graph.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Two primitives of the same kind share an assigned id.
    #[error("duplicate {kind} id {id}")]
    DuplicateIdentity {
        /// Kind of both primitives.
        kind: PrimitiveKind,
        /// The shared id.
        id: u64,
    },

    /// A reference points outside the arena or at a primitive of another kind.
    #[error("{from} references {to}, which is not in the graph")]
    DanglingReference {
        /// Label of the referring primitive.
        from: String,
        /// The unresolvable handle.
        to: PrimitiveRef,
    },

    /// A path references something other than a point.
    #[error("{from} is a path but references a {found}")]
    KindMismatch {
        /// Label of the referring path.
        from: String,
        /// Kind that was found.
        found: PrimitiveKind,
    },

    /// The handle does not name a primitive of this graph.
    #[error("unknown primitive handle {0}")]
    UnknownHandle(PrimitiveRef),

    /// Identity assignment was requested for a primitive that already has one.
    #[error("{0} already has an assigned identity")]
    AlreadyAssigned(String),

    /// The arena cannot address more slots.
    #[error("graph cannot hold more than {} primitives", u32::MAX)]
    CapacityExceeded,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A collection of points, paths and groups plus the extents they came from.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    primitives: Vec<Primitive>,
    by_identity: HashMap<(PrimitiveKind, u64), PrimitiveRef>,
    bounds: Vec<Bounds>,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a primitive and return its handle.
    ///
    /// References inside `primitive` are not checked here: groups may form
    /// cycles, so closure can only be checked once everything is inserted
    /// (see [`Graph::validate`]).
    ///
    /// # Errors
    /// Returns [`GraphError::DuplicateIdentity`] if an assigned identity of the
    /// same kind is already present.
    pub fn add(&mut self, primitive: Primitive) -> Result<PrimitiveRef, GraphError> {
        let kind = primitive.kind();
        let slot =
            u32::try_from(self.primitives.len()).map_err(|_| GraphError::CapacityExceeded)?;
        let handle = PrimitiveRef::new(kind, slot);
        if let Identity::Assigned(id) = primitive.identity() {
            if self.by_identity.contains_key(&(kind, id)) {
                return Err(GraphError::DuplicateIdentity { kind, id });
            }
            self.by_identity.insert((kind, id), handle);
        }
        self.primitives.push(primitive);
        Ok(handle)
    }

    /// Number of primitives, deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Returns `true` if the graph holds no primitives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Number of primitives of one kind.
    #[must_use]
    pub fn count(&self, kind: PrimitiveKind) -> usize {
        self.primitives.iter().filter(|p| p.kind() == kind).count()
    }

    /// Look up a primitive by handle.
    #[must_use]
    pub fn get(&self, handle: PrimitiveRef) -> Option<&Primitive> {
        self.primitives
            .get(handle.index())
            .filter(|p| p.kind() == handle.kind())
    }

    /// Mutable access by handle.
    ///
    /// The identity cannot be changed through this reference; use
    /// [`Graph::assign_identity`].
    pub fn get_mut(&mut self, handle: PrimitiveRef) -> Option<&mut Primitive> {
        self.primitives
            .get_mut(handle.index())
            .filter(|p| p.kind() == handle.kind())
    }

    /// Find the primitive with an assigned id.
    #[must_use]
    pub fn find(&self, kind: PrimitiveKind, id: u64) -> Option<PrimitiveRef> {
        self.by_identity.get(&(kind, id)).copied()
    }

    /// Find the counterpart of `identity`; always `None` for unassigned ones.
    #[must_use]
    pub fn lookup(&self, kind: PrimitiveKind, identity: Identity) -> Option<PrimitiveRef> {
        identity.id().and_then(|id| self.find(kind, id))
    }

    /// Iterate all primitives in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveRef, &Primitive)> {
        self.primitives.iter().enumerate().map(|(i, p)| {
            #[allow(clippy::cast_possible_truncation)]
            let slot = i as u32;
            (PrimitiveRef::new(p.kind(), slot), p)
        })
    }

    /// Handles of every primitive of one kind, in arena order.
    #[must_use]
    pub fn refs_of_kind(&self, kind: PrimitiveKind) -> Vec<PrimitiveRef> {
        self.iter()
            .filter(|(r, _)| r.kind() == kind)
            .map(|(r, _)| r)
            .collect()
    }

    /// Give an unassigned primitive a stable identity.
    ///
    /// # Errors
    /// Fails if the handle is unknown, the primitive already has an identity,
    /// or the id is taken by another primitive of the same kind.
    pub fn assign_identity(&mut self, handle: PrimitiveRef, id: u64) -> Result<(), GraphError> {
        let kind = handle.kind();
        if self.by_identity.contains_key(&(kind, id)) {
            return Err(GraphError::DuplicateIdentity { kind, id });
        }
        let primitive = self
            .get_mut(handle)
            .ok_or(GraphError::UnknownHandle(handle))?;
        if !primitive.is_new() {
            return Err(GraphError::AlreadyAssigned(primitive.label()));
        }
        primitive.identity = Identity::Assigned(id);
        self.by_identity.insert((kind, id), handle);
        Ok(())
    }

    /// Primitives that reference `handle`, in arena order.
    ///
    /// Linear scan; bulk callers should build a
    /// [`ReferrerIndex`](super::referrers::ReferrerIndex) instead.
    #[must_use]
    pub fn referrers(&self, handle: PrimitiveRef) -> Vec<PrimitiveRef> {
        self.iter()
            .filter(|(_, p)| p.body.references().contains(&handle))
            .map(|(r, _)| r)
            .collect()
    }

    /// Check referential closure: every reference resolves to a primitive of
    /// the referenced kind in this graph, and paths only reference points.
    ///
    /// # Errors
    /// Returns the first violation found, in arena order.
    pub fn validate(&self) -> Result<(), GraphError> {
        for (_, primitive) in self.iter() {
            for target in primitive.body.references() {
                if self.get(target).is_none() {
                    return Err(GraphError::DanglingReference {
                        from: primitive.label(),
                        to: target,
                    });
                }
                if matches!(primitive.body, Body::Path { .. })
                    && target.kind() != PrimitiveKind::Point
                {
                    return Err(GraphError::KindMismatch {
                        from: primitive.label(),
                        found: target.kind(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Extents this graph was assembled from.
    #[must_use]
    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    /// Record an extent unless an equal one is already present.
    ///
    /// Returns `true` if the extent was added.
    pub fn add_bounds(&mut self, bounds: Bounds) -> bool {
        if self.bounds.contains(&bounds) {
            return false;
        }
        self.bounds.push(bounds);
        true
    }

    /// SHA-256 over a canonical encoding of every primitive (arena order) and
    /// the bounds list, as lowercase hex.
    ///
    /// Two graphs with the same digest are byte-for-byte identical in every
    /// field the engine can touch.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (handle, p) in self.iter() {
            hasher.update(handle.slot().to_le_bytes());
            hasher.update(p.kind().as_str().as_bytes());
            match p.identity() {
                Identity::Assigned(id) => {
                    hasher.update([1]);
                    hasher.update(id.to_le_bytes());
                }
                Identity::Unassigned => hasher.update([0]),
            }
            hasher.update(p.version.to_le_bytes());
            hasher.update([
                u8::from(p.visible),
                u8::from(p.deleted),
                u8::from(p.modified),
                u8::from(p.incomplete),
            ]);
            for (k, v) in &p.tags {
                hash_str(&mut hasher, k);
                hash_str(&mut hasher, v);
            }
            hash_str(&mut hasher, p.user.as_deref().unwrap_or_default());
            hasher.update(p.timestamp.unwrap_or_default().to_le_bytes());
            match &p.body {
                Body::Point { coord } => {
                    if let Some(c) = coord {
                        hasher.update(c.lat.to_bits().to_le_bytes());
                        hasher.update(c.lon.to_bits().to_le_bytes());
                    }
                }
                Body::Path { points } => {
                    for r in points {
                        hasher.update(r.slot().to_le_bytes());
                    }
                }
                Body::Group { members } => {
                    for m in members {
                        hash_str(&mut hasher, &m.role);
                        hasher.update(m.target.kind().as_str().as_bytes());
                        hasher.update(m.target.slot().to_le_bytes());
                    }
                }
            }
        }
        for b in &self.bounds {
            for edge in [b.min_lat, b.min_lon, b.max_lat, b.max_lon] {
                hasher.update(edge.to_bits().to_le_bytes());
            }
        }
        let mut hex = String::with_capacity(64);
        for byte in hasher.finalize() {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
