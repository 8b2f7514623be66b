//! Primitives: points, paths and groups.
//!
//! A [`Primitive`] carries the per-object state shared by every kind
//! (identity, version, flags, tags, technical metadata) and a [`Body`] with
//! the kind-specific payload. References inside a body are arena handles into
//! the owning graph.

use std::collections::BTreeMap;

use super::types::{Identity, LatLon, PrimitiveKind, PrimitiveRef};

/// Unordered key/value tags. Kept in a `BTreeMap` so that iteration, equality
/// and digests are deterministic.
pub type Tags = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Member / Body
// ---------------------------------------------------------------------------

/// One role-tagged entry of a group.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Member {
    /// Free-form role string; may be empty.
    pub role: String,
    /// The referenced primitive (any kind).
    pub target: PrimitiveRef,
}

impl Member {
    /// Create a member.
    pub fn new(role: impl Into<String>, target: PrimitiveRef) -> Self {
        Self {
            role: role.into(),
            target,
        }
    }
}

/// Kind-specific payload of a primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Leaf with an optional coordinate (absent while incomplete).
    Point {
        /// Location, if loaded.
        coord: Option<LatLon>,
    },
    /// Ordered point references.
    Path {
        /// Point handles, in order. A path is closed when the first and last
        /// entries are the same point.
        points: Vec<PrimitiveRef>,
    },
    /// Ordered role-tagged references.
    Group {
        /// Members, in order.
        members: Vec<Member>,
    },
}

impl Body {
    /// The primitive kind this body belongs to.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Point { .. } => PrimitiveKind::Point,
            Self::Path { .. } => PrimitiveKind::Path,
            Self::Group { .. } => PrimitiveKind::Group,
        }
    }

    /// All outgoing references, in order, duplicates included.
    #[must_use]
    pub fn references(&self) -> Vec<PrimitiveRef> {
        match self {
            Self::Point { .. } => Vec::new(),
            Self::Path { points } => points.clone(),
            Self::Group { members } => members.iter().map(|m| m.target).collect(),
        }
    }

    /// Drop all outgoing references. Points are unaffected.
    pub fn clear_references(&mut self) {
        match self {
            Self::Point { .. } => {}
            Self::Path { points } => points.clear(),
            Self::Group { members } => members.clear(),
        }
    }

    /// Copy of this body with references removed.
    #[must_use]
    pub fn detached(&self) -> Self {
        match self {
            Self::Point { coord } => Self::Point { coord: *coord },
            Self::Path { .. } => Self::Path { points: Vec::new() },
            Self::Group { .. } => Self::Group {
                members: Vec::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Primitive
// ---------------------------------------------------------------------------

/// A point, path or group with its upstream identity and local edit state.
///
/// Unmodified, undeleted primitives are assumed to mirror the authoritative
/// source exactly at `version`. The identity is managed by the owning graph
/// (it is also an index key) and can only be read here.
#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
    pub(crate) identity: Identity,
    /// Upstream revision counter; meaningless for unassigned identities.
    pub version: u64,
    /// Upstream soft-delete marker.
    pub visible: bool,
    /// Local intent to delete.
    pub deleted: bool,
    /// Local intent to change.
    pub modified: bool,
    /// Only the identity is known.
    pub incomplete: bool,
    /// Semantic key/value attributes.
    pub tags: Tags,
    /// Last upstream editor (technical metadata).
    pub user: Option<String>,
    /// Last upstream edit time in seconds since the epoch (technical metadata).
    pub timestamp: Option<u64>,
    /// Kind-specific payload.
    pub body: Body,
}

impl Primitive {
    fn with_body(identity: Identity, body: Body) -> Self {
        Self {
            identity,
            version: 0,
            visible: true,
            deleted: false,
            modified: identity.is_unassigned(),
            incomplete: false,
            tags: Tags::new(),
            user: None,
            timestamp: None,
            body,
        }
    }

    /// A point. Locally created points start out modified.
    #[must_use]
    pub fn point(identity: Identity, coord: Option<LatLon>) -> Self {
        Self::with_body(identity, Body::Point { coord })
    }

    /// A path over the given point handles.
    #[must_use]
    pub fn path(identity: Identity, points: Vec<PrimitiveRef>) -> Self {
        Self::with_body(identity, Body::Path { points })
    }

    /// A group over the given members.
    #[must_use]
    pub fn group(identity: Identity, members: Vec<Member>) -> Self {
        Self::with_body(identity, Body::Group { members })
    }

    /// A placeholder for a primitive whose attributes are not loaded.
    #[must_use]
    pub fn incomplete(kind: PrimitiveKind, id: u64) -> Self {
        let body = match kind {
            PrimitiveKind::Point => Body::Point { coord: None },
            PrimitiveKind::Path => Body::Path { points: Vec::new() },
            PrimitiveKind::Group => Body::Group {
                members: Vec::new(),
            },
        };
        let mut p = Self::with_body(Identity::Assigned(id), body);
        p.incomplete = true;
        p
    }

    /// Set the upstream version.
    #[must_use]
    pub const fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Add or replace one tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the modified flag.
    #[must_use]
    pub const fn with_modified(mut self, modified: bool) -> Self {
        self.modified = modified;
        self
    }

    /// Set the local deleted flag.
    #[must_use]
    pub const fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    /// Set the upstream visibility flag.
    #[must_use]
    pub const fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set the last upstream editor.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Upstream identity.
    #[must_use]
    pub const fn identity(&self) -> Identity {
        self.identity
    }

    /// Returns `true` if this primitive has no assigned identity.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.identity.is_unassigned()
    }

    /// Primitive kind.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        self.body.kind()
    }

    /// Coordinate of a point; `None` for other kinds or when unknown.
    #[must_use]
    pub const fn coord(&self) -> Option<LatLon> {
        match &self.body {
            Body::Point { coord } => *coord,
            _ => None,
        }
    }

    /// Point handles of a path; empty for other kinds.
    #[must_use]
    pub fn points(&self) -> &[PrimitiveRef] {
        match &self.body {
            Body::Path { points } => points,
            _ => &[],
        }
    }

    /// Members of a group; empty for other kinds.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        match &self.body {
            Body::Group { members } => members,
            _ => &[],
        }
    }

    /// Returns `true` for a path whose first and last point coincide.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        let points = self.points();
        points.len() >= 3 && points.first() == points.last()
    }

    /// Short human-readable name, e.g. `path 17` or `point new`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.kind(), self.identity)
    }

    /// Copy of this primitive with references removed, ready to be inserted
    /// into another graph.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            body: self.body.detached(),
            ..self.clone()
        }
    }

    /// Take over everything from `src` except identity and references.
    ///
    /// Returns `true` if anything changed. References live in the source
    /// graph's handle space and are rebuilt separately by the fix-up pass.
    pub fn merge_from(&mut self, src: &Self) -> bool {
        let before = (
            self.version,
            self.visible,
            self.deleted,
            self.modified,
            self.incomplete,
            self.coord(),
        );
        let tags_changed = self.tags != src.tags;
        let technical_changed = self.copy_technical_from(src);

        self.version = src.version;
        self.deleted = src.deleted;
        self.incomplete = src.incomplete;
        if tags_changed {
            self.tags.clone_from(&src.tags);
        }
        if let (Body::Point { coord }, Body::Point { coord: src_coord }) =
            (&mut self.body, &src.body)
        {
            *coord = *src_coord;
        }

        let after = (
            self.version,
            self.visible,
            self.deleted,
            self.modified,
            self.incomplete,
            self.coord(),
        );
        tags_changed || technical_changed || before != after
    }

    /// Take over only technical attributes: visibility, modified flag, user
    /// and timestamp. Returns `true` if anything changed.
    pub fn copy_technical_from(&mut self, src: &Self) -> bool {
        let changed = self.visible != src.visible
            || self.modified != src.modified
            || self.user != src.user
            || self.timestamp != src.timestamp;
        self.visible = src.visible;
        self.modified = src.modified;
        self.user.clone_from(&src.user);
        self.timestamp = src.timestamp;
        changed
    }
}
