//! Foundation types for the primitive graph.
//!
//! Primitive kinds, identities, arena handles, coordinates and bounds. These
//! are plain values: nothing here owns another primitive.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PrimitiveKind
// ---------------------------------------------------------------------------

/// The three kinds of primitive, declared in merge order.
///
/// Paths reference points and groups reference anything, so the primary
/// merge pass must visit kinds in the order returned by [`PrimitiveKind::ALL`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// A leaf with an optional coordinate.
    Point,
    /// An ordered sequence of point references.
    Path,
    /// An ordered sequence of role-tagged references of any kind.
    Group,
}

impl PrimitiveKind {
    /// All kinds in mandatory merge order.
    pub const ALL: [Self; 3] = [Self::Point, Self::Path, Self::Group];

    /// Lowercase name used in reports and documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Path => "path",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity handed out by the authoritative source.
///
/// `Unassigned` primitives were created locally and have no stable id yet;
/// their `version` carries no meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// Stable numeric id assigned upstream.
    Assigned(u64),
    /// Locally created, no stable id.
    Unassigned,
}

impl Identity {
    /// Returns `true` for locally created primitives.
    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        matches!(self, Self::Unassigned)
    }

    /// The assigned id, if any.
    #[must_use]
    pub const fn id(self) -> Option<u64> {
        match self {
            Self::Assigned(id) => Some(id),
            Self::Unassigned => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assigned(id) => write!(f, "{id}"),
            Self::Unassigned => f.write_str("new"),
        }
    }
}

// ---------------------------------------------------------------------------
// PrimitiveRef
// ---------------------------------------------------------------------------

/// Handle to a primitive inside one [`Graph`](super::graph::Graph) arena.
///
/// Handles are stable for the lifetime of the graph that issued them and are
/// meaningless in any other graph. Cross-graph correspondence goes through
/// the merge engine's identity map, never through handle equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimitiveRef {
    kind: PrimitiveKind,
    slot: u32,
}

impl PrimitiveRef {
    pub(crate) const fn new(kind: PrimitiveKind, slot: u32) -> Self {
        Self { kind, slot }
    }

    /// Kind of the referenced primitive.
    #[must_use]
    pub const fn kind(self) -> PrimitiveKind {
        self.kind
    }

    /// Arena slot index.
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    pub(crate) const fn index(self) -> usize {
        self.slot as usize
    }
}

impl fmt::Display for PrimitiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.slot)
    }
}

// ---------------------------------------------------------------------------
// LatLon / Bounds
// ---------------------------------------------------------------------------

/// A WGS84 coordinate in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

impl LatLon {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Geographic extent of downloaded data.
///
/// A graph keeps the list of extents it was assembled from; merging with
/// `merge_bounds` appends the source's extents that the target lacks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Southern edge.
    pub min_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl Bounds {
    /// Create bounds from two corners in any order.
    #[must_use]
    pub fn from_corners(a: LatLon, b: LatLon) -> Self {
        Self {
            min_lat: a.lat.min(b.lat),
            min_lon: a.lon.min(b.lon),
            max_lat: a.lat.max(b.lat),
            max_lon: a.lon.max(b.lon),
        }
    }

    /// Returns `true` if `coord` lies inside or on the edge.
    #[must_use]
    pub fn contains(&self, coord: LatLon) -> bool {
        (self.min_lat..=self.max_lat).contains(&coord.lat)
            && (self.min_lon..=self.max_lon).contains(&coord.lon)
    }
}
