//! Primitive graph model.
//!
//! - [`types`]: kinds, identities, handles, coordinates.
//! - [`primitive`]: the [`Primitive`] record and its kind-specific [`Body`].
//! - [`graph`]: the arena that owns primitives and indexes identities.
//! - [`referrers`]: reverse reference index used by cascading deletion.

pub mod graph;
pub mod primitive;
pub mod referrers;
pub mod types;

pub use graph::{Graph, GraphError};
pub use primitive::{Body, Member, Primitive, Tags};
pub use referrers::ReferrerIndex;
pub use types::{Bounds, Identity, LatLon, PrimitiveKind, PrimitiveRef};
