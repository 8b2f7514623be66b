//! Three-phase graph merge.
//!
//! Merges a source graph into a target graph in place:
//!
//! - **primary pass** ([`engine`], [`identity`], [`reconcile`]): per kind, in
//!   the order points → paths → groups, resolve each source primitive to a
//!   target counterpart and clone, match, adopt or reconcile it.
//! - **fix-up** ([`fixup`]): rebuild references of merged and cloned paths
//!   and groups through the identity map.
//! - **cascade** ([`cascade`]): delete primitives the source deleted, as long
//!   as nothing live still references them.
//!
//! Conflicts collect in a [`ConflictLedger`]; touched target primitives
//! collect in a [`ChangeSet`]. Only data-integrity violations abort a call.
//!
//! # Determinism
//!
//! For fixed inputs the result is fixed: source primitives are visited in
//! arena order, local candidates are scanned in target arena order and the
//! first semantically equal unclaimed one wins.

pub mod cascade;
pub mod changeset;
pub mod conflict;
pub mod engine;
pub mod fixup;
pub mod identity;
pub mod reconcile;
pub mod types;

pub use changeset::ChangeSet;
pub use conflict::{Conflict, ConflictLedger, ConflictReason};
pub use engine::{GraphMerger, merge_graphs};
pub use identity::{IdentityMap, semantically_equal};
pub use types::{MergeOptions, MergeOutcome, MergeStats, ProgressCounter};
