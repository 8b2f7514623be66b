//! Core domain logic for geomerge.
//!
//! - [`model`]: arena-backed graph of points, paths and groups.
//! - [`merge`]: identity resolution, reconciliation, reference fix-up,
//!   cascading deletion, conflict ledger and change set.
//! - [`error`]: the fatal error taxonomy of a merge call.
//!
//! No I/O happens here. Loading documents, task collaborators and the CLI
//! live in the `geomerge` crate.

pub mod error;
pub mod merge;
pub mod model;

pub use error::{GraphSide, IntegrityError, MergeError};
pub use merge::{ChangeSet, ConflictLedger, MergeOptions, MergeOutcome, merge_graphs};
pub use model::{Graph, Primitive, PrimitiveKind, PrimitiveRef};
