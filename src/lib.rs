//! geomerge library crate.
//!
//! The merge engine itself lives in `geomerge_core`. This crate adds what is
//! needed to use it on real data and is exposed so that integration tests
//! can drive it without going through the CLI:
//!
//! - [`document`]: JSON graph documents.
//! - [`task`]: tasks and the [`task::TaskSource`] collaborator.
//! - [`session`]: the edit session that serializes merges.
//! - [`config`]: `geomerge.toml`.
//! - [`report`]: merge outcomes rendered for people and scripts.

pub mod config;
pub mod document;
pub mod error;
pub mod format;
pub mod report;
pub mod session;
pub mod task;
pub mod telemetry;

pub use error::GeomergeError;
pub use session::EditSession;
