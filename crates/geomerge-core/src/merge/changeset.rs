//! Change set accumulator.
//!
//! Collects which target primitives a merge added, modified and deleted, for
//! undo recording and redraw. The three sets are kept disjoint:
//!
//! - an added primitive stays "added" no matter what happens to it later;
//! - a deleted primitive moves out of "modified".

use std::collections::BTreeSet;

use crate::model::PrimitiveRef;

/// Added, modified and deleted target handles from one merge call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    added: BTreeSet<PrimitiveRef>,
    modified: BTreeSet<PrimitiveRef>,
    deleted: BTreeSet<PrimitiveRef>,
}

impl ChangeSet {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a primitive cloned into the target.
    pub fn mark_added(&mut self, handle: PrimitiveRef) {
        self.modified.remove(&handle);
        self.deleted.remove(&handle);
        self.added.insert(handle);
    }

    /// Record an in-place change. Ignored for added or deleted primitives.
    pub fn mark_modified(&mut self, handle: PrimitiveRef) {
        if !self.added.contains(&handle) && !self.deleted.contains(&handle) {
            self.modified.insert(handle);
        }
    }

    /// Record a deletion. Ignored for primitives added by the same merge.
    pub fn mark_deleted(&mut self, handle: PrimitiveRef) {
        if self.added.contains(&handle) {
            return;
        }
        self.modified.remove(&handle);
        self.deleted.insert(handle);
    }

    /// Added handles in order.
    #[must_use]
    pub const fn added(&self) -> &BTreeSet<PrimitiveRef> {
        &self.added
    }

    /// Modified handles in order.
    #[must_use]
    pub const fn modified(&self) -> &BTreeSet<PrimitiveRef> {
        &self.modified
    }

    /// Deleted handles in order.
    #[must_use]
    pub const fn deleted(&self) -> &BTreeSet<PrimitiveRef> {
        &self.deleted
    }

    /// Returns `true` if the merge changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Total number of touched primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}
