//! Reverse reference index.
//!
//! Built once from a graph and then kept in step by the caller while it
//! clears references. Lookups are O(log n) instead of a full arena scan.

use std::collections::{BTreeSet, HashMap};

use super::graph::Graph;
use super::types::PrimitiveRef;

/// Maps each primitive to the set of primitives that reference it.
#[derive(Clone, Debug, Default)]
pub struct ReferrerIndex {
    referrers: HashMap<PrimitiveRef, BTreeSet<PrimitiveRef>>,
}

impl ReferrerIndex {
    /// Index every reference in `graph`.
    #[must_use]
    pub fn build(graph: &Graph) -> Self {
        let mut index = Self::default();
        for (from, primitive) in graph.iter() {
            for to in primitive.body.references() {
                index.referrers.entry(to).or_default().insert(from);
            }
        }
        index
    }

    /// Referrers of `handle`, in handle order.
    pub fn referrers_of(&self, handle: PrimitiveRef) -> impl Iterator<Item = PrimitiveRef> + '_ {
        self.referrers
            .get(&handle)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Forget that `from` referenced each of `old_targets`.
    pub fn detach(&mut self, from: PrimitiveRef, old_targets: &[PrimitiveRef]) {
        for to in old_targets {
            if let Some(set) = self.referrers.get_mut(to) {
                set.remove(&from);
                if set.is_empty() {
                    self.referrers.remove(to);
                }
            }
        }
    }
}
