//! Reports printed by the CLI.
//!
//! Handles mean nothing outside their graph, so reports name primitives by
//! label (`path 17`, `point new`) and slot.

use std::fmt::Write as _;

use geomerge_core::merge::MergeOutcome;
use geomerge_core::model::{Graph, PrimitiveKind, PrimitiveRef};
use serde::Serialize;

use crate::task::Task;

// ---------------------------------------------------------------------------
// MergeReport
// ---------------------------------------------------------------------------

/// One conflict, as reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConflictEntry {
    pub primitive: String,
    pub reason: String,
    /// The local deletion is what is being questioned.
    pub from_theirs: bool,
}

/// Counters from the merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsEntry {
    pub processed: usize,
    pub cloned: usize,
    pub matched: usize,
    pub adopted: usize,
    pub merged: usize,
    pub kept: usize,
    pub fixed_up: usize,
    pub deleted: usize,
    pub forced_deletions: usize,
}

/// Summary of one merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<u64>,
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub conflicts: Vec<ConflictEntry>,
    pub stats: StatsEntry,
}

impl MergeReport {
    /// Describe `outcome`; `target` is the graph it was merged into.
    #[must_use]
    pub fn new(target: &Graph, outcome: &MergeOutcome) -> Self {
        let labels = |set: &std::collections::BTreeSet<PrimitiveRef>| -> Vec<String> {
            set.iter().map(|&r| label(target, r)).collect()
        };
        let s = outcome.stats;
        Self {
            task: None,
            added: labels(outcome.changes.added()),
            modified: labels(outcome.changes.modified()),
            deleted: labels(outcome.changes.deleted()),
            conflicts: outcome
                .conflicts
                .iter()
                .map(|c| ConflictEntry {
                    primitive: label(target, c.target),
                    reason: c.reason.to_string(),
                    from_theirs: c.from_theirs,
                })
                .collect(),
            stats: StatsEntry {
                processed: s.processed,
                cloned: s.cloned,
                matched: s.matched,
                adopted: s.adopted,
                merged: s.merged,
                kept: s.kept,
                fixed_up: s.fixed_up,
                deleted: s.deleted,
                forced_deletions: s.forced_deletions,
            },
        }
    }

    /// Attach the task this merge came from.
    #[must_use]
    pub fn for_task(mut self, task: &Task) -> Self {
        self.task = Some(task.id);
        self
    }

    /// Returns `true` if the merge needs no manual follow-up.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Human-readable rendering.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if let Some(id) = self.task {
            let _ = writeln!(out, "Task {id}");
        }
        let _ = writeln!(
            out,
            "Merged {} primitive(s): {} added, {} modified, {} deleted",
            self.stats.processed,
            self.added.len(),
            self.modified.len(),
            self.deleted.len()
        );
        for (heading, items) in [
            ("Added", &self.added),
            ("Modified", &self.modified),
            ("Deleted", &self.deleted),
        ] {
            if !items.is_empty() {
                let _ = writeln!(out, "  {heading}: {}", items.join(", "));
            }
        }
        if self.conflicts.is_empty() {
            let _ = writeln!(out, "No conflicts.");
        } else {
            let _ = writeln!(out, "{} conflict(s):", self.conflicts.len());
            for c in &self.conflicts {
                let _ = writeln!(out, "  - {}: {}", c.primitive, c.reason);
            }
        }
        out
    }
}

fn label(graph: &Graph, handle: PrimitiveRef) -> String {
    graph
        .get(handle)
        .map_or_else(|| handle.to_string(), |p| format!("{} ({handle})", p.label()))
}

// ---------------------------------------------------------------------------
// GraphSummary
// ---------------------------------------------------------------------------

/// Per-kind counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub total: usize,
    pub new: usize,
    pub modified: usize,
    pub deleted: usize,
    pub incomplete: usize,
}

/// What `geomerge inspect` prints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub points: KindCounts,
    pub paths: KindCounts,
    pub groups: KindCounts,
    pub bounds: usize,
    /// Validation error, if the graph is not referentially closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid: Option<String>,
    pub digest: String,
}

impl GraphSummary {
    /// Summarize `graph`.
    #[must_use]
    pub fn new(graph: &Graph) -> Self {
        let mut counts = [KindCounts::default(); 3];
        for (_, p) in graph.iter() {
            let c = &mut counts[p.kind() as usize];
            c.total += 1;
            c.new += usize::from(p.is_new());
            c.modified += usize::from(p.modified);
            c.deleted += usize::from(p.deleted);
            c.incomplete += usize::from(p.incomplete);
        }
        let [points, paths, groups] = counts;
        Self {
            points,
            paths,
            groups,
            bounds: graph.bounds().len(),
            invalid: graph.validate().err().map(|e| e.to_string()),
            digest: graph.digest(),
        }
    }

    /// Human-readable rendering.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (kind, c) in [
            (PrimitiveKind::Point, self.points),
            (PrimitiveKind::Path, self.paths),
            (PrimitiveKind::Group, self.groups),
        ] {
            let _ = writeln!(
                out,
                "{:<6} {:>6} total, {} new, {} modified, {} deleted, {} incomplete",
                kind.as_str(),
                c.total, c.new, c.modified, c.deleted, c.incomplete
            );
        }
        let _ = writeln!(out, "bounds {:>6}", self.bounds);
        match &self.invalid {
            Some(err) => {
                let _ = writeln!(out, "INVALID: {err}");
            }
            None => {
                let _ = writeln!(out, "valid");
            }
        }
        let _ = writeln!(out, "digest {}", self.digest);
        out
    }
}
