//! Pipeline state: the typed carrier threaded through the three stages,
//! and the in-memory checkpointer that makes runs resumable.
//!
//! ## Why a typed state struct?
//!
//! Each stage writes exactly one optional output and reads at most one
//! input. Modelling that as a struct of `Option`s (instead of an untyped
//! map) makes the "stages must null-check their inputs" rule a compiler
//! obligation: the extract stage cannot pretend `document_text` exists, it
//! has to match on the `Option`. The state is owned exclusively by one
//! run's control flow — no locks, no sharing across runs.

use crate::output::ExtractedRecord;
use std::collections::HashMap;
use std::sync::Mutex;

/// The reflowed document body.
///
/// Constructed only by the ingest stage, which guarantees the reflow
/// invariant: no line matching the list-item-start pattern is followed by
/// an unmerged continuation line. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText(String);

impl DocumentText {
    pub(crate) fn new(reflowed: String) -> Self {
        Self(reflowed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One node of the sequential state machine.
///
/// Transitions are fixed: Start → Ingest → Extract → Store → End.
/// No branches, no cycles, no skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Ingest,
    Extract,
    Store,
}

impl Stage {
    /// The stage after this one, or `None` at the end of the run.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Ingest => Some(Stage::Extract),
            Stage::Extract => Some(Stage::Store),
            Stage::Store => None,
        }
    }

    /// Lower-case name used in log lines and reports.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Extract => "extract",
            Stage::Store => "store",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Mutable carrier threaded through the stages of one run.
///
/// Created empty at run start, populated incrementally, discarded after the
/// run completes (apart from an optional resumability checkpoint).
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// Written by the ingest stage; read by the extract stage.
    pub document_text: Option<DocumentText>,
    /// Written by the extract stage; read (never mutated) by the store stage.
    pub record: Option<ExtractedRecord>,
}

/// A saved point in a run: the state so far plus the next pending stage.
///
/// `next: None` means the run has already reached End; re-invoking it is a
/// no-op.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub state: PipelineState,
    pub next: Option<Stage>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            state: PipelineState::default(),
            next: Some(Stage::Ingest),
        }
    }
}

/// In-memory checkpoint store keyed by run id.
///
/// Lets an operator re-invoke a run and have the state machine resume from
/// the last completed transition instead of restarting from Start. Purely
/// optional: a single uninterrupted run never reads a checkpoint back.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    inner: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the checkpoint for `run_id`, or a fresh one pointing at Ingest.
    pub fn load(&self, run_id: &str) -> Checkpoint {
        self.inner
            .lock()
            .expect("checkpoint lock poisoned")
            .get(run_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Save the checkpoint for `run_id`, replacing any previous one.
    pub fn save(&self, run_id: &str, checkpoint: Checkpoint) {
        self.inner
            .lock()
            .expect("checkpoint lock poisoned")
            .insert(run_id.to_string(), checkpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_transition_table() {
        assert_eq!(Stage::Ingest.next(), Some(Stage::Extract));
        assert_eq!(Stage::Extract.next(), Some(Stage::Store));
        assert_eq!(Stage::Store.next(), None);
    }

    #[test]
    fn fresh_checkpoint_starts_at_ingest() {
        let cp = MemoryCheckpointer::new().load("unknown-run");
        assert_eq!(cp.next, Some(Stage::Ingest));
        assert!(cp.state.document_text.is_none());
        assert!(cp.state.record.is_none());
    }

    #[test]
    fn checkpoint_round_trip() {
        let store = MemoryCheckpointer::new();
        let mut cp = Checkpoint::default();
        cp.state.document_text = Some(DocumentText::new("1. A\n2. B".into()));
        cp.next = Some(Stage::Extract);
        store.save("run-1", cp);

        let loaded = store.load("run-1");
        assert_eq!(loaded.next, Some(Stage::Extract));
        assert_eq!(
            loaded.state.document_text.as_ref().map(|t| t.as_str()),
            Some("1. A\n2. B")
        );
    }

    #[test]
    fn document_text_accessors() {
        let t = DocumentText::new(String::new());
        assert!(t.is_empty());
        let t = DocumentText::new("abc".into());
        assert_eq!(t.len(), 3);
        assert_eq!(t.as_str(), "abc");
    }
}
