//! Progress-callback trait for per-stage and per-field pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! real-time events as the run moves through its stages.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, a database record, or a
//! terminal progress bar — without the library knowing anything about how
//! the host application communicates. The trait is `Send + Sync` so it
//! works correctly when field queries fan out concurrently.

use crate::output::ExtractionField;
use crate::state::Stage;
use std::sync::Arc;

/// Called by the pipeline as a run progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `concurrency > 1` the field events may fire
/// concurrently from different tasks; implementations must synchronise any
/// shared mutable state.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once when the run (or its resumed remainder) begins.
    fn on_run_start(&self, run_id: &str) {
        let _ = run_id;
    }

    /// Called just before a stage executes.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage completes successfully.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage fails (the run may still continue).
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called just before a field's completion query is dispatched.
    ///
    /// `index` is 1-based dispatch order; with fan-out enabled, completion
    /// order may differ.
    fn on_field_start(&self, field: ExtractionField, index: usize, total: usize) {
        let _ = (field, index, total);
    }

    /// Called when a field's value was extracted.
    fn on_field_complete(&self, field: ExtractionField, total: usize, value_len: usize) {
        let _ = (field, total, value_len);
    }

    /// Called when a field degraded to an error-description string.
    fn on_field_error(&self, field: ExtractionField, total: usize, error: &str) {
        let _ = (field, total, error);
    }

    /// Called once when the run reaches End.
    ///
    /// `all_stages_succeeded` is false when any executed stage failed, even
    /// though the run itself completed.
    fn on_run_complete(&self, run_id: &str, all_stages_succeeded: bool) {
        let _ = (run_id, all_stages_succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        stage_starts: AtomicUsize,
        stage_completes: AtomicUsize,
        field_completes: AtomicUsize,
        field_errors: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _stage: Stage) {
            self.stage_starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_complete(&self, _stage: Stage) {
            self.stage_completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_field_complete(&self, _field: ExtractionField, _total: usize, _len: usize) {
            self.field_completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_field_error(&self, _field: ExtractionField, _total: usize, _error: &str) {
            self.field_errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start("run-1");
        cb.on_stage_start(Stage::Ingest);
        cb.on_stage_complete(Stage::Ingest);
        cb.on_stage_error(Stage::Store, "boom");
        cb.on_field_start(ExtractionField::Title, 1, 8);
        cb.on_field_complete(ExtractionField::Title, 8, 42);
        cb.on_field_error(ExtractionField::Keywords, 8, "quota");
        cb.on_run_complete("run-1", false);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback::default();
        cb.on_stage_start(Stage::Ingest);
        cb.on_stage_complete(Stage::Ingest);
        cb.on_stage_start(Stage::Extract);
        cb.on_field_complete(ExtractionField::Title, 8, 10);
        cb.on_field_error(ExtractionField::Keywords, 8, "quota");
        cb.on_stage_complete(Stage::Extract);

        assert_eq!(cb.stage_starts.load(Ordering::SeqCst), 2);
        assert_eq!(cb.stage_completes.load(Ordering::SeqCst), 2);
        assert_eq!(cb.field_completes.load(Ordering::SeqCst), 1);
        assert_eq!(cb.field_errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn PipelineProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_run_start("r");
        cb.on_field_start(ExtractionField::Abstract, 4, 8);
    }
}
