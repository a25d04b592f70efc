//! The pipeline orchestrator: a three-node sequential state machine.
//!
//! ## Transition table
//!
//! ```text
//! Start ──▶ Ingest ──▶ Extract ──▶ Store ──▶ End
//! ```
//!
//! No branches, no cycles, no skip transitions. Each stage reads its input
//! from [`PipelineState`], null-checks it (prior stages may have failed),
//! and writes at most one output back.
//!
//! ## The continue-on-stage-failure policy
//!
//! A failed ingest or extract stage is logged at ERROR and converted into
//! empty state; the machine still advances. This is a named, load-bearing
//! policy, not accidental error suppression: the reference behaviour
//! prefers a degraded or empty downstream record over an aborted run. It
//! can be disabled via
//! [`crate::config::PipelineConfig::continue_on_stage_failure`], in which
//! case the run stops at the failed stage and a checkpointed re-invocation
//! retries it.
//!
//! A store failure is logged and the run still reaches End — [`Pipeline::run`]
//! never returns an error. Callers that want a run-level failure status
//! read it from [`RunOutput::all_stages_succeeded`] instead.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::{RunOutput, RunStats, StageReport, StageStatus};
use crate::pipeline::extract::{self, CompletionBackend, EdgequakeBackend};
use crate::pipeline::ingest::{self, PageTextProvider, PdfTextProvider};
use crate::pipeline::store::{BigQuerySink, RecordSink};
use crate::state::{MemoryCheckpointer, Stage};
use chrono::Utc;
use edgequake_llm::ProviderFactory;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Model used when the caller names a provider but no model.
const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A constructed pipeline: resolved backend, sink, and checkpoint store.
///
/// One `Pipeline` can drive many runs; each run gets its own
/// [`PipelineState`](crate::state::PipelineState) keyed by run id, so
/// concurrent documents never share state.
pub struct Pipeline {
    config: PipelineConfig,
    backend: Arc<dyn CompletionBackend>,
    page_texts: Arc<dyn PageTextProvider>,
    sink: Arc<dyn RecordSink>,
    checkpoints: MemoryCheckpointer,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("backend", &"<dyn CompletionBackend>")
            .field("page_texts", &"<dyn PageTextProvider>")
            .field("sink", &"<dyn RecordSink>")
            .finish()
    }
}

impl Pipeline {
    /// Construct a pipeline, resolving the completion backend and sink.
    ///
    /// This is the only place a fatal error can surface; once `new`
    /// succeeds, [`Pipeline::run`] always completes.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let backend = resolve_backend(&config)?;
        let sink = resolve_sink(&config)?;
        let page_texts = config
            .page_text_provider
            .clone()
            .unwrap_or_else(|| Arc::new(PdfTextProvider));

        Ok(Self {
            config,
            backend,
            page_texts,
            sink,
            checkpoints: MemoryCheckpointer::new(),
        })
    }

    /// Execute (or resume) the run identified by `run_id` against `document`.
    ///
    /// Resumes from the last completed transition when a checkpoint for
    /// `run_id` exists; a run that already reached End is a no-op that
    /// reports the checkpointed record and executes no stages.
    ///
    /// Never returns an error: stage failures are logged and reported in
    /// the returned [`RunOutput`].
    pub async fn run(&self, document: impl AsRef<Path>, run_id: &str) -> RunOutput {
        let document = document.as_ref().to_path_buf();
        let total_start = Instant::now();
        let mut checkpoint = self.checkpoints.load(run_id);

        if let Some(cb) = &self.config.progress_callback {
            cb.on_run_start(run_id);
        }

        let mut output = RunOutput {
            run_id: run_id.to_string(),
            ..Default::default()
        };

        if checkpoint.next.is_none() {
            info!("Run '{}' already reached End; nothing to do", run_id);
            output.record = checkpoint.state.record.clone();
            return output;
        }

        while let Some(stage) = checkpoint.next {
            if let Some(cb) = &self.config.progress_callback {
                cb.on_stage_start(stage);
            }

            let stage_start = Instant::now();
            let result = self
                .execute_stage(stage, &document, &mut checkpoint.state, &mut output)
                .await;
            let duration_ms = stage_start.elapsed().as_millis() as u64;
            record_stage_duration(&mut output.stats, stage, duration_ms);

            let status = match result {
                Ok(()) => {
                    info!("Stage '{}' completed", stage);
                    if let Some(cb) = &self.config.progress_callback {
                        cb.on_stage_complete(stage);
                    }
                    StageStatus::Completed
                }
                Err(detail) => {
                    error!("Stage '{}' failed: {}", stage, detail);
                    if let Some(cb) = &self.config.progress_callback {
                        cb.on_stage_error(stage, &detail);
                    }
                    StageStatus::Failed(detail)
                }
            };
            let failed = status != StageStatus::Completed;
            output.stages.push(StageReport {
                stage,
                status,
                duration_ms,
            });

            if failed && !self.config.continue_on_stage_failure {
                // Leave the checkpoint pointing at the failed stage so a
                // re-invocation retries it rather than restarting.
                self.checkpoints.save(run_id, checkpoint.clone());
                break;
            }

            checkpoint.next = stage.next();
            self.checkpoints.save(run_id, checkpoint.clone());
        }

        output.record = checkpoint.state.record.clone();
        output.stats.degraded_fields = output.fields.iter().filter(|f| f.degraded).count();
        output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        if let Some(cb) = &self.config.progress_callback {
            cb.on_run_complete(run_id, output.all_stages_succeeded());
        }

        output
    }

    /// Run one stage against the shared state.
    ///
    /// Returns `Err(description)` on stage failure; the caller owns the
    /// policy decision of what a failure means for the run.
    async fn execute_stage(
        &self,
        stage: Stage,
        document: &PathBuf,
        state: &mut crate::state::PipelineState,
        output: &mut RunOutput,
    ) -> Result<(), String> {
        match stage {
            Stage::Ingest => {
                let text =
                    ingest::ingest_document(document.clone(), Arc::clone(&self.page_texts))
                        .await
                        .map_err(|e| e.to_string())?;
                info!(
                    "Text processed successfully from document ({} chars)",
                    text.len()
                );
                state.document_text = Some(text);
                Ok(())
            }
            Stage::Extract => {
                // Null-check: ingest may have failed under the
                // continue-on-stage-failure policy.
                let Some(text) = &state.document_text else {
                    return Err("no document text available to extract from".into());
                };
                let (record, outcomes) = extract::extract_record(
                    &self.backend,
                    text.as_str(),
                    self.config.concurrency,
                    self.config.progress_callback.as_ref(),
                )
                .await;
                info!(
                    "Data extracted from text ({} fields, {} degraded)",
                    outcomes.len(),
                    outcomes.iter().filter(|o| o.degraded).count()
                );
                output.fields = outcomes;
                state.record = Some(record);
                Ok(())
            }
            Stage::Store => {
                let Some(record) = &state.record else {
                    return Err("no extracted record available to store".into());
                };
                self.sink.ensure_table().await.map_err(|e| e.to_string())?;
                self.sink.insert(record).await.map_err(|e| e.to_string())?;
                info!("Record stored in analytical table");
                Ok(())
            }
        }
    }
}

/// One-shot convenience: build a pipeline from `config` and drive a single
/// run against `document` with a generated run id.
///
/// # Errors
/// Returns `Err(PipelineError)` only for setup failures (invalid config,
/// unresolvable backend or sink). Stage failures are reported in the
/// returned [`RunOutput`].
pub async fn process(
    document: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<RunOutput, PipelineError> {
    let pipeline = Pipeline::new(config.clone())?;
    let run_id = format!("run-{}", Utc::now().timestamp_millis());
    Ok(pipeline.run(document, &run_id).await)
}

fn record_stage_duration(stats: &mut RunStats, stage: Stage, duration_ms: u64) {
    match stage {
        Stage::Ingest => stats.ingest_duration_ms = duration_ms,
        Stage::Extract => stats.extract_duration_ms = duration_ms,
        Stage::Store => stats.store_duration_ms = duration_ms,
    }
}

// ── Backend and sink resolution ──────────────────────────────────────────

/// Resolve the completion backend, from most-specific to least-specific.
///
/// The fallback chain lets library users and CLI users each set exactly as
/// much or as little as they need:
///
/// 1. **Pre-built backend** (`config.backend`) — the caller constructed it
///    entirely; used as-is. The test seam.
/// 2. **Named provider + model** (`config.provider_name`) — reads the
///    corresponding API key from the environment via the provider factory.
/// 3. **Environment pair** (`PAPER2ROW_LLM_PROVIDER` + `PAPER2ROW_MODEL`)
///    — provider and model chosen at the execution-environment level
///    (Makefile, CI). Checked before full auto-detection so the model
///    choice is honoured even when multiple API keys are present.
/// 4. **OpenAI key, then full auto-detection** — users with several
///    provider keys default to OpenAI unless they ask for another
///    provider; otherwise the factory scans all known key variables.
fn resolve_backend(config: &PipelineConfig) -> Result<Arc<dyn CompletionBackend>, PipelineError> {
    if let Some(backend) = &config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(name) = &config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_backend(config, name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("PAPER2ROW_LLM_PROVIDER"),
        std::env::var("PAPER2ROW_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_backend(config, &prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_backend(config, "openai", model);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(EdgequakeBackend::new(
        provider,
        config.temperature,
        config.max_tokens,
    )))
}

/// Instantiate a named provider and wrap it in the backend adapter.
fn create_backend(
    config: &PipelineConfig,
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn CompletionBackend>, PipelineError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(EdgequakeBackend::new(
        provider,
        config.temperature,
        config.max_tokens,
    )))
}

/// Resolve the record sink: a pre-built sink wins, else the BigQuery
/// coordinates must be complete.
fn resolve_sink(config: &PipelineConfig) -> Result<Arc<dyn RecordSink>, PipelineError> {
    if let Some(sink) = &config.sink {
        return Ok(Arc::clone(sink));
    }

    match (
        &config.project_id,
        &config.dataset_id,
        &config.table_id,
        &config.sink_token,
    ) {
        (Some(project), Some(dataset), Some(table), Some(token)) => {
            let mut sink = BigQuerySink::new(project, dataset, table, token);
            if let Some(base) = &config.sink_api_base {
                sink = sink.with_api_base(base);
            }
            Ok(Arc::new(sink))
        }
        _ => Err(PipelineError::SinkNotConfigured(
            "project, dataset, table, and token are all required".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompletionError, IngestionError};
    use crate::pipeline::store::MemorySink;
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            Ok(prompt.lines().next().unwrap_or("").to_string())
        }
    }

    struct PagesProvider(Vec<String>);

    impl PageTextProvider for PagesProvider {
        fn page_texts(
            &self,
            _path: &std::path::Path,
        ) -> Result<Vec<String>, IngestionError> {
            Ok(self.0.clone())
        }
    }

    fn temp_pdf() -> tempfile::NamedTempFile {
        tempfile::Builder::new().suffix(".pdf").tempfile().unwrap()
    }

    fn test_config(sink: Arc<dyn RecordSink>) -> PipelineConfig {
        PipelineConfig::builder()
            .backend(Arc::new(EchoBackend))
            .page_text_provider(Arc::new(PagesProvider(vec!["Title page\n".into()])))
            .sink(sink)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn full_run_inserts_record() {
        let sink = Arc::new(MemorySink::new());
        let pipeline = Pipeline::new(test_config(sink.clone())).unwrap();

        let output = pipeline.run(temp_pdf().path(), "run-ok").await;

        assert!(output.all_stages_succeeded());
        assert_eq!(output.stages.len(), 3);
        assert_eq!(sink.rows().len(), 1);
        assert!(output.record.is_some());
        assert_eq!(output.fields.len(), 8);
    }

    #[tokio::test]
    async fn sink_not_configured_is_a_setup_error() {
        let config = PipelineConfig::builder()
            .backend(Arc::new(EchoBackend))
            .build()
            .unwrap();
        let err = Pipeline::new(config).unwrap_err();
        assert!(matches!(err, PipelineError::SinkNotConfigured(_)));
    }

    #[tokio::test]
    async fn completed_run_is_a_noop_on_reinvoke() {
        let sink = Arc::new(MemorySink::new());
        let pipeline = Pipeline::new(test_config(sink.clone())).unwrap();
        let doc = temp_pdf();

        let first = pipeline.run(doc.path(), "run-twice").await;
        assert!(first.all_stages_succeeded());
        assert_eq!(sink.rows().len(), 1);

        let second = pipeline.run(doc.path(), "run-twice").await;
        assert!(second.stages.is_empty(), "no stage should re-execute");
        assert!(second.record.is_some(), "checkpointed record is reported");
        assert_eq!(sink.rows().len(), 1, "no duplicate insert");
    }

    #[tokio::test]
    async fn halted_run_resumes_from_failed_stage() {
        // Store fails; with continue-on-stage-failure disabled the run
        // halts at Store and the checkpoint still points there.
        let failing = Arc::new(MemorySink::failing("transient outage"));
        let mut config = test_config(failing);
        config.continue_on_stage_failure = false;
        let pipeline = Pipeline::new(config).unwrap();
        let doc = temp_pdf();

        let first = pipeline.run(doc.path(), "run-resume").await;
        assert!(!first.all_stages_succeeded());
        assert_eq!(first.stages.len(), 3);
        assert!(!first.stage(Stage::Store).unwrap().succeeded());

        // The pipeline's sink is fixed at construction, so re-driving the
        // same pipeline retries the store stage only — and fails again —
        // without re-running ingest or extract.
        let second = pipeline.run(doc.path(), "run-resume").await;
        assert_eq!(second.stages.len(), 1);
        assert_eq!(second.stages[0].stage, Stage::Store);
        assert!(second.record.is_some(), "record survived in the checkpoint");
    }
}
