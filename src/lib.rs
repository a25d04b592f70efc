//! # paper2row
//!
//! Extract bibliographic and semantic fields from scientific-paper PDFs
//! with an LLM and store each paper as one row of an analytical table.
//!
//! ## Why this crate?
//!
//! Research teams accumulate folders of paper PDFs faster than anyone can
//! catalogue them. This crate turns each PDF into a structured row — title,
//! authors, publication date, abstract, key findings, methodology, summary,
//! keywords — by asking a language model one focused question per field,
//! then appends the row to a BigQuery table where it can be queried,
//! joined, and charted like any other dataset.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Ingest   validate the path, pull per-page text (spawn_blocking),
//!  │              aggregate pages, repair line-broken list items
//!  ├─ 2. Extract  eight independent model queries, one per field;
//!  │              failed fields degrade instead of aborting
//!  └─ 3. Store    create-if-absent table, insert one row
//! ```
//!
//! The three stages form a fixed sequential state machine. A failed stage
//! is logged and — under the default continue-on-stage-failure policy —
//! the run still advances, producing a degraded row rather than nothing.
//! Runs are keyed by id and checkpointed, so a halted run can be
//! re-invoked and resumes from the stage that failed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper2row::{process, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = PipelineConfig::builder()
//!         .project_id("my-project")
//!         .dataset_id("papers")
//!         .table_id("extracted")
//!         .sink_token(std::env::var("BIGQUERY_TOKEN")?)
//!         .build()?;
//!     let output = process("paper.pdf", &config).await?;
//!     if let Some(record) = &output.record {
//!         println!("{}", record.title);
//!     }
//!     eprintln!("degraded fields: {}", output.stats.degraded_fields);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper2row` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! paper2row = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod state;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{CompletionError, IngestionError, PipelineError, SinkError};
pub use output::{
    ExtractedRecord, ExtractionField, FieldOutcome, RunOutput, RunStats, StageReport, StageStatus,
};
pub use pipeline::extract::{CompletionBackend, EdgequakeBackend};
pub use pipeline::ingest::{PageTextProvider, PdfTextProvider};
pub use pipeline::reflow::reflow;
pub use pipeline::store::{BigQuerySink, MemorySink, RecordSink};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use run::{process, Pipeline};
pub use state::{Checkpoint, DocumentText, MemoryCheckpointer, PipelineState, Stage};
