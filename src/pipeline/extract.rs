//! Extraction: one independent single-shot model query per field, merged
//! into an [`ExtractedRecord`] after every query returns.
//!
//! ## The backend seam
//!
//! The pipeline treats the LLM as a black box: "ask the model about text T,
//! get a string back". [`CompletionBackend`] is that seam.
//! [`EdgequakeBackend`] adapts the `edgequake-llm` provider stack behind
//! it; tests inject scripted backends.
//!
//! ## Failure policy
//!
//! A failed field degrades to an error-description string instead of
//! propagating — a partial record with embedded error text is acceptable
//! output. This is deliberate: one quota blip on `keywords` should not
//! throw away seven good answers.
//!
//! ## Fan-out
//!
//! Fields share no state, so they can be queried concurrently. The
//! reference behaviour is sequential (`concurrency = 1`); higher values
//! fan out through `buffer_unordered`. Either way results are merged into
//! the record only after all queries return — there is no partial-merge.

use crate::error::CompletionError;
use crate::output::{ExtractedRecord, ExtractionField, FieldOutcome};
use crate::progress::ProgressCallback;
use crate::prompts;
use async_trait::async_trait;
use chrono::Utc;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Timestamp format of the sink's `utc_timestamp` column.
const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Black-box text-completion capability.
///
/// One call per field; the query is fully rendered before dispatch and the
/// returned string is collected verbatim (no parsing or validation).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// [`CompletionBackend`] adapter over an `edgequake-llm` provider.
///
/// Each query is a single stateless user message — no system prompt, no
/// conversation history shared between fields.
pub struct EdgequakeBackend {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl EdgequakeBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl CompletionBackend for EdgequakeBackend {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| CompletionError::Api {
                message: e.to_string(),
            })?;
        Ok(response.content.trim().to_string())
    }
}

/// Query one field. Never returns an error: a failed completion produces a
/// degraded outcome whose value is the error-description string that will
/// be stored in the record.
pub async fn extract_field(
    backend: &Arc<dyn CompletionBackend>,
    field: ExtractionField,
    text: &str,
) -> FieldOutcome {
    let start = Instant::now();
    let prompt = prompts::render(field, text);

    match backend.complete(&prompt).await {
        Ok(value) => {
            debug!("Field '{}' extracted ({} chars)", field, value.len());
            FieldOutcome {
                field,
                value,
                degraded: false,
                duration_ms: start.elapsed().as_millis() as u64,
                error: None,
            }
        }
        Err(e) => {
            warn!("Field '{}' degraded — {}", field, e);
            FieldOutcome {
                field,
                value: format!("An error occurred: {e}"),
                degraded: true,
                duration_ms: start.elapsed().as_millis() as u64,
                error: Some(e),
            }
        }
    }
}

/// Query all eight fields and assemble the record.
///
/// With `concurrency <= 1` the fields are queried strictly in
/// [`ExtractionField::ALL`] order; otherwise up to `concurrency` queries
/// run at once. The record is assembled only after the join barrier, and
/// the returned outcomes are always in field order regardless of
/// completion order.
pub async fn extract_record(
    backend: &Arc<dyn CompletionBackend>,
    text: &str,
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> (ExtractedRecord, Vec<FieldOutcome>) {
    let total = ExtractionField::ALL.len();

    let mut outcomes: Vec<FieldOutcome> = if concurrency <= 1 {
        let mut acc = Vec::with_capacity(total);
        for (i, field) in ExtractionField::ALL.into_iter().enumerate() {
            if let Some(cb) = progress {
                cb.on_field_start(field, i + 1, total);
            }
            let outcome = extract_field(backend, field, text).await;
            notify_field_done(progress, &outcome, total);
            acc.push(outcome);
        }
        acc
    } else {
        stream::iter(ExtractionField::ALL.into_iter().enumerate().map(
            |(i, field)| {
                let backend = Arc::clone(backend);
                async move {
                    if let Some(cb) = progress {
                        cb.on_field_start(field, i + 1, total);
                    }
                    let outcome = extract_field(&backend, field, text).await;
                    notify_field_done(progress, &outcome, total);
                    outcome
                }
            },
        ))
        .buffer_unordered(concurrency)
        .collect()
        .await
    };

    // Restore field order after unordered completion.
    outcomes.sort_by_key(|o| ExtractionField::ALL.iter().position(|f| *f == o.field));

    (assemble_record(&outcomes), outcomes)
}

fn notify_field_done(progress: Option<&ProgressCallback>, outcome: &FieldOutcome, total: usize) {
    if let Some(cb) = progress {
        if outcome.degraded {
            cb.on_field_error(outcome.field, total, &outcome.value);
        } else {
            cb.on_field_complete(outcome.field, total, outcome.value.len());
        }
    }
}

/// Build the record from per-field outcomes, stamping the UTC timestamp.
fn assemble_record(outcomes: &[FieldOutcome]) -> ExtractedRecord {
    let value_of = |field: ExtractionField| -> String {
        outcomes
            .iter()
            .find(|o| o.field == field)
            .map(|o| o.value.clone())
            .unwrap_or_default()
    };

    ExtractedRecord {
        utc_timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        title: value_of(ExtractionField::Title),
        authors: value_of(ExtractionField::Authors),
        publication_date: value_of(ExtractionField::PublicationDate),
        abstract_text: value_of(ExtractionField::Abstract),
        findings: value_of(ExtractionField::KeyFindings),
        methodology: value_of(ExtractionField::Methodology),
        summary: value_of(ExtractionField::Summary),
        keywords: split_keywords(&value_of(ExtractionField::Keywords)),
    }
}

/// Map the model's keyword string onto the schema's repeated column.
///
/// Schema mapping only, not output validation: the split is on commas and
/// newlines, entries are trimmed, empties dropped.
fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
