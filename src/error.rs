//! Error types for the paper2row library.
//!
//! The taxonomy mirrors the three pipeline stages plus setup:
//!
//! * [`PipelineError`] — **Fatal**: the pipeline cannot be constructed at
//!   all (invalid configuration, no LLM backend, no sink coordinates).
//!   Returned as `Err(PipelineError)` from [`crate::run::Pipeline::new`].
//!
//! * [`IngestionError`] — the document could not be opened, decoded, or was
//!   not a PDF. Caught by the ingest stage, logged, and converted into an
//!   empty `document_text` rather than propagated (the
//!   `continue-on-stage-failure` policy).
//!
//! * [`CompletionError`] — a single field's model call failed. Degrades
//!   that one field to an error-description string; the other seven fields
//!   and the run itself are unaffected.
//!
//! * [`SinkError`] — the storage insert failed. Fatal to the run's output
//!   but still swallowed after logging: [`crate::run::Pipeline::run`] never
//!   returns `Err` for stage failures. Callers inspect
//!   [`crate::output::RunOutput`] instead.
//!
//! The separation lets callers decide their own tolerance: treat a degraded
//! record as acceptable, or check the per-stage reports and re-drive the run.

use std::path::PathBuf;
use thiserror::Error;

/// Setup-level errors — the only errors that escape the library's public
/// entry points. Stage-level failures use the three enums below and are
/// reported through [`crate::output::RunOutput`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// No record sink could be resolved from the configuration.
    #[error("No record sink configured: {0}\nSet project/dataset/table coordinates or supply a sink programmatically.")]
    SinkNotConfigured(String),
}

/// Document ingestion failures (bad path, unreadable or undecodable PDF).
///
/// Never propagated out of a run: the ingest stage logs these and leaves
/// `document_text` unset so downstream stages can null-check and degrade.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The path does not carry a `.pdf` extension. Policy check only —
    /// the file content is never sniffed.
    #[error("Not a PDF file: '{path}'\nThe input path must end in .pdf.")]
    NotAPdf { path: PathBuf },

    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The PDF was opened but its text could not be decoded.
    #[error("Failed to extract text from '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },
}

/// A per-field model-call failure (quota, transport, or unexpected error).
///
/// Stored in [`crate::output::FieldOutcome`] next to the degraded value;
/// the field's recorded value becomes an error-description string.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// The completion API rejected or failed the request.
    #[error("Model call failed: {message}")]
    Api { message: String },
}

/// Storage failures from the analytical sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Idempotent table creation failed for a reason other than
    /// "already exists".
    #[error("Failed to create table '{table}': {detail}")]
    TableCreate { table: String, detail: String },

    /// The row insert was rejected.
    #[error("Failed to insert row into '{table}': {detail}")]
    Insert { table: String, detail: String },

    /// The sink endpoint could not be reached.
    #[error("Sink transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display() {
        let e = IngestionError::NotAPdf {
            path: PathBuf::from("notes.txt"),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
        assert!(msg.contains(".pdf"));
    }

    #[test]
    fn completion_error_display() {
        let e = CompletionError::Api {
            message: "quota exceeded".into(),
        };
        assert!(e.to_string().contains("quota exceeded"));
    }

    #[test]
    fn sink_insert_display() {
        let e = SinkError::Insert {
            table: "papers".into(),
            detail: "HTTP 403".into(),
        };
        assert!(e.to_string().contains("papers"));
        assert!(e.to_string().contains("HTTP 403"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = PipelineError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "set OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }
}
