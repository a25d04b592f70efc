//! Pipeline stages for PDF-to-record extraction.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap an
//! external collaborator (text provider, completion backend, sink) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! ingest ──▶ reflow ──▶ extract ──▶ store
//! (pdf text)  (list fix)  (8 queries)  (table row)
//! ```
//!
//! 1. [`ingest`]  — validate the `.pdf` path, pull per-page text through the
//!    [`ingest::PageTextProvider`] seam (blocking work under
//!    `spawn_blocking`), aggregate pages with no separator
//! 2. [`reflow`]  — deterministic single-pass repair of line-broken list
//!    items; the only pure-text stage
//! 3. [`extract`] — one independent model query per field through the
//!    [`extract::CompletionBackend`] seam; degraded fields instead of
//!    propagated failures
//! 4. [`store`]   — idempotent table creation plus row insert through the
//!    [`store::RecordSink`] seam; the only stage with nothing downstream to
//!    degrade for

pub mod extract;
pub mod ingest;
pub mod reflow;
pub mod store;
