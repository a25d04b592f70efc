//! Ingestion: resolve the document path, pull per-page text, aggregate and
//! reflow it into a [`DocumentText`].
//!
//! ## Why a provider trait?
//!
//! PDF text extraction is an external collaborator, not part of the core:
//! the pipeline only needs "give me the ordered per-page text of this
//! document". [`PageTextProvider`] is that seam. The default
//! [`PdfTextProvider`] is backed by the `pdf-extract` crate; tests inject
//! scripted providers to exercise aggregation and failure wrapping without
//! real PDFs on disk.
//!
//! Extraction is CPU-bound and blocking, so the async entry point pushes
//! the provider call onto `spawn_blocking` rather than stalling the
//! executor.

use crate::error::IngestionError;
use crate::pipeline::reflow::reflow;
use crate::state::DocumentText;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Ordered per-page text for one document.
///
/// Implementations must return pages in document order and wrap any
/// open/decode failure in [`IngestionError::ExtractionFailed`].
pub trait PageTextProvider: Send + Sync {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, IngestionError>;
}

/// Default provider backed by `pdf-extract`.
pub struct PdfTextProvider;

impl PageTextProvider for PdfTextProvider {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, IngestionError> {
        pdf_extract::extract_text_by_pages(path).map_err(|e| IngestionError::ExtractionFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

/// Validate the input path: `.pdf` extension (policy check, not a content
/// sniff), existence, and read permission.
pub fn validate_pdf_path(path: &Path) -> Result<(), IngestionError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "pdf");
    if !is_pdf {
        return Err(IngestionError::NotAPdf {
            path: path.to_path_buf(),
        });
    }

    if !path.exists() {
        return Err(IngestionError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(IngestionError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(IngestionError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Concatenate per-page text in page order, with no separator inserted.
pub fn aggregate_pages(pages: &[String]) -> String {
    pages.concat()
}

/// Ingest one document: validate, extract per-page text, aggregate, reflow.
///
/// This is the whole ingest stage minus the error-swallowing policy — the
/// orchestrator decides what a returned `Err` means for the run.
pub async fn ingest_document(
    path: PathBuf,
    provider: Arc<dyn PageTextProvider>,
) -> Result<DocumentText, IngestionError> {
    validate_pdf_path(&path)?;

    let pages = {
        let blocking_path = path.clone();
        tokio::task::spawn_blocking(move || provider.page_texts(&blocking_path))
            .await
            .map_err(|e| IngestionError::ExtractionFailed {
                path: path.clone(),
                detail: format!("extraction task failed: {e}"),
            })??
    };

    debug!("Extracted {} pages from {}", pages.len(), path.display());

    let aggregated = aggregate_pages(&pages);
    Ok(DocumentText::new(reflow(&aggregated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct ScriptedProvider(Vec<String>);

    impl PageTextProvider for ScriptedProvider {
        fn page_texts(&self, _path: &Path) -> Result<Vec<String>, IngestionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingProvider;

    impl PageTextProvider for FailingProvider {
        fn page_texts(&self, path: &Path) -> Result<Vec<String>, IngestionError> {
            Err(IngestionError::ExtractionFailed {
                path: path.to_path_buf(),
                detail: "corrupt xref table".into(),
            })
        }
    }

    fn temp_pdf() -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .expect("tempfile");
        f.write_all(b"%PDF-1.4 stub").expect("write");
        f
    }

    #[test]
    fn rejects_non_pdf_extension() {
        let err = validate_pdf_path(Path::new("paper.txt")).unwrap_err();
        assert!(matches!(err, IngestionError::NotAPdf { .. }));
    }

    #[test]
    fn rejects_extensionless_path() {
        let err = validate_pdf_path(Path::new("paper")).unwrap_err();
        assert!(matches!(err, IngestionError::NotAPdf { .. }));
    }

    #[test]
    fn rejects_missing_file() {
        let err = validate_pdf_path(Path::new("/no/such/paper.pdf")).unwrap_err();
        assert!(matches!(err, IngestionError::FileNotFound { .. }));
    }

    #[test]
    fn accepts_existing_pdf_path() {
        let f = temp_pdf();
        assert!(validate_pdf_path(f.path()).is_ok());
    }

    #[test]
    fn pages_concatenate_without_separator() {
        let pages = vec!["end of page one".to_string(), "start of page two".to_string()];
        assert_eq!(aggregate_pages(&pages), "end of page onestart of page two");
        assert_eq!(aggregate_pages(&[]), "");
    }

    #[tokio::test]
    async fn ingest_aggregates_and_reflows() {
        let f = temp_pdf();
        let provider = Arc::new(ScriptedProvider(vec![
            "Intro\n1. finding A\n".to_string(),
            "wrapped tail\n2. finding B\n".to_string(),
        ]));
        let text = ingest_document(f.path().to_path_buf(), provider)
            .await
            .expect("ingest should succeed");
        // Page texts are joined with no separator, then list items reflow:
        // the item opened on page one absorbs the wrap from page two.
        assert_eq!(text.as_str(), "Intro\n1. finding A wrapped tail\n2. finding B");
    }

    #[tokio::test]
    async fn ingest_wraps_provider_failure() {
        let f = temp_pdf();
        let err = ingest_document(f.path().to_path_buf(), Arc::new(FailingProvider))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::ExtractionFailed { .. }));
        assert!(err.to_string().contains("corrupt xref table"));
    }

    #[tokio::test]
    async fn ingest_rejects_bad_extension_before_touching_provider() {
        let err = ingest_document(PathBuf::from("notes.md"), Arc::new(FailingProvider))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::NotAPdf { .. }));
    }
}
