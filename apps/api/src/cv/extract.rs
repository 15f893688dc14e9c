//! PDF text extraction.
//!
//! `AppState` holds an `Arc<dyn DocumentExtractor>`; production uses
//! `PdfTextExtractor` (backed by `pdf-extract`), tests substitute a fake.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to parse PDF: {0}")]
    Pdf(String),

    #[error("extraction task aborted: {0}")]
    Aborted(String),
}

/// Page texts in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub pages: Vec<String>,
}

impl ExtractedDocument {
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }

    /// Concatenates every page in order with no separator.
    pub fn text(&self) -> String {
        self.pages.concat()
    }
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, file: Bytes) -> Result<ExtractedDocument, ExtractionError>;
}

pub struct PdfTextExtractor;

#[async_trait]
impl DocumentExtractor for PdfTextExtractor {
    async fn extract(&self, file: Bytes) -> Result<ExtractedDocument, ExtractionError> {
        // pdf-extract is CPU-bound and panics on some malformed inputs; the
        // blocking pool turns a panic into a JoinError instead of killing the worker.
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&file)
                .map_err(|e| ExtractionError::Pdf(e.to_string()))
        })
        .await
        .map_err(|e| ExtractionError::Aborted(e.to_string()))??;

        debug!("Extracted {} page(s) from upload", pages.len());
        Ok(ExtractedDocument::new(pages))
    }
}
