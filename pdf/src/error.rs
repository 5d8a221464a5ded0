use thiserror::Error;

/// Errors emitted while extracting a PDF.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The input bytes do not decode as a valid PDF structure.
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    /// The source PDF could not be read from the filesystem.
    #[error("failed to read PDF: {0}")]
    Io(#[from] std::io::Error),
    /// The document has no pages in the selected range.
    #[error("no pages selected (document has {page_count})")]
    NoPages {
        /// Total number of pages in the document.
        page_count: usize,
    },
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, PdfError>;
