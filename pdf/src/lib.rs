//! PDF extraction for arxivlens.
//!
//! [`PdfExtractor`] implements [`arxivlens_core::Extractor`]: it reads every page with `lopdf`,
//! cleans the text for indexing, and collects table rows and image references that are passed
//! to the answer generator without being embedded.
//!
//! ```rust,no_run
//! use arxivlens_core::Extractor;
//! use arxivlens_pdf::PdfExtractor;
//!
//! let extracted = PdfExtractor::new().extract("attention.pdf".as_ref())?;
//! println!("{} chars, {} table rows", extracted.text.len(), extracted.tables.len());
//! # Ok::<(), arxivlens_core::Error>(())
//! ```

mod error;
mod model;
mod parser;
mod text;

pub use error::{PdfError, Result};
pub use model::PdfExtractOptions;
pub use text::{CELL_SEPARATOR, clean_text, table_rows};

use std::path::Path;

use arxivlens_core::{ExtractedDocument, Extractor};

/// Extracts text, table rows and image references from PDF files.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
    options: PdfExtractOptions,
}

impl PdfExtractor {
    /// Creates an extractor with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an extractor with custom options.
    #[must_use]
    pub const fn with_options(options: PdfExtractOptions) -> Self {
        Self { options }
    }

    /// Returns the active options.
    #[must_use]
    pub const fn options(&self) -> &PdfExtractOptions {
        &self.options
    }

    /// Extracts the PDF at `path`.
    ///
    /// # Errors
    /// Returns [`PdfError::Parse`] for unreadable PDFs and [`PdfError::NoPages`] when the page
    /// range selects nothing.
    pub fn extract_path(&self, path: impl AsRef<Path>) -> Result<ExtractedDocument> {
        parser::parse_from_path(path.as_ref(), &self.options)
    }

    /// Extracts a PDF held in memory.
    ///
    /// # Errors
    /// Same as [`extract_path`](Self::extract_path).
    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractedDocument> {
        parser::parse_from_bytes(bytes, "memory", &self.options)
    }
}

impl Extractor for PdfExtractor {
    fn extract(&self, path: &Path) -> arxivlens_core::Result<ExtractedDocument> {
        Ok(self.extract_path(path)?)
    }
}
