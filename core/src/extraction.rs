//! Boundary with the document extraction collaborator.
//!
//! The retrieval core only ever sees the main text blob. Tables and image references ride along
//! unindexed and are handed straight to the answer generator.

use std::path::Path;

/// Everything extracted from a single source document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Main text of the document, already cleaned.
    pub text: String,
    /// Table content, one row-joined blob per detected table row group.
    pub tables: Vec<String>,
    /// Image references (descriptions or paths), never embedded.
    pub images: Vec<String>,
}

impl ExtractedDocument {
    /// Creates an extraction result that carries only text.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when no usable text was extracted.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Pulls text, tables and image references out of a source file.
pub trait Extractor: Send + Sync {
    /// Extracts the document stored at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    fn extract(&self, path: &Path) -> crate::Result<ExtractedDocument>;
}
