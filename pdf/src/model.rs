use std::ops::RangeInclusive;

/// Runtime options for PDF extraction.
#[derive(Debug, Clone)]
pub struct PdfExtractOptions {
    /// Optional inclusive 1-based page range.
    pub page_range: Option<RangeInclusive<usize>>,
    /// Collect `" | "`-joined rows from tabular lines.
    pub include_tables: bool,
    /// Collect references to embedded images.
    pub include_images: bool,
}

impl Default for PdfExtractOptions {
    fn default() -> Self {
        Self {
            page_range: None,
            include_tables: true,
            include_images: true,
        }
    }
}

impl PdfExtractOptions {
    /// Restricts extraction to an inclusive 1-based page range.
    #[must_use]
    pub const fn page_range(mut self, range: RangeInclusive<usize>) -> Self {
        self.page_range = Some(range);
        self
    }

    /// Enables or disables table row collection.
    #[must_use]
    pub const fn include_tables(mut self, enabled: bool) -> Self {
        self.include_tables = enabled;
        self
    }

    /// Enables or disables image reference collection.
    #[must_use]
    pub const fn include_images(mut self, enabled: bool) -> Self {
        self.include_images = enabled;
        self
    }
}
