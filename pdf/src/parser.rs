use std::path::Path;

use arxivlens_core::ExtractedDocument;
use lopdf::Document;
use tracing::{debug, warn};

use crate::error::{PdfError, Result};
use crate::model::PdfExtractOptions;
use crate::text::{clean_text, table_rows};

pub(crate) fn parse_from_path(path: &Path, options: &PdfExtractOptions) -> Result<ExtractedDocument> {
    let doc = Document::load(path).map_err(|e| PdfError::Parse(e.to_string()))?;
    parse_document(&doc, &path.display().to_string(), options)
}

pub(crate) fn parse_from_bytes(
    bytes: &[u8],
    source_name: &str,
    options: &PdfExtractOptions,
) -> Result<ExtractedDocument> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfError::Parse(e.to_string()))?;
    parse_document(&doc, source_name, options)
}

fn parse_document(
    doc: &Document,
    source: &str,
    options: &PdfExtractOptions,
) -> Result<ExtractedDocument> {
    // Page numbers are sorted because `get_pages` is a BTreeMap keyed by number.
    let pages = doc.get_pages();
    let selected: Vec<(usize, u32, lopdf::ObjectId)> = pages
        .iter()
        .enumerate()
        .map(|(idx, (number, id))| (idx + 1, *number, *id))
        .filter(|(index, _, _)| {
            options
                .page_range
                .as_ref()
                .is_none_or(|range| range.contains(index))
        })
        .collect();
    if selected.is_empty() {
        return Err(PdfError::NoPages {
            page_count: pages.len(),
        });
    }

    let mut raw = String::new();
    let mut tables = Vec::new();
    let mut images = Vec::new();

    for (index, number, id) in selected {
        let page_text = match doc.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                warn!(source, page = index, error = %e, "failed to extract page text");
                String::new()
            }
        };

        if options.include_tables {
            tables.extend(table_rows(&page_text));
        }
        if options.include_images {
            images.extend(page_images(doc, id, index));
        }

        raw.push_str(&page_text);
        raw.push('\n');
    }

    let text = clean_text(&raw);
    debug!(
        source,
        chars = text.chars().count(),
        tables = tables.len(),
        images = images.len(),
        "extracted pdf"
    );
    Ok(ExtractedDocument {
        text,
        tables,
        images,
    })
}

fn page_images(doc: &Document, page: lopdf::ObjectId, index: usize) -> Vec<String> {
    match doc.get_page_images(page) {
        Ok(found) => found
            .iter()
            .map(|image| {
                format!(
                    "page {index}: image {} {} ({}x{})",
                    image.id.0, image.id.1, image.width, image.height
                )
            })
            .collect(),
        Err(e) => {
            debug!(page = index, error = %e, "no images read from page");
            Vec::new()
        }
    }
}
