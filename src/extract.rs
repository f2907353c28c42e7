//! Document loading and text extraction.
//!
//! Ingestion sees documents as a path on disk; this module turns that path
//! into plain UTF-8 text. PDF bytes go through `pdf-extract`; anything else
//! is read as plain text. Both failure modes (unreadable path, unparsable
//! content) surface as [`RagError::DocumentLoad`], which is fatal to the
//! ingestion invocation — a broken document is not worth retrying.

use std::path::Path;

use crate::error::{RagError, Result};

/// Read the document at `path` and return its extracted text.
pub fn load_document(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| RagError::DocumentLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if is_pdf(&bytes, path) {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| RagError::DocumentLoad {
            path: path.display().to_string(),
            reason: format!("PDF extraction failed: {}", e),
        })
    } else {
        String::from_utf8(bytes).map_err(|e| RagError::DocumentLoad {
            path: path.display().to_string(),
            reason: format!("not valid UTF-8 text: {}", e),
        })
    }
}

/// PDF detection by magic bytes, with the extension as a fallback for files
/// whose header is preceded by junk.
fn is_pdf(bytes: &[u8], path: &Path) -> bool {
    bytes.starts_with(b"%PDF-")
        || path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
}
