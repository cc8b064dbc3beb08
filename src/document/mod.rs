//! Document loading - PDF and plain text sources.

use std::path::Path;

use anyhow::{Context, Result};

/// A loaded source document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Full extracted text.
    pub text: String,
    /// Where the text came from (display path).
    pub source: String,
    /// File name, when available.
    pub title: Option<String>,
}

/// Load a document from disk.
///
/// `.pdf` files go through pdf-extract; everything else is read as UTF-8
/// text.
pub fn load_document(path: &Path) -> Result<Document> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let text = match extension.as_deref() {
        Some("pdf") => extract_pdf_text(path)?,
        _ => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document: {:?}", path))?,
    };

    if text.trim().is_empty() {
        anyhow::bail!("Document is empty: {:?}", path);
    }

    let title = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string());

    Ok(Document {
        text,
        source: path.display().to_string(),
        title,
    })
}

/// Extract text from a PDF file.
fn extract_pdf_text(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        // Scanned documents come back with no text layer at all.
        tracing::warn!("No text extracted from PDF: {:?}", path);
    }

    Ok(text)
}

// ============================================================================
// Tests
// ============================================================================
