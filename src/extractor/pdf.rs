//! PDF text extraction (pdf-extract)

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// Extract `(page, text)` pairs, pages numbered from 1
///
/// Scanned PDFs without a text layer yield one empty page.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![(1, String::new())]);
    }

    Ok(split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect())
}

fn page_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*[-=]+\s*(?:Page\s*)?\d+\s*[-=]+\s*$").expect("valid page regex")
    })
}

/// Split on form feeds, then on `--- Page N ---` markers, else one page
fn split_pdf_pages(text: &str) -> Vec<String> {
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    let pages: Vec<String> = page_marker()
        .split(text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    vec![text.trim().to_string()]
}
