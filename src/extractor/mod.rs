//! Content extraction
//!
//! Turns collected files into numbered pages of text.
//! - Text/markdown: one page
//! - PDF: pdf-extract, split on page breaks

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

use crate::collector::FileType;

/// Page text with its 1-based number
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub page: i32,
    pub text: String,
}

pub struct ContentExtractor;

impl ContentExtractor {
    pub async fn extract(path: &Path, file_type: FileType) -> Result<Vec<ExtractedPage>> {
        match file_type {
            FileType::Text => Self::extract_text(path).await,
            FileType::Pdf => Self::extract_pdf(path).await,
        }
    }

    async fn extract_text(path: &Path) -> Result<Vec<ExtractedPage>> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        Ok(vec![ExtractedPage { page: 1, text }])
    }

    async fn extract_pdf(path: &Path) -> Result<Vec<ExtractedPage>> {
        // CPU bound
        let path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
            .await
            .context("PDF extraction task failed")??;

        Ok(pages
            .into_iter()
            .map(|(page, text)| ExtractedPage {
                page: page as i32,
                text,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_text_single_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "Procédure PROC-001").unwrap();

        let pages = ContentExtractor::extract(&path, FileType::Text).await.unwrap();
        assert_eq!(
            pages,
            vec![ExtractedPage {
                page: 1,
                text: "Procédure PROC-001".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_extract_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = ContentExtractor::extract(&dir.path().join("nope.txt"), FileType::Text).await;
        assert!(result.is_err());
    }
}
