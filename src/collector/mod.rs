//! Document collection
//!
//! Walks the documents directory for files the knowledge base can ingest.
//! Honors .gitignore and skips oversized files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

// ============================================================================
// File Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Plain text and markdown
    Text,
    Pdf,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" | "markdown" => Some(FileType::Text),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Collected File
// ============================================================================

#[derive(Debug, Clone)]
pub struct CollectedFile {
    pub path: PathBuf,
    pub file_type: FileType,
    /// Size in bytes
    pub size: u64,
}

impl CollectedFile {
    /// `None` for unsupported extensions and non-files
    pub fn from_path(path: PathBuf) -> Result<Option<Self>> {
        let file_type = match FileType::from_path(&path) {
            Some(ft) => ft,
            None => return Ok(None),
        };

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            file_type,
            size: metadata.len(),
        }))
    }

    /// File name used as the document source
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

// ============================================================================
// File Collector
// ============================================================================

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub respect_gitignore: bool,
    pub include_hidden: bool,
    /// Bytes, 0 = unlimited
    pub max_file_size: u64,
    pub skip_pdfs: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 50 * 1024 * 1024, // 50MB
            skip_pdfs: false,
        }
    }
}

pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// Recursively collect supported files, sorted by path
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        if !path.exists() {
            anyhow::bail!("Directory not found: {:?}", path);
        }
        if !path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", path);
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match CollectedFile::from_path(entry.path().to_path_buf()) {
                Ok(Some(file)) => {
                    if self.should_include(&file) {
                        files.push(file);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to collect file: {}", e),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!("Collected {} files from {:?}", files.len(), path);
        Ok(files)
    }

    fn should_include(&self, file: &CollectedFile) -> bool {
        if self.config.max_file_size > 0 && file.size > self.config.max_file_size {
            tracing::debug!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
            return false;
        }

        !(self.config.skip_pdfs && file.file_type == FileType::Pdf)
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Default)]
pub struct CollectionStats {
    pub total_files: usize,
    pub text_files: usize,
    pub pdf_files: usize,
    pub total_size: u64,
}

impl CollectionStats {
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;

            match file.file_type {
                FileType::Text => stats.text_files += 1,
                FileType::Pdf => stats.pdf_files += 1,
            }
        }

        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
