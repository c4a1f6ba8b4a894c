//! Vector Store - search trait and chunk types
//!
//! Chunks carry their document metadata (source, page, doc type) so a hit
//! can be cited without a second lookup.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Embedding dimension stored in the vector table
pub const EMBEDDING_DIMENSION: i32 = 768;

// ============================================================================
// Types
// ============================================================================

/// Chunk to store
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// Unique across the table, allocated after the current maximum
    pub chunk_id: i64,
    /// File name of the source document
    pub source: String,
    /// 1-based page number
    pub page: i32,
    pub doc_type: String,
    /// RFC3339 indexing time
    pub timestamp_indexed: String,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
}

/// Nearest-neighbor hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub source: String,
    pub page: i32,
    pub doc_type: String,
    pub timestamp_indexed: String,
    pub chunk_text: String,
    /// L2 distance, lower is better
    pub score: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a batch of chunks
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// Nearest chunks, optionally restricted to one document type
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        doc_type: Option<&str>,
    ) -> Result<Vec<SearchResult>>;

    /// All chunks of sources whose name contains `needle`
    async fn find_by_source(&self, needle: &str, limit: usize) -> Result<Vec<SearchResult>>;

    /// Remove every chunk of a source
    async fn delete_by_source(&self, source: &str) -> Result<usize>;

    /// Number of stored chunks
    async fn count(&self) -> Result<usize>;

    /// Highest stored chunk id, `None` when empty
    async fn max_chunk_id(&self) -> Result<Option<i64>>;

    /// Distinct document types
    async fn doc_types(&self) -> Result<Vec<String>>;
}

/// Quote a string literal for a LanceDB filter expression
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quoted `%needle%` pattern for a LIKE filter
pub fn like_pattern(needle: &str) -> String {
    let escaped = needle.replace('\'', "''");
    format!("'%{}%'", escaped)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(sql_literal("procedure"), "'procedure'");
        assert_eq!(sql_literal("l'usine"), "'l''usine'");
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("PROC"), "'%PROC%'");
        assert_eq!(like_pattern("d'x"), "'%d''x%'");
    }
}
