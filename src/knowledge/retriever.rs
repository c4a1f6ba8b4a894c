//! Document Retriever
//!
//! Indexing and semantic search over the technical document corpus.
//!
//! ## Flow
//! 1. Pages are chunked, embedded and written to LanceDB
//! 2. The SQLite registry remembers each page's hash for incremental runs
//! 3. Questions are embedded and matched by L2 distance (lower is better)

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::category::DEFAULT_DOC_TYPES;
use super::chunker::{default_chunker, Chunker};
use super::lance::LanceVectorStore;
use super::store::{KnowledgeStore, NewDocument, StoreStats};
use super::vector::{SearchResult, VectorEntry, VectorStore};
use crate::config::Settings;
use crate::embedding::{create_embedder, EmbeddingProvider};

/// Preview length for document metadata
const PREVIEW_CHARS: usize = 200;

/// Chunk cap when collecting a document's chunks
const MAX_DOC_CHUNKS: usize = 10_000;

// ============================================================================
// Types
// ============================================================================

/// Retrieved passage handed to the doc agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub page: i32,
    pub doc_type: String,
    /// L2 distance, lower is better
    pub score: f32,
    /// Set for placeholder chunks (uninitialized store, search failure)
    #[serde(default)]
    pub is_error: bool,
}

impl RetrievedChunk {
    fn system(content: impl Into<String>, source: &str) -> Self {
        Self {
            content: content.into(),
            source: source.to_string(),
            page: 0,
            doc_type: "system".to_string(),
            score: 0.0,
            is_error: true,
        }
    }
}

impl From<SearchResult> for RetrievedChunk {
    fn from(r: SearchResult) -> Self {
        Self {
            content: r.chunk_text,
            source: r.source,
            page: r.page,
            doc_type: r.doc_type,
            score: r.score,
            is_error: false,
        }
    }
}

/// Metadata for one indexed document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMetadata {
    pub source: String,
    pub page: i32,
    pub doc_type: String,
    pub timestamp_indexed: String,
    pub chunk_count: usize,
    pub preview: String,
}

/// Outcome of indexing one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOutcome {
    pub pages: usize,
    pub chunks: usize,
    pub skipped: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrieverStats {
    pub vector_count: usize,
    pub registry: StoreStats,
    pub embedder: String,
}

// ============================================================================
// DocumentRetriever
// ============================================================================

pub struct DocumentRetriever {
    store: KnowledgeStore,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Box<dyn Chunker>,
    next_chunk_id: AtomicI64,
}

impl DocumentRetriever {
    /// Assemble from parts
    pub async fn new(
        store: KnowledgeStore,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: Box<dyn Chunker>,
    ) -> Result<Self> {
        let next = vectors.max_chunk_id().await?.map_or(0, |id| id + 1);
        Ok(Self {
            store,
            vectors,
            embedder,
            chunker,
            next_chunk_id: AtomicI64::new(next),
        })
    }

    /// Open the registry, LanceDB and the configured embedder
    pub async fn open(settings: &Settings) -> Result<Self> {
        let store = KnowledgeStore::open(&settings.knowledge_db)?;
        let vectors = Arc::new(LanceVectorStore::open(&settings.vector_dir).await?);
        let embedder = create_embedder()?;
        Self::new(store, vectors, embedder, default_chunker()).await
    }

    // ------------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------------

    /// Index every page of one source document
    ///
    /// Skipped when the registry holds exactly these pages with matching
    /// hashes, unless `force`. Otherwise previous chunks of the source are
    /// replaced.
    pub async fn index_source(
        &self,
        source: &str,
        doc_type: &str,
        pages: &[(i32, String)],
        force: bool,
    ) -> Result<IndexOutcome> {
        if !force && !pages.is_empty() {
            let mut unchanged = self.store.page_count(source)? == pages.len();
            if unchanged {
                for (page, text) in pages {
                    if !self.store.is_unchanged(source, *page, text)? {
                        unchanged = false;
                        break;
                    }
                }
            }
            if unchanged {
                tracing::debug!("Skipping unchanged {}", source);
                return Ok(IndexOutcome {
                    pages: pages.len(),
                    chunks: 0,
                    skipped: true,
                });
            }
        }

        self.vectors.delete_by_source(source).await?;
        self.store.delete_source(source)?;

        let timestamp = Utc::now().to_rfc3339();
        let mut total_chunks = 0;

        for (page, text) in pages {
            let chunks = self.chunker.chunk(text);
            if !chunks.is_empty() {
                let embeddings = self
                    .embedder
                    .embed_batch(&chunks)
                    .await
                    .with_context(|| format!("Failed to embed {} p.{}", source, page))?;

                let entries: Vec<VectorEntry> = chunks
                    .iter()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| VectorEntry {
                        chunk_id: self.next_chunk_id.fetch_add(1, Ordering::SeqCst),
                        source: source.to_string(),
                        page: *page,
                        doc_type: doc_type.to_string(),
                        timestamp_indexed: timestamp.clone(),
                        chunk_text: chunk.clone(),
                        embedding,
                    })
                    .collect();

                self.vectors.insert_batch(&entries).await?;
            }

            self.store.upsert_document(&NewDocument {
                source: source.to_string(),
                page: *page,
                doc_type: doc_type.to_string(),
                content: text.clone(),
                chunk_count: chunks.len(),
            })?;
            total_chunks += chunks.len();
        }

        tracing::info!(
            "Indexed {} ({}, {} pages, {} chunks)",
            source,
            doc_type,
            pages.len(),
            total_chunks
        );

        Ok(IndexOutcome {
            pages: pages.len(),
            chunks: total_chunks,
            skipped: false,
        })
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    /// Raw nearest-neighbour search
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        doc_type: Option<&str>,
    ) -> Result<Vec<RetrievedChunk>> {
        let embedding = self.embedder.embed(query).await?;
        let results = self.vectors.search(&embedding, k, doc_type).await?;
        Ok(results.into_iter().map(RetrievedChunk::from).collect())
    }

    /// Search for the doc agent
    ///
    /// Never fails: an empty knowledge base or a search error yields a
    /// single placeholder chunk flagged `is_error`.
    pub async fn search_technical_docs(&self, query: &str, k: usize) -> Vec<RetrievedChunk> {
        match self.vectors.count().await {
            Ok(0) => {
                return vec![RetrievedChunk::system(
                    "Base de connaissances non initialisée. Veuillez charger les documents.",
                    "system",
                )]
            }
            Ok(_) => {}
            Err(e) => return vec![RetrievedChunk::system(format!("Erreur: {}", e), "error")],
        }

        match self.search(query, k, None).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("Document search failed: {}", e);
                vec![RetrievedChunk::system(format!("Erreur: {}", e), "error")]
            }
        }
    }

    /// Search restricted to one document type, unfiltered on failure
    pub async fn filter_by_doc_type(
        &self,
        query: &str,
        doc_type: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        match self.search(query, k, Some(doc_type)).await {
            Ok(chunks) => Ok(chunks),
            Err(e) => {
                tracing::warn!("Filtered search failed ({}), retrying unfiltered", e);
                self.search(query, k, None).await
            }
        }
    }

    /// Metadata of the first document whose name contains `doc_id`
    pub async fn get_doc_metadata(&self, doc_id: &str) -> Result<DocMetadata> {
        let chunks = self.vectors.find_by_source(doc_id, MAX_DOC_CHUNKS).await?;
        let first = chunks
            .first()
            .ok_or_else(|| anyhow::anyhow!("Document not found: {}", doc_id))?;

        let chunk_count = chunks.iter().filter(|c| c.source == first.source).count();

        Ok(DocMetadata {
            source: first.source.clone(),
            page: first.page,
            doc_type: first.doc_type.clone(),
            timestamp_indexed: first.timestamp_indexed.clone(),
            chunk_count,
            preview: preview(&first.chunk_text, PREVIEW_CHARS),
        })
    }

    /// Distinct document types, or the defaults when nothing is indexed
    pub async fn all_doc_types(&self) -> Result<Vec<String>> {
        let types = self.vectors.doc_types().await?;
        if types.is_empty() {
            return Ok(DEFAULT_DOC_TYPES.iter().map(|s| s.to_string()).collect());
        }
        Ok(types)
    }

    pub async fn vector_count(&self) -> Result<usize> {
        self.vectors.count().await
    }

    pub async fn stats(&self) -> Result<RetrieverStats> {
        Ok(RetrieverStats {
            vector_count: self.vectors.count().await?,
            registry: self.store.stats()?,
            embedder: self.embedder.name().to_string(),
        })
    }
}

/// First `max` characters, with `...` when cut
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedding;
    use tempfile::TempDir;

    async fn create_test_retriever(dir: &TempDir) -> DocumentRetriever {
        let store = KnowledgeStore::open(&dir.path().join("knowledge.db")).unwrap();
        let vectors = Arc::new(
            LanceVectorStore::open(&dir.path().join("vectors.lance"))
                .await
                .unwrap(),
        );
        DocumentRetriever::new(
            store,
            vectors,
            Arc::new(HashingEmbedding::new()),
            default_chunker(),
        )
        .await
        .unwrap()
    }

    fn pages(text: &str) -> Vec<(i32, String)> {
        vec![(1, text.to_string())]
    }

    #[tokio::test]
    async fn test_empty_store_returns_placeholder() {
        let dir = TempDir::new().unwrap();
        let retriever = create_test_retriever(&dir).await;

        let results = retriever.search_technical_docs("pompe", 5).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_error);
        assert_eq!(results[0].source, "system");
        assert_eq!(results[0].score, 0.0);
    }

    #[tokio::test]
    async fn test_index_and_search() {
        let dir = TempDir::new().unwrap();
        let retriever = create_test_retriever(&dir).await;

        retriever
            .index_source(
                "PROC-PUMP.txt",
                "procedure",
                &pages("Maintenance des pompes primaires: contrôle vibratoire trimestriel."),
                false,
            )
            .await
            .unwrap();
        retriever
            .index_source(
                "GUIDE-SURETE.txt",
                "safety",
                &pages("Défense en profondeur: cinq niveaux et trois barrières de confinement."),
                false,
            )
            .await
            .unwrap();

        let results = retriever
            .search_technical_docs("contrôle vibratoire des pompes", 2)
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "PROC-PUMP.txt");
        assert!(!results[0].is_error);
        assert!(results[0].score <= results[1].score);
    }

    #[tokio::test]
    async fn test_reindex_unchanged_is_skipped() {
        let dir = TempDir::new().unwrap();
        let retriever = create_test_retriever(&dir).await;
        let content = pages("Spécification des capteurs PT100.");

        let first = retriever
            .index_source("SPEC.txt", "specification", &content, false)
            .await
            .unwrap();
        let second = retriever
            .index_source("SPEC.txt", "specification", &content, false)
            .await
            .unwrap();
        let forced = retriever
            .index_source("SPEC.txt", "specification", &content, true)
            .await
            .unwrap();

        assert!(!first.skipped);
        assert!(second.skipped);
        assert!(!forced.skipped);
        assert_eq!(retriever.vector_count().await.unwrap(), first.chunks);
    }

    #[tokio::test]
    async fn test_removed_pages_are_reindexed() {
        let dir = TempDir::new().unwrap();
        let retriever = create_test_retriever(&dir).await;
        let first_page = (1, "Rapport d'inspection, partie une.".to_string());
        let two_pages = vec![
            first_page.clone(),
            (2, "Annexe obsolète sur les générateurs de vapeur.".to_string()),
        ];

        retriever
            .index_source("RAPPORT.pdf", "rapport", &two_pages, false)
            .await
            .unwrap();
        let shrunk = retriever
            .index_source("RAPPORT.pdf", "rapport", &[first_page], false)
            .await
            .unwrap();

        assert!(!shrunk.skipped);
        assert_eq!(retriever.vector_count().await.unwrap(), shrunk.chunks);
        let pages: Vec<i32> = retriever
            .search("générateurs de vapeur", 5, None)
            .await
            .unwrap()
            .iter()
            .map(|c| c.page)
            .collect();
        assert_eq!(pages, vec![1]);
        assert_eq!(retriever.stats().await.unwrap().registry.page_count, 1);
    }

    #[tokio::test]
    async fn test_chunk_ids_stay_unique_after_delete() {
        let dir = TempDir::new().unwrap();
        let retriever = create_test_retriever(&dir).await;
        for (source, text) in [("a.txt", "pompe"), ("b.txt", "vanne"), ("c.txt", "capteur")] {
            retriever
                .index_source(source, "procedure", &pages(text), false)
                .await
                .unwrap();
        }
        retriever.vectors.delete_by_source("a.txt").await.unwrap();
        drop(retriever);

        // A fresh retriever must allocate above the surviving ids
        let reopened = create_test_retriever(&dir).await;
        reopened
            .index_source("d.txt", "procedure", &pages("turbine"), false)
            .await
            .unwrap();

        let mut ids: Vec<i64> = reopened
            .vectors
            .find_by_source(".txt", 10)
            .await
            .unwrap()
            .iter()
            .map(|r| r.chunk_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_filter_by_doc_type() {
        let dir = TempDir::new().unwrap();
        let retriever = create_test_retriever(&dir).await;
        retriever
            .index_source("a.txt", "procedure", &pages("pompe primaire"), false)
            .await
            .unwrap();
        retriever
            .index_source("b.txt", "rapport", &pages("pompe primaire rapport"), false)
            .await
            .unwrap();

        let results = retriever
            .filter_by_doc_type("pompe", "rapport", 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "b.txt");
    }

    #[tokio::test]
    async fn test_doc_metadata_and_types() {
        let dir = TempDir::new().unwrap();
        let retriever = create_test_retriever(&dir).await;

        assert_eq!(
            retriever.all_doc_types().await.unwrap(),
            vec!["procedure", "rapport", "specification"]
        );

        let long_text = "Inspection semestrielle. ".repeat(20);
        retriever
            .index_source("RAPPORT-2024.txt", "rapport", &pages(&long_text), false)
            .await
            .unwrap();

        let meta = retriever.get_doc_metadata("RAPPORT").await.unwrap();
        assert_eq!(meta.source, "RAPPORT-2024.txt");
        assert_eq!(meta.doc_type, "rapport");
        assert_eq!(meta.chunk_count, 1);
        assert!(meta.preview.ends_with("..."));
        assert_eq!(meta.preview.chars().count(), PREVIEW_CHARS + 3);

        assert!(retriever.get_doc_metadata("missing").await.is_err());
        assert_eq!(retriever.all_doc_types().await.unwrap(), vec!["rapport"]);
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("court", 10), "court");
        assert_eq!(preview("éééé", 2), "éé...");
    }
}
