//! Ingestion
//!
//! - seed: simulated operational database
//! - complete: GeoNuclearData fleet with catalog-driven operations
//! - docs: demo documents and public PDF downloads
//! - build_vectorstore: collect, extract, categorize and index documents

pub mod complete;
pub mod docs;
pub mod seed;

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::collector::FileCollector;
use crate::config::Settings;
use crate::extractor::ContentExtractor;
use crate::knowledge::{categorize_doc, DocumentRetriever};

pub use complete::{
    build_complete_dataset, download_geonuclear_data, download_nrc_documents,
    load_geonuclear_file, parse_geonuclear, write_complete_dataset, CompleteOptions,
    CompleteSummary, FleetOrigin, FleetReactor, EQUIPMENT_CATALOG, NRC_DOCUMENTS,
};
pub use docs::{
    create_demo_documents, download_documents, download_public_documents, setup_document_corpus, CorpusSummary,
    DemoDocument, PublicDocument, DEMO_DOCUMENTS, PUBLIC_DOCUMENTS,
};
pub use seed::{
    format_thousands, get_db_summary, seed_database, SeedSummary, DEFAULT_SEED, DEFAULT_YEARS,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildSummary {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Index the configured docs directory into the knowledge base
pub async fn build_vectorstore(settings: &Settings, force: bool) -> Result<BuildSummary> {
    settings.ensure_dirs()?;
    let retriever = DocumentRetriever::open(settings).await?;
    index_directory(&retriever, &settings.docs_dir, force).await
}

/// Index every supported file under `dir`
///
/// An empty directory is first filled with the demo documents.
pub async fn index_directory(
    retriever: &DocumentRetriever,
    dir: &Path,
    force: bool,
) -> Result<BuildSummary> {
    let collector = FileCollector::with_defaults();
    let mut files = if dir.exists() {
        collector.collect_directory(dir)?
    } else {
        Vec::new()
    };

    if files.is_empty() {
        tracing::warn!("No documents found in {:?}, creating demo documents", dir);
        create_demo_documents(dir)?;
        files = collector.collect_directory(dir)?;
    }

    let mut summary = BuildSummary::default();

    for file in &files {
        let source = file.file_name();
        let pages = match ContentExtractor::extract(&file.path, file.file_type).await {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!("Failed to load {}: {:#}", source, e);
                summary.failed += 1;
                continue;
            }
        };

        let pages: Vec<(i32, String)> = pages.into_iter().map(|p| (p.page, p.text)).collect();
        let doc_type = categorize_doc(&source);

        match retriever.index_source(&source, doc_type, &pages, force).await {
            Ok(outcome) => {
                summary.documents += 1;
                summary.pages += outcome.pages;
                summary.chunks += outcome.chunks;
                if outcome.skipped {
                    summary.skipped += 1;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to index {}: {:#}", source, e);
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Knowledge base built: {} documents, {} chunks ({} unchanged, {} failed)",
        summary.documents,
        summary.chunks,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedding;
    use crate::knowledge::{default_chunker, KnowledgeStore, LanceVectorStore};
    use std::sync::Arc;
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

    #[tokio::test]
    async fn test_empty_directory_gets_demo_documents() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        let retriever = create_test_retriever(&dir).await;

        let summary = index_directory(&retriever, &docs, false).await.unwrap();
        assert_eq!(summary.documents, 4);
        assert_eq!(summary.failed, 0);
        assert!(summary.chunks > 4);
        assert_eq!(retriever.vector_count().await.unwrap(), summary.chunks);

        let mut types = retriever.all_doc_types().await.unwrap();
        types.sort();
        assert_eq!(types, vec!["procedure", "rapport", "safety", "specification"]);

        let hits = retriever
            .search_technical_docs("critères d'acceptation vibrations pompes", 3)
            .await;
        assert!(!hits[0].is_error);
    }

    #[tokio::test]
    async fn test_rebuild_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        let retriever = create_test_retriever(&dir).await;

        let first = index_directory(&retriever, &docs, false).await.unwrap();
        let second = index_directory(&retriever, &docs, false).await.unwrap();
        assert_eq!(second.skipped, 4);
        assert_eq!(second.chunks, 0);
        assert_eq!(retriever.vector_count().await.unwrap(), first.chunks);
    }
}
