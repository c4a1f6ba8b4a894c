//! Knowledge module - technical document retrieval
//!
//! - SQLite: registry of indexed pages (hash, type, chunk count)
//! - LanceDB: chunk vectors with source/page/doc_type metadata
//! - Chunker: recursive character splitter
//! - Retriever: indexing + semantic search for the doc agent

mod category;
mod chunker;
mod lance;
mod retriever;
mod store;
mod vector;

// Re-exports
pub use category::{categorize_doc, DEFAULT_DOC_TYPE, DEFAULT_DOC_TYPES};
pub use chunker::{default_chunker, ChunkConfig, Chunker, RecursiveChunker, DEFAULT_SEPARATORS};
pub use lance::LanceVectorStore;
pub use retriever::{
    preview, DocMetadata, DocumentRetriever, IndexOutcome, RetrievedChunk, RetrieverStats,
};
pub use store::{content_hash, Document, KnowledgeStore, NewDocument, StoreStats};
pub use vector::{SearchResult, VectorEntry, VectorStore, EMBEDDING_DIMENSION};
