//! LanceDB Vector Store
//!
//! ANN search over document chunks. Metadata columns (source, page,
//! doc_type, timestamp) live next to the embedding so filters run inside
//! the query.
//! ref: https://lancedb.github.io/lancedb/

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase, Select};

use super::vector::{
    like_pattern, sql_literal, SearchResult, VectorEntry, VectorStore, EMBEDDING_DIMENSION,
};

const TABLE_NAME: &str = "chunks";

// ============================================================================
// LanceVectorStore
// ============================================================================

pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// Open (or create) a `.lance` directory
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db })
    }

    fn create_schema() -> Schema {
        Schema::new(vec![
            Field::new("chunk_id", DataType::Int64, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::Int32, false),
            Field::new("doc_type", DataType::Utf8, false),
            Field::new("timestamp_indexed", DataType::Utf8, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ])
    }

    fn entries_to_batch(entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        if let Some(bad) = entries
            .iter()
            .find(|e| e.embedding.len() != EMBEDDING_DIMENSION as usize)
        {
            anyhow::bail!(
                "Embedding dimension mismatch for {}: got {}, expected {}",
                bad.source,
                bad.embedding.len(),
                EMBEDDING_DIMENSION
            );
        }

        let chunk_ids: Vec<i64> = entries.iter().map(|e| e.chunk_id).collect();
        let sources: Vec<&str> = entries.iter().map(|e| e.source.as_str()).collect();
        let pages: Vec<i32> = entries.iter().map(|e| e.page).collect();
        let doc_types: Vec<&str> = entries.iter().map(|e| e.doc_type.as_str()).collect();
        let timestamps: Vec<&str> = entries
            .iter()
            .map(|e| e.timestamp_indexed.as_str())
            .collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.chunk_text.as_str()).collect();

        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(Float32Array::from(embeddings_flat)) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        RecordBatch::try_new(
            Arc::new(Self::create_schema()),
            vec![
                Arc::new(Int64Array::from(chunk_ids)),
                Arc::new(StringArray::from(sources)),
                Arc::new(Int32Array::from(pages)),
                Arc::new(StringArray::from(doc_types)),
                Arc::new(StringArray::from(timestamps)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&TABLE_NAME.to_string()))
            .unwrap_or(false)
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open chunk table")
    }

    /// Decode result rows; `_distance` is only present for vector queries
    fn batch_to_results(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<T>())
                .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
        }

        let chunk_ids = column::<Int64Array>(batch, "chunk_id")?;
        let sources = column::<StringArray>(batch, "source")?;
        let pages = column::<Int32Array>(batch, "page")?;
        let doc_types = column::<StringArray>(batch, "doc_type")?;
        let timestamps = column::<StringArray>(batch, "timestamp_indexed")?;
        let chunk_texts = column::<StringArray>(batch, "chunk_text")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        Ok((0..batch.num_rows())
            .map(|i| SearchResult {
                chunk_id: chunk_ids.value(i),
                source: sources.value(i).to_string(),
                page: pages.value(i),
                doc_type: doc_types.value(i).to_string(),
                timestamp_indexed: timestamps.value(i).to_string(),
                chunk_text: chunk_texts.value(i).to_string(),
                score: distances.map(|d| d.value(i)).unwrap_or(0.0),
            })
            .collect())
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = Self::entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            self.open_table()
                .await?
                .add(batches)
                .execute()
                .await
                .context("Failed to add chunks to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create chunk table")?;
        }

        Ok(entries.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        doc_type: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;
        let mut query = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit);

        if let Some(doc_type) = doc_type {
            query = query.only_if(format!("doc_type = {}", sql_literal(doc_type)));
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .context("Failed to execute vector search")?
            .try_collect()
            .await?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(Self::batch_to_results(batch)?);
        }
        results.sort_by(|a, b| a.score.total_cmp(&b.score));

        Ok(results)
    }

    async fn find_by_source(&self, needle: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let batches: Vec<RecordBatch> = self
            .open_table()
            .await?
            .query()
            .only_if(format!("source LIKE {}", like_pattern(needle)))
            .limit(limit)
            .execute()
            .await
            .context("Failed to query chunks by source")?
            .try_collect()
            .await?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(Self::batch_to_results(batch)?);
        }
        results.sort_by(|a, b| (&a.source, a.page, a.chunk_id).cmp(&(&b.source, b.page, b.chunk_id)));

        Ok(results)
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let filter = format!("source = {}", sql_literal(source));

        let before = table
            .count_rows(Some(filter.clone()))
            .await
            .context("Failed to count chunks for source")?;
        if before == 0 {
            return Ok(0);
        }

        table
            .delete(&filter)
            .await
            .context("Failed to delete chunks")?;

        Ok(before)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        self.open_table()
            .await?
            .count_rows(None)
            .await
            .context("Failed to count rows")
    }

    async fn max_chunk_id(&self) -> Result<Option<i64>> {
        if !self.table_exists().await {
            return Ok(None);
        }

        let batches: Vec<RecordBatch> = self
            .open_table()
            .await?
            .query()
            .select(Select::Columns(vec!["chunk_id".to_string()]))
            .execute()
            .await
            .context("Failed to scan chunk ids")?
            .try_collect()
            .await?;

        let mut max = None;
        for batch in &batches {
            let column = batch
                .column_by_name("chunk_id")
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_id column"))?;
            for i in 0..column.len() {
                max = max.max(Some(column.value(i)));
            }
        }

        Ok(max)
    }

    async fn doc_types(&self) -> Result<Vec<String>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let batches: Vec<RecordBatch> = self
            .open_table()
            .await?
            .query()
            .select(Select::Columns(vec!["doc_type".to_string()]))
            .execute()
            .await
            .context("Failed to scan doc types")?
            .try_collect()
            .await?;

        let mut types = BTreeSet::new();
        for batch in &batches {
            let column = batch
                .column_by_name("doc_type")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing doc_type column"))?;
            for i in 0..column.len() {
                types.insert(column.value(i).to_string());
            }
        }

        Ok(types.into_iter().collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(chunk_id: i64, source: &str, doc_type: &str, fill: f32) -> VectorEntry {
        VectorEntry {
            chunk_id,
            source: source.to_string(),
            page: 1,
            doc_type: doc_type.to_string(),
            timestamp_indexed: "2024-07-01T00:00:00+00:00".to_string(),
            chunk_text: format!("chunk {} of {}", chunk_id, source),
            embedding: vec![fill; EMBEDDING_DIMENSION as usize],
        }
    }

    async fn open_store(dir: &TempDir) -> LanceVectorStore {
        LanceVectorStore::open(&dir.path().join("test.lance"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_count() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        assert_eq!(store.count().await.unwrap(), 0);

        let entries = vec![
            entry(0, "PROC-PUMP.txt", "procedure", 0.1),
            entry(1, "PROC-PUMP.txt", "procedure", 0.2),
        ];
        assert_eq!(store.insert_batch(&entries).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        store
            .insert_batch(&[
                entry(0, "a.txt", "procedure", 0.1),
                entry(1, "b.txt", "rapport", 0.5),
                entry(2, "c.txt", "safety", 0.9),
            ])
            .await
            .unwrap();

        let query = vec![0.1; EMBEDDING_DIMENSION as usize];
        let results = store.search(&query, 2, None).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "a.txt");
        assert!(results[0].score <= results[1].score);
    }

    #[tokio::test]
    async fn test_search_with_doc_type_filter() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        store
            .insert_batch(&[
                entry(0, "a.txt", "procedure", 0.1),
                entry(1, "b.txt", "rapport", 0.1),
            ])
            .await
            .unwrap();

        let query = vec![0.1; EMBEDDING_DIMENSION as usize];
        let results = store.search(&query, 5, Some("rapport")).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_type, "rapport");
    }

    #[tokio::test]
    async fn test_delete_by_source_and_doc_types() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        store
            .insert_batch(&[
                entry(0, "a.txt", "procedure", 0.1),
                entry(1, "a.txt", "procedure", 0.2),
                entry(2, "b.txt", "rapport", 0.3),
            ])
            .await
            .unwrap();

        assert_eq!(
            store.doc_types().await.unwrap(),
            vec!["procedure".to_string(), "rapport".to_string()]
        );

        assert_eq!(store.delete_by_source("a.txt").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.delete_by_source("missing.txt").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_source() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        store
            .insert_batch(&[
                entry(0, "PROC-PUMP-001.txt", "procedure", 0.1),
                entry(1, "SPEC-TEMP-002.txt", "specification", 0.2),
            ])
            .await
            .unwrap();

        let hits = store.find_by_source("PUMP", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "PROC-PUMP-001.txt");
    }
}
