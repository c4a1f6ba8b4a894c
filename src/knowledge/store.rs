//! Knowledge Store - rusqlite document registry
//!
//! Tracks which source pages are indexed, their type and content hash, so
//! re-running ingestion only re-embeds what changed.
//! Location: ~/.reactor-chat/knowledge.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Types
// ============================================================================

/// Indexed source page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub source: String,
    pub page: i32,
    pub doc_type: String,
    pub content_hash: String,
    pub content_bytes: usize,
    pub chunk_count: usize,
    pub indexed_at: DateTime<Utc>,
}

/// Registry input
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub source: String,
    pub page: i32,
    pub doc_type: String,
    pub content: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub source_count: usize,
    pub page_count: usize,
    pub chunk_count: usize,
    pub total_content_bytes: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

pub struct KnowledgeStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

const SELECT_COLUMNS: &str =
    "SELECT id, source, page, doc_type, content_hash, content_bytes, chunk_count, indexed_at FROM documents";

impl KnowledgeStore {
    /// Open (or create) the registry
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                page INTEGER NOT NULL,
                doc_type TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                content_bytes INTEGER NOT NULL DEFAULT 0,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                indexed_at TEXT NOT NULL,
                UNIQUE(source, page)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);
            CREATE INDEX IF NOT EXISTS idx_documents_doc_type ON documents(doc_type);
            "#,
        )
        .context("Failed to create documents table")?;

        tracing::debug!("Knowledge store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// Register a page (replaces an existing `(source, page)` row)
    pub fn upsert_document(&self, doc: &NewDocument) -> Result<i64> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO documents (source, page, doc_type, content_hash, content_bytes, chunk_count, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(source, page) DO UPDATE SET
                doc_type = excluded.doc_type,
                content_hash = excluded.content_hash,
                content_bytes = excluded.content_bytes,
                chunk_count = excluded.chunk_count,
                indexed_at = excluded.indexed_at",
            params![
                doc.source,
                doc.page,
                doc.doc_type,
                content_hash(&doc.content),
                doc.content.len() as i64,
                doc.chunk_count as i64,
                now
            ],
        )
        .context("Failed to upsert document")?;

        let id: i64 = conn.query_row(
            "SELECT id FROM documents WHERE source = ?1 AND page = ?2",
            params![doc.source, doc.page],
            |row| row.get(0),
        )?;

        tracing::debug!("Registered {} p.{} (id={})", doc.source, doc.page, id);
        Ok(id)
    }

    pub fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let doc = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                row_to_document,
            )
            .optional()?;

        Ok(doc)
    }

    pub fn get_page(&self, source: &str, page: i32) -> Result<Option<Document>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let doc = conn
            .query_row(
                &format!("{} WHERE source = ?1 AND page = ?2", SELECT_COLUMNS),
                params![source, page],
                row_to_document,
            )
            .optional()?;

        Ok(doc)
    }

    /// Whether the stored hash matches `content`
    pub fn is_unchanged(&self, source: &str, page: i32, content: &str) -> Result<bool> {
        Ok(self
            .get_page(source, page)?
            .map(|doc| doc.content_hash == content_hash(content))
            .unwrap_or(false))
    }

    /// Pages whose source name contains `needle` (case-insensitive)
    pub fn find_by_source(&self, needle: &str) -> Result<Vec<Document>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let pattern = format!("%{}%", needle.to_lowercase());

        let mut stmt = conn.prepare(&format!(
            "{} WHERE LOWER(source) LIKE ?1 ORDER BY source, page",
            SELECT_COLUMNS
        ))?;

        let docs = stmt
            .query_map(params![pattern], row_to_document)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(docs)
    }

    pub fn list_documents(&self, doc_type: Option<&str>) -> Result<Vec<Document>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let docs = if let Some(doc_type) = doc_type {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE doc_type = ?1 ORDER BY source, page",
                SELECT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![doc_type], row_to_document)?;
            rows.filter_map(|r| r.ok()).collect()
        } else {
            let mut stmt = conn.prepare(&format!("{} ORDER BY source, page", SELECT_COLUMNS))?;
            let rows = stmt.query_map([], row_to_document)?;
            rows.filter_map(|r| r.ok()).collect()
        };

        Ok(docs)
    }

    /// Number of registered pages of a source
    pub fn page_count(&self, source: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Remove every page of a source
    pub fn delete_source(&self, source: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let rows = conn.execute("DELETE FROM documents WHERE source = ?1", params![source])?;
        Ok(rows)
    }

    pub fn doc_types(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let mut stmt = conn.prepare("SELECT DISTINCT doc_type FROM documents ORDER BY doc_type")?;
        let types = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(types)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let (sources, pages, chunks, bytes): (i64, i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(DISTINCT source), COUNT(*),
                        COALESCE(SUM(chunk_count), 0), COALESCE(SUM(content_bytes), 0)
                 FROM documents",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap_or((0, 0, 0, 0));

        Ok(StoreStats {
            source_count: sources as usize,
            page_count: pages as usize,
            chunk_count: chunks as usize,
            total_content_bytes: bytes as usize,
            db_path: self.db_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        source: row.get(1)?,
        page: row.get(2)?,
        doc_type: row.get(3)?,
        content_hash: row.get(4)?,
        content_bytes: row.get::<_, i64>(5)? as usize,
        chunk_count: row.get::<_, i64>(6)? as usize,
        indexed_at: parse_datetime(row.get::<_, String>(7)?),
    })
}

/// RFC3339 string to DateTime<Utc>
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Hex SHA-256 of page content
pub fn content_hash(content: &str) -> String {
    Sha256::digest(content.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, KnowledgeStore) {
        let dir = TempDir::new().unwrap();
        let store = KnowledgeStore::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn page(source: &str, page: i32, doc_type: &str, content: &str) -> NewDocument {
        NewDocument {
            source: source.to_string(),
            page,
            doc_type: doc_type.to_string(),
            content: content.to_string(),
            chunk_count: 1,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let (_dir, store) = create_test_store();

        let id = store
            .upsert_document(&page("PROC-PUMP.txt", 1, "procedure", "contenu"))
            .unwrap();
        let doc = store.get_document(id).unwrap().unwrap();

        assert_eq!(doc.source, "PROC-PUMP.txt");
        assert_eq!(doc.doc_type, "procedure");
        assert_eq!(doc.content_bytes, "contenu".len());
    }

    #[test]
    fn test_upsert_replaces_same_page() {
        let (_dir, store) = create_test_store();

        let first = store
            .upsert_document(&page("a.txt", 1, "document", "v1"))
            .unwrap();
        let second = store
            .upsert_document(&page("a.txt", 1, "document", "v2"))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_documents(None).unwrap().len(), 1);
        assert!(store.is_unchanged("a.txt", 1, "v2").unwrap());
        assert!(!store.is_unchanged("a.txt", 1, "v1").unwrap());
        assert!(!store.is_unchanged("b.txt", 1, "v1").unwrap());
    }

    #[test]
    fn test_find_by_source_is_case_insensitive() {
        let (_dir, store) = create_test_store();
        store
            .upsert_document(&page("PROC-PUMP-001.txt", 1, "procedure", "x"))
            .unwrap();
        store
            .upsert_document(&page("SPEC-TEMP-002.txt", 1, "specification", "y"))
            .unwrap();

        let hits = store.find_by_source("pump").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "PROC-PUMP-001.txt");
    }

    #[test]
    fn test_doc_types_and_stats() {
        let (_dir, store) = create_test_store();
        store.upsert_document(&page("a.pdf", 1, "rapport", "1234")).unwrap();
        store.upsert_document(&page("a.pdf", 2, "rapport", "567890")).unwrap();
        store.upsert_document(&page("b.txt", 1, "safety", "x")).unwrap();

        assert_eq!(store.doc_types().unwrap(), vec!["rapport", "safety"]);
        assert_eq!(store.list_documents(Some("rapport")).unwrap().len(), 2);

        let stats = store.stats().unwrap();
        assert_eq!(stats.source_count, 2);
        assert_eq!(stats.page_count, 3);
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.total_content_bytes, 11);
    }

    #[test]
    fn test_delete_source() {
        let (_dir, store) = create_test_store();
        store.upsert_document(&page("a.pdf", 1, "rapport", "x")).unwrap();
        store.upsert_document(&page("a.pdf", 2, "rapport", "y")).unwrap();

        assert_eq!(store.page_count("a.pdf").unwrap(), 2);
        assert_eq!(store.page_count("b.pdf").unwrap(), 0);

        assert_eq!(store.delete_source("a.pdf").unwrap(), 2);
        assert_eq!(store.page_count("a.pdf").unwrap(), 0);
        assert!(store.list_documents(None).unwrap().is_empty());
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("").len(), 64);
    }
}
