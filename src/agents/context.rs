//! Data shared across turns of one chat session

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::Result;

use crate::operational::{OperationalDb, QueryTable};

/// Table the VizAgent falls back to when no query has run yet
pub const FALLBACK_TABLE: &str = "maintenances";

pub struct SessionContext {
    db_path: PathBuf,
    last_query: RwLock<Option<QueryTable>>,
    operational_data: RwLock<Option<QueryTable>>,
}

impl SessionContext {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            last_query: RwLock::new(None),
            operational_data: RwLock::new(None),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Load the fallback table from the operational database
    pub fn load_operational_data(&self) -> Result<usize> {
        let db = OperationalDb::open(&self.db_path)?;
        let table = db.read_table(FALLBACK_TABLE)?;
        let rows = table.len();
        self.set_operational_data(table)?;
        tracing::info!("Loaded {} {} rows", rows, FALLBACK_TABLE);
        Ok(rows)
    }

    pub fn set_operational_data(&self, table: QueryTable) -> Result<()> {
        let mut slot = self
            .operational_data
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        *slot = Some(table);
        Ok(())
    }

    pub fn set_last_query(&self, table: QueryTable) -> Result<()> {
        let mut slot = self
            .last_query
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        *slot = Some(table);
        Ok(())
    }

    pub fn last_query(&self) -> Option<QueryTable> {
        self.last_query.read().ok().and_then(|t| t.clone())
    }

    pub fn clear_last_query(&self) {
        if let Ok(mut slot) = self.last_query.write() {
            *slot = None;
        }
    }

    /// Last non-empty query result, else the operational data
    pub fn available_table(&self) -> Option<QueryTable> {
        if let Some(table) = self.last_query().filter(|t| !t.is_empty()) {
            return Some(table);
        }
        self.operational_data.read().ok().and_then(|t| t.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(rows: usize) -> QueryTable {
        QueryTable::new(
            vec!["n".to_string()],
            (0..rows).map(|i| vec![json!(i)]).collect(),
        )
    }

    #[test]
    fn test_available_table_prefers_last_query() {
        let ctx = SessionContext::new(Path::new("unused.db"));
        assert!(ctx.available_table().is_none());

        ctx.set_operational_data(table(10)).unwrap();
        assert_eq!(ctx.available_table().unwrap().len(), 10);

        ctx.set_last_query(table(2)).unwrap();
        assert_eq!(ctx.available_table().unwrap().len(), 2);

        // an empty result does not hide the fallback
        ctx.set_last_query(table(0)).unwrap();
        assert_eq!(ctx.available_table().unwrap().len(), 10);

        ctx.clear_last_query();
        assert!(ctx.last_query().is_none());
    }

    #[test]
    fn test_load_operational_data_missing_db() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = SessionContext::new(&dir.path().join("missing.db"));
        assert!(ctx.load_operational_data().is_err());
    }
}
