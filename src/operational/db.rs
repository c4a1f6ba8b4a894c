//! Operational database - read-only rusqlite access
//!
//! Reactors, maintenances, incidents and sensor readings seeded by
//! `ingest::seed`. Every query goes through the SQL guard; identifiers
//! interpolated into helper queries are validated first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::guard::{check_fragment, check_identifier, check_select};
use super::stats::NumericStats;
use super::table::{format_cell, QueryTable};

/// Rows returned by `execute_query`
pub const MAX_QUERY_ROWS: usize = 100;

// ============================================================================
// Result types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub sql: String,
    pub table: QueryTable,
    /// More than `MAX_QUERY_ROWS` rows matched
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalMetricStats {
    #[serde(flatten)]
    pub stats: NumericStats,
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMetricStats {
    pub group: String,
    #[serde(flatten)]
    pub stats: NumericStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricStatistics {
    Global {
        metric: String,
        statistics: GlobalMetricStats,
    },
    Grouped {
        metric: String,
        group_by: String,
        statistics: Vec<GroupMetricStats>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCounts {
    pub dimension: String,
    pub table: String,
    pub total: i64,
    /// `[dimension, count]`, most frequent first
    pub categories: QueryTable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub row_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableInfo {
    Table {
        table: String,
        columns: Vec<ColumnInfo>,
        row_count: i64,
    },
    All {
        tables: Vec<TableSummary>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub min_date: String,
    pub max_date: String,
}

impl DateRange {
    fn unknown() -> Self {
        Self {
            min_date: "N/A".to_string(),
            max_date: "N/A".to_string(),
        }
    }
}

// ============================================================================
// OperationalDb
// ============================================================================

pub struct OperationalDb {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl OperationalDb {
    /// Open an existing database read-only
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Database not found: {:?}", path);
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open operational database: {:?}", path))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// Run a statement, keeping at most `limit` rows
    fn query_table(&self, sql: &str, limit: Option<usize>) -> Result<(QueryTable, bool)> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        let mut truncated = false;

        while let Some(row) = rows.next()? {
            if limit.map(|l| out.len() >= l).unwrap_or(false) {
                truncated = true;
                break;
            }
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(cell_to_json(row.get_ref(i)?));
            }
            out.push(cells);
        }

        Ok((QueryTable::new(columns, out), truncated))
    }

    /// Guarded SELECT, truncated to `MAX_QUERY_ROWS`
    pub fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let statement = check_select(sql)?;
        let (table, truncated) = self.query_table(statement, Some(MAX_QUERY_ROWS))?;

        tracing::debug!(
            "Query returned {} rows (truncated: {})",
            table.len(),
            truncated
        );

        Ok(QueryResult {
            sql: statement.to_string(),
            table,
            truncated,
        })
    }

    /// Every row of one table
    pub fn read_table(&self, table: &str) -> Result<QueryTable> {
        let table = check_identifier(table)?;
        let (data, _) = self.query_table(&format!("SELECT * FROM {}", table), None)?;
        Ok(data)
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn row_count(&self, table: &str) -> Result<i64> {
        let table = check_identifier(table)?;
        let conn = self.lock()?;
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let table = check_identifier(table)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    column_type: row.get(2)?,
                    nullable: row.get::<_, i64>(3)? == 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    /// `(table, row count)` in creation order
    pub fn table_counts(&self) -> Result<Vec<(String, i64)>> {
        self.table_names()?
            .into_iter()
            .map(|name| {
                let count = self.row_count(&name)?;
                Ok((name, count))
            })
            .collect()
    }

    /// Schema block given to the SQL generation prompt
    pub fn table_schemas(&self) -> Result<String> {
        let mut lines = Vec::new();
        for name in self.table_names()? {
            let cols = self
                .columns(&name)?
                .iter()
                .map(|c| format!("{} ({})", c.name, c.column_type))
                .collect::<Vec<_>>()
                .join(", ");
            let count = self.row_count(&name)?;
            lines.push(format!("- {} ({} lignes): {}", name, count, cols));
        }
        Ok(lines.join("\n"))
    }

    pub fn metric_statistics(
        &self,
        metric: &str,
        table: &str,
        group_by: Option<&str>,
    ) -> Result<MetricStatistics> {
        let metric = check_identifier(metric)?;
        let table = check_identifier(table)?;

        let sql = match group_by {
            Some(group) => format!("SELECT {}, {} FROM {}", check_identifier(group)?, metric, table),
            None => format!("SELECT {} FROM {}", metric, table),
        };
        let (data, _) = self.query_table(&sql, None)?;

        if !data.has_column(metric) {
            anyhow::bail!("Colonne '{}' non trouvée dans {}", metric, table);
        }
        if !data.is_empty() && !data.is_numeric_column(metric) {
            anyhow::bail!("Colonne '{}' n'est pas numérique", metric);
        }

        let metric_idx = data.column_index(metric).unwrap_or(0);

        match group_by {
            Some(group) => {
                let group_idx = data.column_index(group).unwrap_or(0);
                let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
                for row in &data.rows {
                    let key = &row[group_idx];
                    if key.is_null() {
                        continue;
                    }
                    let values = groups.entry(format_cell(key)).or_default();
                    if let Some(v) = row[metric_idx].as_f64() {
                        values.push(v);
                    }
                }

                Ok(MetricStatistics::Grouped {
                    metric: metric.to_string(),
                    group_by: group.to_string(),
                    statistics: groups
                        .into_iter()
                        .map(|(group, values)| GroupMetricStats {
                            group,
                            stats: NumericStats::from_values(&values),
                        })
                        .collect(),
                })
            }
            None => {
                let values = data.numeric_values(metric).unwrap_or_default();
                Ok(MetricStatistics::Global {
                    metric: metric.to_string(),
                    statistics: GlobalMetricStats {
                        stats: NumericStats::from_values(&values),
                        sum: values.iter().sum(),
                    },
                })
            }
        }
    }

    pub fn count_by_category(
        &self,
        dimension: &str,
        table: &str,
        filter: Option<&str>,
    ) -> Result<CategoryCounts> {
        let dimension = check_identifier(dimension)?;
        let table = check_identifier(table)?;
        let where_clause = match filter {
            Some(f) if !f.trim().is_empty() => {
                check_fragment(f)?;
                format!("WHERE {}", f)
            }
            _ => String::new(),
        };

        let sql = format!(
            "SELECT {dim}, COUNT(*) AS count FROM {table} {where_clause} GROUP BY {dim} ORDER BY count DESC",
            dim = dimension,
            table = table,
            where_clause = where_clause,
        );
        let (categories, _) = self.query_table(&sql, None)?;
        let total = categories
            .numeric_values("count")
            .unwrap_or_default()
            .iter()
            .sum::<f64>() as i64;

        Ok(CategoryCounts {
            dimension: dimension.to_string(),
            table: table.to_string(),
            total,
            categories,
        })
    }

    pub fn table_info(&self, table: Option<&str>) -> Result<TableInfo> {
        match table {
            Some(name) => Ok(TableInfo::Table {
                table: name.to_string(),
                columns: self.columns(name)?,
                row_count: self.row_count(name)?,
            }),
            None => Ok(TableInfo::All {
                tables: self
                    .table_counts()?
                    .into_iter()
                    .map(|(name, row_count)| TableSummary { name, row_count })
                    .collect(),
            }),
        }
    }

    /// MIN/MAX of a date column; `N/A` when unavailable
    pub fn date_range(&self, table: &str, column: &str) -> DateRange {
        let range = || -> Result<DateRange> {
            let table = check_identifier(table)?;
            let column = check_identifier(column)?;
            let (data, _) = self.query_table(
                &format!(
                    "SELECT MIN({c}) AS min_date, MAX({c}) AS max_date FROM {t}",
                    c = column,
                    t = table
                ),
                Some(1),
            )?;
            let row = data.rows.first().context("empty result")?;
            let show = |v: &Value| {
                if v.is_null() {
                    "N/A".to_string()
                } else {
                    format_cell(v)
                }
            };
            Ok(DateRange {
                min_date: show(&row[0]),
                max_date: show(&row[1]),
            })
        };

        range().unwrap_or_else(|e| {
            tracing::debug!("Date range unavailable for {}.{}: {}", table, column, e);
            DateRange::unknown()
        })
    }
}

fn cell_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::String("[BLOB]".to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
