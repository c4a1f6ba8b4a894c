//! Query result table
//!
//! Column names plus rows of JSON cells. Shared by the data agent (LLM
//! formatting, statistics) and the viz agent (chart input).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of one column
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).unwrap_or(&Value::Null))
                .collect(),
        )
    }

    /// Non-null numeric cells of a column as f64
    pub fn numeric_values(&self, name: &str) -> Option<Vec<f64>> {
        let values = self.column_values(name)?;
        Some(values.into_iter().filter_map(Value::as_f64).collect())
    }

    /// Every non-null cell is a number, and there is at least one
    pub fn is_numeric_column(&self, name: &str) -> bool {
        match self.column_values(name) {
            Some(values) => {
                let mut non_null = values.into_iter().filter(|v| !v.is_null()).peekable();
                non_null.peek().is_some() && non_null.all(Value::is_number)
            }
            None => false,
        }
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| self.is_numeric_column(c))
            .cloned()
            .collect()
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> QueryTable {
        QueryTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Rows as column-keyed objects
    pub fn to_records(&self, limit: usize) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// GitHub-flavoured markdown table
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("| {} |\n", self.columns.join(" | ")));
        out.push_str(&format!(
            "|{}|\n",
            self.columns
                .iter()
                .map(|c| "-".repeat(c.chars().count().max(3) + 2))
                .collect::<Vec<_>>()
                .join("|")
        ));
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|v| format_cell(v).replace('|', "\\|"))
                .collect();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        out.trim_end().to_string()
    }

    /// Text given to the LLM: bare value, "no results", or a markdown table
    pub fn format_for_llm(&self) -> String {
        if self.is_empty() {
            return "Aucun résultat trouvé.".to_string();
        }
        if self.rows.len() == 1 && self.columns.len() == 1 {
            return format_cell(&self.rows[0][0]);
        }
        self.to_markdown()
    }
}

/// Display form of one cell
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
