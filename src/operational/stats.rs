//! Descriptive statistics over query columns

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::table::{format_cell, QueryTable};

/// Numeric summary; `std` is the sample deviation, 0 below two values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl NumericStats {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if count < 2 {
            0.0
        } else {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        };

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };

        Self {
            count,
            mean,
            std,
            min: sorted[0],
            max: sorted[count - 1],
            median,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    pub count: usize,
    pub unique: usize,
    /// Five most frequent values, ties in order of first appearance
    pub top_values: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnStatistics {
    Numeric(NumericStats),
    Categorical(CategoricalStats),
}

pub fn compute_statistics(table: &QueryTable, column: &str) -> Result<ColumnStatistics> {
    if !table.has_column(column) {
        anyhow::bail!("Colonne {} non trouvée", column);
    }

    if table.is_numeric_column(column) {
        let values = table.numeric_values(column).unwrap_or_default();
        return Ok(ColumnStatistics::Numeric(NumericStats::from_values(&values)));
    }

    let cells: Vec<String> = table
        .column_values(column)
        .unwrap_or_default()
        .into_iter()
        .filter(|v| !v.is_null())
        .map(format_cell)
        .collect();

    Ok(ColumnStatistics::Categorical(top_values(&cells, 5)))
}

fn top_values(cells: &[String], limit: usize) -> CategoricalStats {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for cell in cells {
        let entry = counts.entry(cell.as_str()).or_insert(0);
        if *entry == 0 {
            order.push(cell.as_str());
        }
        *entry += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .iter()
        .map(|v| (v.to_string(), counts[v]))
        .collect();
    // Stable sort keeps first-appearance order among ties
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);

    CategoricalStats {
        count: cells.len(),
        unique: order.len(),
        top_values: ranked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_stats() {
        let stats = NumericStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count, 8);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.median, 4.5);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert!((stats.std - 2.138).abs() < 1e-3);
    }

    #[test]
    fn test_single_value_has_zero_std() {
        let stats = NumericStats::from_values(&[42.0]);
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.median, 42.0);
    }

    #[test]
    fn test_categorical_ties_keep_first_appearance() {
        let table = QueryTable::new(
            vec!["status".to_string()],
            ["pending", "completed", "completed", "pending", "in_progress"]
                .iter()
                .map(|s| vec![json!(s)])
                .collect(),
        );

        match compute_statistics(&table, "status").unwrap() {
            ColumnStatistics::Categorical(stats) => {
                assert_eq!(stats.count, 5);
                assert_eq!(stats.unique, 3);
                assert_eq!(
                    stats.top_values,
                    vec![
                        ("pending".to_string(), 2),
                        ("completed".to_string(), 2),
                        ("in_progress".to_string(), 1)
                    ]
                );
            }
            other => panic!("expected categorical stats, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column() {
        let err = compute_statistics(&QueryTable::default(), "cost").unwrap_err();
        assert_eq!(err.to_string(), "Colonne cost non trouvée");
    }
}
