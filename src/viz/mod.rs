//! Chart generation
//!
//! Builds Plotly figures as JSON from query tables. Column names coming
//! from the LLM are checked against the table and fuzzy-matched when they
//! are close enough. Figures are rendered by writing a standalone HTML page.

pub mod fuzzy;

use std::cmp::Ordering;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::operational::{format_cell, QueryTable};

/// Series colours
pub const PALETTE: [&str; 8] = [
    "#0066CC", "#FF6B35", "#2ECC71", "#9B59B6", "#E74C3C", "#3498DB", "#1ABC9C", "#F39C12",
];

pub const PAPER_BGCOLOR: &str = "#0E1117";
pub const PLOT_BGCOLOR: &str = "#262730";
pub const FONT_COLOR: &str = "#FAFAFA";

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

// ============================================================================
// Chart configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Box,
    Pie,
    Histogram,
}

impl ChartType {
    pub const ALL: [ChartType; 6] = [
        ChartType::Bar,
        ChartType::Line,
        ChartType::Scatter,
        ChartType::Box,
        ChartType::Pie,
        ChartType::Histogram,
    ];

    /// Unknown names fall back to a bar chart
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "line" => ChartType::Line,
            "scatter" => ChartType::Scatter,
            "box" => ChartType::Box,
            "pie" => ChartType::Pie,
            "histogram" => ChartType::Histogram,
            _ => ChartType::Bar,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Scatter => "scatter",
            ChartType::Box => "box",
            ChartType::Pie => "pie",
            ChartType::Histogram => "histogram",
        }
    }

    /// Display name with a leading capital
    pub fn label(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
    Count,
}

impl Aggregation {
    /// `None` for anything but sum, mean or count
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Some(Aggregation::Sum),
            "mean" => Some(Aggregation::Mean),
            "count" => Some(Aggregation::Count),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub chart_type: ChartType,
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub title: String,
    pub aggregation: Option<Aggregation>,
}

impl ChartConfig {
    pub fn new(chart_type: ChartType, x: &str, y: &str, title: &str) -> Self {
        Self {
            chart_type,
            x: x.to_string(),
            y: y.to_string(),
            color: None,
            title: title.to_string(),
            aggregation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("Aucune donnée disponible. Exécutez d'abord une requête.")]
    NoData,

    #[error("Colonne {axis} '{column}' non trouvée. Colonnes disponibles: {available:?}")]
    ColumnNotFound {
        axis: &'static str,
        column: String,
        available: Vec<String>,
    },

    #[error("Colonne '{0}' n'est pas numérique")]
    NotNumeric(String),
}

/// Generated figure with the resolved configuration
#[derive(Debug, Clone, Serialize)]
pub struct Chart {
    pub chart_type: ChartType,
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub title: String,
    pub data_points: usize,
    /// Plotly figure: `{ data, layout }`
    pub figure: Value,
    /// Python snippet reproducing the figure
    pub code: String,
}

// ============================================================================
// Column validation
// ============================================================================

/// Exact column, else the best fuzzy match above the cutoff
///
/// Returns `(column, is_exact)`. When nothing matches the name is returned
/// unchanged with `false`.
pub fn validate_column(name: &str, table: &QueryTable) -> (String, bool) {
    if table.has_column(name) {
        return (name.to_string(), true);
    }
    match fuzzy::extract_best(name, &table.columns, fuzzy::DEFAULT_CUTOFF) {
        Some((column, score)) => {
            tracing::debug!("Column {:?} matched {:?} (score {})", name, column, score);
            (column.to_string(), false)
        }
        None => (name.to_string(), false),
    }
}

fn resolve(name: &str, axis: &'static str, table: &QueryTable) -> Result<String, ChartError> {
    let (column, _) = validate_column(name, table);
    if table.has_column(&column) {
        Ok(column)
    } else {
        Err(ChartError::ColumnNotFound {
            axis,
            column: name.to_string(),
            available: table.columns.clone(),
        })
    }
}

// ============================================================================
// Suggestions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub chart_type: ChartType,
    pub reason: &'static str,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VizSuggestion {
    pub primary: Recommendation,
    pub alternatives: Vec<Recommendation>,
    pub available_types: Vec<&'static str>,
}

const SUGGESTION_RULES: &[(&[&str], ChartType, &str, u8)] = &[
    (
        &["date", "time", "année", "mois", "jour", "temporal"],
        ChartType::Line,
        "Données temporelles détectées - graphique linéaire recommandé pour voir l'évolution",
        1,
    ),
    (
        &["catégorie", "type", "status", "category", "groupe"],
        ChartType::Bar,
        "Données catégorielles - histogramme pour comparer les catégories",
        2,
    ),
    (
        &["distribution", "répartition", "spread", "variance"],
        ChartType::Box,
        "Analyse de distribution - box plot pour voir les quartiles",
        3,
    ),
    (
        &["corrélation", "relation", "scatter", "nuage"],
        ChartType::Scatter,
        "Relation entre variables - nuage de points recommandé",
        2,
    ),
    (
        &["pourcentage", "proportion", "part", "%", "pie"],
        ChartType::Pie,
        "Répartition en proportions - diagramme circulaire",
        3,
    ),
];

/// Keyword heuristics over a free-text description of the data
pub fn suggest_viz_type(summary: &str) -> VizSuggestion {
    let lower = summary.to_lowercase();

    let mut recommendations: Vec<Recommendation> = SUGGESTION_RULES
        .iter()
        .filter(|(keywords, ..)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, chart_type, reason, priority)| Recommendation {
            chart_type: *chart_type,
            reason: *reason,
            priority: *priority,
        })
        .collect();

    if recommendations.is_empty() {
        recommendations.push(Recommendation {
            chart_type: ChartType::Bar,
            reason: "Type par défaut - histogramme polyvalent",
            priority: 5,
        });
    }

    // Stable: rule order breaks ties
    recommendations.sort_by_key(|r| r.priority);
    let primary = recommendations.remove(0);
    recommendations.truncate(2);

    VizSuggestion {
        primary,
        alternatives: recommendations,
        available_types: vec!["bar", "line", "scatter", "box", "pie", "histogram", "heatmap"],
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Validate columns, aggregate, and build the figure
pub fn generate_chart(table: &QueryTable, config: &ChartConfig) -> Result<Chart, ChartError> {
    if table.is_empty() {
        return Err(ChartError::NoData);
    }

    let x = resolve(&config.x, "X", table)?;
    let mut y = resolve(&config.y, "Y", table)?;
    let mut color = config
        .color
        .as_deref()
        .and_then(|c| resolve(c, "couleur", table).ok());

    let aggregated;
    let data = match config.aggregation {
        Some(agg) => {
            aggregated = aggregate(table, &x, &y, agg)?;
            // Aggregation keeps only x and the reduced column, which may be renamed
            color = None;
            if let Some(reduced) = aggregated.columns.get(1) {
                y = reduced.clone();
            }
            &aggregated
        }
        None => table,
    };

    let figure = json!({
        "data": build_traces(data, config.chart_type, &x, &y, color.as_deref()),
        "layout": build_layout(&config.title, &x, &y, config.chart_type),
    });
    let code = python_code(config.chart_type, &x, &y, color.as_deref(), &config.title);

    Ok(Chart {
        chart_type: config.chart_type,
        x,
        y,
        color,
        title: config.title.clone(),
        data_points: data.len(),
        figure,
        code,
    })
}

/// Chart with automatically picked columns
///
/// First non-numeric column as x, first numeric column as y; a single
/// column becomes a histogram.
pub fn quick_chart(table: &QueryTable, chart_type: ChartType) -> Result<Chart, ChartError> {
    let first = table.columns.first().ok_or(ChartError::NoData)?;

    if table.columns.len() < 2 {
        return generate_chart(
            table,
            &ChartConfig::new(ChartType::Histogram, first, first, ""),
        );
    }

    let x = table
        .columns
        .iter()
        .find(|c| !table.is_numeric_column(c))
        .unwrap_or(first);
    let y = table
        .columns
        .iter()
        .find(|c| table.is_numeric_column(c))
        .unwrap_or(&table.columns[1]);

    generate_chart(table, &ChartConfig::new(chart_type, x, y, ""))
}

fn cmp_cells(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        _ => format_cell(a).cmp(&format_cell(b)),
    }
}

/// Group by `x` (sorted keys, nulls dropped) and reduce `y`
fn aggregate(
    table: &QueryTable,
    x: &str,
    y: &str,
    aggregation: Aggregation,
) -> Result<QueryTable, ChartError> {
    let x_idx = table.column_index(x).unwrap_or(0);
    let y_idx = table.column_index(y).unwrap_or(0);

    if aggregation != Aggregation::Count && !table.is_numeric_column(y) {
        return Err(ChartError::NotNumeric(y.to_string()));
    }

    let mut groups: Vec<(Value, Vec<&Value>)> = Vec::new();
    for row in &table.rows {
        let key = &row[x_idx];
        if key.is_null() {
            continue;
        }
        match groups.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.push(&row[y_idx]),
            None => groups.push((key.clone(), vec![&row[y_idx]])),
        }
    }
    groups.sort_by(|a, b| cmp_cells(&a.0, &b.0));

    let y_name = if aggregation == Aggregation::Count && x == y {
        "count".to_string()
    } else {
        y.to_string()
    };

    let rows = groups
        .into_iter()
        .map(|(key, values)| {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            let reduced = match aggregation {
                Aggregation::Count => json!(values.len()),
                Aggregation::Sum => json!(numbers.iter().sum::<f64>()),
                Aggregation::Mean if numbers.is_empty() => Value::Null,
                Aggregation::Mean => json!(numbers.iter().sum::<f64>() / numbers.len() as f64),
            };
            vec![key, reduced]
        })
        .collect();

    Ok(QueryTable::new(vec![x.to_string(), y_name], rows))
}

fn column(table: &QueryTable, name: &str) -> Vec<Value> {
    table
        .column_values(name)
        .unwrap_or_default()
        .into_iter()
        .cloned()
        .collect()
}

fn build_traces(
    table: &QueryTable,
    chart_type: ChartType,
    x: &str,
    y: &str,
    color: Option<&str>,
) -> Vec<Value> {
    match chart_type {
        ChartType::Pie => vec![json!({
            "type": "pie",
            "labels": column(table, x),
            "values": column(table, y),
            "marker": { "colors": PALETTE },
        })],
        _ => match color {
            Some(color_col) => split_by(table, color_col)
                .iter()
                .enumerate()
                .map(|(i, (name, subset))| {
                    series_trace(subset, chart_type, x, y, Some(name.as_str()), PALETTE[i % PALETTE.len()])
                })
                .collect(),
            None => vec![series_trace(table, chart_type, x, y, None, PALETTE[0])],
        },
    }
}

/// Rows grouped by a column, in order of first appearance
fn split_by(table: &QueryTable, column: &str) -> Vec<(String, QueryTable)> {
    let idx = table.column_index(column).unwrap_or(0);
    let mut groups: Vec<(String, QueryTable)> = Vec::new();
    for row in &table.rows {
        let key = format_cell(&row[idx]);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, subset)) => subset.rows.push(row.clone()),
            None => groups.push((
                key,
                QueryTable::new(table.columns.clone(), vec![row.clone()]),
            )),
        }
    }
    groups
}

fn series_trace(
    table: &QueryTable,
    chart_type: ChartType,
    x: &str,
    y: &str,
    name: Option<&str>,
    colour: &str,
) -> Value {
    let mut trace = match chart_type {
        ChartType::Line => json!({ "type": "scatter", "mode": "lines", "x": column(table, x), "y": column(table, y) }),
        ChartType::Scatter => json!({ "type": "scatter", "mode": "markers", "x": column(table, x), "y": column(table, y) }),
        ChartType::Box => json!({ "type": "box", "x": column(table, x), "y": column(table, y) }),
        ChartType::Histogram => json!({ "type": "histogram", "x": column(table, x) }),
        ChartType::Bar | ChartType::Pie => json!({ "type": "bar", "x": column(table, x), "y": column(table, y) }),
    };

    trace["marker"] = json!({ "color": colour });
    if chart_type == ChartType::Line {
        trace["line"] = json!({ "color": colour });
    }
    if let Some(name) = name {
        trace["name"] = json!(name);
    }
    trace
}

fn build_layout(title: &str, x: &str, y: &str, chart_type: ChartType) -> Value {
    let mut layout = json!({
        "title": { "text": title, "font": { "size": 16, "color": FONT_COLOR } },
        "font": { "family": "Arial, sans-serif", "size": 12, "color": FONT_COLOR },
        "paper_bgcolor": PAPER_BGCOLOR,
        "plot_bgcolor": PLOT_BGCOLOR,
        "colorway": PALETTE,
        "legend": { "bgcolor": "rgba(0,0,0,0.5)", "bordercolor": "#444", "borderwidth": 1 },
        "margin": { "l": 60, "r": 40, "t": 60, "b": 60 },
        "hoverlabel": { "bgcolor": "#333", "font": { "size": 12, "family": "Arial" } },
    });

    if chart_type != ChartType::Pie {
        let y_title = if chart_type == ChartType::Histogram { "count" } else { y };
        layout["xaxis"] = json!({ "title": { "text": x }, "gridcolor": "#444" });
        layout["yaxis"] = json!({ "title": { "text": y_title }, "gridcolor": "#444" });
    }
    layout
}

fn python_code(chart_type: ChartType, x: &str, y: &str, color: Option<&str>, title: &str) -> String {
    let palette = PALETTE
        .iter()
        .map(|c| format!("'{}'", c))
        .collect::<Vec<_>>()
        .join(", ");
    let color_param = color
        .map(|c| format!(", color='{}'", c))
        .unwrap_or_default();
    let axes = match chart_type {
        ChartType::Pie => format!("values='{}',\n    names='{}'", y, x),
        ChartType::Histogram => format!("x='{}'{}", x, color_param),
        _ => format!("x='{}',\n    y='{}'{}", x, y, color_param),
    };

    format!(
        r#"import plotly.express as px
import pandas as pd

# Charger vos données
# df = pd.read_sql("votre_requete", connection)

PALETTE = [{palette}]

fig = px.{chart}(
    df,
    {axes},
    title='{title}',
    color_discrete_sequence=PALETTE
)

fig.update_layout(
    template='plotly_dark',
    paper_bgcolor='{paper}',
    plot_bgcolor='{plot}'
)

fig.show()
"#,
        palette = palette,
        chart = chart_type.as_str(),
        axes = axes,
        title = title.replace('\'', "\\'"),
        paper = PAPER_BGCOLOR,
        plot = PLOT_BGCOLOR,
    )
}

// ============================================================================
// Rendering
// ============================================================================

/// Standalone HTML page loading plotly.js from its CDN
pub fn chart_html(figure: &Value, title: &str) -> String {
    // Keep `</script>` inside string values from closing the tag
    let figure_json = figure.to_string().replace("</", "<\\/");
    let title = title
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
<style>body {{ margin: 0; background: {bg}; }} #chart {{ width: 100vw; height: 100vh; }}</style>
</head>
<body>
<div id="chart"></div>
<script>
const figure = {figure};
Plotly.newPlot("chart", figure.data, figure.layout, {{ responsive: true }});
</script>
</body>
</html>
"#,
        title = title,
        cdn = PLOTLY_CDN,
        bg = PAPER_BGCOLOR,
        figure = figure_json,
    )
}

pub fn write_chart_html(chart: &Chart, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create chart directory {:?}", parent))?;
    }
    std::fs::write(path, chart_html(&chart.figure, &chart.title))
        .with_context(|| format!("Failed to write chart: {:?}", path))?;
    tracing::info!("Chart written to {:?}", path);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn maintenances() -> QueryTable {
        QueryTable::new(
            vec![
                "reactor_name".to_string(),
                "type".to_string(),
                "duration_hours".to_string(),
            ],
            vec![
                vec![json!("Civaux-1"), json!("préventive"), json!(4)],
                vec![json!("Civaux-2"), json!("corrective"), json!(10)],
                vec![json!("Civaux-1"), json!("corrective"), json!(6)],
            ],
        )
    }

    #[test]
    fn test_chart_type_parse() {
        assert_eq!(ChartType::parse("Line"), ChartType::Line);
        assert_eq!(ChartType::parse("heatmap"), ChartType::Bar);
        assert_eq!(ChartType::Histogram.label(), "Histogram");
    }

    #[test]
    fn test_validate_column() {
        let table = maintenances();
        assert_eq!(
            validate_column("duration_hours", &table),
            ("duration_hours".to_string(), true)
        );
        assert_eq!(
            validate_column("duration", &table),
            ("duration_hours".to_string(), false)
        );
        assert_eq!(
            validate_column("temperature", &table),
            ("temperature".to_string(), false)
        );
    }

    #[test]
    fn test_generate_bar_chart() {
        let config = ChartConfig::new(ChartType::Bar, "reactor_name", "duration", "Durées");
        let chart = generate_chart(&maintenances(), &config).unwrap();

        assert_eq!(chart.y, "duration_hours");
        assert_eq!(chart.data_points, 3);
        let trace = &chart.figure["data"][0];
        assert_eq!(trace["type"], "bar");
        assert_eq!(trace["y"], json!([4, 10, 6]));
        assert_eq!(chart.figure["layout"]["paper_bgcolor"], PAPER_BGCOLOR);
        assert_eq!(chart.figure["layout"]["margin"]["l"], 60);
        assert!(chart.code.contains("px.bar("));
        assert!(chart.code.contains("y='duration_hours'"));
    }

    #[test]
    fn test_unknown_column_lists_available() {
        let config = ChartConfig::new(ChartType::Line, "temperature", "duration_hours", "t");
        let err = generate_chart(&maintenances(), &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Colonne X 'temperature' non trouvée. Colonnes disponibles: [\"reactor_name\", \"type\", \"duration_hours\"]"
        );
    }

    #[test]
    fn test_color_splits_series_or_is_dropped() {
        let mut config = ChartConfig::new(ChartType::Scatter, "reactor_name", "duration_hours", "t");
        config.color = Some("type".to_string());
        let chart = generate_chart(&maintenances(), &config).unwrap();
        let traces = chart.figure["data"].as_array().unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0]["name"], "préventive");
        assert_eq!(traces[1]["marker"]["color"], PALETTE[1]);

        config.color = Some("zzz".to_string());
        let chart = generate_chart(&maintenances(), &config).unwrap();
        assert_eq!(chart.color, None);
        assert_eq!(chart.figure["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_aggregation() {
        let mut config = ChartConfig::new(ChartType::Pie, "reactor_name", "duration_hours", "Total");
        config.aggregation = Some(Aggregation::Sum);
        let chart = generate_chart(&maintenances(), &config).unwrap();
        let trace = &chart.figure["data"][0];
        assert_eq!(trace["labels"], json!(["Civaux-1", "Civaux-2"]));
        assert_eq!(trace["values"], json!([10.0, 10.0]));

        config.aggregation = Some(Aggregation::Count);
        let chart = generate_chart(&maintenances(), &config).unwrap();
        assert_eq!(chart.figure["data"][0]["values"], json!([2, 1]));

        let mut by_type = ChartConfig::new(ChartType::Bar, "type", "type", "Par type");
        by_type.aggregation = Some(Aggregation::Count);
        let chart = generate_chart(&maintenances(), &by_type).unwrap();
        assert_eq!(chart.y, "count");
        assert_eq!(chart.figure["data"][0]["y"], json!([2, 1]));
        assert!(chart.code.contains("y='count'"));

        let mut bad = ChartConfig::new(ChartType::Bar, "type", "reactor_name", "t");
        bad.aggregation = Some(Aggregation::Mean);
        assert_eq!(
            generate_chart(&maintenances(), &bad).unwrap_err(),
            ChartError::NotNumeric("reactor_name".to_string())
        );
    }

    #[test]
    fn test_empty_table() {
        let config = ChartConfig::new(ChartType::Bar, "a", "b", "t");
        assert_eq!(
            generate_chart(&QueryTable::default(), &config).unwrap_err(),
            ChartError::NoData
        );
    }

    #[test]
    fn test_quick_chart() {
        let chart = quick_chart(&maintenances(), ChartType::Bar).unwrap();
        assert_eq!(chart.x, "reactor_name");
        assert_eq!(chart.y, "duration_hours");

        let single = QueryTable::new(vec!["v".to_string()], vec![vec![json!(1)], vec![json!(2)]]);
        let chart = quick_chart(&single, ChartType::Line).unwrap();
        assert_eq!(chart.chart_type, ChartType::Histogram);
    }

    #[test]
    fn test_suggest_viz_type() {
        let s = suggest_viz_type("Colonnes: date, status, nombre");
        assert_eq!(s.primary.chart_type, ChartType::Line);
        assert_eq!(s.alternatives[0].chart_type, ChartType::Bar);
        assert!(s.available_types.contains(&"heatmap"));

        let s = suggest_viz_type("valeurs brutes");
        assert_eq!(s.primary.chart_type, ChartType::Bar);
        assert_eq!(s.primary.priority, 5);
        assert!(s.alternatives.is_empty());
    }

    #[test]
    fn test_write_chart_html() {
        let dir = TempDir::new().unwrap();
        let chart = quick_chart(&maintenances(), ChartType::Bar).unwrap();
        let path = dir.path().join("charts").join("c.html");
        write_chart_html(&chart, &path).unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains(PLOTLY_CDN));
        assert!(html.contains("Plotly.newPlot"));
        assert!(html.contains("Civaux-1"));
    }
}
