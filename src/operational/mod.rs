//! Operational data backend
//!
//! Read-only SQL over the plant database, the guard every query passes
//! through, and statistics over result tables.

pub mod db;
pub mod guard;
pub mod stats;
pub mod table;

pub use db::{
    CategoryCounts, ColumnInfo, DateRange, MetricStatistics, OperationalDb, QueryResult,
    TableInfo, TableSummary, MAX_QUERY_ROWS,
};
pub use guard::{check_fragment, check_identifier, check_select, SqlGuardError};
pub use stats::{compute_statistics, CategoricalStats, ColumnStatistics, NumericStats};
pub use table::{format_cell, QueryTable};
