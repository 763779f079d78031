//! Statistics of relational expressions.
mod estimator;
pub use estimator::*;

use std::collections::HashMap;
use std::sync::Arc;

use crate::expr::ColId;

/// Statistics are shared by all members of a group, and of its duplicates.
pub type StatsRef = Arc<Statistics>;

/// Statistics of a relational expression.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Statistics {
    /// Total number of rows.
    ///
    /// This maybe an estimated value.
    rows: f64,
    /// Statistics of each column.
    column_stats: HashMap<ColId, ColumnStatistics>,
}

/// Statistics of one column.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ColumnStatistics {
    /// Number of distinct values.
    pub ndv: f64,
    /// Fraction of rows that are null.
    pub null_fraction: f64,
}

impl Statistics {
    pub fn new(rows: f64) -> Self {
        Self {
            rows: rows.max(0.0),
            column_stats: HashMap::new(),
        }
    }

    pub fn rows(&self) -> f64 {
        self.rows
    }

    /// Overrides the row estimate, e.g. with a row hint.
    pub fn set_rows(&mut self, rows: f64) {
        self.rows = rows.max(0.0);
    }

    pub fn column(&self, col: ColId) -> Option<&ColumnStatistics> {
        self.column_stats.get(&col)
    }

    pub fn set_column(&mut self, col: ColId, stats: ColumnStatistics) {
        self.column_stats.insert(col, stats);
    }

    pub fn with_column(mut self, col: ColId, stats: ColumnStatistics) -> Self {
        self.set_column(col, stats);
        self
    }

    /// Number of distinct values of `col`, bounded by the row count.
    pub fn ndv(&self, col: ColId) -> Option<f64> {
        self.column(col).map(|c| c.ndv.min(self.rows).max(1.0))
    }

    pub(crate) fn columns(&self) -> impl Iterator<Item = (&ColId, &ColumnStatistics)> {
        self.column_stats.iter()
    }
}
