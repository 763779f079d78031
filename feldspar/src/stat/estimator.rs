use datafusion_expr::Operator as BinaryOp;

use crate::expr::{column_cmp_const, column_eq_column, conjuncts, ColRef, ExprRef};
use crate::operator::TableRef;
use crate::stat::{ColumnStatistics, Statistics, StatsRef};

/// Kind of join whose cardinality is estimated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    FullOuter,
}

/// Cardinality estimation used when deriving statistics of groups.
///
/// Estimators only compute, they never see the memo. Row hints are applied by the caller.
pub trait StatsEstimator: Send + Sync {
    /// Statistics of every row of `table`.
    fn table(&self, table: &TableRef) -> Statistics;

    fn select(&self, input: &Statistics, predicate: &ExprRef) -> Statistics;

    /// `children` are the relational inputs in order, `predicate` the join condition.
    fn join(&self, kind: JoinKind, children: &[StatsRef], predicate: &ExprRef) -> Statistics;

    fn union_all(&self, children: &[StatsRef]) -> Statistics;

    /// Rows of `table` fetched through a bitmap and kept by the recheck condition.
    fn bitmap_scan(&self, table: &Statistics, recheck: &ExprRef) -> Statistics {
        self.select(table, recheck)
    }
}

/// Selectivity of `col = const` without column statistics.
pub const DEFAULT_EQ_SELECTIVITY: f64 = 0.1;
/// Selectivity of range comparisons.
pub const DEFAULT_RANGE_SELECTIVITY: f64 = 1.0 / 3.0;
/// Selectivity of any other predicate.
pub const DEFAULT_SELECTIVITY: f64 = 0.25;

/// Textbook estimator assuming independent predicates and uniform values.
#[derive(Default, Debug)]
pub struct SimpleStatsEstimator;

impl SimpleStatsEstimator {
    fn ndv(children: &[&Statistics], col: &ColRef) -> Option<f64> {
        children.iter().find_map(|stats| stats.ndv(col.id()))
    }

    /// Selectivity of one conjunct over the rows described by `children`.
    fn selectivity(children: &[&Statistics], predicate: &ExprRef) -> f64 {
        if let Some((left, right)) = column_eq_column(predicate) {
            let ndv = Self::ndv(children, left)
                .into_iter()
                .chain(Self::ndv(children, right))
                .fold(None, |max: Option<f64>, ndv| Some(max.map_or(ndv, |m| m.max(ndv))));
            return ndv.map_or(DEFAULT_EQ_SELECTIVITY, |ndv| 1.0 / ndv);
        }

        match column_cmp_const(predicate) {
            Some((col, BinaryOp::Eq, _)) => Self::ndv(children, &col)
                .map_or(DEFAULT_EQ_SELECTIVITY, |ndv| 1.0 / ndv),
            Some((_, BinaryOp::NotEq, _)) => 1.0 - DEFAULT_EQ_SELECTIVITY,
            Some((_, BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq, _)) => {
                DEFAULT_RANGE_SELECTIVITY
            }
            _ => DEFAULT_SELECTIVITY,
        }
    }

    fn filtered(children: &[&Statistics], rows: f64, predicate: &ExprRef) -> Statistics {
        let selectivity: f64 = conjuncts(predicate)
            .iter()
            .map(|conjunct| Self::selectivity(children, conjunct))
            .product();

        let mut stats = Statistics::new(rows * selectivity);
        for child in children {
            for (col, col_stats) in child.columns() {
                stats.set_column(*col, *col_stats);
            }
        }
        stats
    }
}

impl StatsEstimator for SimpleStatsEstimator {
    fn table(&self, table: &TableRef) -> Statistics {
        let rows = table.desc().rows();
        let mut stats = Statistics::new(rows);
        // Every value of a single column key is distinct.
        for key in table.keys() {
            if key.len() == 1 {
                if let Some(col) = key.iter().next() {
                    stats.set_column(
                        col.id(),
                        ColumnStatistics {
                            ndv: rows,
                            null_fraction: 0.0,
                        },
                    );
                }
            }
        }
        stats
    }

    fn select(&self, input: &Statistics, predicate: &ExprRef) -> Statistics {
        Self::filtered(&[input], input.rows(), predicate)
    }

    fn join(&self, kind: JoinKind, children: &[StatsRef], predicate: &ExprRef) -> Statistics {
        let inputs: Vec<&Statistics> = children.iter().map(|c| c.as_ref()).collect();
        let cross: f64 = inputs.iter().map(|c| c.rows()).product();
        let mut stats = Self::filtered(&inputs, cross, predicate);

        let outer = inputs.first().map_or(0.0, |c| c.rows());
        let inner = inputs.get(1).map_or(0.0, |c| c.rows());
        match kind {
            JoinKind::Inner => {}
            JoinKind::LeftOuter => stats.set_rows(stats.rows().max(outer)),
            JoinKind::FullOuter => stats.set_rows(stats.rows().max(outer).max(inner)),
        }
        stats
    }

    fn union_all(&self, children: &[StatsRef]) -> Statistics {
        Statistics::new(children.iter().map(|c| c.rows()).sum())
    }
}
