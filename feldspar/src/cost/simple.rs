use serde::{Deserialize, Serialize};

use crate::cost::{Cost, CostContext, CostModel};
use crate::operator::PhysicalOperator::*;

/// Per row weights of [`SimpleCostModel`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostParams {
    pub seq_scan_row: f64,
    /// Rows fetched through a bitmap are read out of order.
    pub bitmap_scan_row: f64,
    /// Index only scans read the index pages alone.
    pub index_only_scan_row: f64,
    pub filter_row: f64,
    pub hash_build_row: f64,
    pub hash_probe_row: f64,
    pub join_output_row: f64,
    /// Evaluating the predicate on one pair of rows.
    pub nl_join_pair: f64,
    pub motion_row: f64,
    /// Broadcasts send each row once per segment.
    pub segments: f64,
    pub sort_row: f64,
    pub spool_row: f64,
    pub union_row: f64,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            seq_scan_row: 1.0,
            bitmap_scan_row: 0.5,
            index_only_scan_row: 0.2,
            filter_row: 0.1,
            hash_build_row: 1.5,
            hash_probe_row: 1.0,
            join_output_row: 0.1,
            nl_join_pair: 0.01,
            motion_row: 2.0,
            segments: 3.0,
            sort_row: 0.5,
            spool_row: 0.5,
            union_row: 0.05,
        }
    }
}

#[derive(Default, Debug)]
pub struct SimpleCostModel {
    params: CostParams,
}

impl SimpleCostModel {
    pub fn new(params: CostParams) -> Self {
        Self { params }
    }

    fn child_rows(context: &CostContext, idx: usize) -> f64 {
        context.child_rows.get(idx).copied().unwrap_or(0.0)
    }

    fn hash_join(&self, context: &CostContext) -> f64 {
        let p = &self.params;
        Self::child_rows(context, 0) * p.hash_probe_row
            + Self::child_rows(context, 1) * p.hash_build_row
            + context.rows * p.join_output_row
    }
}

impl CostModel for SimpleCostModel {
    fn cost(&self, context: &CostContext) -> Cost {
        let p = &self.params;
        let input = Self::child_rows(context, 0);
        let cost = match context.operator {
            PhysicalTableScan(_)
            | PhysicalDynamicTableScan(_)
            | PhysicalForeignScan(_)
            | PhysicalDynamicForeignScan(_) => context.rows * p.seq_scan_row,
            PhysicalBitmapTableScan(_) | PhysicalDynamicBitmapTableScan(_) => {
                context.rows * p.bitmap_scan_row
            }
            PhysicalIndexOnlyScan(_) | PhysicalDynamicIndexOnlyScan(_) => {
                context.rows * p.index_only_scan_row
            }
            PhysicalFilter(_) => input * p.filter_row,
            PhysicalInnerHashJoin(_) | PhysicalLeftOuterHashJoin(_) | PhysicalFullHashJoin(_) => {
                self.hash_join(context)
            }
            PhysicalInnerNLJoin(_) => {
                input * Self::child_rows(context, 1) * p.nl_join_pair
                    + context.rows * p.join_output_row
            }
            PhysicalUnionAll(_) => context.child_rows.iter().sum::<f64>() * p.union_row,
            PhysicalMotionGather(_) | PhysicalMotionHashDistribute(_) | PhysicalMotionRandom(_) => {
                input * p.motion_row
            }
            PhysicalMotionBroadcast(_) => input * p.motion_row * p.segments,
            PhysicalSort(_) => input * input.max(2.0).log2() * p.sort_row,
            PhysicalSpool(_) => input * p.spool_row,
        };
        Cost::from(cost)
    }
}
