//! Index only access.
//!
//! An index only get answers its index condition, its single scalar child, from a btree index
//! storing every column of the table, so the table itself is never visited.
use std::fmt::Formatter;

use super::get::leaf_requirements;
use crate::cascades::ExprHandle;
use crate::catalog::{IndexDescriptor, TableDescriptorSet};
use crate::error::OptResult;
use crate::expr::ColRefSet;
use crate::operator::{
    DerivePropContext, DerivePropResult, DisplayFields, LogicalOperatorTrait,
    PhysicalOperatorTrait, TableRef,
};
use crate::optimizer::OptimizerContext;
use crate::properties::{
    DistributionSpec, OrderSpec, Ordering, PhysicalPropertySet, RewindabilitySpec,
};
use crate::stat::Statistics;

/// Rows come out of a btree sorted on its keys, within each segment.
fn index_order(table: &TableRef, index: &IndexDescriptor) -> OrderSpec {
    OrderSpec::new(
        index
            .key_columns
            .iter()
            .map(|pos| Ordering::asc(table.columns()[*pos].clone()))
            .collect(),
    )
}

fn index_only_stats(
    table: &TableRef,
    parts: Option<&[u32]>,
    handle: &ExprHandle,
    ctx: &OptimizerContext,
) -> Statistics {
    let table_stats = table.stats(parts, ctx);
    ctx.stats_estimator()
        .select(&table_stats, &handle.child_scalar(0))
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LogicalIndexOnlyGet {
    table: TableRef,
    index: IndexDescriptor,
}

impl LogicalIndexOnlyGet {
    pub fn new(table: TableRef, index: IndexDescriptor) -> Self {
        Self { table, index }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn index(&self) -> &IndexDescriptor {
        &self.index
    }
}

impl LogicalOperatorTrait for LogicalIndexOnlyGet {
    fn derive_output_columns(&self, _handle: &ExprHandle) -> ColRefSet {
        self.table.output_columns()
    }

    fn derive_table_descriptors(&self, _handle: &ExprHandle) -> TableDescriptorSet {
        self.table.table_descriptors()
    }

    fn derive_keys(&self, _handle: &ExprHandle) -> Vec<ColRefSet> {
        self.table.keys()
    }

    fn derive_stats(&self, handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        Ok(index_only_stats(&self.table, None, handle, ctx))
    }
}

impl DisplayFields for LogicalIndexOnlyGet {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, index: {})", self.table, self.index.name)
    }
}

/// Index only get over the selected partitions of a partitioned table.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LogicalDynamicIndexOnlyGet {
    table: TableRef,
    index: IndexDescriptor,
    parts: Vec<u32>,
}

impl LogicalDynamicIndexOnlyGet {
    pub fn new(table: TableRef, index: IndexDescriptor, parts: Vec<u32>) -> Self {
        Self {
            table,
            index,
            parts,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn index(&self) -> &IndexDescriptor {
        &self.index
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl LogicalOperatorTrait for LogicalDynamicIndexOnlyGet {
    fn derive_output_columns(&self, _handle: &ExprHandle) -> ColRefSet {
        self.table.output_columns()
    }

    fn derive_table_descriptors(&self, _handle: &ExprHandle) -> TableDescriptorSet {
        self.table.table_descriptors()
    }

    fn derive_keys(&self, _handle: &ExprHandle) -> Vec<ColRefSet> {
        self.table.keys()
    }

    fn derive_stats(&self, handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        Ok(index_only_stats(&self.table, Some(&self.parts), handle, ctx))
    }
}

impl DisplayFields for LogicalDynamicIndexOnlyGet {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:?}, index: {}, parts: {:?})",
            self.table, self.index.name, self.parts
        )
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalIndexOnlyScan {
    table: TableRef,
    index: IndexDescriptor,
}

impl PhysicalIndexOnlyScan {
    pub fn new(table: TableRef, index: IndexDescriptor) -> Self {
        Self { table, index }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn index(&self) -> &IndexDescriptor {
        &self.index
    }
}

impl PhysicalOperatorTrait for PhysicalIndexOnlyScan {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        leaf_requirements()
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        self.table.distribution()
    }

    fn derive_order(&self, _children: &[PhysicalPropertySet]) -> OrderSpec {
        index_order(&self.table, &self.index)
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }
}

impl DisplayFields for PhysicalIndexOnlyScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, index: {})", self.table, self.index.name)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalDynamicIndexOnlyScan {
    table: TableRef,
    index: IndexDescriptor,
    parts: Vec<u32>,
}

impl PhysicalDynamicIndexOnlyScan {
    pub fn new(table: TableRef, index: IndexDescriptor, parts: Vec<u32>) -> Self {
        Self {
            table,
            index,
            parts,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl PhysicalOperatorTrait for PhysicalDynamicIndexOnlyScan {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        leaf_requirements()
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        self.table.distribution()
    }

    /// Partitions are scanned one after another, so only each partition is sorted.
    fn derive_order(&self, _children: &[PhysicalPropertySet]) -> OrderSpec {
        if self.parts.len() > 1 {
            OrderSpec::default()
        } else {
            index_order(&self.table, &self.index)
        }
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }
}

impl DisplayFields for PhysicalDynamicIndexOnlyScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:?}, index: {}, parts: {:?})",
            self.table, self.index.name, self.parts
        )
    }
}
