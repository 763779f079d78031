//! Table access operators.
//!
//! Logical gets name the table and the columns they produce, scans are their physical
//! implementations. Bitmap variants have two scalar children, `[recheck, bitmap]`: the bitmap
//! selects candidate rows through indexes, the recheck condition is evaluated on every fetched row.
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::cascades::ExprHandle;
use crate::catalog::{DistributionPolicy, ForeignServer, TableDescriptor, TableDescriptorSet};
use crate::error::OptResult;
use crate::expr::{ColRef, ColRefSet, ColumnFactory};
use crate::operator::{
    DerivePropContext, DerivePropResult, DisplayFields, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::optimizer::OptimizerContext;
use crate::properties::{
    DistributionSpec, PhysicalPropertySet, RewindabilitySpec, SingletonKind,
};
use crate::stat::Statistics;

/// One reference to a table in a query, with the columns it produces.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct TableRef {
    desc: Arc<TableDescriptor>,
    /// One column per column of the descriptor, in the same order.
    columns: Vec<ColRef>,
}

impl TableRef {
    pub fn new(desc: Arc<TableDescriptor>, factory: &ColumnFactory) -> Self {
        let columns = desc
            .columns()
            .iter()
            .map(|c| factory.new_col_ref(c.name(), c.data_type().clone()))
            .collect();
        Self { desc, columns }
    }

    pub fn desc(&self) -> &Arc<TableDescriptor> {
        &self.desc
    }

    pub fn columns(&self) -> &[ColRef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColRef> {
        self.desc
            .columns()
            .iter()
            .position(|c| c.name() == name)
            .map(|pos| &self.columns[pos])
    }

    /// Same table with fresh columns, for a second reference in a rewritten expression.
    pub fn copy_with_new_columns(&self, factory: &ColumnFactory) -> Self {
        Self {
            desc: self.desc.clone(),
            columns: self.columns.iter().map(|c| factory.copy_of(c)).collect(),
        }
    }

    pub fn output_columns(&self) -> ColRefSet {
        self.columns.iter().cloned().collect()
    }

    pub fn keys(&self) -> Vec<ColRefSet> {
        self.desc
            .keys()
            .iter()
            .map(|key| key.iter().map(|pos| self.columns[*pos].clone()).collect())
            .collect()
    }

    pub(super) fn table_descriptors(&self) -> TableDescriptorSet {
        std::iter::once(self.desc.clone()).collect()
    }

    /// Distribution of rows as stored.
    pub fn distribution(&self) -> DistributionSpec {
        match self.desc.distribution() {
            DistributionPolicy::Hashed => DistributionSpec::hashed(
                self.desc
                    .dist_columns()
                    .iter()
                    .map(|pos| self.columns[*pos].clone())
                    .collect(),
                true,
            ),
            DistributionPolicy::Random => DistributionSpec::Random {
                duplicate_sensitive: true,
            },
            DistributionPolicy::Replicated => DistributionSpec::Replicated,
            DistributionPolicy::CoordinatorOnly => {
                DistributionSpec::Singleton(SingletonKind::Coordinator)
            }
        }
    }

    /// Statistics of the whole table, scaled down to `parts` if only some partitions are read.
    pub(super) fn stats(&self, parts: Option<&[u32]>, ctx: &OptimizerContext) -> Statistics {
        let mut stats = ctx.stats_estimator().table(self);
        let total = self.desc.partitions().len();
        if let Some(parts) = parts {
            if total > 0 {
                stats.set_rows(stats.rows() * parts.len() as f64 / total as f64);
            }
        }
        stats
    }
}

impl Debug for TableRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.desc)
    }
}

fn foreign_distribution(server: &ForeignServer) -> DistributionSpec {
    if server.coordinator_only {
        DistributionSpec::Singleton(SingletonKind::Coordinator)
    } else {
        DistributionSpec::Random {
            duplicate_sensitive: true,
        }
    }
}

pub(super) fn leaf_requirements() -> OptResult<Vec<DerivePropResult>> {
    Ok(vec![DerivePropResult::new(vec![])])
}

/// Partition ids of `table` stored locally.
fn local_parts(table: &TableDescriptor) -> Vec<u32> {
    table
        .partitions()
        .iter()
        .filter(|p| !p.is_foreign())
        .map(|p| p.id)
        .collect()
}

/// Reads a non-partitioned table.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LogicalGet {
    table: TableRef,
}

impl LogicalGet {
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

impl LogicalOperatorTrait for LogicalGet {
    fn derive_output_columns(&self, _handle: &ExprHandle) -> ColRefSet {
        self.table.output_columns()
    }

    fn derive_table_descriptors(&self, _handle: &ExprHandle) -> TableDescriptorSet {
        self.table.table_descriptors()
    }

    fn derive_keys(&self, _handle: &ExprHandle) -> Vec<ColRefSet> {
        self.table.keys()
    }

    fn derive_stats(&self, _handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        Ok(self.table.stats(None, ctx))
    }
}

impl DisplayFields for LogicalGet {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.table)
    }
}

/// Reads the selected partitions of a partitioned table.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LogicalDynamicGet {
    table: TableRef,
    parts: Vec<u32>,
}

impl LogicalDynamicGet {
    /// Reads every partition.
    pub fn new(table: TableRef) -> Self {
        let parts = table.desc().partitions().iter().map(|p| p.id).collect();
        Self { table, parts }
    }

    pub fn with_parts(table: TableRef, parts: Vec<u32>) -> Self {
        Self { table, parts }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }

    /// Whether any selected partition lives on a foreign server.
    pub fn has_foreign_parts(&self) -> bool {
        self.table
            .desc()
            .partitions()
            .iter()
            .any(|p| p.is_foreign() && self.parts.contains(&p.id))
    }

    /// Selected partitions stored locally.
    pub fn local_parts(&self) -> Vec<u32> {
        local_parts(self.table.desc())
            .into_iter()
            .filter(|id| self.parts.contains(id))
            .collect()
    }
}

impl LogicalOperatorTrait for LogicalDynamicGet {
    fn derive_output_columns(&self, _handle: &ExprHandle) -> ColRefSet {
        self.table.output_columns()
    }

    fn derive_table_descriptors(&self, _handle: &ExprHandle) -> TableDescriptorSet {
        self.table.table_descriptors()
    }

    fn derive_keys(&self, _handle: &ExprHandle) -> Vec<ColRefSet> {
        self.table.keys()
    }

    fn derive_stats(&self, _handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        Ok(self.table.stats(Some(&self.parts), ctx))
    }
}

impl DisplayFields for LogicalDynamicGet {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, parts: {:?})", self.table, self.parts)
    }
}

/// Reads a table stored on a foreign server.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LogicalForeignGet {
    table: TableRef,
    server: ForeignServer,
}

impl LogicalForeignGet {
    pub fn new(table: TableRef, server: ForeignServer) -> Self {
        Self { table, server }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn server(&self) -> &ForeignServer {
        &self.server
    }
}

impl LogicalOperatorTrait for LogicalForeignGet {
    fn derive_output_columns(&self, _handle: &ExprHandle) -> ColRefSet {
        self.table.output_columns()
    }

    fn derive_table_descriptors(&self, _handle: &ExprHandle) -> TableDescriptorSet {
        self.table.table_descriptors()
    }

    fn derive_stats(&self, _handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        Ok(self.table.stats(None, ctx))
    }
}

impl DisplayFields for LogicalForeignGet {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, server: {})", self.table, self.server.name)
    }
}

/// Reads the partitions of a table stored on one foreign server.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LogicalDynamicForeignGet {
    table: TableRef,
    server: ForeignServer,
    parts: Vec<u32>,
}

impl LogicalDynamicForeignGet {
    pub fn new(table: TableRef, server: ForeignServer, parts: Vec<u32>) -> Self {
        Self {
            table,
            server,
            parts,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn server(&self) -> &ForeignServer {
        &self.server
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl LogicalOperatorTrait for LogicalDynamicForeignGet {
    fn derive_output_columns(&self, _handle: &ExprHandle) -> ColRefSet {
        self.table.output_columns()
    }

    fn derive_table_descriptors(&self, _handle: &ExprHandle) -> TableDescriptorSet {
        self.table.table_descriptors()
    }

    fn derive_stats(&self, _handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        Ok(self.table.stats(Some(&self.parts), ctx))
    }
}

impl DisplayFields for LogicalDynamicForeignGet {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:?}, server: {}, parts: {:?})",
            self.table, self.server.name, self.parts
        )
    }
}

/// Reads the rows of a table selected by a bitmap.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LogicalBitmapTableGet {
    table: TableRef,
}

impl LogicalBitmapTableGet {
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

impl LogicalOperatorTrait for LogicalBitmapTableGet {
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
        let table_stats = self.table.stats(None, ctx);
        Ok(ctx
            .stats_estimator()
            .bitmap_scan(&table_stats, &handle.child_scalar(0)))
    }
}

impl DisplayFields for LogicalBitmapTableGet {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.table)
    }
}

/// Bitmap get over the selected partitions of a partitioned table.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LogicalDynamicBitmapTableGet {
    table: TableRef,
    parts: Vec<u32>,
}

impl LogicalDynamicBitmapTableGet {
    pub fn new(table: TableRef, parts: Vec<u32>) -> Self {
        Self { table, parts }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl LogicalOperatorTrait for LogicalDynamicBitmapTableGet {
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
        let table_stats = self.table.stats(Some(&self.parts), ctx);
        Ok(ctx
            .stats_estimator()
            .bitmap_scan(&table_stats, &handle.child_scalar(0)))
    }
}

impl DisplayFields for LogicalDynamicBitmapTableGet {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, parts: {:?})", self.table, self.parts)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalTableScan {
    table: TableRef,
}

impl PhysicalTableScan {
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

impl PhysicalOperatorTrait for PhysicalTableScan {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        leaf_requirements()
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        self.table.distribution()
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }
}

impl DisplayFields for PhysicalTableScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.table)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalDynamicTableScan {
    table: TableRef,
    parts: Vec<u32>,
}

impl PhysicalDynamicTableScan {
    pub fn new(table: TableRef, parts: Vec<u32>) -> Self {
        Self { table, parts }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl PhysicalOperatorTrait for PhysicalDynamicTableScan {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        leaf_requirements()
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        self.table.distribution()
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }
}

impl DisplayFields for PhysicalDynamicTableScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, parts: {:?})", self.table, self.parts)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalForeignScan {
    table: TableRef,
    server: ForeignServer,
}

impl PhysicalForeignScan {
    pub fn new(table: TableRef, server: ForeignServer) -> Self {
        Self { table, server }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

impl PhysicalOperatorTrait for PhysicalForeignScan {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        leaf_requirements()
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        foreign_distribution(&self.server)
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }
}

impl DisplayFields for PhysicalForeignScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, server: {})", self.table, self.server.name)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalDynamicForeignScan {
    table: TableRef,
    server: ForeignServer,
    parts: Vec<u32>,
}

impl PhysicalDynamicForeignScan {
    pub fn new(table: TableRef, server: ForeignServer, parts: Vec<u32>) -> Self {
        Self {
            table,
            server,
            parts,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

impl PhysicalOperatorTrait for PhysicalDynamicForeignScan {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        leaf_requirements()
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        foreign_distribution(&self.server)
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }
}

impl DisplayFields for PhysicalDynamicForeignScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({:?}, server: {}, parts: {:?})",
            self.table, self.server.name, self.parts
        )
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalBitmapTableScan {
    table: TableRef,
}

impl PhysicalBitmapTableScan {
    pub fn new(table: TableRef) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

impl PhysicalOperatorTrait for PhysicalBitmapTableScan {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        leaf_requirements()
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        self.table.distribution()
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }
}

impl DisplayFields for PhysicalBitmapTableScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.table)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalDynamicBitmapTableScan {
    table: TableRef,
    parts: Vec<u32>,
}

impl PhysicalDynamicBitmapTableScan {
    pub fn new(table: TableRef, parts: Vec<u32>) -> Self {
        Self { table, parts }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

impl PhysicalOperatorTrait for PhysicalDynamicBitmapTableScan {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        leaf_requirements()
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        self.table.distribution()
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }
}

impl DisplayFields for PhysicalDynamicBitmapTableScan {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, parts: {:?})", self.table, self.parts)
    }
}
