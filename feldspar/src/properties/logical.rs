use crate::catalog::TableDescriptorSet;
use crate::expr::ColRefSet;

/// Properties shared by all logically equivalent expressions of a group.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LogicalProperty {
    output_columns: ColRefSet,
    table_descriptors: TableDescriptorSet,
    /// Each set of columns uniquely identifies a row.
    keys: Vec<ColRefSet>,
}

impl LogicalProperty {
    pub fn new(
        output_columns: ColRefSet,
        table_descriptors: TableDescriptorSet,
        keys: Vec<ColRefSet>,
    ) -> Self {
        Self {
            output_columns,
            table_descriptors,
            keys,
        }
    }

    pub fn output_columns(&self) -> &ColRefSet {
        &self.output_columns
    }

    pub fn table_descriptors(&self) -> &TableDescriptorSet {
        &self.table_descriptors
    }

    pub fn keys(&self) -> &[ColRefSet] {
        &self.keys
    }
}
