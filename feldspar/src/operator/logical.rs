use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::AsRefStr;

use crate::cascades::ExprHandle;
use crate::catalog::TableDescriptorSet;
use crate::error::OptResult;
use crate::expr::ColRefSet;
use crate::operator::{
    LogicalBitmapTableGet, LogicalDynamicBitmapTableGet, LogicalDynamicForeignGet,
    LogicalDynamicGet, LogicalDynamicIndexOnlyGet, LogicalForeignGet, LogicalFullOuterJoin,
    LogicalGet, LogicalIndexOnlyGet, LogicalInnerJoin, LogicalLeftOuterJoin, LogicalNAryJoin,
    LogicalSelect, LogicalUnionAll, OperatorId,
};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::stat::Statistics;

/// Logical relational operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, AsRefStr)]
#[enum_dispatch]
pub enum LogicalOperator {
    LogicalGet(LogicalGet),
    LogicalDynamicGet(LogicalDynamicGet),
    LogicalForeignGet(LogicalForeignGet),
    LogicalDynamicForeignGet(LogicalDynamicForeignGet),
    LogicalBitmapTableGet(LogicalBitmapTableGet),
    LogicalDynamicBitmapTableGet(LogicalDynamicBitmapTableGet),
    LogicalIndexOnlyGet(LogicalIndexOnlyGet),
    LogicalDynamicIndexOnlyGet(LogicalDynamicIndexOnlyGet),
    LogicalSelect(LogicalSelect),
    LogicalInnerJoin(LogicalInnerJoin),
    LogicalLeftOuterJoin(LogicalLeftOuterJoin),
    LogicalFullOuterJoin(LogicalFullOuterJoin),
    LogicalNAryJoin(LogicalNAryJoin),
    LogicalUnionAll(LogicalUnionAll),
}

/// Derivation of logical properties and statistics.
///
/// Children's properties are read through the [`ExprHandle`], they are always derived before
/// their parents.
#[enum_dispatch(LogicalOperator)]
pub trait LogicalOperatorTrait {
    fn derive_output_columns(&self, handle: &ExprHandle) -> ColRefSet;

    /// Tables referenced by the relational children, deduplicated by table id.
    fn derive_table_descriptors(&self, handle: &ExprHandle) -> TableDescriptorSet {
        let mut tables = TableDescriptorSet::new();
        for idx in handle.relational_children() {
            tables.union_with(handle.child_logical_prop(idx).table_descriptors());
        }
        tables
    }

    fn derive_keys(&self, _handle: &ExprHandle) -> Vec<ColRefSet> {
        vec![]
    }

    fn derive_stats(&self, handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics>;

    fn is_input_order_sensitive(&self) -> bool {
        true
    }
}

impl LogicalOperator {
    pub fn id(&self) -> OperatorId {
        match self {
            LogicalOperator::LogicalGet(_) => OperatorId::LogicalGet,
            LogicalOperator::LogicalDynamicGet(_) => OperatorId::LogicalDynamicGet,
            LogicalOperator::LogicalForeignGet(_) => OperatorId::LogicalForeignGet,
            LogicalOperator::LogicalDynamicForeignGet(_) => OperatorId::LogicalDynamicForeignGet,
            LogicalOperator::LogicalBitmapTableGet(_) => OperatorId::LogicalBitmapTableGet,
            LogicalOperator::LogicalDynamicBitmapTableGet(_) => {
                OperatorId::LogicalDynamicBitmapTableGet
            }
            LogicalOperator::LogicalIndexOnlyGet(_) => OperatorId::LogicalIndexOnlyGet,
            LogicalOperator::LogicalDynamicIndexOnlyGet(_) => {
                OperatorId::LogicalDynamicIndexOnlyGet
            }
            LogicalOperator::LogicalSelect(_) => OperatorId::LogicalSelect,
            LogicalOperator::LogicalInnerJoin(_) => OperatorId::LogicalInnerJoin,
            LogicalOperator::LogicalLeftOuterJoin(_) => OperatorId::LogicalLeftOuterJoin,
            LogicalOperator::LogicalFullOuterJoin(_) => OperatorId::LogicalFullOuterJoin,
            LogicalOperator::LogicalNAryJoin(_) => OperatorId::LogicalNAryJoin,
            LogicalOperator::LogicalUnionAll(_) => OperatorId::LogicalUnionAll,
        }
    }

    pub fn derive_logical_prop(&self, handle: &ExprHandle) -> LogicalProperty {
        LogicalProperty::new(
            self.derive_output_columns(handle),
            self.derive_table_descriptors(handle),
            self.derive_keys(handle),
        )
    }
}
