use crate::cascades::ExprHandle;
use crate::error::OptResult;
use crate::expr::ColRefSet;
use crate::operator::{
    DerivePropContext, DerivePropResult, DisplayFields, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::optimizer::OptimizerContext;
use crate::properties::{DistributionSpec, OrderSpec, PhysicalPropertySet, RewindabilitySpec};
use crate::stat::Statistics;

/// Rows of `[input, predicate]` for which the predicate holds.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct LogicalSelect;

impl LogicalOperatorTrait for LogicalSelect {
    fn derive_output_columns(&self, handle: &ExprHandle) -> ColRefSet {
        handle.child_logical_prop(0).output_columns().clone()
    }

    fn derive_keys(&self, handle: &ExprHandle) -> Vec<ColRefSet> {
        handle.child_logical_prop(0).keys().to_vec()
    }

    fn derive_stats(&self, handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        Ok(ctx
            .stats_estimator()
            .select(&handle.child_stats(0), &handle.child_scalar(1)))
    }
}

impl DisplayFields for LogicalSelect {}

/// Evaluates the predicate row by row, keeping every property of its input.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct PhysicalFilter;

impl PhysicalOperatorTrait for PhysicalFilter {
    fn derive_properties(&self, context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        Ok(vec![DerivePropResult::new(vec![context
            .required_prop
            .clone()])])
    }

    fn derive_distribution(&self, children: &[PhysicalPropertySet]) -> DistributionSpec {
        children[0].dist().clone()
    }

    fn derive_order(&self, children: &[PhysicalPropertySet]) -> OrderSpec {
        children[0].order().clone()
    }

    fn derive_rewindability(&self, children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        children[0].rewind()
    }
}

impl DisplayFields for PhysicalFilter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ColumnFactory;
    use crate::properties::{OrderSpec, Ordering};
    use arrow_schema::DataType;

    #[test]
    fn test_filter_passes_properties_through() {
        let a = ColumnFactory::default().new_col_ref("a", DataType::Int32);
        let required = PhysicalPropertySet::new(
            DistributionSpec::hashed(vec![a.clone()], true),
            OrderSpec::new(vec![Ordering::asc(a)]),
            RewindabilitySpec::Rewindable,
        );

        let results = PhysicalFilter
            .derive_properties(DerivePropContext {
                required_prop: &required,
            })
            .unwrap();
        assert_eq!(vec![required.clone()], results[0].input_required_props);

        let delivered = PhysicalFilter.derive_distribution(&[required.clone()]);
        assert_eq!(required.dist(), &delivered);
        assert_eq!(
            RewindabilitySpec::Rewindable,
            PhysicalFilter.derive_rewindability(&[required])
        );
    }
}
