use std::fmt::Formatter;

use crate::cascades::ExprHandle;
use crate::error::OptResult;
use crate::expr::{ColRef, ColRefSet};
use crate::operator::{
    DerivePropContext, DerivePropResult, DisplayFields, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::optimizer::OptimizerContext;
use crate::properties::{DistributionSpec, PhysicalPropertySet, SingletonKind};
use crate::stat::Statistics;

/// Concatenates its inputs. Column `input_columns[i][j]` of input `i` becomes
/// `output_columns[j]`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct LogicalUnionAll {
    output_columns: Vec<ColRef>,
    input_columns: Vec<Vec<ColRef>>,
}

impl LogicalUnionAll {
    pub fn new(output_columns: Vec<ColRef>, input_columns: Vec<Vec<ColRef>>) -> Self {
        assert!(
            input_columns
                .iter()
                .all(|cols| cols.len() == output_columns.len()),
            "union inputs must produce as many columns as the union"
        );
        Self {
            output_columns,
            input_columns,
        }
    }

    pub fn output_columns(&self) -> &[ColRef] {
        &self.output_columns
    }

    pub fn input_columns(&self) -> &[Vec<ColRef>] {
        &self.input_columns
    }
}

impl LogicalOperatorTrait for LogicalUnionAll {
    fn derive_output_columns(&self, _handle: &ExprHandle) -> ColRefSet {
        self.output_columns.iter().cloned().collect()
    }

    fn derive_stats(&self, handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        let children = handle
            .relational_children()
            .map(|idx| handle.child_stats(idx))
            .collect::<Vec<_>>();
        Ok(ctx.stats_estimator().union_all(&children))
    }
}

impl DisplayFields for LogicalUnionAll {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.output_columns)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalUnionAll {
    output_columns: Vec<ColRef>,
    input_columns: Vec<Vec<ColRef>>,
}

impl PhysicalUnionAll {
    pub fn new(output_columns: Vec<ColRef>, input_columns: Vec<Vec<ColRef>>) -> Self {
        Self {
            output_columns,
            input_columns,
        }
    }

    pub fn output_columns(&self) -> &[ColRef] {
        &self.output_columns
    }

    fn arity(&self) -> usize {
        self.input_columns.len()
    }
}

impl PhysicalOperatorTrait for PhysicalUnionAll {
    /// Either every input runs where its rows are, as long as no rows get duplicated by a
    /// replicated input, or everything is gathered on the coordinator.
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        let parallel = PhysicalPropertySet::with_dist(DistributionSpec::NonReplicated);
        let coordinator =
            PhysicalPropertySet::with_dist(DistributionSpec::Singleton(SingletonKind::Coordinator));
        Ok(vec![
            DerivePropResult::new(vec![parallel; self.arity()]),
            DerivePropResult::new(vec![coordinator; self.arity()]),
        ])
    }

    fn derive_distribution(&self, children: &[PhysicalPropertySet]) -> DistributionSpec {
        let on_coordinator = DistributionSpec::Singleton(SingletonKind::Coordinator);
        if !children.is_empty() && children.iter().all(|c| c.dist() == &on_coordinator) {
            on_coordinator
        } else {
            DistributionSpec::Random {
                duplicate_sensitive: true,
            }
        }
    }
}

impl DisplayFields for PhysicalUnionAll {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.output_columns)
    }
}
