pub mod schema;

use std::sync::Arc;

use datafusion_expr::Operator::Eq;
use feldspar::cascades::CascadesOptimizer;
use feldspar::config::OptimizerConfig;
use feldspar::expr::{cmp, ident, ColRef, Expression};
use feldspar::operator::{LogicalDynamicGet, LogicalGet, LogicalInnerJoin, LogicalOperator};
use feldspar::optimizer::OptimizerContext;
use feldspar::plan::Plan;
use feldspar::properties::{DistributionSpec, PhysicalPropertySet, SingletonKind};

use crate::utils::schema::warehouse_catalog;

pub fn optimizer_context(config: OptimizerConfig) -> OptimizerContext {
    OptimizerContext::new(Arc::new(warehouse_catalog()), config)
}

pub fn get(ctx: &OptimizerContext, table: &str) -> Expression {
    Expression::new(LogicalGet::new(ctx.table_ref(table).unwrap()), vec![])
}

pub fn dynamic_get(ctx: &OptimizerContext, table: &str) -> Expression {
    Expression::new(
        LogicalDynamicGet::new(ctx.table_ref(table).unwrap()),
        vec![],
    )
}

pub fn column(get: &Expression, name: &str) -> ColRef {
    let table = match get.operator().and_then(|op| op.as_logical()) {
        Some(LogicalOperator::LogicalGet(get)) => get.table(),
        Some(LogicalOperator::LogicalDynamicGet(get)) => get.table(),
        other => panic!("{:?} is not a get", other),
    };
    table.column(name).unwrap().clone()
}

/// Joins two gets on `id`.
pub fn inner_join(outer: Expression, inner: Expression) -> Expression {
    let predicate = cmp(Eq, ident(&column(&outer, "id")), ident(&column(&inner, "id")));
    Expression::new(
        LogicalInnerJoin,
        vec![Arc::new(outer), Arc::new(inner), Arc::new(predicate)],
    )
}

pub fn on_coordinator() -> PhysicalPropertySet {
    PhysicalPropertySet::with_dist(DistributionSpec::Singleton(SingletonKind::Coordinator))
}

/// Optimizes `expr` with every rule enabled by `ctx`.
pub fn optimize(ctx: OptimizerContext, expr: &Expression, required: PhysicalPropertySet) -> Plan {
    CascadesOptimizer::with_config_rules(ctx, expr, required)
        .find_best_plan()
        .unwrap()
}

/// Operator names of `plan`, in breadth first order.
pub fn operator_names(plan: &Plan) -> Vec<String> {
    plan.bfs_iterator()
        .map(|node| node.operator().id().as_ref().to_string())
        .collect()
}
