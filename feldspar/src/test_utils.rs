use std::sync::Arc;

use arrow_schema::DataType;
use datafusion_expr::Operator::Eq;

use crate::cascades::{GroupExprId, Memo};
use crate::catalog::{
    ColumnDescriptor, DistributionPolicy, ForeignServer, IndexKind, MemoryCatalog,
    PartitionDescriptor, TableDescriptor, TableDescriptorBuilder, TableId,
};
use crate::config::OptimizerConfig;
use crate::expr::{cmp, ident, ColRef, Expression};
use crate::operator::{LogicalDynamicGet, LogicalGet, LogicalInnerJoin, LogicalOperator, Operator};
use crate::optimizer::OptimizerContext;

fn int_table(id: u64, name: &str) -> TableDescriptorBuilder {
    TableDescriptor::builder(TableId(id), name)
        .column(ColumnDescriptor::new("c1", DataType::Int32, -1, 1, false))
        .column(ColumnDescriptor::new("c2", DataType::Int32, -1, 2, true))
}

pub fn table_with_alias(id: u64, alias: &str) -> Arc<TableDescriptor> {
    let table = int_table(id, &format!("table{}", id)).build().unwrap();
    Arc::new(table).with_alias(alias)
}

/// A catalog of:
///
/// * `t1`, `t2`: hashed on `c1`, with a bitmap index on `c2`.
/// * `t3`: randomly distributed.
/// * `secured`: like `t1` but with row level security.
/// * `sales`: partitioned, two local partitions and one on each of two foreign servers.
/// * `local_sales`: partitioned, local partitions only.
/// * `ledger`: hashed on `c1`, with a btree index on `c2` that includes `c1`.
/// * `local_ledger`: `ledger` partitioned on `c2`, local partitions only.
pub fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    let tables = vec![
        int_table(1, "t1")
            .distributed_by(&["c1"])
            .key(&["c1"])
            .index(11, "t1_c2_idx", IndexKind::Bitmap, &["c2"])
            .unwrap()
            .rows(1000.0),
        int_table(2, "t2")
            .distributed_by(&["c1"])
            .index(21, "t2_c2_idx", IndexKind::Bitmap, &["c2"])
            .unwrap()
            .rows(100.0),
        int_table(3, "t3")
            .distribution(DistributionPolicy::Random)
            .rows(10.0),
        int_table(4, "secured")
            .distributed_by(&["c1"])
            .index(41, "secured_c2_idx", IndexKind::Bitmap, &["c2"])
            .unwrap()
            .security_quals(true)
            .rows(1000.0),
        int_table(5, "sales")
            .distributed_by(&["c1"])
            .partitioned_by(&["c2"])
            .partition(PartitionDescriptor::local(51))
            .partition(PartitionDescriptor::local(52))
            .partition(PartitionDescriptor::foreign(53, foreign_server(1, false)))
            .partition(PartitionDescriptor::foreign(54, foreign_server(2, true)))
            .index(55, "sales_c2_idx", IndexKind::Bitmap, &["c2"])
            .unwrap()
            .rows(4000.0),
        int_table(6, "local_sales")
            .distributed_by(&["c1"])
            .partitioned_by(&["c2"])
            .partition(PartitionDescriptor::local(61))
            .partition(PartitionDescriptor::local(62))
            .index(63, "local_sales_c2_idx", IndexKind::Bitmap, &["c2"])
            .unwrap()
            .rows(2000.0),
        int_table(7, "ledger")
            .distributed_by(&["c1"])
            .index(71, "ledger_c2_idx", IndexKind::Btree, &["c2"])
            .and_then(|b| b.include(&["c1"]))
            .unwrap()
            .rows(1000.0),
        int_table(8, "local_ledger")
            .distributed_by(&["c1"])
            .partitioned_by(&["c2"])
            .partition(PartitionDescriptor::local(81))
            .partition(PartitionDescriptor::local(82))
            .index(83, "local_ledger_c2_idx", IndexKind::Btree, &["c2"])
            .and_then(|b| b.include(&["c1"]))
            .unwrap()
            .rows(2000.0),
    ];
    for table in tables {
        catalog.register_table(table.build().unwrap());
    }
    catalog
}

pub fn foreign_server(id: u32, coordinator_only: bool) -> ForeignServer {
    ForeignServer {
        id,
        name: format!("server{}", id),
        coordinator_only,
    }
}

pub fn optimizer_context() -> OptimizerContext {
    optimizer_context_with_config(OptimizerConfig::default())
}

pub fn optimizer_context_with_config(config: OptimizerConfig) -> OptimizerContext {
    OptimizerContext::new(Arc::new(catalog()), config)
}

/// A get of every column of `table`.
pub fn scan(ctx: &OptimizerContext, table: &str) -> Expression {
    Expression::new(LogicalGet::new(ctx.table_ref(table).unwrap()), vec![])
}

/// A dynamic get of every partition of `table`.
pub fn dynamic_scan(ctx: &OptimizerContext, table: &str) -> Expression {
    Expression::new(
        LogicalDynamicGet::new(ctx.table_ref(table).unwrap()),
        vec![],
    )
}

/// Column `name` produced by a get.
pub fn column(get: &Expression, name: &str) -> ColRef {
    let op = get.operator().map(|op| op.as_ref());
    let table = match op {
        Some(Operator::Logical(LogicalOperator::LogicalGet(get))) => get.table(),
        Some(Operator::Logical(LogicalOperator::LogicalDynamicGet(get))) => get.table(),
        _ => panic!("{:?} is not a get", get),
    };
    table.column(name).unwrap().clone()
}

/// Inner join of two gets on their `c1` columns.
pub fn inner_join(outer: Expression, inner: Expression) -> Expression {
    let predicate = cmp(Eq, ident(&column(&outer, "c1")), ident(&column(&inner, "c1")));
    Expression::from((
        Operator::from(LogicalInnerJoin),
        vec![outer, inner, predicate],
    ))
}

/// Binds an expression of the memo the way a pattern of leaves and trees does: relational
/// children are group leaves, scalar children whole trees.
pub fn bind_leaves(memo: &Memo, id: GroupExprId) -> Expression {
    let expr = memo.group_expr(id);
    let children = expr
        .children()
        .iter()
        .map(|child| {
            if memo.group(*child).is_scalar() {
                memo.scalar_expr(*child)
            } else {
                Arc::new(Expression::group(*child))
            }
        })
        .collect();
    Expression::bound(expr.operator().clone(), id.group_id, children)
}
