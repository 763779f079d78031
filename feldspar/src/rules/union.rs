use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cascades::ExprHandle;
use crate::catalog::ForeignServer;
use crate::error::OptResult;
use crate::expr::Expression;
use crate::operator::LogicalOperator::{LogicalDynamicGet, LogicalUnionAll};
use crate::operator::{
    LogicalDynamicForeignGet, LogicalDynamicGet as DynamicGet, LogicalUnionAll as UnionAll,
    OperatorId, PhysicalUnionAll,
};
use crate::rules::RuleId::{ExpandDynamicGetWithForeignPartitions, UnionAll2UnionAll};
use crate::rules::{node, Pattern, Rule, RuleContext, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref UNION_ALL_PATTERN: Pattern = node(OperatorId::LogicalUnionAll);
    static ref DYNAMIC_GET_PATTERN: Pattern = node(OperatorId::LogicalDynamicGet);
}

#[derive(Clone, Default)]
pub struct UnionAll2UnionAllRule {}

impl UnionAll2UnionAllRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for UnionAll2UnionAllRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        match input.operator().and_then(|op| op.as_logical()) {
            Some(LogicalUnionAll(union)) => result.add(Expression::new(
                PhysicalUnionAll::new(
                    union.output_columns().to_vec(),
                    union.input_columns().to_vec(),
                ),
                input.children().to_vec(),
            )),
            _ => panic!("{:?} does not match {:?}", input, self.rule_id()),
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &UNION_ALL_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        UnionAll2UnionAll
    }
}

/// Splits a dynamic get reading foreign partitions into a union of one dynamic get of the local
/// partitions and one dynamic foreign get per foreign server.
#[derive(Clone, Default)]
pub struct ExpandDynamicGetWithForeignPartitionsRule {}

impl ExpandDynamicGetWithForeignPartitionsRule {
    pub fn new() -> Self {
        Self {}
    }
}

/// Foreign partitions read by `get`, by server.
fn foreign_parts_by_server(get: &DynamicGet) -> BTreeMap<ForeignServer, Vec<u32>> {
    let mut servers: BTreeMap<ForeignServer, Vec<u32>> = BTreeMap::new();
    for part in get.table().desc().partitions() {
        if let Some(server) = &part.foreign_server {
            if get.parts().contains(&part.id) {
                servers.entry(server.clone()).or_default().push(part.id);
            }
        }
    }
    servers
}

impl Rule for ExpandDynamicGetWithForeignPartitionsRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        let get = match input.operator().and_then(|op| op.as_logical()) {
            Some(LogicalDynamicGet(get)) => get,
            _ => panic!("{:?} does not match {:?}", input, self.rule_id()),
        };
        let servers = foreign_parts_by_server(get);
        if servers.is_empty() {
            return Ok(());
        }

        let table = get.table();
        let local_parts = get.local_parts();
        if local_parts.is_empty() && servers.len() == 1 {
            if let Some((server, parts)) = servers.into_iter().next() {
                result.add(Expression::new(
                    LogicalDynamicForeignGet::new(table.clone(), server, parts),
                    vec![],
                ));
            }
            return Ok(());
        }

        let mut inputs = vec![];
        let mut input_columns = vec![];
        if !local_parts.is_empty() {
            let local = table.copy_with_new_columns(ctx.column_factory());
            input_columns.push(local.columns().to_vec());
            inputs.push(Arc::new(Expression::new(
                DynamicGet::with_parts(local, local_parts),
                vec![],
            )));
        }
        for (server, parts) in servers {
            let foreign = table.copy_with_new_columns(ctx.column_factory());
            input_columns.push(foreign.columns().to_vec());
            inputs.push(Arc::new(Expression::new(
                LogicalDynamicForeignGet::new(foreign, server, parts),
                vec![],
            )));
        }

        result.add(Expression::new(
            UnionAll::new(table.columns().to_vec(), input_columns),
            inputs,
        ));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &DYNAMIC_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        ExpandDynamicGetWithForeignPartitions
    }

    fn promise(&self, handle: &ExprHandle) -> RulePromise {
        match handle.operator().as_logical() {
            Some(LogicalDynamicGet(get)) if get.has_foreign_parts() => RulePromise::High,
            _ => RulePromise::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascades::Memo;
    use crate::catalog::{ColumnDescriptor, PartitionDescriptor, TableDescriptor, TableId};
    use crate::operator::{LogicalOperator, PhysicalOperator, TableRef};
    use crate::optimizer::OptimizerContext;
    use crate::test_utils::{bind_leaves, dynamic_scan, foreign_server, optimizer_context};
    use arrow_schema::DataType;

    fn expand(ctx: &OptimizerContext, input: Expression) -> Vec<Expression> {
        let memo = Memo::new();
        let root = memo.insert(&input);
        let mut result = RuleResult::new();
        ExpandDynamicGetWithForeignPartitionsRule::new()
            .apply(&RuleContext::new(&memo, ctx), &bind_leaves(&memo, root), &mut result)
            .unwrap();
        result.results().collect()
    }

    #[test]
    fn test_expand_into_union_per_server() {
        let ctx = optimizer_context();
        let get = dynamic_scan(&ctx, "sales");
        let alternatives = expand(&ctx, get.clone());
        assert_eq!(1, alternatives.len());

        let union = &alternatives[0];
        let union_op = match union.operator().unwrap().as_logical() {
            Some(LogicalUnionAll(union)) => union,
            other => panic!("expected union, got {:?}", other),
        };
        // Local partitions, then one input per server.
        assert_eq!(3, union.arity());
        match union[0].operator().unwrap().as_logical() {
            Some(LogicalDynamicGet(local)) => assert_eq!(&[51, 52], local.parts()),
            other => panic!("expected local dynamic get, got {:?}", other),
        }
        for (idx, part) in [(1, 53), (2, 54)] {
            match union[idx].operator().unwrap().as_logical() {
                Some(LogicalOperator::LogicalDynamicForeignGet(foreign)) => {
                    assert_eq!(&[part], foreign.parts())
                }
                other => panic!("expected foreign get, got {:?}", other),
            }
        }

        // The union produces the columns of the original get from fresh input columns.
        let original = match get.operator().unwrap().as_logical() {
            Some(LogicalDynamicGet(get)) => get.table().columns().to_vec(),
            _ => unreachable!(),
        };
        assert_eq!(original, union_op.output_columns());
        assert!(union_op
            .input_columns()
            .iter()
            .all(|cols| cols.iter().all(|c| !original.contains(c))));
    }

    #[test]
    fn test_single_foreign_server_needs_no_union() {
        let ctx = optimizer_context();
        let desc = TableDescriptor::builder(TableId(100), "remote")
            .column(ColumnDescriptor::new("c1", DataType::Int32, -1, 1, false))
            .partitioned_by(&["c1"])
            .partition(PartitionDescriptor::foreign(101, foreign_server(1, false)))
            .partition(PartitionDescriptor::foreign(102, foreign_server(1, false)))
            .build()
            .unwrap();
        let table = TableRef::new(Arc::new(desc), ctx.column_factory());
        let alternatives = expand(&ctx, Expression::new(DynamicGet::new(table.clone()), vec![]));

        assert_eq!(1, alternatives.len());
        match alternatives[0].operator().unwrap().as_logical() {
            Some(LogicalOperator::LogicalDynamicForeignGet(foreign)) => {
                assert_eq!(&[101, 102], foreign.parts());
                assert_eq!(&table, foreign.table());
            }
            other => panic!("expected foreign get, got {:?}", other),
        }
    }

    #[test]
    fn test_promise_requires_foreign_parts() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let sales = memo.insert(&dynamic_scan(&ctx, "sales"));
        let local_sales = memo.insert(&dynamic_scan(&ctx, "local_sales"));

        let rule = ExpandDynamicGetWithForeignPartitionsRule::new();
        assert_eq!(
            RulePromise::High,
            rule.promise(&ExprHandle::new(&memo, &memo.group_expr(sales)))
        );
        assert_eq!(
            RulePromise::None,
            rule.promise(&ExprHandle::new(&memo, &memo.group_expr(local_sales)))
        );
    }

    #[test]
    fn test_union_all_to_physical() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let alternatives = expand(&ctx, dynamic_scan(&ctx, "sales"));
        let root = memo.insert(&alternatives[0]);

        let mut result = RuleResult::new();
        UnionAll2UnionAllRule::new()
            .apply(&RuleContext::new(&memo, &ctx), &bind_leaves(&memo, root), &mut result)
            .unwrap();
        let union = result.results().next().unwrap();
        assert_eq!(3, union.arity());
        assert!(matches!(
            union.operator().unwrap().as_physical(),
            Some(PhysicalOperator::PhysicalUnionAll(_))
        ));
    }
}
