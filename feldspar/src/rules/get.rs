use crate::cascades::ExprHandle;
use crate::error::OptResult;
use crate::expr::Expression;
use crate::operator::LogicalOperator::{
    LogicalBitmapTableGet, LogicalDynamicBitmapTableGet, LogicalDynamicForeignGet,
    LogicalDynamicGet, LogicalDynamicIndexOnlyGet, LogicalForeignGet, LogicalGet,
    LogicalIndexOnlyGet,
};
use crate::operator::{
    LogicalOperator, Operator, OperatorId, PhysicalBitmapTableScan,
    PhysicalDynamicBitmapTableScan, PhysicalDynamicForeignScan, PhysicalDynamicIndexOnlyScan,
    PhysicalDynamicTableScan, PhysicalForeignScan, PhysicalIndexOnlyScan, PhysicalTableScan,
    TableRef,
};
use crate::rules::RuleId::{
    BitmapTableGet2BitmapTableScan, DynamicBitmapTableGet2DynamicBitmapTableScan,
    DynamicForeignGet2DynamicForeignScan, DynamicGet2DynamicTableScan,
    DynamicIndexOnlyGet2DynamicIndexOnlyScan, ForeignGet2ForeignScan, Get2TableScan,
    IndexOnlyGet2IndexOnlyScan,
};
use crate::rules::{node, Pattern, Rule, RuleContext, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref GET_PATTERN: Pattern = node(OperatorId::LogicalGet);
    static ref DYNAMIC_GET_PATTERN: Pattern = node(OperatorId::LogicalDynamicGet);
    static ref FOREIGN_GET_PATTERN: Pattern = node(OperatorId::LogicalForeignGet);
    static ref DYNAMIC_FOREIGN_GET_PATTERN: Pattern = node(OperatorId::LogicalDynamicForeignGet);
    static ref BITMAP_TABLE_GET_PATTERN: Pattern = node(OperatorId::LogicalBitmapTableGet);
    static ref DYNAMIC_BITMAP_TABLE_GET_PATTERN: Pattern = {
        node(OperatorId::LogicalDynamicBitmapTableGet)
    };
    static ref INDEX_ONLY_GET_PATTERN: Pattern = node(OperatorId::LogicalIndexOnlyGet);
    static ref DYNAMIC_INDEX_ONLY_GET_PATTERN: Pattern = {
        node(OperatorId::LogicalDynamicIndexOnlyGet)
    };
}

fn logical_get(input: &Expression) -> &LogicalOperator {
    input
        .operator()
        .and_then(|op| op.as_logical())
        .unwrap_or_else(|| panic!("{:?} is not a logical get", input))
}

/// Whether scan hints allow reading `table` with an access path rooted at `op`.
pub(super) fn hint_allows(ctx: &RuleContext, table: &TableRef, op: OperatorId) -> bool {
    ctx.plan_hint()
        .and_then(|plan_hint| plan_hint.scan_hint(table.desc().alias()))
        .map(|hint| hint.satisfies_operator(op))
        .unwrap_or(true)
}

fn implement<O: Into<Operator>>(input: &Expression, physical: O) -> Expression {
    Expression::new(physical, input.children().to_vec())
}

/// Implements a get with a sequential scan.
#[derive(Clone, Default)]
pub struct Get2TableScanRule {}

impl Get2TableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Get2TableScanRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        match logical_get(input) {
            LogicalGet(get) => {
                if hint_allows(ctx, get.table(), OperatorId::LogicalGet) {
                    result.add(implement(input, PhysicalTableScan::new(get.table().clone())));
                }
            }
            op => panic!("{:?} does not match {:?}", op, self.rule_id()),
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Get2TableScan
    }
}

/// Implements a dynamic get without foreign partitions. Those are expanded first.
#[derive(Clone, Default)]
pub struct DynamicGet2DynamicTableScanRule {}

impl DynamicGet2DynamicTableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DynamicGet2DynamicTableScanRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        match logical_get(input) {
            LogicalDynamicGet(get) => {
                if hint_allows(ctx, get.table(), OperatorId::LogicalDynamicGet) {
                    result.add(implement(
                        input,
                        PhysicalDynamicTableScan::new(get.table().clone(), get.parts().to_vec()),
                    ));
                }
            }
            op => panic!("{:?} does not match {:?}", op, self.rule_id()),
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &DYNAMIC_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        DynamicGet2DynamicTableScan
    }

    fn promise(&self, handle: &ExprHandle) -> RulePromise {
        match handle.operator().as_logical() {
            Some(LogicalDynamicGet(get)) if get.has_foreign_parts() => RulePromise::None,
            _ => RulePromise::Medium,
        }
    }
}

#[derive(Clone, Default)]
pub struct ForeignGet2ForeignScanRule {}

impl ForeignGet2ForeignScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for ForeignGet2ForeignScanRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        match logical_get(input) {
            LogicalForeignGet(get) => result.add(implement(
                input,
                PhysicalForeignScan::new(get.table().clone(), get.server().clone()),
            )),
            op => panic!("{:?} does not match {:?}", op, self.rule_id()),
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &FOREIGN_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        ForeignGet2ForeignScan
    }
}

#[derive(Clone, Default)]
pub struct DynamicForeignGet2DynamicForeignScanRule {}

impl DynamicForeignGet2DynamicForeignScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DynamicForeignGet2DynamicForeignScanRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        match logical_get(input) {
            LogicalDynamicForeignGet(get) => result.add(implement(
                input,
                PhysicalDynamicForeignScan::new(
                    get.table().clone(),
                    get.server().clone(),
                    get.parts().to_vec(),
                ),
            )),
            op => panic!("{:?} does not match {:?}", op, self.rule_id()),
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &DYNAMIC_FOREIGN_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        DynamicForeignGet2DynamicForeignScan
    }
}

/// Implements a bitmap get, keeping its `[recheck, bitmap]` children.
#[derive(Clone, Default)]
pub struct BitmapTableGet2BitmapTableScanRule {}

impl BitmapTableGet2BitmapTableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for BitmapTableGet2BitmapTableScanRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        match logical_get(input) {
            LogicalBitmapTableGet(get) => result.add(implement(
                input,
                PhysicalBitmapTableScan::new(get.table().clone()),
            )),
            op => panic!("{:?} does not match {:?}", op, self.rule_id()),
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &BITMAP_TABLE_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        BitmapTableGet2BitmapTableScan
    }
}

#[derive(Clone, Default)]
pub struct DynamicBitmapTableGet2DynamicBitmapTableScanRule {}

impl DynamicBitmapTableGet2DynamicBitmapTableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DynamicBitmapTableGet2DynamicBitmapTableScanRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        match logical_get(input) {
            LogicalDynamicBitmapTableGet(get) => result.add(implement(
                input,
                PhysicalDynamicBitmapTableScan::new(get.table().clone(), get.parts().to_vec()),
            )),
            op => panic!("{:?} does not match {:?}", op, self.rule_id()),
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &DYNAMIC_BITMAP_TABLE_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        DynamicBitmapTableGet2DynamicBitmapTableScan
    }
}

/// Implements an index only get, keeping its index condition.
#[derive(Clone, Default)]
pub struct IndexOnlyGet2IndexOnlyScanRule {}

impl IndexOnlyGet2IndexOnlyScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for IndexOnlyGet2IndexOnlyScanRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        match logical_get(input) {
            LogicalIndexOnlyGet(get) => result.add(implement(
                input,
                PhysicalIndexOnlyScan::new(get.table().clone(), get.index().clone()),
            )),
            op => panic!("{:?} does not match {:?}", op, self.rule_id()),
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &INDEX_ONLY_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        IndexOnlyGet2IndexOnlyScan
    }
}

#[derive(Clone, Default)]
pub struct DynamicIndexOnlyGet2DynamicIndexOnlyScanRule {}

impl DynamicIndexOnlyGet2DynamicIndexOnlyScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DynamicIndexOnlyGet2DynamicIndexOnlyScanRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        match logical_get(input) {
            LogicalDynamicIndexOnlyGet(get) => result.add(implement(
                input,
                PhysicalDynamicIndexOnlyScan::new(
                    get.table().clone(),
                    get.index().clone(),
                    get.parts().to_vec(),
                ),
            )),
            op => panic!("{:?} does not match {:?}", op, self.rule_id()),
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &DYNAMIC_INDEX_ONLY_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        DynamicIndexOnlyGet2DynamicIndexOnlyScan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascades::Memo;
    use crate::config::OptimizerConfig;
    use crate::expr::{cmp, constant, ident};
    use crate::hints::{PlanHint, ScanHint, ScanHintKind};
    use crate::operator::{LogicalIndexOnlyGet, PhysicalOperator};
    use datafusion_common::ScalarValue;
    use datafusion_expr::Operator::Eq;
    use std::sync::Arc;
    use crate::test_utils::{
        bind_leaves, dynamic_scan, optimizer_context, optimizer_context_with_config, scan,
    };

    #[test]
    fn test_get_to_table_scan() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let root = memo.insert(&scan(&ctx, "t1"));

        let mut result = RuleResult::new();
        Get2TableScanRule::new()
            .apply(&RuleContext::new(&memo, &ctx), &bind_leaves(&memo, root), &mut result)
            .unwrap();

        let scan = result.results().next().unwrap();
        assert!(matches!(
            scan.operator().unwrap().as_physical(),
            Some(PhysicalOperator::PhysicalTableScan(_))
        ));
    }

    #[test]
    fn test_scan_hint_disables_seq_scan() {
        let mut plan_hint = PlanHint::new();
        plan_hint.add_scan_hint(ScanHint::new("t1", vec![ScanHintKind::NoSeqScan]));
        let ctx =
            optimizer_context_with_config(OptimizerConfig::default().with_plan_hint(plan_hint));
        let memo = Memo::new();
        let t1 = memo.insert(&scan(&ctx, "t1"));
        let t2 = memo.insert(&scan(&ctx, "t2"));

        let rule_ctx = RuleContext::new(&memo, &ctx);
        let mut t1_result = RuleResult::new();
        Get2TableScanRule::new()
            .apply(&rule_ctx, &bind_leaves(&memo, t1), &mut t1_result)
            .unwrap();
        assert!(t1_result.is_empty());

        let mut t2_result = RuleResult::new();
        Get2TableScanRule::new()
            .apply(&rule_ctx, &bind_leaves(&memo, t2), &mut t2_result)
            .unwrap();
        assert_eq!(1, t2_result.len());
    }

    #[test]
    fn test_dynamic_get_with_foreign_parts_is_not_implemented() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let sales = memo.insert(&dynamic_scan(&ctx, "sales"));
        let local_sales = memo.insert(&dynamic_scan(&ctx, "local_sales"));

        let rule = DynamicGet2DynamicTableScanRule::new();
        assert_eq!(
            RulePromise::None,
            rule.promise(&ExprHandle::new(&memo, &memo.group_expr(sales)))
        );
        assert_eq!(
            RulePromise::Medium,
            rule.promise(&ExprHandle::new(&memo, &memo.group_expr(local_sales)))
        );
    }

    #[test]
    fn test_index_only_get_keeps_index_condition() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let table = ctx.table_ref("ledger").unwrap();
        let index = table.desc().indexes()[0].clone();
        let condition = cmp(
            Eq,
            ident(table.column("c2").unwrap()),
            constant(ScalarValue::Int32(Some(1))),
        );
        let get = Expression::new(
            LogicalIndexOnlyGet::new(table, index),
            vec![Arc::new(condition.clone())],
        );
        let root = memo.insert(&get);

        let mut result = RuleResult::new();
        IndexOnlyGet2IndexOnlyScanRule::new()
            .apply(&RuleContext::new(&memo, &ctx), &bind_leaves(&memo, root), &mut result)
            .unwrap();

        let scan = result.results().next().unwrap();
        match scan.operator().unwrap().as_physical() {
            Some(PhysicalOperator::PhysicalIndexOnlyScan(scan)) => {
                assert_eq!("ledger_c2_idx", scan.index().name)
            }
            other => panic!("unexpected alternative {:?}", other),
        }
        assert_eq!(condition, *scan[0]);
    }
}
