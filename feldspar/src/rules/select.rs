use std::sync::Arc;

use datafusion_expr::Operator as BinaryOp;

use crate::cascades::ExprHandle;
use crate::catalog::{IndexDescriptor, IndexKind};
use crate::error::OptResult;
use crate::expr::{column_cmp_const, conjunction, conjuncts, ColRef, ExprRef, Expression};
use crate::operator::LogicalOperator::{LogicalDynamicGet, LogicalGet};
use crate::operator::Operator::Scalar;
use crate::operator::ScalarOperator::ScalarBoolOp;
use crate::operator::{
    BitmapBoolOpKind, BoolOpKind, LogicalBitmapTableGet, LogicalDynamicBitmapTableGet,
    LogicalDynamicIndexOnlyGet, LogicalIndexOnlyGet, LogicalOperator, LogicalSelect, OperatorId,
    PatternOperator, PhysicalFilter, ScalarBitmapBoolOp, ScalarBitmapIndexProbe, TableRef,
};
use crate::rules::get::hint_allows;
use crate::rules::RuleId::{
    Select2BitmapBoolOp, Select2DynamicBitmapBoolOp, Select2DynamicIndexOnlyGet, Select2Filter,
    Select2IndexOnlyGet,
};
use crate::rules::{
    assert_matches, pattern, Pattern, Rule, RuleContext, RuleId, RulePromise, RuleResult,
};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref SELECT_PATTERN: Pattern = {
        pattern(OperatorId::LogicalSelect)
          .leaf(PatternOperator::Leaf)
          .leaf(PatternOperator::Tree)
        .end_node()
    };
    static ref SELECT_OVER_GET_PATTERN: Pattern = {
        pattern(OperatorId::LogicalSelect)
          .leaf(PatternOperator::Node(OperatorId::LogicalGet))
          .leaf(PatternOperator::Tree)
        .end_node()
    };
    static ref SELECT_OVER_DYNAMIC_GET_PATTERN: Pattern = {
        pattern(OperatorId::LogicalSelect)
          .leaf(PatternOperator::Node(OperatorId::LogicalDynamicGet))
          .leaf(PatternOperator::Tree)
        .end_node()
    };
}

/// Transforms select to filter.
#[derive(Clone, Default)]
pub struct Select2FilterRule {}

impl Select2FilterRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Select2FilterRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        result.add(Expression::new(PhysicalFilter, input.children().to_vec()));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &SELECT_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Select2Filter
    }
}

/// Index access built from a select predicate.
struct BitmapAccess {
    /// Conjuncts answered by the indexes, rechecked on every fetched row.
    recheck: ExprRef,
    bitmap: ExprRef,
    /// Conjuncts no index answers.
    residual: Vec<ExprRef>,
}

impl BitmapAccess {
    /// Children of a bitmap get.
    fn children(&self) -> Vec<ExprRef> {
        vec![self.recheck.clone(), self.bitmap.clone()]
    }
}

/// Builds bitmap index probes for the conjuncts of `predicate` comparing an indexed column to a
/// constant, or a disjunction of such comparisons.
fn bitmap_access(table: &TableRef, predicate: &ExprRef) -> Option<BitmapAccess> {
    let mut indexed = vec![];
    let mut probes = vec![];
    let mut residual = vec![];
    for conjunct in conjuncts(predicate) {
        match bitmap_of(table, &conjunct) {
            Some(probe) => {
                indexed.push(conjunct);
                probes.push(probe);
            }
            None => residual.push(conjunct),
        }
    }

    let bitmap = match probes.len() {
        0 => return None,
        1 => probes.remove(0),
        _ => Arc::new(Expression::new(
            ScalarBitmapBoolOp::new(BitmapBoolOpKind::And),
            probes,
        )),
    };

    Some(BitmapAccess {
        recheck: conjunction(indexed),
        bitmap,
        residual,
    })
}

fn bitmap_of(table: &TableRef, expr: &ExprRef) -> Option<ExprRef> {
    if let Some(Scalar(ScalarBoolOp(op))) = expr.operator().map(|op| op.as_ref()) {
        if op.kind() != BoolOpKind::Or {
            return None;
        }
        let probes = expr
            .children()
            .iter()
            .map(|disjunct| bitmap_of(table, disjunct))
            .collect::<Option<Vec<_>>>()?;
        return Some(Arc::new(Expression::new(
            ScalarBitmapBoolOp::new(BitmapBoolOpKind::Or),
            probes,
        )));
    }

    let (column, op, _) = column_cmp_const(expr)?;
    if !is_index_comparison(op) {
        return None;
    }
    let index = leading_index(table, &column)?;
    Some(Arc::new(Expression::new(
        ScalarBitmapIndexProbe::new(index.clone()),
        vec![expr.clone()],
    )))
}

fn is_index_comparison(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Eq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
    )
}

/// First index of `table` whose leading key is `column`.
fn leading_index<'a>(table: &'a TableRef, column: &ColRef) -> Option<&'a IndexDescriptor> {
    table.desc().indexes().iter().find(|index| {
        index
            .key_columns
            .first()
            .map(|pos| &table.columns()[*pos] == column)
            .unwrap_or(false)
    })
}

fn get_table(input: &Expression) -> (&LogicalOperator, &TableRef) {
    let op = input[0]
        .operator()
        .and_then(|op| op.as_logical())
        .unwrap_or_else(|| panic!("{:?} is not a select over a get", input));
    let table = match op {
        LogicalGet(get) => get.table(),
        LogicalDynamicGet(get) => get.table(),
        _ => panic!("{:?} is not a select over a get", input),
    };
    (op, table)
}

/// Whether bitmap index paths may be used for `table`.
///
/// Security quals are evaluated as a filter above the scan, so an index condition must never
/// see rows before them.
fn bitmap_allowed(ctx: &RuleContext, table: &TableRef) -> bool {
    !table.desc().has_security_quals()
        && hint_allows(ctx, table, OperatorId::ScalarBitmapIndexProbe)
}

/// Answers a select over a get through bitmap indexes. Conjuncts no index answers stay in a
/// select above the bitmap get.
#[derive(Clone, Default)]
pub struct Select2BitmapBoolOpRule {}

impl Select2BitmapBoolOpRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Select2BitmapBoolOpRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        let (_, table) = get_table(input);
        if !bitmap_allowed(ctx, table) {
            return Ok(());
        }

        if let Some(access) = bitmap_access(table, &input[1]) {
            let bitmap_get =
                Expression::new(LogicalBitmapTableGet::new(table.clone()), access.children());
            if access.residual.is_empty() {
                result.add(bitmap_get);
            } else {
                result.add(Expression::new(
                    LogicalSelect,
                    vec![Arc::new(bitmap_get), conjunction(access.residual)],
                ));
            }
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &SELECT_OVER_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Select2BitmapBoolOp
    }

    fn promise(&self, _handle: &ExprHandle) -> RulePromise {
        RulePromise::High
    }
}

/// Bitmap access of the partitions read by a dynamic get.
///
/// The result keeps the whole predicate in a redundant select above the bitmap get, so it is
/// still available to partition elimination. Gets with foreign partitions are left to
/// [`ExpandDynamicGetWithForeignPartitionsRule`].
///
/// [`ExpandDynamicGetWithForeignPartitionsRule`]:
///     crate::rules::ExpandDynamicGetWithForeignPartitionsRule
#[derive(Clone, Default)]
pub struct Select2DynamicBitmapBoolOpRule {}

impl Select2DynamicBitmapBoolOpRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Select2DynamicBitmapBoolOpRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        let (op, table) = get_table(input);
        let parts = match op {
            LogicalDynamicGet(get) if !get.has_foreign_parts() => get.parts().to_vec(),
            _ => return Ok(()),
        };
        if !bitmap_allowed(ctx, table) {
            return Ok(());
        }

        if let Some(access) = bitmap_access(table, &input[1]) {
            let bitmap_get = Expression::new(
                LogicalDynamicBitmapTableGet::new(table.clone(), parts),
                access.children(),
            );
            result.add(Expression::new(
                LogicalSelect,
                vec![Arc::new(bitmap_get), input[1].clone()],
            ));
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &SELECT_OVER_DYNAMIC_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Select2DynamicBitmapBoolOp
    }

    fn promise(&self, _handle: &ExprHandle) -> RulePromise {
        RulePromise::High
    }
}

/// Index only access built from a select predicate.
struct IndexOnlyAccess<'a> {
    index: &'a IndexDescriptor,
    /// Conjuncts comparing a key of `index` to a constant.
    condition: ExprRef,
    residual: Vec<ExprRef>,
}

/// Picks the first btree index of `table` that stores every column of the table and has a key
/// compared to a constant by some conjunct of `predicate`.
fn index_only_access<'a>(
    table: &'a TableRef,
    predicate: &ExprRef,
) -> Option<IndexOnlyAccess<'a>> {
    let conjuncts = conjuncts(predicate);
    table
        .desc()
        .indexes()
        .iter()
        .filter(|index| index.kind == IndexKind::Btree && index.covers(0..table.columns().len()))
        .find_map(|index| {
            let (indexed, residual): (Vec<_>, Vec<_>) = conjuncts
                .iter()
                .cloned()
                .partition(|conjunct| is_key_condition(table, index, conjunct));
            if indexed.is_empty() {
                return None;
            }
            Some(IndexOnlyAccess {
                index,
                condition: conjunction(indexed),
                residual,
            })
        })
}

fn is_key_condition(table: &TableRef, index: &IndexDescriptor, expr: &ExprRef) -> bool {
    match column_cmp_const(expr) {
        Some((column, op, _)) => {
            is_index_comparison(op)
                && index
                    .key_columns
                    .iter()
                    .any(|pos| table.columns()[*pos] == column)
        }
        None => false,
    }
}

/// Whether index only paths may be used for `table`. Security quals rule them out like bitmap
/// paths.
fn index_only_allowed(ctx: &RuleContext, table: &TableRef, op: OperatorId) -> bool {
    !table.desc().has_security_quals() && hint_allows(ctx, table, op)
}

/// Answers a select over a get from a btree index storing every column of the table. Conjuncts
/// the index keys don't answer stay in a select above the index only get.
#[derive(Clone, Default)]
pub struct Select2IndexOnlyGetRule {}

impl Select2IndexOnlyGetRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Select2IndexOnlyGetRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        let (_, table) = get_table(input);
        if !index_only_allowed(ctx, table, OperatorId::LogicalIndexOnlyGet) {
            return Ok(());
        }

        if let Some(access) = index_only_access(table, &input[1]) {
            let get = Expression::new(
                LogicalIndexOnlyGet::new(table.clone(), access.index.clone()),
                vec![access.condition],
            );
            if access.residual.is_empty() {
                result.add(get);
            } else {
                result.add(Expression::new(
                    LogicalSelect,
                    vec![Arc::new(get), conjunction(access.residual)],
                ));
            }
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &SELECT_OVER_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Select2IndexOnlyGet
    }

    fn promise(&self, _handle: &ExprHandle) -> RulePromise {
        RulePromise::High
    }
}

/// Index only access of the partitions read by a dynamic get, keeping the whole predicate in a
/// select above like [`Select2DynamicBitmapBoolOpRule`].
#[derive(Clone, Default)]
pub struct Select2DynamicIndexOnlyGetRule {}

impl Select2DynamicIndexOnlyGetRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Select2DynamicIndexOnlyGetRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        let (op, table) = get_table(input);
        let parts = match op {
            LogicalDynamicGet(get) if !get.has_foreign_parts() => get.parts().to_vec(),
            _ => return Ok(()),
        };
        if !index_only_allowed(ctx, table, OperatorId::LogicalDynamicIndexOnlyGet) {
            return Ok(());
        }

        if let Some(access) = index_only_access(table, &input[1]) {
            let get = Expression::new(
                LogicalDynamicIndexOnlyGet::new(table.clone(), access.index.clone(), parts),
                vec![access.condition],
            );
            result.add(Expression::new(
                LogicalSelect,
                vec![Arc::new(get), input[1].clone()],
            ));
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &SELECT_OVER_DYNAMIC_GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Select2DynamicIndexOnlyGet
    }

    fn promise(&self, _handle: &ExprHandle) -> RulePromise {
        RulePromise::High
    }
}
