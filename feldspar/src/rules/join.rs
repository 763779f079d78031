use std::sync::Arc;

use crate::cascades::ExprHandle;
use crate::error::OptResult;
use crate::expr::{
    conjunction, conjuncts, equi_join_keys, used_columns, ColRefSet, ExprRef, Expression,
};
use crate::operator::{
    HashJoinKeys, LogicalInnerJoin, Operator, OperatorId, PatternOperator,
    PhysicalFullHashJoin, PhysicalInnerHashJoin, PhysicalInnerNLJoin, PhysicalLeftOuterHashJoin,
};
use crate::rules::RuleId::{
    ExpandNAryJoin, FullJoinCommutativity, FullOuterJoin2HashJoin, InnerJoin2HashJoin,
    InnerJoin2NLJoin, InnerJoinCommutativity, LeftOuterJoin2HashJoin,
};
use crate::rules::{
    assert_matches, pattern, Pattern, Rule, RuleContext, RuleId, RulePromise, RuleResult,
};
use crate::utils::TreeBuilder;

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref INNER_JOIN_PATTERN: Pattern = {
        join_pattern(OperatorId::LogicalInnerJoin)
    };
    static ref LEFT_OUTER_JOIN_PATTERN: Pattern = {
        join_pattern(OperatorId::LogicalLeftOuterJoin)
    };
    static ref FULL_OUTER_JOIN_PATTERN: Pattern = {
        join_pattern(OperatorId::LogicalFullOuterJoin)
    };
    static ref NARY_JOIN_PATTERN: Pattern = {
        pattern(OperatorId::LogicalNAryJoin)
          .leaf(PatternOperator::MultiLeaf)
        .end_node()
    };
}

/// `[outer, inner, predicate]` with the predicate bound as a tree.
fn join_pattern(join: OperatorId) -> Pattern {
    pattern(join)
        .leaf(PatternOperator::Leaf)
        .leaf(PatternOperator::Leaf)
        .leaf(PatternOperator::Tree)
        .end_node()
}

/// Same join with its outer and inner inputs swapped.
fn commute(input: &Expression) -> Expression {
    input.with_children(vec![
        input[1].clone(),
        input[0].clone(),
        input[2].clone(),
    ])
}

/// Swaps the inputs of an inner join.
#[derive(Clone, Default)]
pub struct InnerJoinCommutativityRule {}

impl InnerJoinCommutativityRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for InnerJoinCommutativityRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        result.add(commute(input));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &INNER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        InnerJoinCommutativity
    }

    fn is_compatible(&self, other: RuleId) -> bool {
        other != InnerJoinCommutativity
    }
}

/// Swaps the inputs of a full outer join.
#[derive(Clone, Default)]
pub struct FullJoinCommutativityRule {}

impl FullJoinCommutativityRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for FullJoinCommutativityRule {
    fn apply(
        &self,
        _ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        result.add(commute(input));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &FULL_OUTER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        FullJoinCommutativity
    }

    fn is_compatible(&self, other: RuleId) -> bool {
        other != FullJoinCommutativity
    }
}

/// Expands an n-ary join into a left deep tree of inner joins in input order.
///
/// Each conjunct of the predicate is evaluated by the lowest join producing all its columns.
#[derive(Clone, Default)]
pub struct ExpandNAryJoinRule {}

impl ExpandNAryJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for ExpandNAryJoinRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        let (predicate, inputs) = input
            .children()
            .split_last()
            .unwrap_or_else(|| panic!("n-ary join {:?} without predicate", input));
        assert!(inputs.len() >= 2, "n-ary join {:?} has less than two inputs", input);

        let mut pending: Vec<(ExprRef, ColRefSet)> = conjuncts(&ctx.scalar(predicate))
            .into_iter()
            .map(|conjunct| {
                let columns = used_columns(&conjunct);
                (conjunct, columns)
            })
            .collect();

        let mut joined = inputs[0].clone();
        let mut columns = ctx.logical_prop(&inputs[0]).output_columns().clone();
        for (idx, next) in inputs.iter().enumerate().skip(1) {
            columns.extend(ctx.logical_prop(next).output_columns().iter().cloned());

            let is_last = idx == inputs.len() - 1;
            let (placed, rest): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|(_, used)| is_last || used.is_subset(&columns));
            pending = rest;

            let predicate = conjunction(placed.into_iter().map(|(conjunct, _)| conjunct).collect());
            joined = Arc::new(Expression::new(
                LogicalInnerJoin,
                vec![joined, next.clone(), predicate],
            ));
        }

        result.add(
            Arc::try_unwrap(joined).unwrap_or_else(|joined| joined.as_ref().clone()),
        );
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &NARY_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        ExpandNAryJoin
    }
}

/// Splits the join predicate into hash keys, pairing outer and inner columns.
fn hash_join_keys(ctx: &RuleContext, input: &Expression) -> HashJoinKeys {
    let outer = ctx.logical_prop(&input[0]);
    let inner = ctx.logical_prop(&input[1]);
    let keys = equi_join_keys(&input[2], outer.output_columns(), inner.output_columns());
    HashJoinKeys::new(keys.outer, keys.inner)
}

fn implement_join<O: Into<Operator>>(input: &Expression, physical: O) -> Expression {
    Expression::new(physical, input.children().to_vec())
}

/// Whether the join type hint on the tables of both inputs allows implementing the join with
/// `op`.
fn join_hint_allows(ctx: &RuleContext, input: &Expression, op: OperatorId) -> bool {
    let plan_hint = match ctx.plan_hint() {
        Some(plan_hint) => plan_hint,
        None => return true,
    };
    let mut tables = ctx.logical_prop(&input[0]).table_descriptors().clone();
    tables.union_with(ctx.logical_prop(&input[1]).table_descriptors());
    plan_hint
        .join_type_hint(&tables)
        .map(|hint| hint.satisfies_operator(op))
        .unwrap_or(true)
}

/// Transforms inner join to hash join.
#[derive(Clone, Default)]
pub struct InnerJoin2HashJoinRule {}

impl InnerJoin2HashJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for InnerJoin2HashJoinRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        if !join_hint_allows(ctx, input, OperatorId::PhysicalInnerHashJoin) {
            return Ok(());
        }
        let keys = hash_join_keys(ctx, input);
        result.add(implement_join(input, PhysicalInnerHashJoin::new(keys)));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &INNER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        InnerJoin2HashJoin
    }

    fn promise(&self, _handle: &ExprHandle) -> RulePromise {
        RulePromise::High
    }
}

/// Transforms inner join to nested loop join, rescanning the inner side for every outer row.
#[derive(Clone, Default)]
pub struct InnerJoin2NLJoinRule {}

impl InnerJoin2NLJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for InnerJoin2NLJoinRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        if join_hint_allows(ctx, input, OperatorId::PhysicalInnerNLJoin) {
            result.add(implement_join(input, PhysicalInnerNLJoin));
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &INNER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        InnerJoin2NLJoin
    }
}

/// Transforms left outer join to left outer hash join, building on the inner side.
#[derive(Clone, Default)]
pub struct LeftOuterJoin2HashJoinRule {}

impl LeftOuterJoin2HashJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for LeftOuterJoin2HashJoinRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        let keys = hash_join_keys(ctx, input);
        result.add(implement_join(input, PhysicalLeftOuterHashJoin::new(keys)));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &LEFT_OUTER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        LeftOuterJoin2HashJoin
    }

    fn promise(&self, _handle: &ExprHandle) -> RulePromise {
        RulePromise::High
    }
}

/// Transforms full outer join to full hash join.
#[derive(Clone, Default)]
pub struct FullOuterJoin2HashJoinRule {}

impl FullOuterJoin2HashJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for FullOuterJoin2HashJoinRule {
    fn apply(
        &self,
        ctx: &RuleContext,
        input: &Expression,
        result: &mut RuleResult,
    ) -> OptResult<()> {
        assert_matches(self.pattern(), input);
        let keys = hash_join_keys(ctx, input);
        result.add(implement_join(input, PhysicalFullHashJoin::new(keys)));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &FULL_OUTER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        FullOuterJoin2HashJoin
    }

    fn promise(&self, _handle: &ExprHandle) -> RulePromise {
        RulePromise::High
    }
}

#[cfg(test)]
mod tests {
    use enumset::EnumSet;

    use super::*;
    use crate::cascades::Memo;
    use crate::config::OptimizerConfig;
    use crate::expr::{cmp, ident, ExprNode};
    use crate::hints::{JoinTypeHint, JoinTypeHintKind, PlanHint};
    use crate::operator::{LogicalNAryJoin, LogicalOperator, PhysicalOperator};
    use crate::test_utils::{
        bind_leaves, column, inner_join, optimizer_context, optimizer_context_with_config, scan,
    };
    use datafusion_expr::Operator::Eq;

    #[test]
    fn test_commutativity_is_incompatible_with_itself() {
        let inner = InnerJoinCommutativityRule::new();
        let full = FullJoinCommutativityRule::new();
        for other in EnumSet::<RuleId>::all() {
            assert_eq!(other != InnerJoinCommutativity, inner.is_compatible(other));
            assert_eq!(other != FullJoinCommutativity, full.is_compatible(other));
        }
    }

    #[test]
    fn test_commute_inner_join() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let root = memo.insert(&inner_join(scan(&ctx, "t1"), scan(&ctx, "t2")));
        let input = bind_leaves(&memo, root);

        let mut result = RuleResult::new();
        InnerJoinCommutativityRule::new()
            .apply(&RuleContext::new(&memo, &ctx), &input, &mut result)
            .unwrap();

        let alternatives: Vec<Expression> = result.results().collect();
        assert_eq!(1, alternatives.len());
        assert_eq!(input[0], alternatives[0][1]);
        assert_eq!(input[1], alternatives[0][0]);
        assert_eq!(input[2], alternatives[0][2]);
    }

    #[test]
    fn test_inner_join_to_hash_join() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let t1 = scan(&ctx, "t1");
        let t2 = scan(&ctx, "t2");
        let (t1_c1, t2_c1) = (column(&t1, "c1"), column(&t2, "c1"));
        let root = memo.insert(&inner_join(t1, t2));

        let mut result = RuleResult::new();
        InnerJoin2HashJoinRule::new()
            .apply(
                &RuleContext::new(&memo, &ctx),
                &bind_leaves(&memo, root),
                &mut result,
            )
            .unwrap();

        let alternative = result.results().next().unwrap();
        match alternative.operator().map(|op| op.as_ref()) {
            Some(Operator::Physical(PhysicalOperator::PhysicalInnerHashJoin(join))) => {
                assert_eq!(&[t1_c1], join.keys().outer());
                assert_eq!(&[t2_c1], join.keys().inner());
            }
            other => panic!("unexpected alternative {:?}", other),
        }
    }

    #[test]
    fn test_join_type_hint_selects_implementation() {
        let implementations = |kind: Option<JoinTypeHintKind>| {
            let mut plan_hint = PlanHint::new();
            if let Some(kind) = kind {
                plan_hint.add_join_type_hint(JoinTypeHint::new(vec!["t2", "t1"], kind));
            }
            let ctx =
                optimizer_context_with_config(OptimizerConfig::default().with_plan_hint(plan_hint));
            let memo = Memo::new();
            let root = memo.insert(&inner_join(scan(&ctx, "t1"), scan(&ctx, "t2")));
            let input = bind_leaves(&memo, root);
            let rule_ctx = RuleContext::new(&memo, &ctx);

            let mut result = RuleResult::new();
            InnerJoin2HashJoinRule::new()
                .apply(&rule_ctx, &input, &mut result)
                .unwrap();
            InnerJoin2NLJoinRule::new()
                .apply(&rule_ctx, &input, &mut result)
                .unwrap();
            result
                .results()
                .map(|expr| expr.operator().unwrap().id())
                .collect::<Vec<_>>()
        };

        let both = vec![OperatorId::PhysicalInnerHashJoin, OperatorId::PhysicalInnerNLJoin];
        assert_eq!(both, implementations(None));
        assert_eq!(
            vec![OperatorId::PhysicalInnerNLJoin],
            implementations(Some(JoinTypeHintKind::NestLoop))
        );
        assert_eq!(
            vec![OperatorId::PhysicalInnerNLJoin],
            implementations(Some(JoinTypeHintKind::NoHashJoin))
        );
        assert_eq!(
            vec![OperatorId::PhysicalInnerHashJoin],
            implementations(Some(JoinTypeHintKind::NoNestLoop))
        );
    }

    #[test]
    fn test_expand_nary_join_places_conjuncts() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let (t1, t2, t3) = (scan(&ctx, "t1"), scan(&ctx, "t2"), scan(&ctx, "t3"));
        let t1_t2 = cmp(Eq, ident(&column(&t1, "c1")), ident(&column(&t2, "c1")));
        let t2_t3 = cmp(Eq, ident(&column(&t2, "c2")), ident(&column(&t3, "c2")));
        let nary = Expression::new(
            LogicalNAryJoin,
            vec![
                Arc::new(t1),
                Arc::new(t2),
                Arc::new(t3),
                Arc::new(crate::expr::and(vec![t2_t3.clone(), t1_t2.clone()])),
            ],
        );
        let root = memo.insert(&nary);

        let mut result = RuleResult::new();
        ExpandNAryJoinRule::new()
            .apply(
                &RuleContext::new(&memo, &ctx),
                &bind_leaves(&memo, root),
                &mut result,
            )
            .unwrap();

        let top = result.results().next().unwrap();
        assert!(matches!(
            top.operator().unwrap().as_logical(),
            Some(LogicalOperator::LogicalInnerJoin(_))
        ));
        assert_eq!(t2_t3, *top[2]);
        assert!(matches!(top[1].node(), ExprNode::Group(_)));

        let bottom = &top[0];
        assert_eq!(t1_t2, *bottom[2]);
        assert!(matches!(bottom[0].node(), ExprNode::Group(_)));
        assert!(matches!(bottom[1].node(), ExprNode::Group(_)));
    }
}
