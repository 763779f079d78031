use std::sync::Arc;

use itertools::Itertools;

use crate::cascades::{GroupExpr, GroupId, Memo};
use crate::expr::{ExprRef, Expression};
use crate::operator::{Operator, PatternOperator};

/// Extracts from the memo every expression tree rooted at a group expression that matches a
/// rule pattern.
///
/// Children bound by `Leaf`, `MultiLeaf` or an empty child pattern list are group leaves, so
/// rules only see as much of the memo as their pattern asks for.
pub(super) struct Binding<'a> {
    memo: &'a Memo,
}

impl<'a> Binding<'a> {
    pub(super) fn new(memo: &'a Memo) -> Self {
        Self { memo }
    }

    pub(super) fn bind(&self, expr: &GroupExpr, pattern: &Expression) -> Vec<Expression> {
        let pattern_op = match pattern.operator().map(|op| op.as_ref()) {
            Some(Operator::Pattern(PatternOperator::Node(id))) => *id,
            _ => panic!("pattern root must be a node, found {:?}", pattern),
        };
        if expr.operator().id() != pattern_op {
            return vec![];
        }

        let child_patterns = pattern.children();
        if child_patterns.is_empty() {
            let children = expr.children().iter().map(|g| Self::leaf(*g)).collect();
            return vec![self.bound(expr, children)];
        }

        let multi_leaf = child_patterns
            .last()
            .map(|p| Self::is_pattern(p, PatternOperator::MultiLeaf))
            .unwrap_or(false);
        let arity_matches = if multi_leaf {
            expr.arity() + 1 >= child_patterns.len()
        } else {
            expr.arity() == child_patterns.len()
        };
        if !arity_matches {
            return vec![];
        }

        let mut child_bindings: Vec<Vec<ExprRef>> = Vec::with_capacity(expr.arity());
        for (idx, child) in expr.children().iter().enumerate() {
            let child_pattern = child_patterns.get(idx).unwrap_or_else(|| {
                child_patterns
                    .last()
                    .unwrap_or_else(|| panic!("empty child patterns of {:?}", pattern))
            });
            let options = self.bind_child(*child, child_pattern);
            if options.is_empty() {
                return vec![];
            }
            child_bindings.push(options);
        }

        if child_bindings.is_empty() {
            return vec![self.bound(expr, vec![])];
        }

        child_bindings
            .into_iter()
            .multi_cartesian_product()
            .map(|children| self.bound(expr, children))
            .collect()
    }

    fn bind_child(&self, group_id: GroupId, pattern: &Expression) -> Vec<ExprRef> {
        let pattern_op = match pattern.operator().map(|op| op.as_ref()) {
            Some(Operator::Pattern(op)) => *op,
            _ => panic!("{:?} is not a pattern", pattern),
        };

        match pattern_op {
            PatternOperator::Leaf | PatternOperator::MultiLeaf => vec![Self::leaf(group_id)],
            PatternOperator::Tree => {
                if self.memo.group(group_id).is_scalar() {
                    vec![self.memo.scalar_expr(group_id)]
                } else {
                    vec![Self::leaf(group_id)]
                }
            }
            PatternOperator::Node(_) => self
                .memo
                .class_exprs(group_id)
                .iter()
                .filter(|expr| !expr.is_physical())
                .flat_map(|expr| self.bind(expr, pattern))
                .map(Arc::new)
                .collect(),
        }
    }

    fn bound(&self, expr: &GroupExpr, children: Vec<ExprRef>) -> Expression {
        Expression::bound(expr.operator().clone(), expr.group_id(), children)
    }

    fn leaf(group_id: GroupId) -> ExprRef {
        Arc::new(Expression::group(group_id))
    }

    fn is_pattern(pattern: &Expression, op: PatternOperator) -> bool {
        matches!(pattern.operator().map(|o| o.as_ref()), Some(Operator::Pattern(p)) if *p == op)
    }
}
