use std::sync::Arc;

use crate::cascades::{GroupExpr, GroupId, Memo};
use crate::catalog::TableDescriptorSet;
use crate::expr::ExprRef;
use crate::operator::{LogicalOperatorTrait, OperatorRef};
use crate::properties::LogicalProperty;
use crate::stat::StatsRef;

/// A group expression seen from its operator while deriving properties or computing promises.
///
/// Children are read through the memo, so a handle is only valid while the memo is borrowed.
/// Statistics of children are pinned when the handle is built for a derivation, a concurrent
/// reset of a child slot does not affect it.
pub struct ExprHandle<'a> {
    memo: &'a Memo,
    expr: &'a GroupExpr,
    child_stats: Vec<Option<StatsRef>>,
}

impl<'a> ExprHandle<'a> {
    pub fn new(memo: &'a Memo, expr: &'a GroupExpr) -> Self {
        Self {
            memo,
            expr,
            child_stats: vec![],
        }
    }

    /// `child_stats` holds one entry per child, `None` for scalar ones.
    pub(crate) fn with_child_stats(
        memo: &'a Memo,
        expr: &'a GroupExpr,
        child_stats: Vec<Option<StatsRef>>,
    ) -> Self {
        Self {
            memo,
            expr,
            child_stats,
        }
    }

    pub fn memo(&self) -> &'a Memo {
        self.memo
    }

    pub fn expr(&self) -> &'a GroupExpr {
        self.expr
    }

    pub fn operator(&self) -> &OperatorRef {
        self.expr.operator()
    }

    pub fn arity(&self) -> usize {
        self.expr.arity()
    }

    pub fn child_group(&self, idx: usize) -> GroupId {
        self.expr.child(idx)
    }

    pub fn is_scalar_child(&self, idx: usize) -> bool {
        self.memo.group(self.expr.child(idx)).is_scalar()
    }

    /// Positions of the relational children.
    pub fn relational_children(&self) -> impl Iterator<Item = usize> + 'a {
        let memo = self.memo;
        let expr = self.expr;
        (0..expr.arity()).filter(move |idx| !memo.group(expr.child(*idx)).is_scalar())
    }

    /// # Panics
    ///
    /// If child `idx` is scalar.
    pub fn child_logical_prop(&self, idx: usize) -> Arc<LogicalProperty> {
        let child = self.expr.child(idx);
        self.memo
            .logical_prop(child)
            .unwrap_or_else(|| panic!("child {} of {:?} has no logical property", idx, self.expr))
    }

    /// # Panics
    ///
    /// If the handle was not built for a derivation and the stats of child `idx` are not
    /// derived.
    pub fn child_stats(&self, idx: usize) -> StatsRef {
        if let Some(Some(stats)) = self.child_stats.get(idx) {
            return stats.clone();
        }
        let child = self.expr.child(idx);
        self.memo
            .stats(child)
            .unwrap_or_else(|| panic!("stats of group {} are not derived", child))
    }

    /// Scalar tree of child `idx`.
    pub fn child_scalar(&self, idx: usize) -> ExprRef {
        self.memo.scalar_expr(self.expr.child(idx))
    }

    /// Tables referenced below this expression.
    pub fn table_descriptors(&self) -> TableDescriptorSet {
        match self.expr.operator().as_logical() {
            Some(op) => op.derive_table_descriptors(self),
            None => self
                .memo
                .logical_prop(self.expr.group_id())
                .map(|prop| prop.table_descriptors().clone())
                .unwrap_or_default(),
        }
    }
}
