use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use anyhow::bail;
use log::debug;
use parking_lot::{Mutex, RwLock};
use prettytable::Table;

use super::group::{GroupExprKey, GroupIds};
use crate::cascades::{ExprHandle, Group, GroupExpr, GroupExprId, GroupId, Winner};
use crate::error::{OptError, OptResult};
use crate::expr::{ExprNode, ExprRef, Expression};
use crate::operator::{LogicalOperatorTrait, OperatorRef};
use crate::optimizer::OptimizerContext;
use crate::plan::{Plan, PlanNode, PlanNodeIdGen, PlanNodeRef};
use crate::properties::{LogicalProperty, PhysicalPropertySet};
use crate::rules::RuleId;
use crate::stat::StatsRef;

/// Dynamic programming table used for storing expression groups.
///
/// The memo is shared between threads. Locks are always taken in the order: `index`, then
/// `merge_lock`, then the locks of a group.
pub struct Memo {
    groups: RwLock<Vec<Arc<Group>>>,
    /// Used to avoid insert duplicate group expression.
    ///
    /// Keys use canonical child ids as of their insertion, they are remapped whenever groups are
    /// marked as duplicates.
    index: Mutex<HashMap<GroupExprKey, GroupExprId>>,
    /// Serializes duplicate marking.
    merge_lock: Mutex<()>,
}

impl Default for Memo {
    fn default() -> Self {
        Self::new()
    }
}

impl Memo {
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(vec![]),
            index: Mutex::new(HashMap::new()),
            merge_lock: Mutex::new(()),
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }

    /// # Panics
    ///
    /// If no group has this id.
    pub fn group(&self, id: GroupId) -> Arc<Group> {
        self.groups
            .read()
            .get(id.0)
            .cloned()
            .unwrap_or_else(|| panic!("group {} not found in memo", id))
    }

    /// # Panics
    ///
    /// If no group expression has this id.
    pub fn group_expr(&self, id: GroupExprId) -> Arc<GroupExpr> {
        self.group(id.group_id)
            .expr(id.expr_id)
            .unwrap_or_else(|| panic!("group expression {} not found in memo", id))
    }

    /// The id every member of the duplicate class of `id` resolves to.
    pub fn canonical_group_id(&self, id: GroupId) -> GroupId {
        let mut current = id;
        while let Some(next) = self.group(current).duplicate_of() {
            current = next;
        }
        current
    }

    pub fn is_same_class(&self, a: GroupId, b: GroupId) -> bool {
        self.canonical_group_id(a) == self.canonical_group_id(b)
    }

    /// Groups of the duplicate class of `id`, in id order.
    pub fn class_members(&self, id: GroupId) -> Vec<GroupId> {
        let canonical = self.canonical_group_id(id);
        (0..self.group_count())
            .map(GroupId)
            .filter(|g| self.canonical_group_id(*g) == canonical)
            .collect()
    }

    /// Group expressions of the whole duplicate class of `id`.
    pub fn class_exprs(&self, id: GroupId) -> Vec<Arc<GroupExpr>> {
        self.class_members(id)
            .into_iter()
            .flat_map(|g| self.group(g).exprs())
            .collect()
    }

    pub fn logical_prop(&self, id: GroupId) -> Option<Arc<LogicalProperty>> {
        self.group(id).logical_prop().cloned()
    }

    /// Inserts an initial expression tree, returning the group expression of its root.
    ///
    /// # Panics
    ///
    /// If the root is a group leaf.
    pub fn insert(&self, expr: &Expression) -> GroupExprId {
        self.insert_expression(expr, None, None, true).0
    }

    /// Inserts a rule result as a member of `target`.
    ///
    /// Returns the group expression of the root and whether it was newly created. When an
    /// identical expression already lives in another group, that group and `target` are marked
    /// as duplicates.
    pub fn insert_into(
        &self,
        expr: &Expression,
        target: GroupId,
        rule_id: RuleId,
        origin: GroupExprId,
    ) -> (GroupExprId, bool) {
        self.insert_expression(expr, Some(target), Some((rule_id, origin)), true)
    }

    /// Inserts an enforcer on top of the group it enforces properties for.
    pub(crate) fn insert_enforcer(
        &self,
        operator: OperatorRef,
        group: GroupId,
    ) -> (GroupExprId, bool) {
        self.insert_group_expr(
            operator,
            GroupIds::from_slice(&[group]),
            Some(group),
            None,
            false,
        )
    }

    fn insert_expression(
        &self,
        expr: &Expression,
        target: Option<GroupId>,
        origin: Option<(RuleId, GroupExprId)>,
        is_root: bool,
    ) -> (GroupExprId, bool) {
        match expr.node() {
            ExprNode::Operator { operator, .. } => {
                let inputs = expr
                    .children()
                    .iter()
                    .map(|child| match child.node() {
                        ExprNode::Group(group_id) => *group_id,
                        ExprNode::Operator { .. } => {
                            self.insert_expression(child, None, origin, false).0.group_id
                        }
                    })
                    .collect();
                let intermediate = origin.is_some() && !is_root;
                self.insert_group_expr(operator.clone(), inputs, target, origin, intermediate)
            }
            ExprNode::Group(_) => {
                unreachable!("Should not insert group leaf {:?} directly!", expr)
            }
        }
    }

    fn insert_group_expr(
        &self,
        operator: OperatorRef,
        inputs: GroupIds,
        target: Option<GroupId>,
        origin: Option<(RuleId, GroupExprId)>,
        intermediate: bool,
    ) -> (GroupExprId, bool) {
        let canonical_inputs: GroupIds = inputs
            .iter()
            .map(|g| self.canonical_group_id(*g))
            .collect();
        let key = GroupExprKey::new(operator.clone(), canonical_inputs);

        let mut index = self.index.lock();
        if let Some(existing) = index.get(&key).copied() {
            if let Some(target) = target {
                if !self.is_same_class(existing.group_id, target) {
                    debug!(
                        "Group expression {} duplicates an expression inserted into group {}",
                        existing, target
                    );
                    let (a, b) = self.ordered_canonicals(existing.group_id, target);
                    self.merge_classes(&mut index, a, b);
                }
            }
            return (existing, false);
        }

        let id = match target {
            Some(target) => self.group(target).push_expr(|id| {
                GroupExpr::new(id, operator.clone(), inputs.clone(), origin, intermediate)
            }),
            None => self.new_group(operator, inputs, origin, intermediate),
        };
        index.insert(key, id);
        (id, true)
    }

    /// Called with the index locked, so group ids are handed out sequentially.
    fn new_group(
        &self,
        operator: OperatorRef,
        inputs: GroupIds,
        origin: Option<(RuleId, GroupExprId)>,
        intermediate: bool,
    ) -> GroupExprId {
        let group_id = GroupId(self.group_count());
        let expr_id = GroupExprId::new(group_id, 0);
        let expr = GroupExpr::new(expr_id, operator, inputs, origin, intermediate);

        let logical_prop = expr
            .operator()
            .as_logical()
            .map(|op| Arc::new(op.derive_logical_prop(&ExprHandle::new(self, &expr))));

        self.groups
            .write()
            .push(Arc::new(Group::new(group_id, expr, logical_prop)));
        expr_id
    }

    fn ordered_canonicals(&self, a: GroupId, b: GroupId) -> (GroupId, GroupId) {
        let (a, b) = (self.canonical_group_id(a), self.canonical_group_id(b));
        (a.min(b), a.max(b))
    }

    /// Makes the class of `b` resolve to the canonical id of the class of `a`.
    pub fn mark_duplicates(&self, a: GroupId, b: GroupId) {
        let mut index = self.index.lock();
        self.merge_classes(&mut index, a, b);
    }

    fn merge_classes(
        &self,
        index: &mut HashMap<GroupExprKey, GroupExprId>,
        a: GroupId,
        b: GroupId,
    ) {
        let _merging = self.merge_lock.lock();

        let mut pending = vec![(a, b)];
        while let Some((a, b)) = pending.pop() {
            let (canonical, duplicate) = (self.canonical_group_id(a), self.canonical_group_id(b));
            if canonical == duplicate {
                continue;
            }
            debug!("Marking group {} as duplicate of group {}", duplicate, canonical);

            let canonical_group = self.group(canonical);
            let duplicate_group = self.group(duplicate);
            duplicate_group.set_duplicate_of(canonical);

            // Waits for a derivation in progress on the old canonical slot.
            let moved_stats = duplicate_group.stats_slot().lock().take();
            if let Some(stats) = moved_stats {
                canonical_group.stats_slot().lock().get_or_insert(stats);
            }

            for (required, winner) in duplicate_group.take_winners() {
                canonical_group.update_winner(&required, winner);
            }

            // Keys referencing the duplicate class now collide with keys of the canonical one,
            // colliding expressions prove more groups equivalent.
            for (key, id) in std::mem::take(index) {
                let key = key.remap(|g| self.canonical_group_id(g));
                match index.entry(key) {
                    Entry::Vacant(entry) => {
                        entry.insert(id);
                    }
                    Entry::Occupied(entry) => {
                        let existing = *entry.get();
                        if !self.is_same_class(existing.group_id, id.group_id) {
                            pending.push(self.ordered_canonicals(existing.group_id, id.group_id));
                        }
                    }
                }
            }
        }
    }

    /// Statistics of the class of `id`, if derived.
    pub fn stats(&self, id: GroupId) -> Option<StatsRef> {
        self.group(self.canonical_group_id(id))
            .stats_slot()
            .lock()
            .clone()
    }

    /// Clears the statistics of the whole class of `id`. Returns whether there were any.
    pub fn reset_stats(&self, id: GroupId) -> bool {
        self.group(self.canonical_group_id(id))
            .stats_slot()
            .lock()
            .take()
            .is_some()
    }

    /// Derives statistics of the class of `expr_id` through that expression.
    ///
    /// Statistics are computed at most once per class: relational children are derived first,
    /// then the canonical slot is locked while computing, so concurrent callers get the same
    /// object. A group marked as duplicate after its slot was resolved is retried through its
    /// new canonical group.
    pub fn derive_stats(
        &self,
        expr_id: GroupExprId,
        ctx: &OptimizerContext,
    ) -> OptResult<StatsRef> {
        let expr = self.group_expr(expr_id);
        let canonical = self.canonical_group_id(expr_id.group_id);

        let logical = match expr.operator().as_logical() {
            Some(op) => op,
            None => return self.group_stats(expr_id.group_id, ctx),
        };
        if expr
            .children()
            .iter()
            .any(|child| self.canonical_group_id(*child) == canonical)
        {
            return self.group_stats(expr_id.group_id, ctx);
        }

        let child_stats = expr
            .children()
            .iter()
            .map(|child| {
                if self.group(*child).is_scalar() {
                    Ok(None)
                } else {
                    self.group_stats(*child, ctx).map(Some)
                }
            })
            .collect::<OptResult<Vec<_>>>()?;
        let handle = ExprHandle::with_child_stats(self, &expr, child_stats);

        loop {
            let canonical = self.canonical_group_id(expr_id.group_id);
            let group = self.group(canonical);
            let mut slot = group.stats_slot().lock();
            // Merging marks the group as duplicate before it takes the slot.
            if group.duplicate_of().is_some() {
                continue;
            }
            if let Some(stats) = slot.as_ref() {
                return Ok(stats.clone());
            }

            let stats = Arc::new(logical.derive_stats(&handle, ctx)?);
            debug!(
                "Derived {:.2} rows for group {} from {}",
                stats.rows(),
                canonical,
                expr_id
            );
            *slot = Some(stats.clone());
            return Ok(stats);
        }
    }

    /// Statistics of the class of `id`, derived from its first suitable logical expression if
    /// needed.
    pub fn group_stats(&self, id: GroupId, ctx: &OptimizerContext) -> OptResult<StatsRef> {
        if let Some(stats) = self.stats(id) {
            return Ok(stats);
        }

        let canonical = self.canonical_group_id(id);
        let expr = self.class_exprs(id).into_iter().find(|expr| {
            expr.is_logical()
                && expr
                    .children()
                    .iter()
                    .all(|child| self.canonical_group_id(*child) != canonical)
        });

        match expr {
            Some(expr) => self.derive_stats(expr.id(), ctx),
            None => bail!("Group {} has no expression to derive statistics from", id),
        }
    }

    /// Rebuilds the scalar tree stored in a scalar group.
    ///
    /// # Panics
    ///
    /// If `id` is not a scalar group.
    pub fn scalar_expr(&self, id: GroupId) -> ExprRef {
        let group = self.group(id);
        assert!(group.is_scalar(), "group {} is not scalar", id);
        let expr = group
            .expr(0)
            .unwrap_or_else(|| panic!("scalar group {} is empty", id));
        let children = expr
            .children()
            .iter()
            .map(|child| self.scalar_expr(*child))
            .collect();
        Arc::new(Expression::bound(expr.operator().clone(), id, children))
    }

    pub fn winner(&self, id: GroupId, required: &PhysicalPropertySet) -> Option<Winner> {
        self.group(self.canonical_group_id(id)).winner(required)
    }

    /// Records `winner` unless the class already has a cheaper one for `required`.
    pub(crate) fn update_winner(
        &self,
        id: GroupId,
        required: &PhysicalPropertySet,
        winner: Winner,
    ) -> bool {
        self.group(self.canonical_group_id(id))
            .update_winner(required, winner)
    }

    pub(crate) fn start_optimizing(&self, id: GroupId, required: &PhysicalPropertySet) -> bool {
        self.group(self.canonical_group_id(id))
            .start_optimizing(required)
    }

    /// Find best plan from `root` for `required`.
    pub fn best_plan(&self, root: GroupId, required: &PhysicalPropertySet) -> OptResult<Plan> {
        let winner = self
            .winner(root, required)
            .ok_or_else(|| OptError::NoPlanFound(required.clone()))?;
        let mut id_gen = PlanNodeIdGen::new();
        Ok(Plan::new(self.plan_of(root, winner, &mut id_gen)))
    }

    fn plan_of(
        &self,
        group_id: GroupId,
        winner: Winner,
        id_gen: &mut PlanNodeIdGen,
    ) -> PlanNodeRef {
        let expr = self.group_expr(winner.expr);
        let operator = expr
            .operator()
            .as_physical()
            .unwrap_or_else(|| panic!("winner {} is not physical", winner.expr))
            .clone();
        let id = id_gen.next();

        let mut required = winner.input_required_props.iter();
        let mut inputs = vec![];
        let mut scalars = vec![];
        for child in expr.children() {
            if self.group(*child).is_scalar() {
                scalars.push(self.scalar_expr(*child));
                continue;
            }
            let child_required = required
                .next()
                .unwrap_or_else(|| panic!("winner {} misses input requirements", winner.expr));
            let child_winner = self
                .winner(*child, child_required)
                .unwrap_or_else(|| {
                    panic!("group {} has no winner for {:?}", child, child_required)
                });
            inputs.push(self.plan_of(*child, child_winner, id_gen));
        }

        let rows = self.stats(group_id).map(|s| s.rows()).unwrap_or_default();
        Arc::new(
            PlanNode::new(id, operator, inputs, scalars)
                .with_cost(winner.cost, rows)
                .with_delivered(winner.delivered),
        )
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "Groups in memo:")?;
        writeln!(f)?;

        let groups = self.groups.read().clone();
        for group in &groups {
            writeln!(f, "{:?}", group)?;
        }

        let duplicates: Vec<_> = groups
            .iter()
            .filter_map(|g| g.duplicate_of().map(|canonical| (g.id(), canonical)))
            .collect();
        if !duplicates.is_empty() {
            writeln!(f, "Duplicated groups:")?;
            let mut table = Table::new();
            table.add_row(row!["Group Id", "Duplicate Of"]);
            for (group, canonical) in duplicates {
                table.add_row(row![group, canonical]);
            }
            writeln!(f, "{}", table)?;
        }

        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::operator::{
        LogicalGet, LogicalInnerJoin, LogicalOperator, LogicalSelect, ScalarConst,
    };
    use crate::test_utils::{inner_join, optimizer_context, scan};
    use crate::utils::TreeBuilder;

    #[test]
    fn test_insert_dedup() {
        let ctx = optimizer_context();
        let t1 = ctx.table_ref("t1").unwrap();
        let memo = Memo::new();

        let select = Expression::new_builder(LogicalSelect)
            .leaf(LogicalGet::new(t1.clone()))
            .leaf(ScalarConst::boolean(true))
            .end_node();

        let first = memo.insert(&select);
        let second = memo.insert(&select.clone());
        assert_eq!(first, second);
        assert_eq!(3, memo.group_count());
        assert_eq!(1, memo.group(first.group_id).expr_count());
        assert!(memo.group(GroupId(1)).is_scalar());
        assert!(memo.logical_prop(GroupId(1)).is_none());
    }

    #[test]
    fn test_build_memo_with_multi_child() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let join = inner_join(scan(&ctx, "t1"), scan(&ctx, "t2"));

        let root = memo.insert(&join);
        let root_expr = memo.group_expr(root);
        assert!(matches!(
            root_expr.operator().as_logical(),
            Some(LogicalOperator::LogicalInnerJoin(LogicalInnerJoin))
        ));
        assert_eq!(3, root_expr.arity());
        assert_eq!(None, root_expr.origin_rule());

        let prop = memo.logical_prop(root.group_id).unwrap();
        assert_eq!(2, prop.table_descriptors().len());
        assert_eq!(
            memo.logical_prop(root_expr.child(0))
                .unwrap()
                .output_columns()
                .len()
                + memo
                    .logical_prop(root_expr.child(1))
                    .unwrap()
                    .output_columns()
                    .len(),
            prop.output_columns().len()
        );
    }

    #[test]
    fn test_insert_into_other_group_marks_duplicates() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let t1 = scan(&ctx, "t1");
        let get = memo.insert(&t1).group_id;
        let select = memo.insert(
            &Expression::new_builder(LogicalSelect)
                .add_child(t1.clone())
                .leaf(ScalarConst::boolean(true))
                .end_node(),
        );

        let (id, inserted) = memo.insert_into(
            &t1,
            select.group_id,
            RuleId::Select2Filter,
            select,
        );
        assert!(!inserted);
        assert_eq!(GroupExprId::new(get, 0), id);
        assert!(memo.is_same_class(get, select.group_id));
        assert_eq!(get, memo.canonical_group_id(select.group_id));
    }

    #[test]
    fn test_duplicates_share_stats() {
        let ctx = optimizer_context();
        let memo = Memo::new();
        let a = memo.insert(&scan(&ctx, "t1"));
        let b = memo.insert(&scan(&ctx, "t2"));

        memo.mark_duplicates(a.group_id, b.group_id);
        let derived = memo.derive_stats(b, &ctx).unwrap();

        let stats_a = memo.stats(a.group_id).unwrap();
        let stats_b = memo.stats(b.group_id).unwrap();
        assert!(Arc::ptr_eq(&stats_a, &stats_b));
        assert!(Arc::ptr_eq(&derived, &stats_a));

        // Derived once per class.
        assert!(Arc::ptr_eq(&derived, &memo.derive_stats(a, &ctx).unwrap()));

        assert!(memo.reset_stats(a.group_id));
        assert!(memo.stats(a.group_id).is_none());
        assert!(memo.stats(b.group_id).is_none());
        assert!(!memo.reset_stats(b.group_id));
    }
}
