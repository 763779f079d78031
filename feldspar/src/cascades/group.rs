use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use enumset::EnumSet;
use parking_lot::{Mutex, RwLock};
use prettytable::Table;
use smallvec::SmallVec;

use crate::cost::Cost;
use crate::operator::{Operator, OperatorRef, PhysicalOperatorTrait};
use crate::properties::{LogicalProperty, PhysicalPropertySet};
use crate::rules::RuleId;
use crate::stat::StatsRef;

/// A group id is an index of `groups` in [`Memo`](crate::cascades::Memo).
#[derive(Hash, Eq, PartialEq, Clone, Copy, Ord, PartialOrd)]
pub struct GroupId(pub usize);

impl Debug for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// A group expression id is an index of the expression list of a group.
#[derive(Hash, Eq, PartialEq, Clone, Copy)]
pub struct GroupExprId {
    pub group_id: GroupId,
    pub expr_id: usize,
}

impl GroupExprId {
    pub fn new(group_id: GroupId, expr_id: usize) -> Self {
        Self { group_id, expr_id }
    }
}

impl Debug for GroupExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}.{:?}", self.group_id, self.expr_id)
    }
}

impl Display for GroupExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}.{:?}", self.group_id, self.expr_id)
    }
}

pub(super) type GroupIds = SmallVec<[GroupId; 4]>;

/// Signature used to detect duplicate group expressions.
///
/// Children are canonical group ids. Children of operators insensitive to input order are
/// sorted, so `a AND b` and `b AND a` share a signature.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub(super) struct GroupExprKey {
    operator: OperatorRef,
    inputs: GroupIds,
}

impl GroupExprKey {
    pub(super) fn new(operator: OperatorRef, mut inputs: GroupIds) -> Self {
        if !operator.is_input_order_sensitive() {
            inputs.sort();
        }
        Self { operator, inputs }
    }

    /// Same key after some child groups became duplicates of others.
    pub(super) fn remap<F: Fn(GroupId) -> GroupId>(self, canonical: F) -> Self {
        let inputs = self.inputs.iter().map(|g| canonical(*g)).collect();
        Self::new(self.operator, inputs)
    }
}

/// Operator plus child groups, one member of a [`Group`].
pub struct GroupExpr {
    id: GroupExprId,
    operator: OperatorRef,
    children: GroupIds,
    /// `None` for expressions of the initial tree.
    origin_rule: Option<RuleId>,
    origin_expr: Option<GroupExprId>,
    /// Created for a non-root node of a rule result.
    intermediate: bool,
    /// Rules already applied to this group expression.
    applied_rules: Mutex<EnumSet<RuleId>>,
}

impl GroupExpr {
    pub(super) fn new(
        id: GroupExprId,
        operator: OperatorRef,
        children: GroupIds,
        origin: Option<(RuleId, GroupExprId)>,
        intermediate: bool,
    ) -> Self {
        Self {
            id,
            operator,
            children,
            origin_rule: origin.map(|(rule, _)| rule),
            origin_expr: origin.map(|(_, expr)| expr),
            intermediate,
            applied_rules: Mutex::new(EnumSet::new()),
        }
    }

    pub fn id(&self) -> GroupExprId {
        self.id
    }

    pub fn group_id(&self) -> GroupId {
        self.id.group_id
    }

    pub fn operator(&self) -> &OperatorRef {
        &self.operator
    }

    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    pub fn child(&self, idx: usize) -> GroupId {
        self.children[idx]
    }

    pub fn arity(&self) -> usize {
        self.children.len()
    }

    pub fn origin_rule(&self) -> Option<RuleId> {
        self.origin_rule
    }

    pub fn origin_expr(&self) -> Option<GroupExprId> {
        self.origin_expr
    }

    pub fn is_intermediate(&self) -> bool {
        self.intermediate
    }

    pub fn is_logical(&self) -> bool {
        matches!(self.operator.as_ref(), Operator::Logical(_))
    }

    pub fn is_physical(&self) -> bool {
        matches!(self.operator.as_ref(), Operator::Physical(_))
    }

    pub fn is_enforcer(&self) -> bool {
        self.operator
            .as_physical()
            .map(|op| op.is_enforcer())
            .unwrap_or(false)
    }

    pub fn is_rule_applied(&self, rule_id: RuleId) -> bool {
        self.applied_rules.lock().contains(rule_id)
    }

    pub fn set_rule_applied(&self, rule_id: RuleId) {
        self.applied_rules.lock().insert(rule_id);
    }
}

impl Debug for GroupExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {} {:?}", self.id, self.operator, self.children.as_slice())
    }
}

/// Cheapest physical group expression found for one required property set.
#[derive(Clone, Debug)]
pub struct Winner {
    pub expr: GroupExprId,
    /// Cost of the whole subtree.
    pub cost: Cost,
    pub delivered: PhysicalPropertySet,
    /// Requirements passed to the relational children of `expr`.
    pub input_required_props: Vec<PhysicalPropertySet>,
}

/// A group contains a set of logically equivalent [`GroupExpr`]s.
///
/// Groups found to be equivalent later are linked through `duplicate_of` instead of being
/// merged. The canonical member of a class, the one without a link, keeps the state shared by
/// the class: statistics, winners and the optimization bookkeeping.
pub struct Group {
    id: GroupId,
    is_scalar: bool,
    exprs: RwLock<Vec<Arc<GroupExpr>>>,
    duplicate_of: RwLock<Option<GroupId>>,
    /// `None` for scalar groups.
    logical_prop: Option<Arc<LogicalProperty>>,
    stats: Mutex<Option<StatsRef>>,
    winners: Mutex<HashMap<PhysicalPropertySet, Winner>>,
    /// Required property sets for which optimization has started.
    optimizing: Mutex<HashSet<PhysicalPropertySet>>,
    /// All logical expression has been explored.
    explored: AtomicBool,
}

impl Group {
    pub(super) fn new(
        id: GroupId,
        first_expr: GroupExpr,
        logical_prop: Option<Arc<LogicalProperty>>,
    ) -> Self {
        Self {
            id,
            is_scalar: first_expr.operator().is_scalar(),
            exprs: RwLock::new(vec![Arc::new(first_expr)]),
            duplicate_of: RwLock::new(None),
            logical_prop,
            stats: Mutex::new(None),
            winners: Mutex::new(HashMap::new()),
            optimizing: Mutex::new(HashSet::new()),
            explored: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn is_scalar(&self) -> bool {
        self.is_scalar
    }

    pub fn logical_prop(&self) -> Option<&Arc<LogicalProperty>> {
        self.logical_prop.as_ref()
    }

    pub fn duplicate_of(&self) -> Option<GroupId> {
        *self.duplicate_of.read()
    }

    pub fn exprs(&self) -> Vec<Arc<GroupExpr>> {
        self.exprs.read().clone()
    }

    pub fn expr(&self, expr_id: usize) -> Option<Arc<GroupExpr>> {
        self.exprs.read().get(expr_id).cloned()
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.read().len()
    }

    pub(super) fn push_expr<F>(&self, create: F) -> GroupExprId
    where
        F: FnOnce(GroupExprId) -> GroupExpr,
    {
        let mut exprs = self.exprs.write();
        let id = GroupExprId::new(self.id, exprs.len());
        exprs.push(Arc::new(create(id)));
        id
    }

    pub(super) fn set_duplicate_of(&self, canonical: GroupId) {
        *self.duplicate_of.write() = Some(canonical);
    }

    pub(super) fn stats_slot(&self) -> &Mutex<Option<StatsRef>> {
        &self.stats
    }

    pub(super) fn winner(&self, required: &PhysicalPropertySet) -> Option<Winner> {
        self.winners.lock().get(required).cloned()
    }

    /// Keeps the cheaper of `winner` and the current winner for `required`.
    pub(super) fn update_winner(&self, required: &PhysicalPropertySet, winner: Winner) -> bool {
        let mut winners = self.winners.lock();
        match winners.get(required) {
            Some(current) if current.cost <= winner.cost => false,
            _ => {
                winners.insert(required.clone(), winner);
                true
            }
        }
    }

    pub(super) fn take_winners(&self) -> HashMap<PhysicalPropertySet, Winner> {
        std::mem::take(&mut *self.winners.lock())
    }

    /// Returns false if optimization for `required` has already started.
    pub(super) fn start_optimizing(&self, required: &PhysicalPropertySet) -> bool {
        self.optimizing.lock().insert(required.clone())
    }

    /// Returns the previous value.
    pub(super) fn set_explored(&self) -> bool {
        self.explored.swap(true, Ordering::SeqCst)
    }

    pub fn is_explored(&self) -> bool {
        self.explored.load(Ordering::SeqCst)
    }
}

impl Debug for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.duplicate_of() {
            Some(canonical) => writeln!(f, "Group {:?} (duplicate of {:?}):", self.id, canonical)?,
            None => writeln!(f, "Group {:?}:", self.id)?,
        }

        let mut table = Table::new();
        table.add_row(row!["Group Expression Id", "Operator", "Inputs", "Origin"]);
        for expr in self.exprs.read().iter() {
            let origin = match (expr.origin_rule, expr.origin_expr) {
                (Some(rule), Some(origin)) => format!("{:?} <- {:?}", rule, origin),
                _ => String::new(),
            };
            table.add_row(row![
                expr.id.expr_id,
                format!("{}", expr.operator),
                format!("{:?}", expr.children.as_slice()),
                origin
            ]);
        }
        writeln!(f, "{}", table)?;

        if let Some(stats) = self.stats.lock().as_ref() {
            writeln!(f, "Rows: {:.2}", stats.rows())?;
        }

        let winners = self.winners.lock();
        if !winners.is_empty() {
            let mut table = Table::new();
            table.add_row(row!["Required", "Winner", "Cost", "Delivered"]);
            for (required, winner) in winners.iter() {
                table.add_row(row![
                    format!("{:?}", required),
                    winner.expr,
                    winner.cost,
                    format!("{:?}", winner.delivered)
                ]);
            }
            writeln!(f, "{}", table)?;
        }
        Ok(())
    }
}
