//! Transformation rules.
//!
//! A rule defines an equivalent transformation of a logical expression. There are two kinds of
//! rules:
//!
//! 1. Exploration rule. It produces an equivalent logical alternative, which is used in the
//! exploration phase of the optimizer. For example, [`InnerJoinCommutativityRule`] just swaps the
//! inputs of an inner join.
//! 2. Implementation rule. It transforms a logical operator to a physical operator. For example,
//! [`InnerJoin2HashJoinRule`] transforms an inner join to a hash join.
//!
//! ## Pattern
//!
//! A pattern defines what expression the rule should operate on, so that the rule never walks the
//! memo itself. Patterns are [`Expression`]s of [`PatternOperator`]s. The pattern of
//! [`Select2FilterRule`] is defined as following:
//! ```no
//! static ref SELECT_PATTERN: Pattern = {
//!     pattern(OperatorId::LogicalSelect)
//!         .leaf(PatternOperator::Leaf)
//!         .leaf(PatternOperator::Tree)
//!     .end_node()
//! };
//! ```
//!
//! When the rule is invoked its input is an [`Expression`] bound from the memo, where every
//! child matched by a leaf is a reference to its group:
//! ```no
//! [GroupExprId(0.0) LogicalSelect]                     [PhysicalFilter]
//!          |             \                                /          \
//!          |              \        Select2Filter         /            \
//!  [GroupId(1)]   [ScalarCmp(=) ..]   -------->   [GroupId(1)]  [ScalarCmp(=) ..]
//! ```
//!
//! The optimizer inserts generated alternatives into the group of the input.
//!
//! [`PatternOperator`]: crate::operator::PatternOperator
mod pattern;
pub use pattern::*;
mod get;
pub use get::*;
mod join;
pub use join::*;
mod select;
pub use select::*;
mod union;
pub use union::*;

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use enum_dispatch::enum_dispatch;
use enumset::EnumSetType;
use serde::{Deserialize, Serialize};
use strum_macros::AsRefStr;

use crate::cascades::{ExprHandle, Memo};
use crate::config::OptimizerConfig;
use crate::error::{OptError, OptResult};
use crate::expr::{ColumnFactory, ExprNode, ExprRef, Expression};
use crate::hints::PlanHint;
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

pub struct RuleResult {
    exprs: Vec<Expression>,
}

impl Default for RuleResult {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleResult {
    pub fn new() -> Self {
        Self { exprs: vec![] }
    }

    pub fn add(&mut self, new_expr: Expression) {
        self.exprs.push(new_expr);
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn results(self) -> impl Iterator<Item = Expression> {
        self.exprs.into_iter()
    }
}

/// What a rule may look at while applied.
pub struct RuleContext<'a> {
    memo: &'a Memo,
    ctx: &'a OptimizerContext,
}

impl<'a> RuleContext<'a> {
    pub fn new(memo: &'a Memo, ctx: &'a OptimizerContext) -> Self {
        Self { memo, ctx }
    }

    pub fn optimizer_context(&self) -> &'a OptimizerContext {
        self.ctx
    }

    pub fn column_factory(&self) -> &'a ColumnFactory {
        self.ctx.column_factory()
    }

    pub fn plan_hint(&self) -> Option<&'a PlanHint> {
        self.ctx.plan_hint()
    }

    /// Logical property of the group `expr` was bound from.
    ///
    /// # Panics
    ///
    /// If `expr` is neither a group leaf nor bound from a relational group.
    pub fn logical_prop(&self, expr: &Expression) -> Arc<LogicalProperty> {
        expr.group_id()
            .and_then(|group_id| self.memo.logical_prop(group_id))
            .unwrap_or_else(|| panic!("{:?} is not bound to a relational group", expr))
    }

    /// Scalar tree of `expr`, extracted from the memo if it was bound as a group leaf.
    pub fn scalar(&self, expr: &ExprRef) -> ExprRef {
        match expr.node() {
            ExprNode::Group(group_id) => self.memo.scalar_expr(*group_id),
            ExprNode::Operator { .. } => expr.clone(),
        }
    }
}

/// A rule should only focus on providing equivalent transformations of expressions.
///
/// Rules are stateless and shared by concurrent optimizations.
#[enum_dispatch(RuleImpl)]
pub trait Rule: Send + Sync {
    /// Apply a rule to a bound expression matching [`Rule::pattern`], appending alternatives
    /// to `result`.
    fn apply(&self, ctx: &RuleContext, input: &Expression, result: &mut RuleResult)
        -> OptResult<()>;

    /// Pattern for rule.
    fn pattern(&self) -> &Pattern;

    /// Use to identify each rule.
    ///
    /// This is used to avoid applying same rule repeatedly to same group expression.
    fn rule_id(&self) -> RuleId;

    fn category(&self) -> RuleCategory {
        self.rule_id().category()
    }

    /// Use to identify applying order of rules. [`RulePromise::None`] skips the rule.
    fn promise(&self, _handle: &ExprHandle) -> RulePromise {
        RulePromise::Medium
    }

    /// Whether the rule may apply to expressions produced by rule `other`.
    fn is_compatible(&self, _other: RuleId) -> bool {
        true
    }
}

#[enum_dispatch]
#[derive(Clone, AsRefStr)]
pub enum RuleImpl {
    // Exploration rules
    InnerJoinCommutativityRule,
    FullJoinCommutativityRule,
    ExpandNAryJoinRule,
    Select2BitmapBoolOpRule,
    Select2DynamicBitmapBoolOpRule,
    Select2IndexOnlyGetRule,
    Select2DynamicIndexOnlyGetRule,
    ExpandDynamicGetWithForeignPartitionsRule,

    // Implementation rules
    Get2TableScanRule,
    DynamicGet2DynamicTableScanRule,
    ForeignGet2ForeignScanRule,
    DynamicForeignGet2DynamicForeignScanRule,
    BitmapTableGet2BitmapTableScanRule,
    DynamicBitmapTableGet2DynamicBitmapTableScanRule,
    IndexOnlyGet2IndexOnlyScanRule,
    DynamicIndexOnlyGet2DynamicIndexOnlyScanRule,
    Select2FilterRule,
    InnerJoin2HashJoinRule,
    InnerJoin2NLJoinRule,
    LeftOuterJoin2HashJoinRule,
    FullOuterJoin2HashJoinRule,
    UnionAll2UnionAllRule,
}

#[derive(EnumSetType, Debug, AsRefStr, Serialize, Deserialize)]
pub enum RuleId {
    // Exploration rules
    InnerJoinCommutativity,
    FullJoinCommutativity,
    ExpandNAryJoin,
    Select2BitmapBoolOp,
    Select2DynamicBitmapBoolOp,
    Select2IndexOnlyGet,
    Select2DynamicIndexOnlyGet,
    ExpandDynamicGetWithForeignPartitions,

    // Implementation rules
    Get2TableScan,
    DynamicGet2DynamicTableScan,
    ForeignGet2ForeignScan,
    DynamicForeignGet2DynamicForeignScan,
    BitmapTableGet2BitmapTableScan,
    DynamicBitmapTableGet2DynamicBitmapTableScan,
    IndexOnlyGet2IndexOnlyScan,
    DynamicIndexOnlyGet2DynamicIndexOnlyScan,
    Select2Filter,
    InnerJoin2HashJoin,
    InnerJoin2NLJoin,
    LeftOuterJoin2HashJoin,
    FullOuterJoin2HashJoin,
    UnionAll2UnionAll,
}

impl RuleId {
    pub fn category(self) -> RuleCategory {
        match self {
            RuleId::InnerJoinCommutativity
            | RuleId::FullJoinCommutativity
            | RuleId::ExpandNAryJoin
            | RuleId::Select2BitmapBoolOp
            | RuleId::Select2DynamicBitmapBoolOp
            | RuleId::Select2IndexOnlyGet
            | RuleId::Select2DynamicIndexOnlyGet
            | RuleId::ExpandDynamicGetWithForeignPartitions => RuleCategory::Exploration,
            _ => RuleCategory::Implementation,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleCategory {
    Exploration,
    Implementation,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum RulePromise {
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Debug for RuleImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Rules available to an optimization, looked up by id.
#[derive(Clone, Debug)]
pub struct RuleSet {
    rules: Vec<RuleImpl>,
}

impl RuleSet {
    pub fn new(rules: Vec<RuleImpl>) -> Self {
        Self { rules }
    }

    /// Every rule of this crate.
    pub fn all() -> Self {
        Self::new(vec![
            InnerJoinCommutativityRule::new().into(),
            FullJoinCommutativityRule::new().into(),
            ExpandNAryJoinRule::new().into(),
            Select2BitmapBoolOpRule::new().into(),
            Select2DynamicBitmapBoolOpRule::new().into(),
            Select2IndexOnlyGetRule::new().into(),
            Select2DynamicIndexOnlyGetRule::new().into(),
            ExpandDynamicGetWithForeignPartitionsRule::new().into(),
            Get2TableScanRule::new().into(),
            DynamicGet2DynamicTableScanRule::new().into(),
            ForeignGet2ForeignScanRule::new().into(),
            DynamicForeignGet2DynamicForeignScanRule::new().into(),
            BitmapTableGet2BitmapTableScanRule::new().into(),
            DynamicBitmapTableGet2DynamicBitmapTableScanRule::new().into(),
            IndexOnlyGet2IndexOnlyScanRule::new().into(),
            DynamicIndexOnlyGet2DynamicIndexOnlyScanRule::new().into(),
            Select2FilterRule::new().into(),
            InnerJoin2HashJoinRule::new().into(),
            InnerJoin2NLJoinRule::new().into(),
            LeftOuterJoin2HashJoinRule::new().into(),
            FullOuterJoin2HashJoinRule::new().into(),
            UnionAll2UnionAllRule::new().into(),
        ])
    }

    /// Every rule not disabled by `config`.
    pub fn for_config(config: &OptimizerConfig) -> Self {
        let mut rules = Self::all().rules;
        rules.retain(|rule| config.is_rule_enabled(rule.rule_id()));
        Self::new(rules)
    }

    pub fn get(&self, rule_id: RuleId) -> OptResult<&RuleImpl> {
        self.rules
            .iter()
            .find(|rule| rule.rule_id() == rule_id)
            .ok_or_else(|| OptError::RuleNotFound(rule_id.as_ref().to_string()).into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleImpl> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
