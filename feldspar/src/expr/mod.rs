//! Expression trees.
//!
//! An [`Expression`] is the tree form of a query fragment. It is used for the query handed to the
//! optimizer, for rule patterns, and for the inputs and outputs of rules. Inside the memo the
//! same tree is flattened into groups, and pattern binding turns it back into a tree whose leaves
//! may be references to whole groups.
mod column;
pub use column::*;
mod scalar;
pub use scalar::*;

use std::fmt::{Debug, Formatter};
use std::ops::Index;
use std::sync::Arc;

use crate::cascades::GroupId;
use crate::operator::{Operator, OperatorRef};
use crate::utils::RootBuilder;

pub type ExprRef = Arc<Expression>;

/// One node of an [`Expression`].
#[derive(Clone)]
pub enum ExprNode {
    /// An operator, remembering the group it was bound from if any.
    Operator {
        operator: OperatorRef,
        group: Option<GroupId>,
    },
    /// Stands for any expression of a group. Always a leaf.
    Group(GroupId),
}

#[derive(Clone)]
pub struct Expression {
    node: ExprNode,
    children: Vec<ExprRef>,
}

impl Expression {
    pub fn new<O: Into<Operator>>(operator: O, children: Vec<ExprRef>) -> Self {
        Self::with_operator(Arc::new(operator.into()), children)
    }

    pub fn with_operator(operator: OperatorRef, children: Vec<ExprRef>) -> Self {
        Self {
            node: ExprNode::Operator {
                operator,
                group: None,
            },
            children,
        }
    }

    /// Node produced by binding a group expression of `group`.
    pub fn bound(operator: OperatorRef, group: GroupId, children: Vec<ExprRef>) -> Self {
        Self {
            node: ExprNode::Operator {
                operator,
                group: Some(group),
            },
            children,
        }
    }

    pub fn group(group_id: GroupId) -> Self {
        Self {
            node: ExprNode::Group(group_id),
            children: vec![],
        }
    }

    pub fn new_builder<O: Into<Operator>>(operator: O) -> RootBuilder<Expression, Operator> {
        RootBuilder::new(operator.into())
    }

    pub fn node(&self) -> &ExprNode {
        &self.node
    }

    pub fn operator(&self) -> Option<&OperatorRef> {
        match &self.node {
            ExprNode::Operator { operator, .. } => Some(operator),
            ExprNode::Group(_) => None,
        }
    }

    /// Group this node stands for, either as a leaf or as a bound operator.
    pub fn group_id(&self) -> Option<GroupId> {
        match &self.node {
            ExprNode::Operator { group, .. } => *group,
            ExprNode::Group(group_id) => Some(*group_id),
        }
    }

    pub fn children(&self) -> &[ExprRef] {
        &self.children
    }

    pub fn arity(&self) -> usize {
        self.children.len()
    }

    /// True for scalar operators. Group leaves are never scalar, their content is unknown here.
    pub fn is_scalar(&self) -> bool {
        self.operator().map(|op| op.is_scalar()).unwrap_or(false)
    }

    /// Same operator with other children, no longer bound to a group.
    pub fn with_children(&self, children: Vec<ExprRef>) -> Self {
        match &self.node {
            ExprNode::Operator { operator, .. } => Self::with_operator(operator.clone(), children),
            ExprNode::Group(_) => panic!("group leaf {:?} can't have children", self.node),
        }
    }
}

impl From<(Operator, Vec<Expression>)> for Expression {
    fn from(t: (Operator, Vec<Expression>)) -> Self {
        Expression::new(t.0, t.1.into_iter().map(Arc::new).collect())
    }
}

impl Index<usize> for Expression {
    type Output = ExprRef;

    fn index(&self, index: usize) -> &ExprRef {
        &self.children[index]
    }
}

/// The group a node was bound from is ignored.
impl PartialEq for ExprNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExprNode::Operator { operator: a, .. }, ExprNode::Operator { operator: b, .. }) => {
                a == b
            }
            (ExprNode::Group(a), ExprNode::Group(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.children == other.children
    }
}

impl Debug for ExprNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExprNode::Operator { operator, .. } => write!(f, "{}", operator),
            ExprNode::Group(group_id) => write!(f, "Group({:?})", group_id),
        }
    }
}

impl Debug for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.node)?;
        if !self.children.is_empty() {
            f.debug_list().entries(&self.children).finish()?;
        }
        Ok(())
    }
}
