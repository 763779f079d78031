//! Physical plans handed out by the optimizer.
mod explain;
pub use explain::*;

use std::collections::HashSet;
use std::mem::swap;
use std::sync::Arc;

use crate::cost::Cost;
use crate::expr::ExprRef;
use crate::operator::PhysicalOperator;
use crate::properties::PhysicalPropertySet;

pub type PlanNodeId = u32;

pub type PlanNodeRef = Arc<PlanNode>;

#[derive(Default)]
pub struct PlanNodeIdGen {
    next: PlanNodeId,
}

impl PlanNodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> PlanNodeId {
        self.next += 1;
        self.next
    }
}

/// One node in a plan.
#[derive(Debug)]
pub struct PlanNode {
    id: PlanNodeId,
    operator: PhysicalOperator,
    /// Relational inputs.
    inputs: Vec<PlanNodeRef>,
    /// Scalar children of the operator, such as a filter predicate or a join condition.
    scalars: Vec<ExprRef>,
    /// Cost of the subtree rooted at this node.
    cost: Cost,
    rows: f64,
    delivered: PhysicalPropertySet,
}

/// The `eq` should ignore `id`.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator
            && self.inputs == other.inputs
            && self.scalars == other.scalars
            && self.delivered == other.delivered
    }
}

impl PlanNode {
    pub fn new(
        id: PlanNodeId,
        operator: PhysicalOperator,
        inputs: Vec<PlanNodeRef>,
        scalars: Vec<ExprRef>,
    ) -> Self {
        Self {
            id,
            operator,
            inputs,
            scalars,
            cost: Cost::default(),
            rows: 0.0,
            delivered: PhysicalPropertySet::default(),
        }
    }

    pub fn with_cost(mut self, cost: Cost, rows: f64) -> Self {
        self.cost = cost;
        self.rows = rows;
        self
    }

    pub fn with_delivered(mut self, delivered: PhysicalPropertySet) -> Self {
        self.delivered = delivered;
        self
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn operator(&self) -> &PhysicalOperator {
        &self.operator
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }

    pub fn scalars(&self) -> &[ExprRef] {
        &self.scalars
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn rows(&self) -> f64 {
        self.rows
    }

    pub fn delivered(&self) -> &PhysicalPropertySet {
        &self.delivered
    }
}

/// A physical plan, the result of optimization.
#[derive(PartialEq, Debug)]
pub struct Plan {
    root: PlanNodeRef,
}

/// Breath first iterator of a single root plan.
struct BFSPlanNodeIter {
    visited: HashSet<PlanNodeId>,
    cur_level: Vec<PlanNodeRef>,
    next_level: Vec<PlanNodeRef>,
}

impl Iterator for BFSPlanNodeIter {
    type Item = PlanNodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur_level.is_empty() {
            swap(&mut self.cur_level, &mut self.next_level);
        }

        if let Some(p) = self.cur_level.pop() {
            for input in &p.inputs {
                if self.visited.insert(input.id) {
                    self.next_level.push(input.clone());
                }
            }

            Some(p)
        } else {
            None
        }
    }
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }

    /// Cost of the whole plan.
    pub fn cost(&self) -> Cost {
        self.root.cost
    }

    pub fn bfs_iterator(&self) -> impl Iterator<Item = PlanNodeRef> {
        let mut visited = HashSet::new();
        visited.insert(self.root.id);

        BFSPlanNodeIter {
            cur_level: vec![self.root.clone()],
            next_level: vec![],
            visited,
        }
    }
}
