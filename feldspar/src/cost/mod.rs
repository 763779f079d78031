//! Cost model.
//!
//! The search only compares costs, it never looks into them. A [`CostModel`] estimates the
//! cost of one operator from its cardinality and the cardinality of its inputs, the search adds
//! the costs of the chosen inputs.
mod simple;
pub use simple::*;

use std::fmt::{Display, Formatter};

use derive_more::{Add, AddAssign, Sub, SubAssign, Sum};

use crate::operator::PhysicalOperator;

pub const INF: Cost = Cost(f64::INFINITY);

#[derive(Copy, Clone, Debug, Default, PartialOrd, PartialEq, Add, Sub, Sum, AddAssign, SubAssign)]
pub struct Cost(f64);

impl Cost {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Cost {
    fn from(c: f64) -> Self {
        Cost(c)
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// What a cost model sees of an operator.
pub struct CostContext<'a> {
    pub operator: &'a PhysicalOperator,
    /// Estimated output rows.
    pub rows: f64,
    /// Estimated output rows of each relational input, in order.
    pub child_rows: &'a [f64],
}

pub trait CostModel: Send + Sync {
    /// Estimate cost of current operator without accumulating children's cost.
    fn cost(&self, context: &CostContext) -> Cost;
}
