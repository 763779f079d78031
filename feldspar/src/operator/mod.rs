//! Operators of expression trees.
//!
//! Operators are classified into four closed families: logical, physical, scalar and pattern.
//! Each family is an enum since they implement different traits. For example, logical operators
//! derive output columns and statistics, physical operators derive delivered properties and the
//! properties they require from their children.
//!
//! Relational operators with scalar children put them last: a select is `[input, predicate]`, a
//! join `[outer, inner, predicate]`.
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;
mod scalar;
pub use scalar::*;
mod pattern;
pub use pattern::*;
mod get;
pub use get::*;
mod index;
pub use index::*;
mod join;
pub use join::*;
mod filter;
pub use filter::*;
mod union;
pub use union::*;
mod enforcer;
pub use enforcer::*;

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::{AsRefStr, IntoStaticStr};

use crate::operator::Operator::{Logical, Pattern, Physical, Scalar};

#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner)]
pub enum Operator {
    Logical(LogicalOperator),
    Physical(PhysicalOperator),
    Scalar(ScalarOperator),
    Pattern(PatternOperator),
}

pub type OperatorRef = Arc<Operator>;

/// Identifies the kind of an operator, ignoring its payload.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, AsRefStr, IntoStaticStr)]
pub enum OperatorId {
    LogicalGet,
    LogicalDynamicGet,
    LogicalForeignGet,
    LogicalDynamicForeignGet,
    LogicalBitmapTableGet,
    LogicalDynamicBitmapTableGet,
    LogicalIndexOnlyGet,
    LogicalDynamicIndexOnlyGet,
    LogicalSelect,
    LogicalInnerJoin,
    LogicalLeftOuterJoin,
    LogicalFullOuterJoin,
    LogicalNAryJoin,
    LogicalUnionAll,

    PhysicalTableScan,
    PhysicalDynamicTableScan,
    PhysicalForeignScan,
    PhysicalDynamicForeignScan,
    PhysicalBitmapTableScan,
    PhysicalDynamicBitmapTableScan,
    PhysicalIndexOnlyScan,
    PhysicalDynamicIndexOnlyScan,
    PhysicalFilter,
    PhysicalInnerHashJoin,
    PhysicalInnerNLJoin,
    PhysicalLeftOuterHashJoin,
    PhysicalFullHashJoin,
    PhysicalUnionAll,
    PhysicalMotionGather,
    PhysicalMotionHashDistribute,
    PhysicalMotionBroadcast,
    PhysicalMotionRandom,
    PhysicalSort,
    PhysicalSpool,

    ScalarIdent,
    ScalarConst,
    ScalarCmp,
    ScalarBoolOp,
    ScalarBitmapIndexProbe,
    ScalarBitmapBoolOp,

    PatternLeaf,
    PatternTree,
    PatternMultiLeaf,
}

/// Appends the payload's fields to the operator's name when displayed.
#[enum_dispatch(LogicalOperator, PhysicalOperator, ScalarOperator)]
pub trait DisplayFields {
    fn display(&self, _f: &mut Formatter<'_>) -> std::fmt::Result {
        Ok(())
    }
}

impl Operator {
    pub fn id(&self) -> OperatorId {
        match self {
            Logical(op) => op.id(),
            Physical(op) => op.id(),
            Scalar(op) => op.id(),
            Pattern(op) => op.id(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.id().into()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Scalar(_))
    }

    /// Structural equality, used to detect duplicate group expressions.
    pub fn matches(&self, other: &Operator) -> bool {
        self == other
    }

    /// Whether swapping children changes the result.
    pub fn is_input_order_sensitive(&self) -> bool {
        match self {
            Logical(op) => op.is_input_order_sensitive(),
            Physical(op) => op.is_input_order_sensitive(),
            Scalar(op) => op.is_input_order_sensitive(),
            Pattern(_) => true,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())?;
        match self {
            Logical(op) => op.display(f),
            Physical(op) => op.display(f),
            Scalar(op) => op.display(f),
            Pattern(PatternOperator::Node(id)) => write!(f, "({:?})", id),
            Pattern(_) => Ok(()),
        }
    }
}

/// Implements `From<Payload> for Operator` for each payload of an operator family.
macro_rules! impl_operator_from {
    ($family:ident, $family_enum:ident, $($payload:ident),+ $(,)?) => {
        $(
            impl From<$payload> for Operator {
                fn from(op: $payload) -> Self {
                    Operator::$family($family_enum::from(op))
                }
            }
        )+
    };
}

impl_operator_from!(
    Logical,
    LogicalOperator,
    LogicalGet,
    LogicalDynamicGet,
    LogicalForeignGet,
    LogicalDynamicForeignGet,
    LogicalBitmapTableGet,
    LogicalDynamicBitmapTableGet,
    LogicalIndexOnlyGet,
    LogicalDynamicIndexOnlyGet,
    LogicalSelect,
    LogicalInnerJoin,
    LogicalLeftOuterJoin,
    LogicalFullOuterJoin,
    LogicalNAryJoin,
    LogicalUnionAll,
);

impl_operator_from!(
    Physical,
    PhysicalOperator,
    PhysicalTableScan,
    PhysicalDynamicTableScan,
    PhysicalForeignScan,
    PhysicalDynamicForeignScan,
    PhysicalBitmapTableScan,
    PhysicalDynamicBitmapTableScan,
    PhysicalIndexOnlyScan,
    PhysicalDynamicIndexOnlyScan,
    PhysicalFilter,
    PhysicalInnerHashJoin,
    PhysicalInnerNLJoin,
    PhysicalLeftOuterHashJoin,
    PhysicalFullHashJoin,
    PhysicalUnionAll,
    PhysicalMotionGather,
    PhysicalMotionHashDistribute,
    PhysicalMotionBroadcast,
    PhysicalMotionRandom,
    PhysicalSort,
    PhysicalSpool,
);

impl_operator_from!(
    Scalar,
    ScalarOperator,
    ScalarIdent,
    ScalarConst,
    ScalarCmp,
    ScalarBoolOp,
    ScalarBitmapIndexProbe,
    ScalarBitmapBoolOp,
);

impl From<PatternOperator> for Operator {
    fn from(op: PatternOperator) -> Self {
        Operator::Pattern(op)
    }
}

impl From<LogicalOperator> for Operator {
    fn from(op: LogicalOperator) -> Self {
        Operator::Logical(op)
    }
}

impl From<PhysicalOperator> for Operator {
    fn from(op: PhysicalOperator) -> Self {
        Operator::Physical(op)
    }
}

impl From<ScalarOperator> for Operator {
    fn from(op: ScalarOperator) -> Self {
        Operator::Scalar(op)
    }
}
