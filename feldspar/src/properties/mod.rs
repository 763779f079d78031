//! Properties of relational operators.
//!
//! There are two kinds of properties: [`LogicalProperty`] and [`PhysicalPropertySet`].
//! Logical properties are shared by logically equivalent expressions, such as output columns and
//! keys. Physical properties describe how the rows of a plan are placed: their distribution over
//! segments, their order, and whether the plan can be rescanned cheaply.

mod distribution;
pub use distribution::*;
mod order;
pub use order::*;
mod rewindability;
pub use rewindability::*;
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;

use std::fmt::Debug;
use std::hash::Hash;

pub trait PhysicalProp: Debug + Hash {
    /// Whether a delivered `self` meets the `required` property.
    fn satisfies(&self, required: &Self) -> bool;
}
