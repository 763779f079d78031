//! The cascades search.
//!
//! A [`Memo`] stores every alternative found so far as group expressions of equivalence
//! [`Group`]s. The [`CascadesOptimizer`] drives a stack of tasks over the memo: exploring groups
//! with exploration rules, implementing them with implementation rules, and optimizing the
//! inputs of each physical alternative for the properties its parent requires. The cheapest
//! physical expression found for a group and a required property set is kept as its [`Winner`].
mod group;
pub use group::*;
mod handle;
pub use handle::*;
mod memo;
pub use memo::*;
mod binding;
mod task;
mod optimizer;
pub use optimizer::*;
