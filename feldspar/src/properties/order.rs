use std::fmt::{Debug, Formatter};

use crate::expr::ColRef;
use crate::properties::PhysicalProp;

/// Ordering of one column.
#[derive(Hash, Clone, Eq, PartialEq)]
pub struct Ordering {
    column: ColRef,
    /// Ascending or descending.
    asc: bool,
    /// Should null be treated first.
    null_first: bool,
}

impl Ordering {
    pub fn new(column: ColRef, asc: bool, null_first: bool) -> Self {
        Self {
            column,
            asc,
            null_first,
        }
    }

    pub fn asc(column: ColRef) -> Self {
        Self::new(column, true, false)
    }

    pub fn column(&self) -> &ColRef {
        &self.column
    }
}

impl Debug for Ordering {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}", self.column, if self.asc { "asc" } else { "desc" })?;
        if self.null_first {
            write!(f, " nulls first")?;
        }
        Ok(())
    }
}

/// Ordering property specification.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct OrderSpec {
    orders: Vec<Ordering>,
}

impl OrderSpec {
    pub fn new(orders: Vec<Ordering>) -> Self {
        Self { orders }
    }

    pub fn orders(&self) -> &[Ordering] {
        &self.orders
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl PhysicalProp for OrderSpec {
    /// Rows sorted on `a, b` are also sorted on `a`.
    fn satisfies(&self, required: &Self) -> bool {
        required.orders.len() <= self.orders.len()
            && required
                .orders
                .iter()
                .zip(&self.orders)
                .all(|(required, provided)| required == provided)
    }
}
