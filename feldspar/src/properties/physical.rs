use std::fmt::{Debug, Formatter};

use crate::properties::{DistributionSpec, OrderSpec, PhysicalProp, RewindabilitySpec};

/// All physical properties, either required from or delivered by a plan.
#[derive(Hash, Clone, Eq, PartialEq, Default)]
pub struct PhysicalPropertySet {
    dist: DistributionSpec,
    order: OrderSpec,
    rewind: RewindabilitySpec,
}

impl PhysicalPropertySet {
    pub fn new(dist: DistributionSpec, order: OrderSpec, rewind: RewindabilitySpec) -> Self {
        Self {
            dist,
            order,
            rewind,
        }
    }

    pub fn with_dist(dist: DistributionSpec) -> Self {
        Self {
            dist,
            ..Default::default()
        }
    }

    pub fn dist(&self) -> &DistributionSpec {
        &self.dist
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }

    pub fn rewind(&self) -> RewindabilitySpec {
        self.rewind
    }

    pub fn set_dist(mut self, dist: DistributionSpec) -> Self {
        self.dist = dist;
        self
    }

    pub fn set_order(mut self, order: OrderSpec) -> Self {
        self.order = order;
        self
    }

    pub fn set_rewind(mut self, rewind: RewindabilitySpec) -> Self {
        self.rewind = rewind;
        self
    }

    /// The requirement without any order or rewindability, which children of operators that
    /// neither preserve order nor rescan their inputs receive.
    pub fn dist_only(&self) -> Self {
        Self::with_dist(self.dist.clone())
    }
}

impl PhysicalProp for PhysicalPropertySet {
    fn satisfies(&self, required: &Self) -> bool {
        self.dist.satisfies(&required.dist)
            && self.order.satisfies(&required.order)
            && self.rewind.satisfies(&required.rewind)
    }
}

impl Debug for PhysicalPropertySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{dist: {:?}", self.dist)?;
        if !self.order.is_empty() {
            write!(f, ", order: {:?}", self.order.orders())?;
        }
        if self.rewind == RewindabilitySpec::Rewindable {
            write!(f, ", rewindable")?;
        }
        write!(f, "}}")
    }
}
