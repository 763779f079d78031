//! Enforcers: physical operators added to a group only to deliver the properties its plans
//! lack.
//!
//! Each enforcer fixes one component of the required properties and requires the rest from its
//! child, which lives in the same group. Stacked bottom-up an enforced plan reads
//! `motion -> sort -> spool`.
use std::fmt::Formatter;

use crate::error::OptResult;
use crate::operator::{
    DerivePropContext, DerivePropResult, DisplayFields, PhysicalOperator, PhysicalOperatorTrait,
};
use crate::properties::{
    DistributionSpec, HashedSpec, OrderSpec, PhysicalPropertySet, RewindabilitySpec,
    SingletonKind,
};

/// The enforcer to try for `required`, if any operator can deliver it.
pub fn enforcer_for(required: &PhysicalPropertySet) -> Option<PhysicalOperator> {
    if required.rewind() == RewindabilitySpec::Rewindable {
        return Some(PhysicalSpool.into());
    }
    if !required.order().is_empty() {
        return Some(PhysicalSort::new(required.order().clone()).into());
    }
    match required.dist() {
        DistributionSpec::Singleton(kind) => Some(PhysicalMotionGather::new(*kind).into()),
        DistributionSpec::Hashed(spec) => {
            Some(PhysicalMotionHashDistribute::new(spec.clone()).into())
        }
        DistributionSpec::Replicated => Some(PhysicalMotionBroadcast.into()),
        DistributionSpec::Random { .. } => Some(PhysicalMotionRandom.into()),
        DistributionSpec::Any | DistributionSpec::NonReplicated | DistributionSpec::Universal => {
            None
        }
    }
}

/// Motions move rows between segments and don't keep any order.
fn motion_child(dist: DistributionSpec) -> OptResult<Vec<DerivePropResult>> {
    Ok(vec![DerivePropResult::new(vec![
        PhysicalPropertySet::with_dist(dist),
    ])])
}

/// Sends all rows to a single process.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalMotionGather {
    kind: SingletonKind,
}

impl PhysicalMotionGather {
    pub fn new(kind: SingletonKind) -> Self {
        Self { kind }
    }
}

impl PhysicalOperatorTrait for PhysicalMotionGather {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        motion_child(DistributionSpec::Any)
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        DistributionSpec::Singleton(self.kind)
    }

    fn is_enforcer(&self) -> bool {
        true
    }
}

impl DisplayFields for PhysicalMotionGather {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.kind)
    }
}

/// Redistributes rows by the hash of some columns.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalMotionHashDistribute {
    spec: HashedSpec,
}

impl PhysicalMotionHashDistribute {
    pub fn new(spec: HashedSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &HashedSpec {
        &self.spec
    }
}

impl PhysicalOperatorTrait for PhysicalMotionHashDistribute {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        motion_child(DistributionSpec::NonReplicated)
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        DistributionSpec::Hashed(self.spec.clone())
    }

    fn is_enforcer(&self) -> bool {
        true
    }
}

impl DisplayFields for PhysicalMotionHashDistribute {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.spec)
    }
}

/// Sends every row to every segment.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct PhysicalMotionBroadcast;

impl PhysicalOperatorTrait for PhysicalMotionBroadcast {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        motion_child(DistributionSpec::NonReplicated)
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        DistributionSpec::Replicated
    }

    fn is_enforcer(&self) -> bool {
        true
    }
}

impl DisplayFields for PhysicalMotionBroadcast {}

/// Spreads rows round robin.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct PhysicalMotionRandom;

impl PhysicalOperatorTrait for PhysicalMotionRandom {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        motion_child(DistributionSpec::NonReplicated)
    }

    fn derive_distribution(&self, _children: &[PhysicalPropertySet]) -> DistributionSpec {
        DistributionSpec::Random {
            duplicate_sensitive: true,
        }
    }

    fn is_enforcer(&self) -> bool {
        true
    }
}

impl DisplayFields for PhysicalMotionRandom {}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalSort {
    order: OrderSpec,
}

impl PhysicalSort {
    pub fn new(order: OrderSpec) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }
}

impl PhysicalOperatorTrait for PhysicalSort {
    fn derive_properties(&self, context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        Ok(vec![DerivePropResult::new(vec![context
            .required_prop
            .dist_only()])])
    }

    fn derive_distribution(&self, children: &[PhysicalPropertySet]) -> DistributionSpec {
        children[0].dist().clone()
    }

    fn derive_order(&self, _children: &[PhysicalPropertySet]) -> OrderSpec {
        self.order.clone()
    }

    /// Sorted rows are materialized.
    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }

    fn is_enforcer(&self) -> bool {
        true
    }
}

impl DisplayFields for PhysicalSort {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.order.orders())
    }
}

/// Materializes its input so that it can be rescanned.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct PhysicalSpool;

impl PhysicalOperatorTrait for PhysicalSpool {
    fn derive_properties(&self, context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        Ok(vec![DerivePropResult::new(vec![context
            .required_prop
            .clone()
            .set_rewind(RewindabilitySpec::NotRewindable)])])
    }

    fn derive_distribution(&self, children: &[PhysicalPropertySet]) -> DistributionSpec {
        children[0].dist().clone()
    }

    fn derive_order(&self, children: &[PhysicalPropertySet]) -> OrderSpec {
        children[0].order().clone()
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::Rewindable
    }

    fn is_enforcer(&self) -> bool {
        true
    }
}

impl DisplayFields for PhysicalSpool {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ColumnFactory;
    use crate::properties::{Ordering, PhysicalProp};
    use arrow_schema::DataType;

    #[test]
    fn test_enforcer_for() {
        let a = ColumnFactory::default().new_col_ref("a", DataType::Int32);
        let order = OrderSpec::new(vec![Ordering::asc(a.clone())]);
        let hashed = DistributionSpec::hashed(vec![a], true);

        let all = PhysicalPropertySet::new(
            hashed.clone(),
            order.clone(),
            RewindabilitySpec::Rewindable,
        );
        assert!(matches!(
            enforcer_for(&all),
            Some(PhysicalOperator::PhysicalSpool(_))
        ));

        let sorted = all.clone().set_rewind(RewindabilitySpec::NotRewindable);
        assert!(matches!(
            enforcer_for(&sorted),
            Some(PhysicalOperator::PhysicalSort(_))
        ));

        let dist = PhysicalPropertySet::with_dist(hashed);
        assert!(matches!(
            enforcer_for(&dist),
            Some(PhysicalOperator::PhysicalMotionHashDistribute(_))
        ));
        assert!(matches!(
            enforcer_for(&PhysicalPropertySet::with_dist(DistributionSpec::Singleton(
                SingletonKind::Coordinator
            ))),
            Some(PhysicalOperator::PhysicalMotionGather(_))
        ));
        assert!(enforcer_for(&PhysicalPropertySet::default()).is_none());
        assert!(
            enforcer_for(&PhysicalPropertySet::with_dist(DistributionSpec::NonReplicated))
                .is_none()
        );
    }

    #[test]
    fn test_enforcers_strip_one_component() {
        let a = ColumnFactory::default().new_col_ref("a", DataType::Int32);
        let required = PhysicalPropertySet::new(
            DistributionSpec::hashed(vec![a.clone()], true),
            OrderSpec::new(vec![Ordering::asc(a)]),
            RewindabilitySpec::Rewindable,
        );
        let context = || DerivePropContext {
            required_prop: &required,
        };

        let spool_child = &PhysicalSpool.derive_properties(context()).unwrap()[0];
        assert_eq!(
            required.clone().set_rewind(RewindabilitySpec::NotRewindable),
            spool_child.input_required_props[0]
        );

        let sort = PhysicalSort::new(required.order().clone());
        let sort_child = &sort.derive_properties(context()).unwrap()[0];
        assert_eq!(required.dist_only(), sort_child.input_required_props[0]);

        let delivered =
            PhysicalOperator::from(sort).derive_delivered(&sort_child.input_required_props);
        assert!(delivered.satisfies(&required));
    }
}
