use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;

use crate::error::OptResult;
use crate::operator::{
    OperatorId, PhysicalBitmapTableScan, PhysicalDynamicBitmapTableScan,
    PhysicalDynamicForeignScan, PhysicalDynamicIndexOnlyScan, PhysicalDynamicTableScan,
    PhysicalFilter, PhysicalForeignScan, PhysicalFullHashJoin, PhysicalIndexOnlyScan,
    PhysicalInnerHashJoin, PhysicalInnerNLJoin, PhysicalLeftOuterHashJoin,
    PhysicalMotionBroadcast, PhysicalMotionGather, PhysicalMotionHashDistribute,
    PhysicalMotionRandom, PhysicalSort, PhysicalSpool, PhysicalTableScan, PhysicalUnionAll,
};
use crate::properties::{DistributionSpec, OrderSpec, PhysicalPropertySet, RewindabilitySpec};

/// Physical relational operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner)]
#[enum_dispatch]
pub enum PhysicalOperator {
    PhysicalTableScan(PhysicalTableScan),
    PhysicalDynamicTableScan(PhysicalDynamicTableScan),
    PhysicalForeignScan(PhysicalForeignScan),
    PhysicalDynamicForeignScan(PhysicalDynamicForeignScan),
    PhysicalBitmapTableScan(PhysicalBitmapTableScan),
    PhysicalDynamicBitmapTableScan(PhysicalDynamicBitmapTableScan),
    PhysicalIndexOnlyScan(PhysicalIndexOnlyScan),
    PhysicalDynamicIndexOnlyScan(PhysicalDynamicIndexOnlyScan),
    PhysicalFilter(PhysicalFilter),
    PhysicalInnerHashJoin(PhysicalInnerHashJoin),
    PhysicalInnerNLJoin(PhysicalInnerNLJoin),
    PhysicalLeftOuterHashJoin(PhysicalLeftOuterHashJoin),
    PhysicalFullHashJoin(PhysicalFullHashJoin),
    PhysicalUnionAll(PhysicalUnionAll),
    PhysicalMotionGather(PhysicalMotionGather),
    PhysicalMotionHashDistribute(PhysicalMotionHashDistribute),
    PhysicalMotionBroadcast(PhysicalMotionBroadcast),
    PhysicalMotionRandom(PhysicalMotionRandom),
    PhysicalSort(PhysicalSort),
    PhysicalSpool(PhysicalSpool),
}

pub struct DerivePropContext<'a> {
    pub required_prop: &'a PhysicalPropertySet,
}

/// One alternative of required properties for the relational children.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivePropResult {
    pub input_required_props: Vec<PhysicalPropertySet>,
}

impl DerivePropResult {
    pub fn new(input_required_props: Vec<PhysicalPropertySet>) -> Self {
        Self {
            input_required_props,
        }
    }
}

/// Property derivation of physical operators.
///
/// Requirements flow top-down through [`derive_properties`], delivered properties bottom-up
/// through the other methods. Delivered properties only depend on what the relational children
/// deliver, passed in child order.
///
/// [`derive_properties`]: PhysicalOperatorTrait::derive_properties
#[enum_dispatch(PhysicalOperator)]
pub trait PhysicalOperatorTrait {
    /// Derive children's required properties with required properties of current node.
    ///
    /// Each result is an alternative the optimizer tries.
    fn derive_properties(&self, context: DerivePropContext) -> OptResult<Vec<DerivePropResult>>;

    fn derive_distribution(&self, children: &[PhysicalPropertySet]) -> DistributionSpec;

    fn derive_order(&self, _children: &[PhysicalPropertySet]) -> OrderSpec {
        OrderSpec::default()
    }

    fn derive_rewindability(&self, _children: &[PhysicalPropertySet]) -> RewindabilitySpec {
        RewindabilitySpec::NotRewindable
    }

    /// Enforcers only exist to change the properties of their single child.
    fn is_enforcer(&self) -> bool {
        false
    }

    fn is_input_order_sensitive(&self) -> bool {
        true
    }
}

impl PhysicalOperator {
    pub fn id(&self) -> OperatorId {
        match self {
            PhysicalOperator::PhysicalTableScan(_) => OperatorId::PhysicalTableScan,
            PhysicalOperator::PhysicalDynamicTableScan(_) => OperatorId::PhysicalDynamicTableScan,
            PhysicalOperator::PhysicalForeignScan(_) => OperatorId::PhysicalForeignScan,
            PhysicalOperator::PhysicalDynamicForeignScan(_) => {
                OperatorId::PhysicalDynamicForeignScan
            }
            PhysicalOperator::PhysicalBitmapTableScan(_) => OperatorId::PhysicalBitmapTableScan,
            PhysicalOperator::PhysicalDynamicBitmapTableScan(_) => {
                OperatorId::PhysicalDynamicBitmapTableScan
            }
            PhysicalOperator::PhysicalIndexOnlyScan(_) => OperatorId::PhysicalIndexOnlyScan,
            PhysicalOperator::PhysicalDynamicIndexOnlyScan(_) => {
                OperatorId::PhysicalDynamicIndexOnlyScan
            }
            PhysicalOperator::PhysicalFilter(_) => OperatorId::PhysicalFilter,
            PhysicalOperator::PhysicalInnerHashJoin(_) => OperatorId::PhysicalInnerHashJoin,
            PhysicalOperator::PhysicalInnerNLJoin(_) => OperatorId::PhysicalInnerNLJoin,
            PhysicalOperator::PhysicalLeftOuterHashJoin(_) => OperatorId::PhysicalLeftOuterHashJoin,
            PhysicalOperator::PhysicalFullHashJoin(_) => OperatorId::PhysicalFullHashJoin,
            PhysicalOperator::PhysicalUnionAll(_) => OperatorId::PhysicalUnionAll,
            PhysicalOperator::PhysicalMotionGather(_) => OperatorId::PhysicalMotionGather,
            PhysicalOperator::PhysicalMotionHashDistribute(_) => {
                OperatorId::PhysicalMotionHashDistribute
            }
            PhysicalOperator::PhysicalMotionBroadcast(_) => OperatorId::PhysicalMotionBroadcast,
            PhysicalOperator::PhysicalMotionRandom(_) => OperatorId::PhysicalMotionRandom,
            PhysicalOperator::PhysicalSort(_) => OperatorId::PhysicalSort,
            PhysicalOperator::PhysicalSpool(_) => OperatorId::PhysicalSpool,
        }
    }

    /// Properties delivered given what the relational children deliver.
    pub fn derive_delivered(&self, children: &[PhysicalPropertySet]) -> PhysicalPropertySet {
        let dist = self.derive_distribution(children);
        dist.assert_derivable();
        PhysicalPropertySet::new(
            dist,
            self.derive_order(children),
            self.derive_rewindability(children),
        )
    }
}
