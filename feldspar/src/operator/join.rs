use std::fmt::{Debug, Formatter};

use log::debug;

use crate::cascades::ExprHandle;
use crate::error::OptResult;
use crate::expr::{ColRef, ColRefSet};
use crate::operator::{
    DerivePropContext, DerivePropResult, DisplayFields, LogicalOperatorTrait,
    PhysicalOperatorTrait,
};
use crate::optimizer::OptimizerContext;
use crate::properties::{DistributionSpec, PhysicalPropertySet, RewindabilitySpec, SingletonKind};
use crate::stat::{JoinKind, Statistics};

fn join_output_columns(handle: &ExprHandle) -> ColRefSet {
    handle
        .relational_children()
        .flat_map(|idx| handle.child_logical_prop(idx).output_columns().clone())
        .collect()
}

/// Estimates rows of a join with the predicate as last child, then applies the row hint naming
/// exactly the joined tables.
fn join_stats(
    kind: JoinKind,
    handle: &ExprHandle,
    ctx: &OptimizerContext,
) -> OptResult<Statistics> {
    let children = handle
        .relational_children()
        .map(|idx| handle.child_stats(idx))
        .collect::<Vec<_>>();
    let predicate = handle.child_scalar(handle.arity() - 1);
    let mut stats = ctx.stats_estimator().join(kind, &children, &predicate);

    let tables = handle.table_descriptors();
    if let Some(hint) = ctx
        .config()
        .plan_hint
        .as_ref()
        .and_then(|plan_hint| plan_hint.row_hint(&tables))
    {
        debug!("Applying {} to join of {:?}", hint, tables);
        stats.set_rows(hint.compute_rows(stats.rows()));
    }
    Ok(stats)
}

/// Inner join of `[outer, inner, predicate]`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct LogicalInnerJoin;

impl LogicalOperatorTrait for LogicalInnerJoin {
    fn derive_output_columns(&self, handle: &ExprHandle) -> ColRefSet {
        join_output_columns(handle)
    }

    fn derive_stats(&self, handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        join_stats(JoinKind::Inner, handle, ctx)
    }
}

impl DisplayFields for LogicalInnerJoin {}

/// Left outer join of `[outer, inner, predicate]`, preserving all outer rows.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct LogicalLeftOuterJoin;

impl LogicalOperatorTrait for LogicalLeftOuterJoin {
    fn derive_output_columns(&self, handle: &ExprHandle) -> ColRefSet {
        join_output_columns(handle)
    }

    fn derive_stats(&self, handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        join_stats(JoinKind::LeftOuter, handle, ctx)
    }
}

impl DisplayFields for LogicalLeftOuterJoin {}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct LogicalFullOuterJoin;

impl LogicalOperatorTrait for LogicalFullOuterJoin {
    fn derive_output_columns(&self, handle: &ExprHandle) -> ColRefSet {
        join_output_columns(handle)
    }

    fn derive_stats(&self, handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        join_stats(JoinKind::FullOuter, handle, ctx)
    }
}

impl DisplayFields for LogicalFullOuterJoin {}

/// Inner join of any number of inputs, `[input.., predicate]`. Only exists until it's expanded
/// into binary joins.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct LogicalNAryJoin;

impl LogicalOperatorTrait for LogicalNAryJoin {
    fn derive_output_columns(&self, handle: &ExprHandle) -> ColRefSet {
        join_output_columns(handle)
    }

    fn derive_stats(&self, handle: &ExprHandle, ctx: &OptimizerContext) -> OptResult<Statistics> {
        join_stats(JoinKind::Inner, handle, ctx)
    }

    fn is_input_order_sensitive(&self) -> bool {
        false
    }
}

impl DisplayFields for LogicalNAryJoin {}

/// Equi join keys, `outer[i] = inner[i]`.
#[derive(Clone, Hash, Eq, PartialEq, Default)]
pub struct HashJoinKeys {
    outer: Vec<ColRef>,
    inner: Vec<ColRef>,
}

impl HashJoinKeys {
    pub fn new(outer: Vec<ColRef>, inner: Vec<ColRef>) -> Self {
        assert_eq!(outer.len(), inner.len(), "hash join keys must pair up");
        Self { outer, inner }
    }

    pub fn outer(&self) -> &[ColRef] {
        &self.outer
    }

    pub fn inner(&self) -> &[ColRef] {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.outer.is_empty()
    }

    fn hashed_children(&self) -> DerivePropResult {
        DerivePropResult::new(vec![
            PhysicalPropertySet::with_dist(DistributionSpec::hashed(self.outer.clone(), false)),
            PhysicalPropertySet::with_dist(DistributionSpec::hashed(self.inner.clone(), false)),
        ])
    }
}

impl Debug for HashJoinKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.outer
                    .iter()
                    .zip(&self.inner)
                    .map(|(o, i)| format!("{:?} = {:?}", o, i)),
            )
            .finish()
    }
}

fn singleton_children() -> DerivePropResult {
    let coordinator =
        PhysicalPropertySet::with_dist(DistributionSpec::Singleton(SingletonKind::Coordinator));
    DerivePropResult::new(vec![coordinator.clone(), coordinator])
}

/// Alternatives shared by inner and left outer hash joins: colocate both sides on the keys,
/// broadcast the inner side, or join everything on the coordinator.
fn colocated_or_broadcast(keys: &HashJoinKeys) -> Vec<DerivePropResult> {
    let mut results = Vec::with_capacity(3);
    if !keys.is_empty() {
        results.push(keys.hashed_children());
    }
    results.push(DerivePropResult::new(vec![
        PhysicalPropertySet::with_dist(DistributionSpec::Any),
        PhysicalPropertySet::with_dist(DistributionSpec::Replicated),
    ]));
    results.push(singleton_children());
    results
}

fn outer_and_inner(children: &[PhysicalPropertySet]) -> (&DistributionSpec, &DistributionSpec) {
    assert_eq!(2, children.len(), "joins have two relational children");
    (children[0].dist(), children[1].dist())
}

/// Hash join of `[outer, inner, predicate]`, building a hash table on the inner side.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalInnerHashJoin {
    keys: HashJoinKeys,
}

impl PhysicalInnerHashJoin {
    pub fn new(keys: HashJoinKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &HashJoinKeys {
        &self.keys
    }
}

impl PhysicalOperatorTrait for PhysicalInnerHashJoin {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        Ok(colocated_or_broadcast(&self.keys))
    }

    fn derive_distribution(&self, children: &[PhysicalPropertySet]) -> DistributionSpec {
        match outer_and_inner(children) {
            (DistributionSpec::Hashed(outer), DistributionSpec::Hashed(inner))
                if outer.is_covered_by(self.keys.outer())
                    && inner.is_covered_by(self.keys.inner()) =>
            {
                DistributionSpec::Hashed(outer.combine(inner))
            }
            (outer, inner) if outer.is_replicated_or_universal() => inner.clone(),
            (outer, _) => outer.clone(),
        }
    }
}

impl DisplayFields for PhysicalInnerHashJoin {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.keys)
    }
}

/// Nested loop join of `[outer, inner, predicate]`, evaluating the predicate on every pair of
/// rows. Any predicate works, the inner side is rescanned once per outer row.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct PhysicalInnerNLJoin;

impl PhysicalOperatorTrait for PhysicalInnerNLJoin {
    /// Broadcast the inner side, or join everything on the coordinator.
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        let rescannable = |dist| {
            PhysicalPropertySet::with_dist(dist).set_rewind(RewindabilitySpec::Rewindable)
        };
        let coordinator = DistributionSpec::Singleton(SingletonKind::Coordinator);
        Ok(vec![
            DerivePropResult::new(vec![
                PhysicalPropertySet::with_dist(DistributionSpec::Any),
                rescannable(DistributionSpec::Replicated),
            ]),
            DerivePropResult::new(vec![
                PhysicalPropertySet::with_dist(coordinator.clone()),
                rescannable(coordinator),
            ]),
        ])
    }

    fn derive_distribution(&self, children: &[PhysicalPropertySet]) -> DistributionSpec {
        match outer_and_inner(children) {
            (outer, inner) if outer.is_replicated_or_universal() => inner.clone(),
            (outer, _) => outer.clone(),
        }
    }
}

impl DisplayFields for PhysicalInnerNLJoin {}

/// Rows of the outer side without a match are null extended, so the output is placed like the
/// outer side only.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalLeftOuterHashJoin {
    keys: HashJoinKeys,
}

impl PhysicalLeftOuterHashJoin {
    pub fn new(keys: HashJoinKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &HashJoinKeys {
        &self.keys
    }
}

impl PhysicalOperatorTrait for PhysicalLeftOuterHashJoin {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        Ok(colocated_or_broadcast(&self.keys))
    }

    fn derive_distribution(&self, children: &[PhysicalPropertySet]) -> DistributionSpec {
        match outer_and_inner(children).0 {
            DistributionSpec::Hashed(outer) => {
                DistributionSpec::Hashed(outer.strip_incomplete_equiv())
            }
            outer => outer.clone(),
        }
    }
}

impl DisplayFields for PhysicalLeftOuterHashJoin {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.keys)
    }
}

/// Both sides are null extended. Neither can be broadcast, since its unmatched rows would be
/// emitted by every segment.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct PhysicalFullHashJoin {
    keys: HashJoinKeys,
}

impl PhysicalFullHashJoin {
    pub fn new(keys: HashJoinKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &HashJoinKeys {
        &self.keys
    }
}

impl PhysicalOperatorTrait for PhysicalFullHashJoin {
    fn derive_properties(&self, _context: DerivePropContext) -> OptResult<Vec<DerivePropResult>> {
        let mut results = Vec::with_capacity(2);
        if !self.keys.is_empty() {
            results.push(self.keys.hashed_children());
        }
        results.push(singleton_children());
        Ok(results)
    }

    /// Null extended rows from either side land wherever their own side placed them, so nulls
    /// are never colocated in the output.
    fn derive_distribution(&self, children: &[PhysicalPropertySet]) -> DistributionSpec {
        match outer_and_inner(children) {
            (DistributionSpec::Hashed(outer), DistributionSpec::Hashed(inner)) => {
                if outer.is_covered_by(self.keys.outer()) && inner.is_covered_by(self.keys.inner())
                {
                    DistributionSpec::Hashed(
                        outer
                            .copy_with_nulls_colocated(false)
                            .combine(&inner.copy_with_nulls_colocated(false)),
                    )
                } else {
                    DistributionSpec::Hashed(outer.copy_with_nulls_colocated(false))
                }
            }
            (outer, inner) if outer.is_replicated_or_universal() => inner.clone(),
            (outer, _) => outer.clone(),
        }
    }
}

impl DisplayFields for PhysicalFullHashJoin {
    fn display(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?})", self.keys)
    }
}
