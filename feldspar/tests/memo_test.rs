use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use datafusion_common::ScalarValue;
use datafusion_expr::Operator::Eq;
use feldspar::cascades::Memo;
use feldspar::config::OptimizerConfig;
use feldspar::expr::{cmp, constant, ident, ExprRef, Expression};
use feldspar::operator::{LogicalInnerJoin, TableRef};
use feldspar::optimizer::OptimizerContext;
use feldspar::rules::RuleId;
use feldspar::stat::{JoinKind, SimpleStatsEstimator, Statistics, StatsEstimator, StatsRef};
use maplit::hashmap;

use crate::utils::{column, get, inner_join, optimizer_context};

mod utils;

#[test]
fn test_duplicate_chain_shares_stats() {
    let ctx = optimizer_context(OptimizerConfig::default());
    let memo = Memo::new();
    let a = memo.insert(&get(&ctx, "customers"));
    let b = memo.insert(&get(&ctx, "orders"));
    let c = memo.insert(&get(&ctx, "payroll"));

    memo.mark_duplicates(a.group_id, b.group_id);
    memo.mark_duplicates(b.group_id, c.group_id);
    for id in [a, b, c] {
        assert_eq!(a.group_id, memo.canonical_group_id(id.group_id));
    }

    let stats = memo.derive_stats(c, &ctx).unwrap();
    assert_eq!(10000.0, stats.rows());
    for id in [a, b, c] {
        assert!(Arc::ptr_eq(&stats, &memo.stats(id.group_id).unwrap()));
    }
    // Already derived for the class, through another member.
    assert!(Arc::ptr_eq(&stats, &memo.derive_stats(a, &ctx).unwrap()));

    assert!(memo.reset_stats(b.group_id));
    for id in [a, b, c] {
        assert!(memo.stats(id.group_id).is_none());
    }
    assert!(!memo.reset_stats(c.group_id));
}

#[test]
fn test_concurrent_derivation_computes_once() {
    let ctx = optimizer_context(OptimizerConfig::default());
    let memo = Memo::new();
    let join = memo.insert(&inner_join(get(&ctx, "customers"), get(&ctx, "orders")));

    let derived: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| memo.derive_stats(join, &ctx).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for stats in &derived {
        assert!(Arc::ptr_eq(&derived[0], stats));
    }
    // `id` is a key of customers.
    assert!((derived[0].rows() - 50000.0).abs() < 1e-6);
}

/// Holds the first join estimate until the test has interfered twice through `barrier`.
struct PausingEstimator {
    inner: SimpleStatsEstimator,
    barrier: Arc<Barrier>,
    armed: AtomicBool,
}

impl PausingEstimator {
    fn new(barrier: Arc<Barrier>) -> Self {
        Self {
            inner: SimpleStatsEstimator::default(),
            barrier,
            armed: AtomicBool::new(true),
        }
    }
}

impl StatsEstimator for PausingEstimator {
    fn table(&self, table: &TableRef) -> Statistics {
        self.inner.table(table)
    }

    fn select(&self, input: &Statistics, predicate: &ExprRef) -> Statistics {
        self.inner.select(input, predicate)
    }

    fn join(&self, kind: JoinKind, children: &[StatsRef], predicate: &ExprRef) -> Statistics {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.barrier.wait();
            self.barrier.wait();
        }
        self.inner.join(kind, children, predicate)
    }

    fn union_all(&self, children: &[StatsRef]) -> Statistics {
        self.inner.union_all(children)
    }
}

fn pausing_context(barrier: &Arc<Barrier>) -> OptimizerContext {
    optimizer_context(OptimizerConfig::default())
        .with_stats_estimator(Box::new(PausingEstimator::new(barrier.clone())))
}

#[test]
fn test_merge_during_derivation_keeps_stats() {
    let barrier = Arc::new(Barrier::new(2));
    let ctx = pausing_context(&barrier);
    let memo = Memo::new();
    let first = memo.insert(&inner_join(get(&ctx, "customers"), get(&ctx, "orders")));
    let second = memo.insert(&inner_join(get(&ctx, "customers"), get(&ctx, "regions")));

    let derived = thread::scope(|s| {
        let deriving = s.spawn(|| memo.derive_stats(first, &ctx).unwrap());
        barrier.wait();
        // Marks the deriving group as duplicate, then waits for its slot.
        let merging = s.spawn(|| memo.mark_duplicates(second.group_id, first.group_id));
        thread::sleep(Duration::from_millis(50));
        barrier.wait();
        merging.join().unwrap();
        deriving.join().unwrap()
    });

    assert!(memo.is_same_class(first.group_id, second.group_id));
    for id in [first.group_id, second.group_id] {
        assert!(Arc::ptr_eq(&derived, &memo.stats(id).unwrap()));
    }
}

#[test]
fn test_reset_child_during_derivation() {
    let barrier = Arc::new(Barrier::new(2));
    let ctx = pausing_context(&barrier);
    let memo = Memo::new();
    let join = memo.insert(&inner_join(get(&ctx, "customers"), get(&ctx, "orders")));
    let customers = memo.group_expr(join).child(0);

    let (reset, derived) = thread::scope(|s| {
        let deriving = s.spawn(|| memo.derive_stats(join, &ctx).unwrap());
        barrier.wait();
        let reset = memo.reset_stats(customers);
        barrier.wait();
        (reset, deriving.join().unwrap())
    });

    assert!(reset);
    assert!((derived.rows() - 50000.0).abs() < 1e-6);
    assert!(memo.stats(customers).is_none());
}

#[test]
fn test_insert_identical_tree_twice() {
    let ctx = optimizer_context(OptimizerConfig::default());
    let memo = Memo::new();
    let join = inner_join(get(&ctx, "customers"), get(&ctx, "orders"));

    let first = memo.insert(&join);
    let group_count = memo.group_count();
    let second = memo.insert(&join);

    assert_eq!(first, second);
    assert_eq!(group_count, memo.group_count());
    assert_eq!(1, memo.group(first.group_id).expr_count());
}

#[test]
fn test_equivalence_propagates_to_parents() {
    let ctx = optimizer_context(OptimizerConfig::default());
    let memo = Memo::new();

    let regions = get(&ctx, "regions");
    let predicate = cmp(
        Eq,
        ident(&column(&regions, "id")),
        constant(ScalarValue::Int64(Some(1))),
    );
    let customers = get(&ctx, "customers");
    let join_with = |input: &Expression| {
        Expression::new(
            LogicalInnerJoin,
            vec![
                Arc::new(input.clone()),
                Arc::new(regions.clone()),
                Arc::new(predicate.clone()),
            ],
        )
    };

    let first = memo.insert(&join_with(&customers));
    let second = memo.insert(&join_with(&get(&ctx, "orders")));
    assert!(!memo.is_same_class(first.group_id, second.group_id));

    let customers_group = memo.group_expr(first).child(0);
    let orders_group = memo.group_expr(second).child(0);
    let origin = memo.group(orders_group).exprs()[0].id();

    // A rule claiming the customers get is an alternative of the orders group.
    let (id, created) =
        memo.insert_into(&customers, orders_group, RuleId::InnerJoinCommutativity, origin);
    assert!(!created);
    assert_eq!(customers_group, id.group_id);
    assert!(memo.is_same_class(customers_group, orders_group));

    // Both joins now read equivalent inputs.
    assert!(memo.is_same_class(first.group_id, second.group_id));
    assert_eq!(
        vec![first.group_id, second.group_id],
        memo.class_members(second.group_id)
    );
}

#[test]
fn test_row_hints_adjust_join_estimate() {
    let join_rows = |config: OptimizerConfig| {
        let ctx = optimizer_context(config);
        let memo = Memo::new();
        let join = memo.insert(&inner_join(get(&ctx, "customers"), get(&ctx, "orders")));
        memo.derive_stats(join, &ctx).unwrap().rows()
    };
    let estimate = join_rows(OptimizerConfig::default());

    let expected = hashmap! {
        "#" => 2.0,
        "+" => estimate + 2.0,
        "-" => estimate - 2.0,
        "*" => estimate * 2.0,
    };
    for (kind, rows) in expected {
        let config = OptimizerConfig::from_yaml(&format!(
            "plan_hint: {{row_hints: [{{aliases: [orders, customers], kind: \"{}\", rows: 2.0}}]}}",
            kind
        ))
        .unwrap();
        assert_eq!(rows, join_rows(config), "row hint {}", kind);
    }
}
