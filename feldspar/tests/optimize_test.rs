use std::fs;
use std::sync::Arc;

use anyhow::Context;
use datafusion_common::ScalarValue;
use datafusion_expr::Operator::Eq;
use feldspar::cascades::{CascadesOptimizer, GroupId};
use feldspar::config::OptimizerConfig;
use feldspar::expr::{cmp, constant, ident, Expression};
use feldspar::operator::{LogicalOperator, LogicalSelect, OperatorId};
use feldspar::optimizer::OptimizerContext;
use feldspar::plan::explain_to_string;
use feldspar::properties::PhysicalPropertySet;

use crate::utils::{
    column, dynamic_get, get, inner_join, on_coordinator, operator_names, optimize,
    optimizer_context,
};

mod utils;

fn load_config(path: &str) -> OptimizerConfig {
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("Failed to open config file: {}", path))
        .unwrap();
    OptimizerConfig::from_yaml(&yaml)
        .with_context(|| format!("Failed to load config from file: {}", path))
        .unwrap()
}

fn select_amount(ctx: &OptimizerContext, table: &str, amount: i32) -> Expression {
    let input = get(ctx, table);
    let predicate = cmp(
        Eq,
        ident(&column(&input, "amount")),
        constant(ScalarValue::Int32(Some(amount))),
    );
    Expression::new(LogicalSelect, vec![Arc::new(input), Arc::new(predicate)])
}

#[test]
fn test_colocated_join_gathered_on_coordinator() {
    let ctx = optimizer_context(OptimizerConfig::default());
    let join = inner_join(get(&ctx, "customers"), get(&ctx, "orders"));
    let plan = optimize(ctx, &join, on_coordinator());

    assert_eq!(
        vec![
            "PhysicalMotionGather",
            "PhysicalInnerHashJoin",
            "PhysicalTableScan",
            "PhysicalTableScan"
        ],
        operator_names(&plan)
    );
    assert_eq!(&on_coordinator(), plan.root().delivered());

    let explained = explain_to_string(&plan).unwrap();
    assert_eq!(4, explained.lines().count());
    assert!(explained.starts_with("PhysicalMotionGather(Coordinator)"));
}

#[test]
fn test_row_hint_overrides_join_estimate() {
    let ctx = optimizer_context(load_config("resources/row_hints.yaml"));
    let join = inner_join(get(&ctx, "orders"), get(&ctx, "customers"));
    let plan = optimize(ctx, &join, on_coordinator());

    assert_eq!(7.0, plan.root().rows());
}

#[test]
fn test_scan_hint_forces_bitmap_scan() {
    let ctx = optimizer_context(load_config("resources/scan_hints.yaml"));
    let select = select_amount(&ctx, "customers", 5);
    let plan = optimize(ctx, &select, PhysicalPropertySet::default());

    assert_eq!(vec!["PhysicalBitmapTableScan"], operator_names(&plan));
    assert_eq!(2, plan.root().scalars().len());
}

#[test]
fn test_row_level_security_disables_bitmap_scans() {
    let ctx = optimizer_context(OptimizerConfig::default());
    let secured = select_amount(&ctx, "payroll", 5);
    let optimizer =
        CascadesOptimizer::with_config_rules(ctx, &secured, PhysicalPropertySet::default());
    optimizer.search().unwrap();

    let memo = optimizer.memo();
    let bitmap_gets = (0..memo.group_count())
        .flat_map(|id| memo.group(GroupId(id)).exprs())
        .filter(|expr| {
            matches!(
                expr.operator().as_logical(),
                Some(LogicalOperator::LogicalBitmapTableGet(_))
            )
        })
        .count();
    assert_eq!(0, bitmap_gets);

    let plan = memo
        .best_plan(optimizer.root_group_id(), &PhysicalPropertySet::default())
        .unwrap();
    assert_eq!(
        vec!["PhysicalFilter", "PhysicalTableScan"],
        operator_names(&plan)
    );
}

#[test]
fn test_foreign_partitions_scanned_per_server() {
    let ctx = optimizer_context(OptimizerConfig::default());
    let events = dynamic_get(&ctx, "events");
    let plan = optimize(ctx, &events, on_coordinator());

    let names = operator_names(&plan);
    let count = |id: OperatorId| names.iter().filter(|n| n.as_str() == id.as_ref()).count();
    assert_eq!(1, count(OperatorId::PhysicalUnionAll));
    assert_eq!(1, count(OperatorId::PhysicalDynamicTableScan));
    assert_eq!(2, count(OperatorId::PhysicalDynamicForeignScan));
    assert_eq!(&on_coordinator(), plan.root().delivered());
}

#[test]
fn test_search_budget() {
    let config = OptimizerConfig::from_yaml("search: {max_tasks: 2}").unwrap();
    let ctx = optimizer_context(config);
    let join = inner_join(get(&ctx, "customers"), get(&ctx, "orders"));

    let err = CascadesOptimizer::with_config_rules(ctx, &join, on_coordinator())
        .find_best_plan()
        .unwrap_err();
    assert_eq!("search stopped after 2 tasks", err.to_string());
}

#[test]
fn test_covering_index_answers_select() {
    let ctx = optimizer_context(OptimizerConfig::default());
    let select = select_amount(&ctx, "accounts", 5);
    let plan = optimize(ctx, &select, PhysicalPropertySet::default());

    assert_eq!(vec!["PhysicalIndexOnlyScan"], operator_names(&plan));
    assert_eq!(1, plan.root().scalars().len());

    let config = OptimizerConfig::from_yaml(
        "plan_hint: {scan_hints: [{alias: accounts, kinds: [NoIndexOnlyScan]}]}",
    )
    .unwrap();
    let ctx = optimizer_context(config);
    let select = select_amount(&ctx, "accounts", 5);
    let plan = optimize(ctx, &select, PhysicalPropertySet::default());
    assert_eq!(
        vec!["PhysicalFilter", "PhysicalTableScan"],
        operator_names(&plan)
    );
}

#[test]
fn test_join_type_hint_replaces_hash_join() {
    let ctx = optimizer_context(load_config("resources/join_hints.yaml"));
    let join = inner_join(get(&ctx, "customers"), get(&ctx, "orders"));
    let plan = optimize(ctx, &join, on_coordinator());

    let names = operator_names(&plan);
    let count = |id: OperatorId| names.iter().filter(|n| n.as_str() == id.as_ref()).count();
    assert_eq!(1, count(OperatorId::PhysicalInnerNLJoin));
    assert_eq!(0, count(OperatorId::PhysicalInnerHashJoin));
    assert_eq!(&on_coordinator(), plan.root().delivered());
}
