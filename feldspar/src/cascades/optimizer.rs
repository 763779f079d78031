use log::debug;

use crate::cascades::memo::Memo;
use crate::cascades::task::{schedule, OptimizeGroupTask};
use crate::cascades::GroupId;
use crate::error::OptResult;
use crate::expr::Expression;
use crate::optimizer::OptimizerContext;
use crate::plan::Plan;
use crate::properties::PhysicalPropertySet;
use crate::rules::RuleSet;

/// Finds the cheapest plan of one query.
pub struct CascadesOptimizer {
    pub(super) required_prop: PhysicalPropertySet,
    pub(super) rules: RuleSet,
    pub(super) memo: Memo,
    pub(super) context: OptimizerContext,
    root: GroupId,
}

impl CascadesOptimizer {
    /// Inserts `expr` into a new memo. The plan found delivers `required_prop`.
    pub fn new(
        context: OptimizerContext,
        rules: RuleSet,
        expr: &Expression,
        required_prop: PhysicalPropertySet,
    ) -> Self {
        let memo = Memo::new();
        let root = memo.insert(expr).group_id;
        Self {
            required_prop,
            rules,
            memo,
            context,
            root,
        }
    }

    /// Uses every rule the config of `context` does not disable.
    pub fn with_config_rules(
        context: OptimizerContext,
        expr: &Expression,
        required_prop: PhysicalPropertySet,
    ) -> Self {
        let rules = RuleSet::for_config(context.config());
        Self::new(context, rules, expr, required_prop)
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub fn context(&self) -> &OptimizerContext {
        &self.context
    }

    pub fn root_group_id(&self) -> GroupId {
        self.root
    }

    /// Runs the search and extracts the winner of the root group.
    ///
    /// Fails with [`OptError::NoPlanFound`] when no plan delivers the required properties, and
    /// with [`OptError::SearchBudgetExceeded`] when the search runs out of tasks.
    ///
    /// [`OptError::NoPlanFound`]: crate::error::OptError::NoPlanFound
    /// [`OptError::SearchBudgetExceeded`]: crate::error::OptError::SearchBudgetExceeded
    pub fn find_best_plan(self) -> OptResult<Plan> {
        self.search()?;
        self.memo.best_plan(self.root, &self.required_prop)
    }

    /// Runs the search, keeping the optimizer for inspection.
    pub fn search(&self) -> OptResult<()> {
        let root_task = OptimizeGroupTask::new(self.root, self.required_prop.clone()).into();
        schedule(self, root_task)?;

        debug!("Memo after optimization: {:?}", self.memo);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OptError;
    use crate::config::OptimizerConfig;
    use crate::hints::{JoinTypeHint, JoinTypeHintKind, PlanHint, ScanHint, ScanHintKind};
    use crate::operator::PhysicalOperator;
    use crate::properties::{DistributionSpec, SingletonKind};
    use crate::rules::{
        Get2TableScanRule, InnerJoin2HashJoinRule, InnerJoinCommutativityRule, RuleSet,
    };
    use crate::test_utils::{inner_join, optimizer_context, optimizer_context_with_config, scan};

    fn on_coordinator() -> PhysicalPropertySet {
        PhysicalPropertySet::with_dist(DistributionSpec::Singleton(SingletonKind::Coordinator))
    }

    #[test]
    fn test_optimize_join() {
        let ctx = optimizer_context();
        let join = inner_join(scan(&ctx, "t1"), scan(&ctx, "t2"));
        let optimizer = CascadesOptimizer::new(
            ctx,
            RuleSet::new(vec![
                InnerJoinCommutativityRule::new().into(),
                InnerJoin2HashJoinRule::new().into(),
                Get2TableScanRule::new().into(),
            ]),
            &join,
            on_coordinator(),
        );

        let plan = optimizer.find_best_plan().unwrap();
        let root = plan.root();
        assert!(matches!(
            root.operator(),
            PhysicalOperator::PhysicalMotionGather(_)
        ));
        assert_eq!(&on_coordinator(), root.delivered());

        let join = &root.inputs()[0];
        assert!(matches!(
            join.operator(),
            PhysicalOperator::PhysicalInnerHashJoin(_)
        ));
        // Both tables are hashed on the join key, so no motion is needed below the join.
        for input in join.inputs() {
            assert!(matches!(
                input.operator(),
                PhysicalOperator::PhysicalTableScan(_)
            ));
        }
        assert!(plan.cost() >= join.cost());
    }

    #[test]
    fn test_no_plan_without_implementation_rules() {
        let ctx = optimizer_context();
        let join = inner_join(scan(&ctx, "t1"), scan(&ctx, "t2"));
        let optimizer = CascadesOptimizer::new(
            ctx,
            RuleSet::new(vec![InnerJoinCommutativityRule::new().into()]),
            &join,
            PhysicalPropertySet::default(),
        );

        let err = optimizer.find_best_plan().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OptError>(),
            Some(OptError::NoPlanFound(_))
        ));
    }

    #[test]
    fn test_scan_hint_excluding_every_path() {
        let mut plan_hint = PlanHint::new();
        plan_hint.add_scan_hint(ScanHint::new("t3", vec![ScanHintKind::NoSeqScan]));
        let ctx =
            optimizer_context_with_config(OptimizerConfig::default().with_plan_hint(plan_hint));
        let get = scan(&ctx, "t3");

        let optimizer =
            CascadesOptimizer::with_config_rules(ctx, &get, PhysicalPropertySet::default());
        assert!(optimizer.find_best_plan().is_err());
    }

    #[test]
    fn test_join_type_hint_forces_nested_loop() {
        let mut plan_hint = PlanHint::new();
        plan_hint.add_join_type_hint(JoinTypeHint::new(
            vec!["t1", "t2"],
            JoinTypeHintKind::NestLoop,
        ));
        let ctx =
            optimizer_context_with_config(OptimizerConfig::default().with_plan_hint(plan_hint));
        let join = inner_join(scan(&ctx, "t1"), scan(&ctx, "t2"));

        let optimizer = CascadesOptimizer::with_config_rules(ctx, &join, on_coordinator());
        let plan = optimizer.find_best_plan().unwrap();
        assert!(plan
            .bfs_iterator()
            .any(|node| matches!(node.operator(), PhysicalOperator::PhysicalInnerNLJoin(_))));
        assert!(!plan
            .bfs_iterator()
            .any(|node| matches!(node.operator(), PhysicalOperator::PhysicalInnerHashJoin(_))));
    }
}
