use std::mem::swap;
use std::sync::Arc;

use anyhow::bail;
use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use log::{debug, info, warn};

use crate::cascades::binding::Binding;
use crate::cascades::task::OptimizeGroupPhase::{Enforce, Start};
use crate::cascades::task::OptimizeInputsTaskState::{
    AfterOptimizeInput, BeforeOptimizeInput, Init, Invalid, OptimizeSelf,
};
use crate::cascades::task::TaskControl::{Done, Yield};
use crate::cascades::{CascadesOptimizer, ExprHandle, GroupExprId, GroupId, Winner};
use crate::cost::{Cost, CostContext};
use crate::error::{OptError, OptResult};
use crate::operator::{
    enforcer_for, DerivePropContext, DerivePropResult, Operator, PhysicalOperator,
    PhysicalOperatorTrait,
};
use crate::properties::{PhysicalProp, PhysicalPropertySet};
use crate::rules::{Rule, RuleCategory, RuleContext, RuleImpl, RulePromise, RuleResult};

#[enum_dispatch]
pub(super) enum TaskImpl {
    ApplyRuleTask,
    OptimizeExpressionTask,
    OptimizeInputsTask,
    ExploreGroupTask,
    OptimizeGroupTask,
}

enum TaskControl {
    /// Run `dependencies` first, then `this` again.
    Yield {
        this: TaskImpl,
        dependencies: Vec<TaskImpl>,
    },
    Done {
        dependencies: Vec<TaskImpl>,
    },
}

impl TaskControl {
    fn done() -> Self {
        Done {
            dependencies: vec![],
        }
    }

    fn done_with_deps(deps: Vec<TaskImpl>) -> Self {
        Done { dependencies: deps }
    }

    fn resume(this: TaskImpl) -> Self {
        Yield {
            this,
            dependencies: vec![],
        }
    }
}

#[enum_dispatch(TaskImpl)]
trait Task {
    fn execute(self, ctx: &CascadesOptimizer) -> OptResult<TaskControl>;
}

/// Runs `root` and every task it spawns, last pushed first.
///
/// Fails with [`OptError::SearchBudgetExceeded`] once more than `search.max_tasks` tasks ran.
pub(super) fn schedule(ctx: &CascadesOptimizer, root: TaskImpl) -> OptResult<()> {
    let max_tasks = ctx.context.config().search.max_tasks;
    let mut tasks = vec![root];
    let mut executed = 0usize;

    while let Some(cur_task) = tasks.pop() {
        if executed >= max_tasks {
            warn!(
                "Search stopped after {} tasks, {} tasks left",
                executed,
                tasks.len() + 1
            );
            return Err(OptError::SearchBudgetExceeded(max_tasks).into());
        }
        executed += 1;

        match cur_task.execute(ctx)? {
            Yield {
                this,
                mut dependencies,
            } => {
                tasks.push(this);
                tasks.append(&mut dependencies);
            }
            Done { mut dependencies } => {
                tasks.append(&mut dependencies);
            }
        }
    }

    debug!("Search finished after {} tasks", executed);
    Ok(())
}

/// Applies one rule to every binding of its pattern rooted at a logical group expression.
pub(super) struct ApplyRuleTask {
    rule: RuleImpl,
    group_expr_id: GroupExprId,
    required_prop: PhysicalPropertySet,
    exploring: bool,
}

impl Task for ApplyRuleTask {
    fn execute(self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        let memo = &ctx.memo;
        let group_expr = memo.group_expr(self.group_expr_id);
        if group_expr.is_rule_applied(self.rule.rule_id()) {
            return Ok(TaskControl::done());
        }

        info!(
            "Beginning to apply rule {:?} to group expression {:?}",
            self.rule, self.group_expr_id
        );

        let bindings = Binding::new(memo).bind(&group_expr, self.rule.pattern());
        let rule_ctx = RuleContext::new(memo, &ctx.context);
        let mut other_tasks = Vec::new();

        for binding in bindings {
            let mut result = RuleResult::new();
            self.rule.apply(&rule_ctx, &binding, &mut result)?;
            for result_expr in result.results() {
                let (new_expr_id, inserted) = memo.insert_into(
                    &result_expr,
                    self.group_expr_id.group_id,
                    self.rule.rule_id(),
                    self.group_expr_id,
                );
                info!(
                    "Result of applying rule {:?} to group expression {:?}: {:?} as {:?}",
                    self.rule, self.group_expr_id, result_expr, new_expr_id
                );
                if !inserted {
                    continue;
                }

                if memo.group_expr(new_expr_id).is_logical() {
                    other_tasks.push(
                        OptimizeExpressionTask {
                            group_expr_id: new_expr_id,
                            required_prop: self.required_prop.clone(),
                            exploring: self.exploring,
                        }
                        .into(),
                    );
                } else if !self.exploring {
                    other_tasks.push(
                        OptimizeInputsTask::new(new_expr_id, self.required_prop.clone()).into(),
                    );
                }
            }
        }

        group_expr.set_rule_applied(self.rule.rule_id());
        Ok(TaskControl::done_with_deps(other_tasks))
    }
}

/// Applies rules to a logical group expression, after exploring its relational inputs.
///
/// If `exploring` is true, only exploration rules are applied. Otherwise both exploration and
/// implementation rules are.
pub(super) struct OptimizeExpressionTask {
    group_expr_id: GroupExprId,
    required_prop: PhysicalPropertySet,
    exploring: bool,
}

impl OptimizeExpressionTask {
    fn accepts(&self, ctx: &CascadesOptimizer, rule: &RuleImpl) -> bool {
        match rule.category() {
            RuleCategory::Exploration => ctx.context.config().search.enable_exploration,
            RuleCategory::Implementation => !self.exploring,
        }
    }
}

impl Task for OptimizeExpressionTask {
    fn execute(self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        let memo = &ctx.memo;
        let group_expr = memo.group_expr(self.group_expr_id);
        let handle = ExprHandle::new(memo, &group_expr);

        // Pushed in ascending promise, so the most promising rule runs first.
        let apply_rule_tasks = ctx
            .rules
            .iter()
            .filter(|rule| self.accepts(ctx, rule))
            .filter(|rule| !group_expr.is_rule_applied(rule.rule_id()))
            .filter(|rule| {
                group_expr
                    .origin_rule()
                    .map(|origin| rule.is_compatible(origin))
                    .unwrap_or(true)
            })
            .map(|rule| (rule.promise(&handle), rule))
            .filter(|(promise, _)| *promise != RulePromise::None)
            .sorted_by_key(|(promise, _)| *promise)
            .map(|(_, rule)| {
                ApplyRuleTask {
                    rule: rule.clone(),
                    group_expr_id: self.group_expr_id,
                    required_prop: self.required_prop.clone(),
                    exploring: self.exploring,
                }
                .into()
            })
            .collect::<Vec<TaskImpl>>();

        let explore_input_group_tasks = handle
            .relational_children()
            .map(|idx| {
                ExploreGroupTask {
                    group_id: handle.child_group(idx),
                    required_prop: self.required_prop.clone(),
                }
                .into()
            })
            .collect::<Vec<TaskImpl>>();

        let mut tasks = Vec::<TaskImpl>::with_capacity(
            explore_input_group_tasks.len() + apply_rule_tasks.len(),
        );
        tasks.extend(apply_rule_tasks);
        // Inputs are explored before any rule binds them.
        tasks.extend(explore_input_group_tasks);

        Ok(TaskControl::done_with_deps(tasks))
    }
}

/// Optimizes the inputs of a physical group expression for one required property set, and
/// records it as winner of its group if it is the cheapest plan found.
///
/// Each [`DerivePropResult`] of the operator is an alternative: the inputs are optimized one by
/// one for the properties it requires, and the alternative is abandoned as soon as an input has
/// no plan or the accumulated cost reaches the current winner's.
#[derive(Debug)]
pub(super) struct OptimizeInputsTask {
    group_expr_id: GroupExprId,
    required_prop: PhysicalPropertySet,
    state: OptimizeInputsTaskState,
}

/// Fixed for the whole task once initialized.
#[derive(Debug)]
struct InputsSearch {
    derive_results: Vec<DerivePropResult>,
    /// Relational children, in order.
    inputs: Vec<GroupId>,
    operator_cost: Cost,
}

#[derive(Debug)]
struct AlternativeProgress {
    derive_idx: usize,
    input_idx: usize,
    accumulated_cost: Cost,
    /// Delivered properties of the inputs optimized so far.
    input_delivered: Vec<PhysicalPropertySet>,
}

impl AlternativeProgress {
    fn first(derive_idx: usize, search: &InputsSearch) -> Self {
        Self {
            derive_idx,
            input_idx: 0,
            accumulated_cost: search.operator_cost,
            input_delivered: Vec::with_capacity(search.inputs.len()),
        }
    }
}

#[derive(Debug)]
enum OptimizeInputsTaskState {
    Init,
    BeforeOptimizeInput(InputsSearch, AlternativeProgress),
    AfterOptimizeInput(InputsSearch, AlternativeProgress),
    OptimizeSelf(InputsSearch, AlternativeProgress),
    Invalid,
}

impl OptimizeInputsTask {
    pub(super) fn new(group_expr_id: GroupExprId, required_prop: PhysicalPropertySet) -> Self {
        Self {
            group_expr_id,
            required_prop,
            state: Init,
        }
    }

    fn operator(&self, ctx: &CascadesOptimizer) -> PhysicalOperator {
        let group_expr = ctx.memo.group_expr(self.group_expr_id);
        group_expr
            .operator()
            .as_physical()
            .cloned()
            .unwrap_or_else(|| panic!("{:?} is not a physical expression", group_expr))
    }

    fn group_id(&self) -> GroupId {
        self.group_expr_id.group_id
    }

    /// Cost of the current winner, the bound every alternative is pruned against.
    fn upper_bound(&self, ctx: &CascadesOptimizer) -> Option<Cost> {
        ctx.memo
            .winner(self.group_id(), &self.required_prop)
            .map(|winner| winner.cost)
    }

    fn is_pruned(&self, ctx: &CascadesOptimizer, progress: &AlternativeProgress) -> bool {
        self.upper_bound(ctx)
            .map(|bound| progress.accumulated_cost >= bound)
            .unwrap_or(false)
    }

    fn operator_cost(
        &self,
        ctx: &CascadesOptimizer,
        operator: &PhysicalOperator,
    ) -> OptResult<Cost> {
        let group_expr = ctx.memo.group_expr(self.group_expr_id);
        let handle = ExprHandle::new(&ctx.memo, &group_expr);
        let rows = ctx.memo.group_stats(self.group_id(), &ctx.context)?.rows();
        let child_rows = handle
            .relational_children()
            .map(|idx| {
                ctx.memo
                    .group_stats(handle.child_group(idx), &ctx.context)
                    .map(|stats| stats.rows())
            })
            .collect::<OptResult<Vec<_>>>()?;

        Ok(ctx.context.cost_model().cost(&CostContext {
            operator,
            rows,
            child_rows: &child_rows,
        }))
    }

    fn take_state(&mut self) -> OptimizeInputsTaskState {
        let mut state = Invalid;
        swap(&mut state, &mut self.state);
        state
    }

    /// Moves to the next alternative, or finishes.
    fn next_alternative(mut self, search: InputsSearch, derive_idx: usize) -> TaskControl {
        if derive_idx + 1 < search.derive_results.len() {
            let progress = AlternativeProgress::first(derive_idx + 1, &search);
            self.state = BeforeOptimizeInput(search, progress);
            TaskControl::resume(self.into())
        } else {
            TaskControl::done()
        }
    }

    fn do_init(mut self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        debug!("Current state {:?} for OptimizeInputsTask", &self);
        let operator = self.operator(ctx);
        let derive_results = operator.derive_properties(DerivePropContext {
            required_prop: &self.required_prop,
        })?;
        if derive_results.is_empty() {
            return Ok(TaskControl::done());
        }

        let group_expr = ctx.memo.group_expr(self.group_expr_id);
        let inputs = ExprHandle::new(&ctx.memo, &group_expr)
            .relational_children()
            .map(|idx| group_expr.child(idx))
            .collect::<Vec<_>>();
        let search = InputsSearch {
            derive_results,
            inputs,
            operator_cost: self.operator_cost(ctx, &operator)?,
        };

        let progress = AlternativeProgress::first(0, &search);
        self.state = BeforeOptimizeInput(search, progress);
        Ok(TaskControl::resume(self.into()))
    }

    fn do_before_optimize_input(mut self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        debug!("Current state {:?} for OptimizeInputsTask", &self);
        match self.take_state() {
            BeforeOptimizeInput(search, progress) => {
                if self.is_pruned(ctx, &progress) {
                    let derive_idx = progress.derive_idx;
                    return Ok(self.next_alternative(search, derive_idx));
                }
                if progress.input_idx == search.inputs.len() {
                    self.state = OptimizeSelf(search, progress);
                    return Ok(TaskControl::resume(self.into()));
                }

                let input_group_id = search.inputs[progress.input_idx];
                let input_required_prop = search.derive_results[progress.derive_idx]
                    .input_required_props[progress.input_idx]
                    .clone();
                self.state = AfterOptimizeInput(search, progress);

                if ctx.memo.winner(input_group_id, &input_required_prop).is_some() {
                    return Ok(TaskControl::resume(self.into()));
                }
                let task = OptimizeGroupTask::new(input_group_id, input_required_prop).into();
                Ok(Yield {
                    this: self.into(),
                    dependencies: vec![task],
                })
            }
            _ => bail!("Should not happen!"),
        }
    }

    fn do_after_optimize_input(mut self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        debug!("Current state {:?} for OptimizeInputsTask", &self);
        match self.take_state() {
            AfterOptimizeInput(search, mut progress) => {
                let input_group_id = search.inputs[progress.input_idx];
                let derived = &search.derive_results[progress.derive_idx];
                let input_required_prop = &derived.input_required_props[progress.input_idx];

                match ctx.memo.winner(input_group_id, input_required_prop) {
                    Some(winner) => {
                        progress.accumulated_cost += winner.cost;
                        progress.input_delivered.push(winner.delivered);
                        progress.input_idx += 1;
                        self.state = BeforeOptimizeInput(search, progress);
                        Ok(TaskControl::resume(self.into()))
                    }
                    None => {
                        // No plan for this input, so none for the alternative.
                        let derive_idx = progress.derive_idx;
                        Ok(self.next_alternative(search, derive_idx))
                    }
                }
            }
            _ => bail!("Should not compute to this state"),
        }
    }

    fn do_optimize_self(mut self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        debug!("Current state {:?} for OptimizeInputsTask", &self);
        match self.take_state() {
            OptimizeSelf(search, progress) => {
                let delivered = self.operator(ctx).derive_delivered(&progress.input_delivered);
                if delivered.satisfies(&self.required_prop) {
                    let winner = Winner {
                        expr: self.group_expr_id,
                        cost: progress.accumulated_cost,
                        delivered,
                        input_required_props: search.derive_results[progress.derive_idx]
                            .input_required_props
                            .clone(),
                    };
                    if ctx.memo.update_winner(self.group_id(), &self.required_prop, winner) {
                        info!(
                            "New winner {:?} with cost {} for group {:?} and {:?}",
                            self.group_expr_id,
                            progress.accumulated_cost,
                            self.group_id(),
                            self.required_prop
                        );
                    }
                }
                let derive_idx = progress.derive_idx;
                Ok(self.next_alternative(search, derive_idx))
            }
            _ => bail!("Should not compute to this state"),
        }
    }
}

impl Task for OptimizeInputsTask {
    fn execute(self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        match self.state {
            Init => self.do_init(ctx),
            BeforeOptimizeInput(..) => self.do_before_optimize_input(ctx),
            AfterOptimizeInput(..) => self.do_after_optimize_input(ctx),
            OptimizeSelf(..) => self.do_optimize_self(ctx),
            Invalid => bail!("Should not happen!"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptimizeGroupPhase {
    /// Optimizes the expressions of the group.
    Start,
    /// Tries an enforcer on top of the group, after its own expressions were optimized.
    Enforce,
}

/// Optimizes a group for [`PhysicalPropertySet`].
pub(super) struct OptimizeGroupTask {
    group_id: GroupId,
    required_prop: PhysicalPropertySet,
    phase: OptimizeGroupPhase,
}

impl OptimizeGroupTask {
    pub(super) fn new(group_id: GroupId, required_prop: PhysicalPropertySet) -> Self {
        Self {
            group_id,
            required_prop,
            phase: Start,
        }
    }

    fn start(mut self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        info!(
            "Beginning to optimize group {:?} for physical property: {:?}",
            self.group_id, self.required_prop
        );

        if let Some(winner) = ctx.memo.winner(self.group_id, &self.required_prop) {
            info!(
                "Winner for physical property {:?} in group {:?} found: {:?}, just return",
                self.required_prop, self.group_id, winner
            );
            return Ok(TaskControl::done());
        }
        if !ctx.memo.start_optimizing(self.group_id, &self.required_prop) {
            // Already optimized without result, or being optimized further up the stack.
            return Ok(TaskControl::done());
        }

        let exprs = ctx.memo.class_exprs(self.group_id);
        let mut tasks = Vec::<TaskImpl>::with_capacity(exprs.len());
        for group_expr in exprs.iter().filter(|e| e.is_logical()) {
            tasks.push(
                OptimizeExpressionTask {
                    group_expr_id: group_expr.id(),
                    required_prop: self.required_prop.clone(),
                    exploring: false,
                }
                .into(),
            );
        }

        // Physical expressions are pushed last and so run first, giving an upper bound early.
        for group_expr in exprs.iter().filter(|e| e.is_physical() && !e.is_enforcer()) {
            tasks.push(OptimizeInputsTask::new(group_expr.id(), self.required_prop.clone()).into());
        }

        self.phase = Enforce;
        Ok(Yield {
            this: self.into(),
            dependencies: tasks,
        })
    }

    fn enforce(self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        let enforcer = match enforcer_for(&self.required_prop) {
            Some(enforcer) => enforcer,
            None => return Ok(TaskControl::done()),
        };

        info!(
            "Enforcing {:?} for group {:?} with {:?}",
            self.required_prop, self.group_id, enforcer
        );
        let (group_expr_id, _) = ctx
            .memo
            .insert_enforcer(Arc::new(Operator::Physical(enforcer)), self.group_id);
        Ok(TaskControl::done_with_deps(vec![OptimizeInputsTask::new(
            group_expr_id,
            self.required_prop,
        )
        .into()]))
    }
}

impl Task for OptimizeGroupTask {
    fn execute(self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        match self.phase {
            Start => self.start(ctx),
            Enforce => self.enforce(ctx),
        }
    }
}

/// Explores a group by applying exploration rules to its logical expressions.
pub(super) struct ExploreGroupTask {
    group_id: GroupId,
    required_prop: PhysicalPropertySet,
}

impl Task for ExploreGroupTask {
    fn execute(self, ctx: &CascadesOptimizer) -> OptResult<TaskControl> {
        let canonical = ctx.memo.canonical_group_id(self.group_id);
        if ctx.memo.group(canonical).set_explored() {
            return Ok(TaskControl::done());
        }

        let tasks = ctx
            .memo
            .class_exprs(self.group_id)
            .into_iter()
            .filter(|group_expr| group_expr.is_logical())
            .map(|group_expr| {
                OptimizeExpressionTask {
                    group_expr_id: group_expr.id(),
                    required_prop: self.required_prop.clone(),
                    exploring: true,
                }
                .into()
            })
            .collect();

        Ok(TaskControl::done_with_deps(tasks))
    }
}
