//! Cascades-style task-queue-driven optimizer (§4.8) built on the
//! [`cascades`] search-space entities: rule management, the cost-aware
//! group/expression/input search, and plan extraction from the winner
//! circle.

mod rule;
mod task;

pub use rule::{default_rules, Rule};
pub use task::Task;

use tracing::debug;

use common::{Config, DbError, DbResult};

use cascades::{
    Cost, CostConstants, Expression, GroupId, MultiExprId, Operator, PhysicalProperties,
    SearchContext, SearchSpace, Winner,
};

/// Safety backstop against a rule set that never reaches a fixed point;
/// no plan this kernel builds should come close to this many task
/// executions.
const MAX_TASKS: usize = 1_000_000;

pub struct Optimizer {
    rules: Vec<Box<dyn Rule>>,
    costs: CostConstants,
    /// Global epsilon pruning bound (§4.8): a plan costing at or below
    /// this value is accepted as its search context's winner immediately,
    /// short-circuiting the remaining rules/expressions for that context.
    /// Divided among children on descent via `SearchContext::child_epsilon`.
    /// `None` disables the mechanism.
    epsilon: Option<Cost>,
}

impl Optimizer {
    pub fn new() -> Self {
        Self { rules: default_rules(), costs: CostConstants::default(), epsilon: None }
    }

    pub fn with_costs(costs: CostConstants) -> Self {
        Self { rules: default_rules(), costs, epsilon: None }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            rules: default_rules(),
            costs: CostConstants::default(),
            epsilon: config.optimizer_epsilon.map(|v| Cost::new(v, 0.0)),
        }
    }

    /// Searches `space` for the cheapest physical plan rooted at `root`
    /// satisfying `required`, costed no higher than `upper_bound`.
    /// Returns `None` if no plan can satisfy `required` within budget.
    /// `trace` (if given) receives one entry per task executed, in
    /// execution order — useful for asserting the search is
    /// deterministic across reruns of the same input.
    pub fn optimize(
        &self,
        space: &mut SearchSpace,
        root: GroupId,
        required: PhysicalProperties,
        upper_bound: Cost,
        trace: Option<&mut Vec<Task>>,
    ) -> DbResult<Option<Expression>> {
        let mut steps = 0usize;
        let mut local_trace = Vec::new();
        let sink = trace.unwrap_or(&mut local_trace);
        let mut ctx = SearchContext::new(required.clone(), upper_bound);
        if let Some(epsilon) = self.epsilon {
            ctx = ctx.with_epsilon(epsilon);
        }
        self.optimize_group(space, root, &ctx, sink, &mut steps)?;
        debug!(tasks = steps, "search converged");
        self.extract_plan(space, root, &required)
    }

    fn bump(steps: &mut usize) -> DbResult<()> {
        *steps += 1;
        if *steps > MAX_TASKS {
            return Err(DbError::Invariant("optimizer exceeded its task budget".into()));
        }
        Ok(())
    }

    /// `OptimizeGroup`: establish a winner for `group` under `ctx.required`.
    fn optimize_group(
        &self,
        space: &mut SearchSpace,
        group: GroupId,
        ctx: &SearchContext,
        trace: &mut Vec<Task>,
        steps: &mut usize,
    ) -> DbResult<()> {
        Self::bump(steps)?;
        trace.push(Task::OptimizeGroup { group, required: ctx.required.clone() });
        if space.group(group).winners.get(&ctx.required).map(|w| w.ready).unwrap_or(false) {
            return Ok(());
        }
        space
            .group_mut(group)
            .winners
            .entry(ctx.required.clone())
            .or_insert_with(|| Winner::in_progress(ctx.upper_bound));

        // An ordered requirement is always satisfiable by optimizing the
        // unordered plan first and wrapping it in a sort enforcer; other
        // multi-expressions below may also satisfy it directly (a
        // SortMergeJoin input, for instance), so both paths are tried and
        // the cheaper one wins.
        if !ctx.required.is_any() {
            let mut any_ctx = SearchContext::any(ctx.upper_bound);
            if let Some(epsilon) = ctx.epsilon {
                any_ctx = any_ctx.with_epsilon(epsilon);
            }
            self.optimize_group(space, group, &any_ctx, trace, steps)?;
            self.insert_sort_enforcer(space, group, ctx, trace, steps)?;
        }

        // Epsilon pruning (§4.8): once a plan at or below `ctx.epsilon`
        // has been accepted as this context's winner, `ctx.finished` is
        // set and every remaining alternative for this same group/
        // required-properties pair is skipped rather than costed.
        let mut i = 0;
        while i < space.group(group).logical_exprs.len() && !ctx.is_finished() {
            let expr = space.group(group).logical_exprs[i];
            self.optimize_expression(space, expr, ctx, trace, steps)?;
            i += 1;
        }
        let physical: Vec<MultiExprId> = space.group(group).physical_exprs.clone();
        for expr in physical {
            if ctx.is_finished() {
                break;
            }
            self.optimize_inputs(space, expr, ctx, trace, steps)?;
        }

        let winner = space
            .group_mut(group)
            .winners
            .get_mut(&ctx.required)
            .ok_or_else(|| DbError::Invariant("winner slot vanished mid-search".into()))?;
        winner.ready = true;
        if ctx.required.is_any() {
            space.group_mut(group).explored = true;
            space.group_mut(group).optimized = true;
        }
        Ok(())
    }

    /// `OptimizeExpression`: fire every rule not yet fired on `expr`,
    /// descending into newly produced logical alternatives and costing
    /// newly produced physical ones.
    fn optimize_expression(
        &self,
        space: &mut SearchSpace,
        expr: MultiExprId,
        ctx: &SearchContext,
        trace: &mut Vec<Task>,
        steps: &mut usize,
    ) -> DbResult<()> {
        Self::bump(steps)?;
        trace.push(Task::OptimizeExpression { expr });
        if ctx.is_finished() {
            return Ok(());
        }
        for ordinal in 0..self.rules.len() {
            if ctx.is_finished() {
                break;
            }
            if space.multi_expr(expr).has_fired(ordinal) {
                continue;
            }
            let operator = space.multi_expr(expr).operator.clone();
            let children = space.multi_expr(expr).children.clone();
            let group = space.multi_expr(expr).group;
            let rule = &self.rules[ordinal];
            if !rule.matches_root(&operator) {
                space.multi_expr_mut(expr).mark_fired(ordinal);
                continue;
            }
            let produced = rule.apply(&operator, &children);
            space.multi_expr_mut(expr).mark_fired(ordinal);
            let Some((new_operator, new_children)) = produced else {
                continue;
            };
            let is_logical = new_operator.is_logical();
            let (new_id, created) = space.insert_multi_expression(group, new_operator, new_children)?;
            if !created {
                continue;
            }
            if is_logical {
                self.optimize_expression(space, new_id, ctx, trace, steps)?;
            } else {
                self.optimize_inputs(space, new_id, ctx, trace, steps)?;
            }
        }
        Ok(())
    }

    /// `OptimizeInputs`: cost a physical multi-expression by optimizing
    /// each child in turn under the property it must deliver, then
    /// comparing the summed cost against the current winner.
    fn optimize_inputs(
        &self,
        space: &mut SearchSpace,
        expr: MultiExprId,
        ctx: &SearchContext,
        trace: &mut Vec<Task>,
        steps: &mut usize,
    ) -> DbResult<()> {
        Self::bump(steps)?;
        trace.push(Task::OptimizeInputs { expr, required: ctx.required.clone() });
        if ctx.is_finished() {
            return Ok(());
        }
        let operator = space.multi_expr(expr).operator.clone();
        let children = space.multi_expr(expr).children.clone();
        let group = space.multi_expr(expr).group;

        // An expression can only win a context if what it actually
        // delivers satisfies what the context requires; everything except
        // `Sort`/`SortEnforcer`/`SortMergeJoin` delivers `Any`, so an
        // ordered context can only be won by those (or by the enforcer
        // `insert_sort_enforcer` synthesizes over the `Any` winner).
        if !ctx.required.satisfied_by(&operator.delivers()) {
            return Ok(());
        }

        // Logical properties are pure functions of cardinalities already
        // cached when the group was ingested, so the local cost of this
        // implementation can be known before any child is actually costed.
        let mut child_props = Vec::with_capacity(children.len());
        for &child in &children {
            child_props.push(space.logical_properties(child)?);
        }
        let props = space.logical_properties(group)?;
        let refs: Vec<&_> = child_props.iter().collect();
        let local_cost = operator.derive_local_cost(&props, &refs, &self.costs)?;

        // Epsilon pruning divides the context's budget among the
        // expression's children (§4.8) rather than gating on local cost
        // alone; each child search may then accept a plan at or below its
        // slice immediately instead of exhausting every alternative.
        let child_epsilon = ctx.child_epsilon(children.len());

        let mut input_cost = Cost::ZERO;
        for (index, &child) in children.iter().enumerate() {
            let Some(child_required) = operator.satisfy_required_properties(&ctx.required, index)?
            else {
                return Ok(()); // this implementation cannot deliver the required order
            };
            let mut child_ctx = SearchContext::new(child_required.clone(), ctx.upper_bound);
            if let Some(epsilon) = child_epsilon {
                child_ctx = child_ctx.with_epsilon(epsilon);
            }
            self.optimize_group(space, child, &child_ctx, trace, steps)?;
            let child_winner = space
                .group(child)
                .winners
                .get(&child_required)
                .ok_or_else(|| DbError::Invariant("child group has no winner after optimization".into()))?;
            if child_winner.is_unsatisfiable() {
                return Ok(());
            }
            input_cost = input_cost + child_winner.cost;
        }

        let total = local_cost + input_cost;
        let winner = space
            .group_mut(group)
            .winners
            .entry(ctx.required.clone())
            .or_insert_with(|| Winner::in_progress(ctx.upper_bound));
        // `winner.cost` starts at `ctx.upper_bound` (see `Winner::in_progress`),
        // so a candidate only ever becomes the winner when it beats both the
        // best plan found so far and the caller's cost budget.
        if total < winner.cost {
            winner.plan = Some(expr);
            winner.cost = total;
        }
        if let Some(epsilon) = ctx.epsilon {
            if total <= epsilon {
                debug!(expr = expr.0, operator = operator.name(), "epsilon pruning: accepting winner immediately");
                ctx.mark_finished();
            }
        }
        Ok(())
    }

    /// Synthesizes `SortEnforcer(keys)` over `group`'s own unordered
    /// winner and costs it under `ctx`. The enforcer's one child is
    /// `group` itself; this terminates because the recursive
    /// `OptimizeGroup{group, Any}` call it triggers finds the `Any`
    /// winner already `ready` (it was optimized just before this call)
    /// and returns immediately rather than synthesizing another enforcer.
    fn insert_sort_enforcer(
        &self,
        space: &mut SearchSpace,
        group: GroupId,
        ctx: &SearchContext,
        trace: &mut Vec<Task>,
        steps: &mut usize,
    ) -> DbResult<()> {
        let keys = match &ctx.required.order {
            cascades::Order::Sorted(keys) => keys.clone(),
            cascades::Order::Any => return Ok(()),
        };
        let operator = Operator::SortEnforcer { keys };
        let (expr, _created) = space.insert_multi_expression(group, operator, vec![group])?;
        self.optimize_inputs(space, expr, ctx, trace, steps)
    }

    /// Walks the winner circle from `root` under `required`, rebuilding
    /// the physical plan tree the search settled on.
    fn extract_plan(
        &self,
        space: &SearchSpace,
        root: GroupId,
        required: &PhysicalProperties,
    ) -> DbResult<Option<Expression>> {
        let winner = match space.group(root).winners.get(required) {
            Some(w) if w.plan.is_some() => w,
            _ => return Ok(None),
        };
        let expr_id = winner.plan.unwrap();
        let multi_expr = space.multi_expr(expr_id);
        let operator = multi_expr.operator.clone();
        let children = multi_expr.children.clone();
        let mut child_plans = Vec::with_capacity(children.len());
        for (index, child) in children.iter().enumerate() {
            let child_required = operator
                .satisfy_required_properties(required, index)?
                .ok_or_else(|| DbError::Invariant("winning plan cannot satisfy its own child requirement".into()))?;
            let child_plan = self.extract_plan(space, *child, &child_required)?.ok_or_else(|| {
                DbError::Invariant("winning plan references a child with no extractable winner".into())
            })?;
            child_plans.push(child_plan);
        }
        Ok(Some(Expression::new(operator, child_plans)))
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}
