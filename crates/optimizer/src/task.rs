//! Task: the conceptual unit of work §4.8 describes the search in terms
//! of. [`Optimizer`](crate::Optimizer) drives these as direct recursive
//! calls rather than an explicit heap-allocated queue — the rule set and
//! plan trees this kernel searches are small enough that the call stack
//! already plays that role, and recursion keeps branch-and-bound
//! resumption (costing join input 1 after input 0's winner is ready)
//! implicit instead of hand-rolled continuation state. Each recursive
//! call still logs the task it corresponds to, so a completed search run
//! carries an explicit, replayable trace of what was scheduled and in
//! what order.

use cascades::{GroupId, MultiExprId, PhysicalProperties};

#[derive(Clone, Debug, PartialEq)]
pub enum Task {
    /// Find the winning plan for `group` under `required`.
    OptimizeGroup { group: GroupId, required: PhysicalProperties },
    /// Fire every not-yet-fired rule against one multi-expression.
    OptimizeExpression { expr: MultiExprId },
    /// Cost a physical multi-expression by optimizing its inputs.
    OptimizeInputs { expr: MultiExprId, required: PhysicalProperties },
}
