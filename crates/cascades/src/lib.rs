//! Cascades search-space entities (§3.3, §4.8): operator, expression,
//! multi-expression, group, winner, search context, and cost. This crate
//! is data structures only — no task queue, no rule firing loop; see the
//! `optimizer` crate for the search algorithm built on top of these
//! entities.

mod cost;
mod expression;
mod group;
mod operator;
mod properties;
mod search_space;

pub use cost::{Cost, CostConstants};
pub use expression::Expression;
pub use group::{Group, GroupId, MultiExprId, MultiExpression, Winner};
pub use operator::{Category, Operator, Predicate};
pub use properties::{LogicalProperties, Order, PhysicalProperties};
pub use search_space::SearchSpace;

/// `{requiredPhysicalProperties, upperBoundCost, finished}`. Threaded
/// through every optimizer task; a task reads the required properties and
/// upper bound from its context and may lower the upper bound when a
/// cheaper plan is proven.
///
/// `finished` uses a `Cell` rather than plain `bool` because a single
/// context value is shared (by reference) across every task that
/// searches the same group under the same required properties; once
/// global epsilon pruning (§4.8) accepts a plan costing at or below
/// `epsilon`, every sibling task sharing this context needs to see that
/// the search for it is over and stop considering further alternatives.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchContext {
    pub required: PhysicalProperties,
    pub upper_bound: Cost,
    /// Global epsilon pruning bound (§4.8), divided among children on
    /// descent via [`Cost::divide`]. `None` disables the mechanism.
    pub epsilon: Option<Cost>,
    pub finished: std::cell::Cell<bool>,
}

impl SearchContext {
    pub fn new(required: PhysicalProperties, upper_bound: Cost) -> Self {
        Self { required, upper_bound, epsilon: None, finished: std::cell::Cell::new(false) }
    }

    pub fn any(upper_bound: Cost) -> Self {
        Self::new(PhysicalProperties::any(), upper_bound)
    }

    pub fn with_epsilon(mut self, epsilon: Cost) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    /// The epsilon budget a child search should inherit: this context's
    /// own epsilon, divided evenly across `num_children` descendants.
    pub fn child_epsilon(&self, num_children: usize) -> Option<Cost> {
        self.epsilon.map(|e| e.divide(num_children as u32))
    }

    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Declares the search for this context over: no further alternative
    /// should be considered once a plan at or below `epsilon` is found.
    pub fn mark_finished(&self) {
        self.finished.set(true);
    }
}
