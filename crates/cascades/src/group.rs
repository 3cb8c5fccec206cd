//! Multi-expression, group, and winner: the arena-indexed bookkeeping a
//! search space is built from. Groups and multi-expressions are addressed
//! by small integer IDs rather than pointers so they can live in a flat
//! `Vec` per [`crate::SearchSpace`], an arena keyed by group ID and
//! multi-expression index.

use hashbrown::HashMap;

use crate::cost::Cost;
use crate::operator::Operator;
use crate::properties::{LogicalProperties, PhysicalProperties};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MultiExprId(pub usize);

#[derive(Clone, Debug)]
pub struct MultiExpression {
    pub group: GroupId,
    pub operator: Operator,
    pub children: Vec<GroupId>,
    /// Bit `i` set means rule with ordinal `i` has already fired on this
    /// multi-expression.
    pub fired_rules: u64,
}

impl MultiExpression {
    pub fn has_fired(&self, rule_ordinal: usize) -> bool {
        debug_assert!(rule_ordinal < 64, "rule ordinal exceeds fired_rules bit width");
        self.fired_rules & (1 << rule_ordinal) != 0
    }

    pub fn mark_fired(&mut self, rule_ordinal: usize) {
        self.fired_rules |= 1 << rule_ordinal;
    }
}

/// `{plan, requiredProperties, cost, ready}`. `plan = None` with
/// `ready = false` means search for this context is in progress;
/// `plan = None` with `ready = true` means proven unsatisfiable.
#[derive(Clone, Debug)]
pub struct Winner {
    pub plan: Option<MultiExprId>,
    pub cost: Cost,
    pub ready: bool,
}

impl Winner {
    pub fn in_progress(upper_bound: Cost) -> Self {
        Self { plan: None, cost: upper_bound, ready: false }
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.plan.is_none() && self.ready
    }
}

#[derive(Clone, Debug)]
pub struct Group {
    pub id: GroupId,
    pub logical_exprs: Vec<MultiExprId>,
    pub physical_exprs: Vec<MultiExprId>,
    pub logical_properties: Option<LogicalProperties>,
    pub winners: HashMap<PhysicalProperties, Winner>,
    pub exploring: bool,
    pub explored: bool,
    pub optimized: bool,
}

impl Group {
    pub fn new(id: GroupId) -> Self {
        Self {
            id,
            logical_exprs: Vec::new(),
            physical_exprs: Vec::new(),
            logical_properties: None,
            winners: HashMap::new(),
            exploring: false,
            explored: false,
            optimized: false,
        }
    }

    pub fn first_logical(&self) -> Option<MultiExprId> {
        self.logical_exprs.first().copied()
    }
}
