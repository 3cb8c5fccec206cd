//! Operator: a tagged variant carrying its own category, arity, and the
//! logical/physical contracts §3.3 describes. Concrete variants cover the
//! small relational vocabulary the sample rule set (§4.8) rewrites between:
//! scans, selection/filter, equi-join, grouping, and sort, each in both a
//! logical and a physical flavor plus the `SortEnforcer` that bridges them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use common::{DbError, DbResult};

use crate::cost::{Cost, CostConstants};
use crate::properties::{LogicalProperties, PhysicalProperties};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Logical,
    Physical,
    Element,
    Constant,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub literal: types::Value,
}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.column.hash(state);
        format!("{:?}", self.literal).hash(state);
    }
}

#[derive(Clone, Debug)]
pub enum Operator {
    // --- logical ---
    GetTable { table: String, row_count: f64, width: f64 },
    Selection { predicate: Predicate },
    EquiJoin { left_key: String, right_key: String, ignore_input_order: bool },
    Aggregation { group_by: Vec<String>, aggregates: Vec<String> },
    OrderBy { keys: Vec<(String, bool)> },
    Projection { columns: Vec<String> },

    // --- physical ---
    FileScan { table: String, row_count: f64, width: f64 },
    Filter { predicate: Predicate },
    HashJoin { left_key: String, right_key: String },
    SortMergeJoin { left_key: String, right_key: String },
    HashAggregation { group_by: Vec<String>, aggregates: Vec<String> },
    Sort { keys: Vec<(String, bool)> },
    SortEnforcer { keys: Vec<(String, bool)> },
    ProjectExec { columns: Vec<String> },
}

/// `EquiJoin`'s two join keys are compared as a set (not a pair) when
/// `ignore_input_order` is set, matching the decided Open Question that
/// join-operator equality is order-independent only by opt-in; every
/// other variant compares its fields in declaration order. `f64` fields
/// are hashed/compared via their bit pattern since Rust's `f64` has no
/// blanket `Hash` impl.
impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        use Operator::*;
        match (self, other) {
            (GetTable { table: t1, row_count: r1, width: w1 }, GetTable { table: t2, row_count: r2, width: w2 }) => {
                t1 == t2 && r1.to_bits() == r2.to_bits() && w1.to_bits() == w2.to_bits()
            }
            (Selection { predicate: p1 }, Selection { predicate: p2 }) => p1 == p2,
            (
                EquiJoin { left_key: l1, right_key: r1, ignore_input_order: i1 },
                EquiJoin { left_key: l2, right_key: r2, ignore_input_order: i2 },
            ) => {
                if *i1 != *i2 {
                    return false;
                }
                if *i1 {
                    let mut a = [l1.as_str(), r1.as_str()];
                    let mut b = [l2.as_str(), r2.as_str()];
                    a.sort_unstable();
                    b.sort_unstable();
                    a == b
                } else {
                    l1 == l2 && r1 == r2
                }
            }
            (Aggregation { group_by: g1, aggregates: a1 }, Aggregation { group_by: g2, aggregates: a2 }) => {
                g1 == g2 && a1 == a2
            }
            (OrderBy { keys: k1 }, OrderBy { keys: k2 }) => k1 == k2,
            (Projection { columns: c1 }, Projection { columns: c2 }) => c1 == c2,
            (FileScan { table: t1, row_count: r1, width: w1 }, FileScan { table: t2, row_count: r2, width: w2 }) => {
                t1 == t2 && r1.to_bits() == r2.to_bits() && w1.to_bits() == w2.to_bits()
            }
            (Filter { predicate: p1 }, Filter { predicate: p2 }) => p1 == p2,
            (HashJoin { left_key: l1, right_key: r1 }, HashJoin { left_key: l2, right_key: r2 }) => {
                l1 == l2 && r1 == r2
            }
            (
                SortMergeJoin { left_key: l1, right_key: r1 },
                SortMergeJoin { left_key: l2, right_key: r2 },
            ) => l1 == l2 && r1 == r2,
            (
                HashAggregation { group_by: g1, aggregates: a1 },
                HashAggregation { group_by: g2, aggregates: a2 },
            ) => g1 == g2 && a1 == a2,
            (Sort { keys: k1 }, Sort { keys: k2 }) => k1 == k2,
            (SortEnforcer { keys: k1 }, SortEnforcer { keys: k2 }) => k1 == k2,
            (ProjectExec { columns: c1 }, ProjectExec { columns: c2 }) => c1 == c2,
            _ => false,
        }
    }
}

impl Hash for Operator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use Operator::*;
        std::mem::discriminant(self).hash(state);
        match self {
            GetTable { table, row_count, width } | FileScan { table, row_count, width } => {
                table.hash(state);
                row_count.to_bits().hash(state);
                width.to_bits().hash(state);
            }
            Selection { predicate } | Filter { predicate } => predicate.hash(state),
            EquiJoin { left_key, right_key, ignore_input_order } => {
                ignore_input_order.hash(state);
                if *ignore_input_order {
                    let mut keys = [left_key.as_str(), right_key.as_str()];
                    keys.sort_unstable();
                    keys.hash(state);
                } else {
                    left_key.hash(state);
                    right_key.hash(state);
                }
            }
            Aggregation { group_by, aggregates } | HashAggregation { group_by, aggregates } => {
                group_by.hash(state);
                aggregates.hash(state);
            }
            OrderBy { keys } | Sort { keys } | SortEnforcer { keys } => keys.hash(state),
            Projection { columns } | ProjectExec { columns } => columns.hash(state),
            HashJoin { left_key, right_key } | SortMergeJoin { left_key, right_key } => {
                left_key.hash(state);
                right_key.hash(state);
            }
        }
    }
}

impl Operator {
    pub fn category(&self) -> Category {
        use Operator::*;
        match self {
            GetTable { .. } | Selection { .. } | EquiJoin { .. } | Aggregation { .. }
            | OrderBy { .. } | Projection { .. } => Category::Logical,
            FileScan { .. } | Filter { .. } | HashJoin { .. } | SortMergeJoin { .. }
            | HashAggregation { .. } | Sort { .. } | SortEnforcer { .. } | ProjectExec { .. } => {
                Category::Physical
            }
        }
    }

    pub fn is_logical(&self) -> bool {
        self.category() == Category::Logical
    }

    pub fn is_physical(&self) -> bool {
        self.category() == Category::Physical
    }

    pub fn arity(&self) -> usize {
        use Operator::*;
        match self {
            GetTable { .. } | FileScan { .. } => 0,
            Selection { .. } | Aggregation { .. } | OrderBy { .. } | Projection { .. }
            | Filter { .. } | HashAggregation { .. } | Sort { .. } | SortEnforcer { .. }
            | ProjectExec { .. } => 1,
            EquiJoin { .. } | HashJoin { .. } | SortMergeJoin { .. } => 2,
        }
    }

    /// A stable content hash of this operator's own parameters, excluding
    /// child group identity (children are tracked separately by
    /// [`crate::MultiExpression`]). Computed unconditionally from every
    /// field — no never-both-true short circuit.
    pub fn hash_content(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    pub fn name(&self) -> &'static str {
        use Operator::*;
        match self {
            GetTable { .. } => "GetTable",
            Selection { .. } => "Selection",
            EquiJoin { .. } => "EquiJoin",
            Aggregation { .. } => "Aggregation",
            OrderBy { .. } => "OrderBy",
            Projection { .. } => "Projection",
            FileScan { .. } => "FileScan",
            Filter { .. } => "Filter",
            HashJoin { .. } => "HashJoin",
            SortMergeJoin { .. } => "SortMergeJoin",
            HashAggregation { .. } => "HashAggregation",
            Sort { .. } => "Sort",
            SortEnforcer { .. } => "SortEnforcer",
            ProjectExec { .. } => "ProjectExec",
        }
    }

    pub fn derive_logical_properties(
        &self,
        inputs: &[&LogicalProperties],
    ) -> DbResult<LogicalProperties> {
        use Operator::*;
        match self {
            GetTable { row_count, width, .. } => Ok(LogicalProperties {
                row_count: *row_count,
                unique_cardinality: Default::default(),
                width: *width,
            }),
            Selection { predicate } => {
                let input = single(inputs)?;
                let selectivity = 0.1;
                let mut props = input.clone();
                props.row_count *= selectivity;
                props.unique_cardinality.retain(|c, _| c != &predicate.column);
                Ok(props)
            }
            EquiJoin { left_key, right_key, .. } => {
                let (left, right) = pair(inputs)?;
                let uc = left.unique_card(left_key).max(right.unique_card(right_key)).max(1.0);
                let row_count = (left.row_count * right.row_count / uc).max(0.0);
                Ok(LogicalProperties {
                    row_count,
                    unique_cardinality: Default::default(),
                    width: left.width + right.width,
                })
            }
            Aggregation { group_by, .. } => {
                let input = single(inputs)?;
                let row_count = group_by
                    .first()
                    .map(|c| input.unique_card(c))
                    .unwrap_or(1.0)
                    .min(input.row_count)
                    .max(1.0);
                Ok(LogicalProperties { row_count, unique_cardinality: Default::default(), width: input.width })
            }
            OrderBy { .. } | Projection { .. } => Ok((*single(inputs)?).clone()),
            _ => Err(DbError::Invariant(format!(
                "{} is not a logical operator",
                self.name()
            ))),
        }
    }

    pub fn derive_local_cost(
        &self,
        props: &LogicalProperties,
        inputs: &[&LogicalProperties],
        k: &CostConstants,
    ) -> DbResult<Cost> {
        use Operator::*;
        let page_rows = 64.0;
        match self {
            FileScan { row_count, .. } => {
                Ok(Cost::new((row_count / page_rows).max(1.0) * k.seq_io_cost, *row_count * k.cpu_apply_cost))
            }
            Filter { .. } => {
                let input = single(inputs)?;
                Ok(Cost::new(0.0, input.row_count * k.cpu_apply_cost))
            }
            HashJoin { .. } => {
                let (left, right) = pair(inputs)?;
                let pages_l = (left.row_count / page_rows).max(1.0);
                let pages_r = (right.row_count / page_rows).max(1.0);
                Ok(Cost::new(
                    (2.0 * pages_l + 2.0 * pages_r) * k.seq_io_cost,
                    (left.row_count + right.row_count) * k.hash_cost,
                ))
            }
            SortMergeJoin { .. } => {
                let (left, right) = pair(inputs)?;
                let pages_l = (left.row_count / page_rows).max(1.0);
                let pages_r = (right.row_count / page_rows).max(1.0);
                Ok(Cost::new(
                    (pages_l + pages_r) * k.seq_io_cost,
                    (left.row_count * left.row_count.max(1.0).log2()
                        + right.row_count * right.row_count.max(1.0).log2())
                        * k.sort_cpu_cost,
                ))
            }
            HashAggregation { aggregates, .. } => {
                let input = single(inputs)?;
                Ok(Cost::new(
                    0.0,
                    input.row_count * (k.hash_cost + k.cpu_apply_cost * aggregates.len().max(1) as f64)
                        + props.row_count * k.touch_copy_cost,
                ))
            }
            Sort { .. } | SortEnforcer { .. } => {
                let input = single(inputs)?;
                let n = input.row_count.max(1.0);
                Ok(Cost::new(0.0, n * n.log2() * k.sort_cpu_cost))
            }
            ProjectExec { .. } => {
                let input = single(inputs)?;
                Ok(Cost::new(0.0, input.row_count * k.touch_copy_cost))
            }
            _ => Err(DbError::Invariant(format!(
                "{} is not a physical operator",
                self.name()
            ))),
        }
    }

    /// The physical property this operator's own output delivers,
    /// independent of what it requires from its inputs. Only `Sort`,
    /// `SortEnforcer`, and `SortMergeJoin` guarantee an order; every other
    /// physical operator delivers `Any`, so a required order can only be
    /// met by wrapping it in a sort enforcer.
    pub fn delivers(&self) -> PhysicalProperties {
        use Operator::*;
        match self {
            Sort { keys } | SortEnforcer { keys } => PhysicalProperties::sorted(keys.clone()),
            SortMergeJoin { left_key, .. } => PhysicalProperties::sorted(vec![(left_key.clone(), false)]),
            _ => PhysicalProperties::any(),
        }
    }

    /// The physical property required of input `index`, or `None` if
    /// `required` cannot be satisfied by any plan rooted at this operator.
    pub fn satisfy_required_properties(
        &self,
        required: &PhysicalProperties,
        index: usize,
    ) -> DbResult<Option<PhysicalProperties>> {
        use Operator::*;
        if index >= self.arity() {
            return Err(DbError::Invariant(format!(
                "input index {index} out of range for {} (arity {})",
                self.name(),
                self.arity()
            )));
        }
        Ok(match self {
            Sort { .. } | SortEnforcer { .. } => Some(PhysicalProperties::any()),
            SortMergeJoin { left_key, right_key } => {
                let key = if index == 0 { left_key } else { right_key };
                Some(PhysicalProperties::sorted(vec![(key.clone(), false)]))
            }
            _ if required.is_any() => Some(PhysicalProperties::any()),
            FileScan { .. } | HashJoin { .. } | HashAggregation { .. } | ProjectExec { .. } | Filter { .. } => {
                // These operators do not preserve or enforce an input order
                // on their own; an ordered requirement above them must be
                // satisfied by a sort enforcer instead.
                None
            }
            _ => Some(PhysicalProperties::any()),
        })
    }
}

fn single<'a>(inputs: &[&'a LogicalProperties]) -> DbResult<&'a LogicalProperties> {
    inputs
        .first()
        .copied()
        .ok_or_else(|| DbError::Invariant("expected exactly one input".into()))
}

fn pair<'a>(inputs: &[&'a LogicalProperties]) -> DbResult<(&'a LogicalProperties, &'a LogicalProperties)> {
    if inputs.len() != 2 {
        return Err(DbError::Invariant("expected exactly two inputs".into()));
    }
    Ok((inputs[0], inputs[1]))
}
