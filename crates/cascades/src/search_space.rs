//! Search space: the arena of groups and multi-expressions one
//! optimization run builds and discards, plus the content-hash dedup
//! index that enforces "no two groups contain the same
//! multi-expression".

use hashbrown::HashMap;
use tracing::trace;

use common::{DbError, DbResult};

use crate::expression::Expression;
use crate::group::{Group, GroupId, MultiExprId, MultiExpression};
use crate::operator::Operator;
use crate::properties::LogicalProperties;

pub struct SearchSpace {
    groups: Vec<Group>,
    multi_exprs: Vec<MultiExpression>,
    dedup: HashMap<(u64, Vec<GroupId>), MultiExprId>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self { groups: Vec::new(), multi_exprs: Vec::new(), dedup: HashMap::new() }
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    pub fn group_mut(&mut self, id: GroupId) -> &mut Group {
        &mut self.groups[id.0]
    }

    pub fn multi_expr(&self, id: MultiExprId) -> &MultiExpression {
        &self.multi_exprs[id.0]
    }

    pub fn multi_expr_mut(&mut self, id: MultiExprId) -> &mut MultiExpression {
        &mut self.multi_exprs[id.0]
    }

    pub fn new_group(&mut self) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(Group::new(id));
        id
    }

    /// Inserts `operator(children...)` into `group`, deduplicating against
    /// every multi-expression already present anywhere in the search
    /// space. Returns the (possibly pre-existing) multi-expression ID and
    /// whether it was newly created.
    ///
    /// A physical multi-expression may only reference groups that already
    /// exist in this search space (§3.3 invariant); since groups are only
    /// ever handed out by `new_group`, any `GroupId` a caller holds
    /// already satisfies this.
    pub fn insert_multi_expression(
        &mut self,
        group: GroupId,
        operator: Operator,
        children: Vec<GroupId>,
    ) -> DbResult<(MultiExprId, bool)> {
        if children.len() != operator.arity() {
            return Err(DbError::Invariant(format!(
                "{} has arity {} but {} children were given",
                operator.name(),
                operator.arity(),
                children.len()
            )));
        }
        let key = (operator.hash_content(), children.clone());
        if let Some(&existing) = self.dedup.get(&key) {
            trace!(group = group.0, multi_expr = existing.0, "duplicate multi-expression folded into existing one");
            return Ok((existing, false));
        }
        let id = MultiExprId(self.multi_exprs.len());
        let is_physical = operator.is_physical();
        trace!(group = group.0, multi_expr = id.0, operator = operator.name(), "new multi-expression");
        self.multi_exprs.push(MultiExpression { group, operator, children, fired_rules: 0 });
        self.dedup.insert(key, id);
        let group_slot = self.group_mut(group);
        if is_physical {
            group_slot.physical_exprs.push(id);
        } else {
            group_slot.logical_exprs.push(id);
        }
        Ok((id, true))
    }

    /// Inserts an initial logical `Expression` tree, creating one fresh
    /// group per node, and returns the root group.
    pub fn ingest(&mut self, expr: &Expression) -> DbResult<GroupId> {
        let children: Vec<GroupId> =
            expr.children.iter().map(|child| self.ingest(child)).collect::<DbResult<_>>()?;
        let group = self.new_group();
        self.insert_multi_expression(group, expr.operator.clone(), children)?;
        Ok(group)
    }

    /// Computes (and caches) the logical properties of `group` from its
    /// first logical multi-expression, recursing into child groups as
    /// needed. All logical alternatives in a group are required to
    /// produce the same multiset of tuples, so the first is
    /// representative.
    pub fn logical_properties(&mut self, group: GroupId) -> DbResult<LogicalProperties> {
        if let Some(props) = &self.group(group).logical_properties {
            return Ok(props.clone());
        }
        let expr_id = self.group(group).first_logical().ok_or_else(|| {
            DbError::Invariant(format!("group {} has no logical expression", group.0))
        })?;
        let operator = self.multi_expr(expr_id).operator.clone();
        let children = self.multi_expr(expr_id).children.clone();
        let mut child_props = Vec::with_capacity(children.len());
        for child in children {
            child_props.push(self.logical_properties(child)?);
        }
        let refs: Vec<&LogicalProperties> = child_props.iter().collect();
        let props = operator.derive_logical_properties(&refs)?;
        self.group_mut(group).logical_properties = Some(props.clone());
        Ok(props)
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Operator;

    #[test]
    fn ingest_creates_one_group_per_node() {
        let mut space = SearchSpace::new();
        let expr = Expression::new(
            Operator::EquiJoin { left_key: "sid".into(), right_key: "sid".into(), ignore_input_order: false },
            vec![
                Expression::leaf(Operator::GetTable { table: "sailors".into(), row_count: 10_000.0, width: 8.0 }),
                Expression::leaf(Operator::GetTable { table: "reserves".into(), row_count: 100_000.0, width: 12.0 }),
            ],
        );
        let root = space.ingest(&expr).unwrap();
        assert_eq!(space.group(root).logical_exprs.len(), 1);
        let root_expr = space.multi_expr(space.group(root).logical_exprs[0]);
        assert_eq!(root_expr.children.len(), 2);
    }

    #[test]
    fn duplicate_multi_expressions_are_deduplicated() {
        let mut space = SearchSpace::new();
        let group = space.new_group();
        let op = Operator::Projection { columns: vec!["a".into()] };
        let leaf_group = space.new_group();
        let (first, created_first) =
            space.insert_multi_expression(group, op.clone(), vec![leaf_group]).unwrap();
        let (second, created_second) = space.insert_multi_expression(group, op, vec![leaf_group]).unwrap();
        assert!(created_first);
        assert!(!created_second);
        assert_eq!(first, second);
        assert_eq!(space.group(group).logical_exprs.len(), 1);
    }

    #[test]
    fn logical_properties_are_cached_after_first_computation() {
        let mut space = SearchSpace::new();
        let expr = Expression::leaf(Operator::GetTable { table: "sailors".into(), row_count: 10_000.0, width: 8.0 });
        let root = space.ingest(&expr).unwrap();
        let first = space.logical_properties(root).unwrap();
        assert_eq!(first.row_count, 10_000.0);
        assert!(space.group(root).logical_properties.is_some());
        let second = space.logical_properties(root).unwrap();
        assert_eq!(first, second);
    }
}
