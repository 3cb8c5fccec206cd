//! Logical properties (cardinalities, unique cardinalities, widths) and
//! physical properties (currently just sort order) that flow through
//! `deriveLogicalProperties` / `satisfyRequiredProperties`.

use hashbrown::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct LogicalProperties {
    pub row_count: f64,
    pub unique_cardinality: HashMap<String, f64>,
    pub width: f64,
}

impl LogicalProperties {
    pub fn unique_card(&self, column: &str) -> f64 {
        self.unique_cardinality.get(column).copied().unwrap_or(self.row_count)
    }
}

/// A required or delivered sort order; `Any` is satisfied by every plan.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    Any,
    Sorted(Vec<(String, bool)>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PhysicalProperties {
    pub order: Order,
}

impl PhysicalProperties {
    pub fn any() -> Self {
        Self { order: Order::Any }
    }

    pub fn sorted(keys: Vec<(String, bool)>) -> Self {
        Self { order: Order::Sorted(keys) }
    }

    pub fn is_any(&self) -> bool {
        matches!(self.order, Order::Any)
    }

    /// Does `delivered` already satisfy `self`?
    pub fn satisfied_by(&self, delivered: &PhysicalProperties) -> bool {
        match &self.order {
            Order::Any => true,
            Order::Sorted(_) => self.order == delivered.order,
        }
    }
}
