//! Runtime value model shared across the storage, schema, and optimizer crates.
//!
//! Deliberately small: it exists to give column statistics and cost formulas
//! something to measure widths and literals against, not to model a full SQL
//! type system (parsing and execution are out of scope for this kernel).

use std::cmp::Ordering;

/// Declared type of a column, used by `schema` for width/statistics bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Text,
    Bool,
    Date,
    Time,
    Timestamp,
}

impl SqlType {
    /// Fixed on-disk width in bytes, or `None` for variable-length types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            SqlType::Byte | SqlType::Bool => Some(1),
            SqlType::Short => Some(2),
            SqlType::Date => Some(3),
            SqlType::Int | SqlType::Float => Some(4),
            SqlType::Time => Some(5),
            SqlType::Long | SqlType::Double | SqlType::Timestamp => Some(8),
            SqlType::Text => None,
        }
    }
}

/// A runtime value. Numeric variants are kept separate (rather than folded
/// into one `Int`/`Float`) so column widths and codec round trips are exact.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bool(bool),
    /// Days since 1970-01-01.
    Date(i32),
    /// Milliseconds since midnight.
    Time(i64),
    /// Milliseconds since the epoch.
    Timestamp(i64),
    Null,
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            Value::Byte(_) => Some(SqlType::Byte),
            Value::Short(_) => Some(SqlType::Short),
            Value::Int(_) => Some(SqlType::Int),
            Value::Long(_) => Some(SqlType::Long),
            Value::Float(_) => Some(SqlType::Float),
            Value::Double(_) => Some(SqlType::Double),
            Value::Text(_) => Some(SqlType::Text),
            Value::Bool(_) => Some(SqlType::Bool),
            Value::Date(_) => Some(SqlType::Date),
            Value::Time(_) => Some(SqlType::Time),
            Value::Timestamp(_) => Some(SqlType::Timestamp),
            Value::Null => None,
        }
    }

    /// Same-type comparison; cross-type and NULL comparisons return `None`.
    ///
    /// Float/double follow `total_cmp` so NaN orders consistently (greater
    /// than every other value, equal to itself) and a key comparator built
    /// on this stays a total order instead of silently going partial.
    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Byte(a), Value::Byte(b)) => Some(a.cmp(b)),
            (Value::Short(a), Value::Short(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Double(a), Value::Double(b)) => Some(a.total_cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        self.cmp_same_type(other).map(|ord| ord == Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering::{Equal, Greater, Less};

    #[test]
    fn cmp_same_type_works() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Text("1".into())), None);
    }

    #[test]
    fn truthiness_is_strict() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(1).as_bool(), None);
        assert_eq!(Value::Null.as_bool(), None);
    }

    #[test]
    fn nan_orders_greater_than_everything_and_equal_to_itself() {
        let nan = Value::Double(f64::NAN);
        let one = Value::Double(1.0);
        assert_eq!(nan.cmp_same_type(&one), Some(Greater));
        assert_eq!(one.cmp_same_type(&nan), Some(Less));
        assert_eq!(nan.cmp_same_type(&nan), Some(Equal));
    }

    #[test]
    fn cross_type_and_null_comparisons_reject() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Long(1)), None);
        assert_eq!(Value::Null.cmp_same_type(&Value::Int(1)), None);
    }

    #[test]
    fn fixed_widths_match_codec_layout() {
        assert_eq!(SqlType::Byte.fixed_width(), Some(1));
        assert_eq!(SqlType::Date.fixed_width(), Some(3));
        assert_eq!(SqlType::Time.fixed_width(), Some(5));
        assert_eq!(SqlType::Long.fixed_width(), Some(8));
        assert_eq!(SqlType::Text.fixed_width(), None);
    }

    proptest! {
        #[test]
        fn order_is_antisymmetric(i in any::<i32>(), j in any::<i32>()) {
            let a = Value::Int(i);
            let b = Value::Int(j);
            match (a.cmp_same_type(&b), b.cmp_same_type(&a)) {
                (Some(o1), Some(o2)) => prop_assert_eq!(o1, o2.reverse()),
                _ => prop_assert!(true),
            }
        }

        #[test]
        fn text_cmp_matches_std(a in ".*", b in ".*") {
            let va = Value::Text(a.clone());
            let vb = Value::Text(b.clone());
            prop_assert_eq!(va.cmp_same_type(&vb), Some(a.cmp(&b)));
        }
    }
}
