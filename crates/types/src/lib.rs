use std::cmp::Ordering;
use std::fmt;

/// Column data types supported by the storage format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Int,
    Float,
    Text,
    Bool,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Int => write!(f, "INT"),
            SqlType::Float => write!(f, "FLOAT"),
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Bool => write!(f, "BOOL"),
        }
    }
}

/// A typed SQL value. `Float` keeps the enum out of `Eq`/`Hash`; comparisons
/// go through the same-type helpers below.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i32),
    Float(f32),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn sql_type(&self) -> SqlType {
        match self {
            Value::Int(_) => SqlType::Int,
            Value::Float(_) => SqlType::Float,
            Value::Text(_) => SqlType::Text,
            Value::Bool(_) => SqlType::Bool,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.eq(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.eq(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.eq(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.eq(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
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
        assert_eq!(Value::Text("true".into()).as_bool(), None);
    }

    #[test]
    fn comparisons_require_same_type() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(
            Value::Text("a".into()).cmp_same_type(&Value::Text("a".into())),
            Some(Equal)
        );
        assert_eq!(
            Value::Bool(true).cmp_same_type(&Value::Bool(false)),
            Some(Greater)
        );
        assert_eq!(
            Value::Float(1.5).cmp_same_type(&Value::Float(0.5)),
            Some(Greater)
        );
        // Cross-type should reject
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Float(1.0)), None);
    }

    #[test]
    fn nan_comparison_is_none() {
        assert_eq!(
            Value::Float(f32::NAN).cmp_same_type(&Value::Float(0.0)),
            None
        );
    }

    #[test]
    fn value_reports_its_type() {
        assert_eq!(Value::Int(7).sql_type(), SqlType::Int);
        assert_eq!(Value::Text("x".into()).sql_type(), SqlType::Text);
    }

    proptest! {
        #[test]
        fn int_ordering_matches_native(a: i32, b: i32) {
            prop_assert_eq!(
                Value::Int(a).cmp_same_type(&Value::Int(b)),
                Some(a.cmp(&b))
            );
        }

        #[test]
        fn eq_same_type_is_reflexive(a: i32, s in "[a-z]{0,8}") {
            prop_assert_eq!(Value::Int(a).eq_same_type(&Value::Int(a)), Some(true));
            let v = Value::Text(s);
            prop_assert_eq!(v.eq_same_type(&v.clone()), Some(true));
        }
    }
}
