//! Runtime values held by object properties.

use serde::{Deserialize, Serialize};

use crate::storage::ObjectId;

/// A runtime value stored in, or computed for, an object property.
///
/// Multi-valued properties and association ends are represented as
/// [`Value::List`]; references to other objects as [`Value::Ref`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Reference to another object.
    Ref(ObjectId),
    /// Ordered collection of values.
    List(Vec<Value>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an object reference.
    pub fn as_ref_id(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Number of elements this value contributes to a multiplicity count.
    ///
    /// `Null` counts as zero, a list as its length, anything else as one.
    pub fn cardinality(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::List(items) => items.len(),
            _ => 1,
        }
    }

    /// Flatten into individual non-null elements.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Value::Null => Vec::new(),
            Value::List(items) => items.into_iter().filter(|v| !v.is_null()).collect(),
            other => vec![other],
        }
    }

    /// Collect every object reference held by this value, in order.
    pub fn ref_ids(&self) -> Vec<ObjectId> {
        match self {
            Value::Ref(id) => vec![*id],
            Value::List(items) => items.iter().filter_map(Value::as_ref_id).collect(),
            _ => Vec::new(),
        }
    }

    /// Check whether this value is, or contains, a reference to `id`.
    pub fn contains_ref(&self, id: ObjectId) -> bool {
        match self {
            Value::Ref(r) => *r == id,
            Value::List(items) => items.iter().any(|v| v.contains_ref(id)),
            _ => false,
        }
    }

    /// Build a list of references.
    pub fn refs(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Value::List(ids.into_iter().map(Value::Ref).collect())
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Ref(_) => "ref",
            Value::List(_) => "list",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Ref(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality() {
        assert_eq!(Value::Null.cardinality(), 0);
        assert_eq!(Value::Int(3).cardinality(), 1);
        assert_eq!(Value::List(vec![Value::Int(1), Value::Int(2)]).cardinality(), 2);
    }

    #[test]
    fn test_ref_helpers() {
        let a = ObjectId::new(1);
        let b = ObjectId::new(2);
        let list = Value::refs([a, b]);

        assert_eq!(list.ref_ids(), vec![a, b]);
        assert!(list.contains_ref(b));
        assert!(!Value::Ref(a).contains_ref(b));
        assert_eq!(Value::Ref(a).as_ref_id(), Some(a));
    }

    #[test]
    fn test_into_items_drops_nulls() {
        let v = Value::List(vec![Value::Null, Value::Int(1)]);
        assert_eq!(v.into_items(), vec![Value::Int(1)]);
        assert!(Value::Null.into_items().is_empty());
    }

    #[test]
    fn test_float_widening() {
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert_eq!(Value::String("x".into()).as_float(), None);
    }
}
