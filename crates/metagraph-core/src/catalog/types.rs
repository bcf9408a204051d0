//! Core type definitions for the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound value meaning "no upper limit".
pub const UNBOUNDED: i64 = -1;

/// Value types an attribute can declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Boolean value.
    Boolean,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point. Integers are accepted.
    Real,
    /// UTF-8 string.
    String,
    /// Reference to an instance of the named class (or a subclass).
    Reference(String),
    /// Any value.
    Any,
}

impl ValueType {
    /// Create a reference type.
    pub fn reference(class: impl Into<String>) -> Self {
        ValueType::Reference(class.into())
    }

    /// Referenced class, if this is a reference type.
    pub fn referenced_class(&self) -> Option<&str> {
        match self {
            ValueType::Reference(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => f.write_str("Boolean"),
            ValueType::Integer => f.write_str("Integer"),
            ValueType::Real => f.write_str("Real"),
            ValueType::String => f.write_str("String"),
            ValueType::Reference(c) => write!(f, "ref {}", c),
            ValueType::Any => f.write_str("Any"),
        }
    }
}

/// Lower and upper bound on the number of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiplicity {
    /// Minimum number of values.
    pub lower: u32,
    /// Maximum number of values, `None` when unbounded.
    pub upper: Option<u32>,
}

impl Multiplicity {
    /// Create from bounds; an upper bound below zero or past `u32::MAX`
    /// means unbounded.
    pub fn new(lower: u32, upper: i64) -> Self {
        Self {
            lower,
            upper: u32::try_from(upper).ok(),
        }
    }

    /// `0..1`
    pub const fn optional() -> Self {
        Self {
            lower: 0,
            upper: Some(1),
        }
    }

    /// `1..1`
    pub const fn one() -> Self {
        Self {
            lower: 1,
            upper: Some(1),
        }
    }

    /// `0..*`
    pub const fn many() -> Self {
        Self {
            lower: 0,
            upper: None,
        }
    }

    /// `1..*`
    pub const fn at_least_one() -> Self {
        Self {
            lower: 1,
            upper: None,
        }
    }

    /// Whether more than one value may be held.
    pub fn is_many(&self) -> bool {
        self.upper.map_or(true, |u| u > 1)
    }

    /// Whether at least one value is required.
    pub fn is_required(&self) -> bool {
        self.lower > 0
    }

    /// Whether `count` values exceed the upper bound.
    pub fn exceeds_upper(&self, count: usize) -> bool {
        self.upper.is_some_and(|u| count > u as usize)
    }

    /// Whether `count` values fall within both bounds.
    pub fn admits(&self, count: usize) -> bool {
        count >= self.lower as usize && !self.exceeds_upper(count)
    }
}

impl Default for Multiplicity {
    fn default() -> Self {
        Self::optional()
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper {
            Some(u) => write!(f, "{}..{}", self.lower, u),
            None => write!(f, "{}..*", self.lower),
        }
    }
}

/// Ownership strength of an association end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregationKind {
    /// Plain reference.
    #[default]
    None,
    /// Shared aggregation; no lifecycle implications.
    Shared,
    /// Composite aggregation; parts are deleted with their owner.
    Composite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplicity_bounds() {
        let m = Multiplicity::new(1, UNBOUNDED);
        assert_eq!(m, Multiplicity::at_least_one());
        assert!(m.is_many());
        assert!(m.is_required());
        assert!(!m.admits(0));
        assert!(m.admits(10));

        let single = Multiplicity::optional();
        assert!(!single.is_many());
        assert!(single.exceeds_upper(2));
        assert!(single.admits(0));

        let huge = Multiplicity::new(0, i64::from(u32::MAX) + 1);
        assert_eq!(huge.upper, None);
        assert_eq!(Multiplicity::new(0, i64::from(u32::MAX)).upper, Some(u32::MAX));
    }

    #[test]
    fn test_multiplicity_display() {
        assert_eq!(Multiplicity::many().to_string(), "0..*");
        assert_eq!(Multiplicity::new(2, 5).to_string(), "2..5");
    }

    #[test]
    fn test_value_type_reference() {
        let t = ValueType::reference("Element");
        assert_eq!(t.referenced_class(), Some("Element"));
        assert_eq!(t.to_string(), "ref Element");
        assert_eq!(ValueType::Integer.referenced_class(), None);
    }
}
