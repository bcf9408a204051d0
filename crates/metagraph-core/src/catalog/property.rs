//! Attribute (property) declarations.

use super::types::{Multiplicity, ValueType};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// An attribute declared on a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaProperty {
    /// Property name (unique within the class hierarchy view).
    pub name: String,
    /// Declared value type.
    pub value_type: ValueType,
    /// Value count bounds.
    pub multiplicity: Multiplicity,
    /// Whether multi-valued contents keep insertion order.
    pub ordered: bool,
    /// Whether multi-valued contents reject duplicates.
    pub unique: bool,
    /// Whether the value is computed on read.
    pub derived: bool,
    /// Name of the derivation evaluator, documentation only.
    pub derivation: Option<String>,
    /// Whether the value may only be assigned once.
    pub read_only: bool,
    /// Value assigned at instance creation.
    pub default: Option<Value>,
}

impl MetaProperty {
    /// Create an optional single-valued property.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            multiplicity: Multiplicity::optional(),
            ordered: false,
            unique: true,
            derived: false,
            derivation: None,
            read_only: false,
            default: None,
        }
    }

    /// Create a required single-valued property.
    pub fn required(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, value_type).with_multiplicity(Multiplicity::one())
    }

    /// Create a multi-valued property.
    pub fn many(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, value_type).with_multiplicity(Multiplicity::many())
    }

    /// Set the multiplicity.
    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    /// Mark as ordered.
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Allow duplicate values.
    pub fn non_unique(mut self) -> Self {
        self.unique = false;
        self
    }

    /// Mark as derived, naming the evaluator.
    pub fn derived(mut self, derivation: impl Into<String>) -> Self {
        self.derived = true;
        self.derivation = Some(derivation.into());
        self
    }

    /// Mark as read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Whether this property holds more than one value.
    pub fn is_many(&self) -> bool {
        self.multiplicity.is_many()
    }

    /// Initial value for a freshly created instance.
    ///
    /// Derived properties never get one. Declared defaults win; otherwise
    /// required properties get the zero value of their type. Read-only
    /// properties without a default stay unset until first assigned.
    pub fn initial_value(&self) -> Option<Value> {
        if self.derived {
            return None;
        }
        if let Some(default) = &self.default {
            return Some(default.clone());
        }
        if !self.multiplicity.is_required() || self.read_only {
            return None;
        }
        if self.is_many() {
            return Some(Value::List(Vec::new()));
        }
        match self.value_type {
            ValueType::Boolean => Some(Value::Bool(false)),
            ValueType::Integer => Some(Value::Int(0)),
            ValueType::Real => Some(Value::Float(0.0)),
            ValueType::String => Some(Value::String(String::new())),
            ValueType::Reference(_) | ValueType::Any => None,
        }
    }
}
