//! Evaluator signatures and the context handed to them.

use crate::engine::{Engine, InstanceRef};
use crate::error::Result;
use crate::storage::ObjectId;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Computes a derived property, a derived association end or an operation body.
pub type DerivedFn = Arc<dyn Fn(&EvalContext<'_>) -> Result<Value> + Send + Sync>;

/// Checks a validation constraint; `Ok(false)` is a violation.
pub type ValidationFn = Arc<dyn Fn(&EvalContext<'_>) -> Result<bool> + Send + Sync>;

/// What an evaluator sees while running.
pub struct EvalContext<'a> {
    engine: &'a Engine,
    object: InstanceRef,
    args: &'a [Value],
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(engine: &'a Engine, object: InstanceRef, args: &'a [Value]) -> Self {
        Self {
            engine,
            object,
            args,
        }
    }

    /// The engine, for reads beyond the current object.
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// The object being evaluated.
    pub fn object(&self) -> &InstanceRef {
        &self.object
    }

    /// Id of the object being evaluated.
    pub fn id(&self) -> ObjectId {
        self.object.id
    }

    /// Class of the object being evaluated.
    pub fn class(&self) -> &str {
        &self.object.class
    }

    /// Operation arguments; empty for derivations and validations.
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Derivation-aware read of a property or end of the current object.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.engine.get_property_value(&self.object, name)
    }

    /// Derivation-aware read of a property or end of another object.
    pub fn get_of(&self, id: ObjectId, name: &str) -> Result<Value> {
        match self.engine.get_instance(id) {
            Some(other) => self.engine.get_property_value(&other, name),
            None => Ok(Value::Null),
        }
    }
}

/// An evaluator together with where it was registered.
#[derive(Clone)]
pub struct RegisteredEvaluator<F> {
    /// Constraint, property, end or operation name.
    pub name: String,
    /// Class or association it was registered for; `None` for global ones.
    pub declared_in: Option<String>,
    /// The evaluator.
    pub evaluator: F,
}

impl<F> fmt::Debug for RegisteredEvaluator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredEvaluator")
            .field("name", &self.name)
            .field("declared_in", &self.declared_in)
            .finish_non_exhaustive()
    }
}
