//! Constraint and derivation registry.
//!
//! Native evaluators for derived properties, derived association ends,
//! validation constraints and operation bodies, looked up through the class
//! hierarchy of a frozen [`Schema`](crate::catalog::Schema).

mod evaluator;
mod registry;

pub use evaluator::{DerivedFn, EvalContext, RegisteredEvaluator, ValidationFn};
pub use registry::{ConstraintRegistry, Derivation, Validation};
