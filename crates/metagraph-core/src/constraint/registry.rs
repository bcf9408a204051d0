//! Keyed evaluator tables with inheritance-aware lookup.

use super::evaluator::{DerivedFn, EvalContext, RegisteredEvaluator, ValidationFn};
use crate::catalog::Schema;
use crate::error::Result;
use crate::value::Value;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// A registered derivation, end evaluator or operation body.
pub type Derivation = RegisteredEvaluator<DerivedFn>;

/// A registered validation constraint.
pub type Validation = RegisteredEvaluator<ValidationFn>;

/// Pluggable evaluators for derived values, validations and operations.
///
/// Tables are independently sharded, so registration may interleave with
/// lookups from other threads.
#[derive(Default)]
pub struct ConstraintRegistry {
    derived: DashMap<(String, String), DerivedFn>,
    validations: DashMap<String, Vec<Validation>>,
    global: DashMap<String, ValidationFn>,
    association_ends: DashMap<(String, String), DerivedFn>,
    operations: DashMap<(String, String), DerivedFn>,
}

impl std::fmt::Debug for ConstraintRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintRegistry")
            .field("derived", &self.derived.len())
            .field("validations", &self.validations.len())
            .field("global", &self.global.len())
            .field("association_ends", &self.association_ends.len())
            .field("operations", &self.operations.len())
            .finish()
    }
}

impl ConstraintRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Registration ==========

    /// Register the evaluator of a derived property.
    pub fn register_derived_property<F>(&self, class: &str, property: &str, f: F)
    where
        F: Fn(&EvalContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        debug!(class, property, "registered derived property");
        self.derived
            .insert((class.to_string(), property.to_string()), Arc::new(f));
    }

    /// Register a class-scoped validation constraint.
    ///
    /// Re-registering a name on the same class replaces the evaluator in place.
    pub fn register_validation<F>(&self, class: &str, constraint: &str, f: F)
    where
        F: Fn(&EvalContext<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        debug!(class, constraint, "registered validation");
        let entry = Validation {
            name: constraint.to_string(),
            declared_in: Some(class.to_string()),
            evaluator: Arc::new(f),
        };
        let mut bucket = self.validations.entry(class.to_string()).or_default();
        match bucket.iter_mut().find(|v| v.name == constraint) {
            Some(existing) => *existing = entry,
            None => bucket.push(entry),
        }
    }

    /// Register a validation constraint applying to any class that declares it.
    pub fn register_global_validation<F>(&self, constraint: &str, f: F)
    where
        F: Fn(&EvalContext<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        debug!(constraint, "registered global validation");
        self.global.insert(constraint.to_string(), Arc::new(f));
    }

    /// Register the evaluator of a derived association end.
    ///
    /// The evaluator returns the end's value: a reference, a list of
    /// references or `Null`.
    pub fn register_association_end<F>(&self, association: &str, end: &str, f: F)
    where
        F: Fn(&EvalContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        debug!(association, end, "registered association end");
        self.association_ends
            .insert((association.to_string(), end.to_string()), Arc::new(f));
    }

    /// Register the native body of an operation.
    pub fn register_operation<F>(&self, class: &str, operation: &str, f: F)
    where
        F: Fn(&EvalContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        debug!(class, operation, "registered operation");
        self.operations
            .insert((class.to_string(), operation.to_string()), Arc::new(f));
    }

    // ========== Lookup ==========

    /// Walk `class` then its ancestors in declaration order; first hit wins.
    fn walk<T>(
        schema: &Schema,
        class: &str,
        probe: impl FnMut(&str) -> Option<T>,
    ) -> Option<T> {
        std::iter::once(class)
            .chain(schema.ancestors(class).iter().map(String::as_str))
            .find_map(probe)
    }

    /// Derived-property evaluator for `class`, inherited if needed.
    pub fn get_derived_property(
        &self,
        schema: &Schema,
        class: &str,
        property: &str,
    ) -> Option<Derivation> {
        Self::walk(schema, class, |c| {
            self.derived
                .get(&(c.to_string(), property.to_string()))
                .map(|f| Derivation {
                    name: property.to_string(),
                    declared_in: Some(c.to_string()),
                    evaluator: f.clone(),
                })
        })
    }

    /// Validation constraint by name: class-scoped (inherited) first, then global.
    pub fn get_validation(&self, schema: &Schema, class: &str, constraint: &str) -> Option<Validation> {
        Self::walk(schema, class, |c| {
            self.validations
                .get(c)
                .and_then(|bucket| bucket.iter().find(|v| v.name == constraint).cloned())
        })
        .or_else(|| self.get_global_validation(constraint))
    }

    /// Global validation by name.
    pub fn get_global_validation(&self, constraint: &str) -> Option<Validation> {
        self.global.get(constraint).map(|f| Validation {
            name: constraint.to_string(),
            declared_in: None,
            evaluator: f.clone(),
        })
    }

    /// All class-scoped validations applying to `class`, direct and inherited.
    ///
    /// De-duplicated by name with the closest class winning; closest first.
    pub fn get_validation_constraints(&self, schema: &Schema, class: &str) -> Vec<Validation> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let lineage =
            std::iter::once(class).chain(schema.precedence(class).iter().map(String::as_str));
        for c in lineage {
            if let Some(bucket) = self.validations.get(c) {
                for validation in bucket.iter() {
                    if seen.insert(validation.name.clone()) {
                        result.push(validation.clone());
                    }
                }
            }
        }
        result
    }

    /// Evaluator of a derived association end.
    pub fn get_association_end(&self, association: &str, end: &str) -> Option<Derivation> {
        self.association_ends
            .get(&(association.to_string(), end.to_string()))
            .map(|f| Derivation {
                name: end.to_string(),
                declared_in: Some(association.to_string()),
                evaluator: f.clone(),
            })
    }

    /// Native operation body for `class`, inherited if needed.
    pub fn get_operation(&self, schema: &Schema, class: &str, operation: &str) -> Option<Derivation> {
        Self::walk(schema, class, |c| {
            self.operations
                .get(&(c.to_string(), operation.to_string()))
                .map(|f| Derivation {
                    name: operation.to_string(),
                    declared_in: Some(c.to_string()),
                    evaluator: f.clone(),
                })
        })
    }

    /// Total number of registered evaluators.
    pub fn len(&self) -> usize {
        self.derived.len()
            + self.validations.iter().map(|b| b.len()).sum::<usize>()
            + self.global.len()
            + self.association_ends.len()
            + self.operations.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
