//! Instance validation.

use super::{Engine, InstanceRef};
use crate::constraint::EvalContext;
use crate::storage::ObjectId;
use std::fmt;
use tracing::{debug, warn};

/// Constraint name reported by the built-in lower-bound check.
pub const LOWER_BOUND_CONSTRAINT: &str = "lowerBound";

/// A failed validation constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationViolation {
    /// Constraint name.
    pub constraint: String,
    /// Offending object.
    pub object: ObjectId,
    /// Class of the offending object.
    pub class: String,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}: {}",
            self.class, self.object, self.constraint, self.message
        )
    }
}

impl Engine {
    /// Run every constraint applying to an instance and collect violations.
    ///
    /// Applies the class-scoped constraints registered on the class and its
    /// ancestors, plus every declared constraint name with a global
    /// evaluator. Evaluator errors are reported as violations. Unknown ids
    /// yield no violations.
    pub fn validate_instance(&self, id: ObjectId) -> Vec<ValidationViolation> {
        let Some(handle) = self.get_instance(id) else {
            return Vec::new();
        };
        let schema = self.schema();
        let mut checks = self
            .constraints()
            .get_validation_constraints(schema, &handle.class);
        for declared in schema.constraint_decls(&handle.class) {
            let name = &declared.decl.name;
            if checks.iter().any(|c| c.name == *name) {
                continue;
            }
            match self.constraints().get_validation(schema, &handle.class, name) {
                Some(check) => checks.push(check),
                None => warn!(
                    class = %handle.class,
                    declared_in = %declared.declared_in,
                    constraint = %name,
                    "declared constraint has no evaluator"
                ),
            }
        }

        let ctx = EvalContext::new(self, handle.clone(), &[]);
        let mut violations = Vec::new();
        for check in &checks {
            let message = match (check.evaluator)(&ctx) {
                Ok(true) => continue,
                Ok(false) => format!("constraint '{}' violated", check.name),
                Err(err) => err.to_string(),
            };
            violations.push(ValidationViolation {
                constraint: check.name.clone(),
                object: handle.id,
                class: handle.class.clone(),
                message,
            });
        }
        if self.config.check_lower_bounds {
            violations.extend(self.lower_bound_violations(&handle));
        }

        self.metrics.record_validation(violations.len() as u64);
        debug!(id = %id, checks = checks.len(), violations = violations.len(), "instance validated");
        violations
    }

    /// Required attributes and stored ends holding fewer values than their
    /// lower bound.
    fn lower_bound_violations(&self, handle: &InstanceRef) -> Vec<ValidationViolation> {
        let schema = self.schema();
        let mut shortfalls: Vec<(String, u32, usize)> = Vec::new();

        for attribute in schema.attributes(&handle.class) {
            if attribute.derived || !attribute.multiplicity.is_required() {
                continue;
            }
            let count = self
                .storage()
                .with_node(handle.id, |n| n.get(&attribute.name).map_or(0, |v| v.cardinality()))
                .unwrap_or(0);
            if count < attribute.multiplicity.lower as usize {
                shortfalls.push((attribute.name.clone(), attribute.multiplicity.lower, count));
            }
        }
        for binding in schema.ends(&handle.class) {
            if !binding.is_stored() || !binding.end.multiplicity.is_required() {
                continue;
            }
            let count = self.end_links(handle.id, binding).len();
            if count < binding.end.multiplicity.lower as usize {
                shortfalls.push((binding.end.name.clone(), binding.end.multiplicity.lower, count));
            }
        }

        shortfalls
            .into_iter()
            .map(|(property, lower, count)| ValidationViolation {
                constraint: LOWER_BOUND_CONSTRAINT.to_string(),
                object: handle.id,
                class: handle.class.clone(),
                message: format!("'{property}' requires at least {lower} values, has {count}"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        MetaAssociation, MetaAssociationEnd, MetaClass, MetaProperty, Multiplicity, SchemaRegistry,
        ValueType,
    };
    use crate::engine::EngineConfig;
    use crate::error::{Error, StateError};
    use crate::value::Value;

    fn engine(config: EngineConfig) -> Engine {
        let mut registry = SchemaRegistry::new();
        registry
            .register_class(
                MetaClass::new("Element")
                    .with_attribute(MetaProperty::new("name", ValueType::String))
                    .with_constraint("nameRequired"),
            )
            .unwrap();
        registry
            .register_class(
                MetaClass::new("Feature")
                    .extends("Element")
                    .with_attribute(MetaProperty::new("lower", ValueType::Integer))
                    .with_constraint("undeclaredEvaluator"),
            )
            .unwrap();
        registry
            .register_association(MetaAssociation::new(
                "FeatureTyping",
                MetaAssociationEnd::new("typedFeature", "Feature")
                    .with_multiplicity(Multiplicity::many())
                    .non_navigable()
                    .opposite(),
                MetaAssociationEnd::new("type", "Element").with_multiplicity(Multiplicity::at_least_one()),
            ))
            .unwrap();
        Engine::with_schema(registry.build_indexes().unwrap()).with_config(config)
    }

    #[test]
    fn test_class_and_global_constraints() {
        let engine = engine(EngineConfig::new());
        engine
            .constraints()
            .register_global_validation("nameRequired", |ctx| Ok(!ctx.get("name")?.is_null()));
        engine.constraints().register_validation("Feature", "lowerNonNegative", |ctx| {
            Ok(ctx.get("lower")?.as_int().map_or(true, |l| l >= 0))
        });

        let f = engine.create_instance("Feature").unwrap();
        engine.set_property(f.id, "lower", -1i64).unwrap();

        let mut names: Vec<String> = engine
            .validate_instance(f.id)
            .into_iter()
            .map(|v| v.constraint)
            .collect();
        names.sort();
        assert_eq!(names, vec!["lowerNonNegative", "nameRequired"]);

        engine.set_property(f.id, "name", "ok").unwrap();
        engine.set_property(f.id, "lower", 1i64).unwrap();
        assert!(engine.validate_instance(f.id).is_empty());
        assert_eq!(engine.metrics().validations_run(), 2);
        assert_eq!(engine.metrics().violations_found(), 2);
    }

    #[test]
    fn test_evaluator_error_becomes_violation() {
        let engine = engine(EngineConfig::new());
        engine.constraints().register_validation("Element", "failing", |_| {
            Err(Error::State(StateError::ArityMismatch {
                operation: "x".into(),
                expected: 0,
                actual: 1,
            }))
        });
        let e = engine.create_instance("Element").unwrap();
        let violations = engine.validate_instance(e.id);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint, "failing");
        assert!(violations[0].message.contains("takes 0 arguments"));
        assert!(violations[0].to_string().starts_with("Element obj#"));
    }

    #[test]
    fn test_diamond_constraint_resolves_to_closer_class() {
        let mut registry = SchemaRegistry::new();
        registry.register_class(MetaClass::new("A")).unwrap();
        registry.register_class(MetaClass::new("B").extends("A")).unwrap();
        registry.register_class(MetaClass::new("C").extends("A")).unwrap();
        registry
            .register_class(MetaClass::new("D").extends("B").extends("C"))
            .unwrap();
        let engine = Engine::with_schema(registry.build_indexes().unwrap());
        engine.constraints().register_validation("A", "shared", |_| Ok(false));
        engine.constraints().register_validation("C", "shared", |_| Ok(true));

        let d = engine.create_instance("D").unwrap();
        assert!(engine.validate_instance(d.id).is_empty());

        let b = engine.create_instance("B").unwrap();
        let violations = engine.validate_instance(b.id);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint, "shared");
    }

    #[test]
    fn test_unknown_instance_has_no_violations() {
        let engine = engine(EngineConfig::new());
        assert!(engine.validate_instance(ObjectId::new(7)).is_empty());
    }

    #[test]
    fn test_lower_bound_checks() {
        let engine = engine(EngineConfig::new().with_lower_bound_checks());
        let f = engine.create_instance("Feature").unwrap();
        let ty = engine.create_instance("Element").unwrap();

        let violations = engine.validate_instance(f.id);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint, LOWER_BOUND_CONSTRAINT);
        assert!(violations[0].message.contains("'type'"));

        engine.set_property(f.id, "type", Value::refs([ty.id])).unwrap();
        assert!(engine.validate_instance(f.id).is_empty());
    }
}
