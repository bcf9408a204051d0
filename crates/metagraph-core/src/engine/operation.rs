//! Operation dispatch.

use super::Engine;
use crate::catalog::OperationBody;
use crate::constraint::EvalContext;
use crate::error::{Result, SchemaError, StateError};
use crate::storage::ObjectId;
use crate::value::Value;
use tracing::debug;

impl Engine {
    /// Invoke an operation on an instance.
    ///
    /// The closest declaration in the class lineage decides the arity and
    /// body kind; native and abstract bodies run the closest registered
    /// implementation.
    pub fn invoke_operation(&self, id: ObjectId, name: &str, args: &[Value]) -> Result<Value> {
        let handle = self.require_instance(id)?;
        let resolved = self
            .schema()
            .find_operation(&handle.class, name)
            .ok_or_else(|| SchemaError::UnknownOperation {
                class: handle.class.clone(),
                operation: name.to_string(),
            })?;
        let operation = &resolved.operation;
        if args.len() != operation.parameters.len() {
            return Err(StateError::ArityMismatch {
                operation: name.to_string(),
                expected: operation.parameters.len(),
                actual: args.len(),
            }
            .into());
        }

        self.metrics.record_operation();
        debug!(id = %id, operation = name, declared_in = %resolved.declared_in, "operation invoked");

        if let OperationBody::Reference(property) = &operation.body {
            return self.get_property_value(&handle, property);
        }
        match self.constraints().get_operation(self.schema(), &handle.class, name) {
            Some(body) => {
                let ctx = EvalContext::new(self, handle.clone(), args);
                (body.evaluator)(&ctx)
            }
            None if operation.body == OperationBody::Abstract => Err(SchemaError::AbstractOperation {
                class: resolved.declared_in.clone(),
                operation: name.to_string(),
            }
            .into()),
            None => Err(SchemaError::MissingImplementation {
                class: handle.class.clone(),
                operation: name.to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MetaClass, MetaOperation, MetaProperty, SchemaRegistry, ValueType};
    use crate::error::Error;

    fn engine() -> Engine {
        let mut registry = SchemaRegistry::new();
        registry
            .register_class(
                MetaClass::new_abstract("Element")
                    .with_attribute(MetaProperty::new("name", ValueType::String))
                    .with_operation(MetaOperation::reference("label", "name"))
                    .with_operation(MetaOperation::abstract_op("kind"))
                    .with_operation(
                        MetaOperation::native("greet")
                            .with_parameter("greeting")
                            .returns(ValueType::String),
                    ),
            )
            .unwrap();
        registry.register_class(MetaClass::new("Feature").extends("Element")).unwrap();
        registry.register_class(MetaClass::new("Usage").extends("Feature")).unwrap();
        Engine::with_schema(registry.build_indexes().unwrap())
    }

    #[test]
    fn test_reference_body() {
        let engine = engine();
        let f = engine.create_instance("Feature").unwrap();
        engine.set_property(f.id, "name", "mass").unwrap();
        assert_eq!(engine.invoke_operation(f.id, "label", &[]).unwrap(), Value::from("mass"));
        assert_eq!(engine.metrics().operations_invoked(), 1);
    }

    #[test]
    fn test_native_body_inherited() {
        let engine = engine();
        engine.constraints().register_operation("Element", "greet", |ctx| {
            let greeting = ctx.args()[0].as_str().unwrap_or_default().to_string();
            let name = ctx.get("name")?;
            Ok(Value::from(format!("{greeting}, {}", name.as_str().unwrap_or("?"))))
        });
        let u = engine.create_instance("Usage").unwrap();
        engine.set_property(u.id, "name", "wheel").unwrap();
        assert_eq!(
            engine.invoke_operation(u.id, "greet", &[Value::from("hello")]).unwrap(),
            Value::from("hello, wheel")
        );
    }

    #[test]
    fn test_dispatch_errors() {
        let engine = engine();
        let f = engine.create_instance("Feature").unwrap();

        assert!(matches!(
            engine.invoke_operation(f.id, "missing", &[]),
            Err(Error::Schema(SchemaError::UnknownOperation { .. }))
        ));
        assert!(matches!(
            engine.invoke_operation(f.id, "greet", &[]),
            Err(Error::State(StateError::ArityMismatch { expected: 1, actual: 0, .. }))
        ));
        assert!(matches!(
            engine.invoke_operation(f.id, "greet", &[Value::from("hi")]),
            Err(Error::Schema(SchemaError::MissingImplementation { .. }))
        ));
        assert!(matches!(
            engine.invoke_operation(f.id, "kind", &[]),
            Err(Error::Schema(SchemaError::AbstractOperation { ref class, .. })) if class == "Element"
        ));
    }

    #[test]
    fn test_abstract_operation_with_subclass_body() {
        let engine = engine();
        engine
            .constraints()
            .register_operation("Usage", "kind", |_| Ok(Value::from("usage")));
        let u = engine.create_instance("Usage").unwrap();
        let f = engine.create_instance("Feature").unwrap();
        assert_eq!(engine.invoke_operation(u.id, "kind", &[]).unwrap(), Value::from("usage"));
        assert!(engine.invoke_operation(f.id, "kind", &[]).is_err());
    }
}
