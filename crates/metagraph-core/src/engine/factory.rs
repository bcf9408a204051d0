//! Class-keyed instance initializers.

use crate::catalog::Schema;
use crate::storage::{Object, ObjectId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Initializes a freshly allocated object.
pub type InitializerFn = Arc<dyn Fn(&Schema, &mut Object) + Send + Sync>;

/// Table from class name to initializer.
///
/// The initializer of the closest class in the lineage runs; classes with
/// none anywhere in their lineage get [`InstanceFactory::default_initialize`].
#[derive(Clone, Default)]
pub struct InstanceFactory {
    initializers: HashMap<String, InitializerFn>,
}

impl fmt::Debug for InstanceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<&String> = self.initializers.keys().collect();
        classes.sort();
        f.debug_struct("InstanceFactory")
            .field("classes", &classes)
            .finish()
    }
}

impl InstanceFactory {
    /// Create a factory with no custom initializers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the initializer for a class and its subclasses.
    pub fn register<F>(mut self, class: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Schema, &mut Object) + Send + Sync + 'static,
    {
        self.initializers.insert(class.into(), Arc::new(f));
        self
    }

    /// Class whose initializer applies to `class`, if any.
    pub fn resolve<'a>(&self, schema: &'a Schema, class: &'a str) -> Option<&'a str> {
        std::iter::once(class)
            .chain(schema.precedence(class).iter().map(String::as_str))
            .find(|c| self.initializers.contains_key(*c))
    }

    /// Build an initialized object of `class`.
    pub fn instantiate(&self, schema: &Schema, class: &str, id: ObjectId) -> Object {
        let mut object = Object::new(id, class);
        match self
            .resolve(schema, class)
            .and_then(|c| self.initializers.get(c))
        {
            Some(init) => init(schema, &mut object),
            None => Self::default_initialize(schema, &mut object),
        }
        object
    }

    /// Assign declared defaults, and zero values to required attributes.
    pub fn default_initialize(schema: &Schema, object: &mut Object) {
        for attribute in schema.attributes(&object.class) {
            if let Some(value) = attribute.initial_value() {
                object.set(attribute.name.clone(), value);
            }
        }
    }
}
