//! Stored objects (graph nodes).

use super::ObjectId;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// A cached derived value, valid while both stamps match.
#[derive(Debug, Clone, PartialEq)]
struct CachedValue {
    epoch: u64,
    generation: u64,
    value: Value,
}

/// An instance of a class.
///
/// Holds raw attribute values only; association ends live in the edge
/// indexes. Derived values are memoized in a computed-value cache stamped
/// with the object's epoch and the engine generation at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Object id.
    pub id: ObjectId,
    /// Class name.
    pub class: String,
    /// Raw attribute values.
    pub properties: BTreeMap<String, Value>,
    computed: HashMap<String, CachedValue>,
    epoch: u64,
}

impl Object {
    /// Create an object with no property values.
    pub fn new(id: ObjectId, class: impl Into<String>) -> Self {
        Self {
            id,
            class: class.into(),
            properties: BTreeMap::new(),
            computed: HashMap::new(),
            epoch: 0,
        }
    }

    /// Create an object with the given property values.
    pub fn with_properties(
        id: ObjectId,
        class: impl Into<String>,
        properties: BTreeMap<String, Value>,
    ) -> Self {
        let mut object = Self::new(id, class);
        object.properties = properties;
        object
    }

    /// Raw value of a property.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Write a raw value. Writing `Null` clears the property.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if value.is_null() {
            self.properties.remove(&name);
        } else {
            self.properties.insert(name, value);
        }
    }

    /// Current cache epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Invalidate every cached value of this object.
    pub fn bump_epoch(&mut self) {
        self.epoch += 1;
        self.computed.clear();
    }

    /// Cached value under `key`, if it is still current.
    pub fn cached(&self, key: &str, generation: u64) -> Option<&Value> {
        self.computed
            .get(key)
            .filter(|c| c.epoch == self.epoch && c.generation == generation)
            .map(|c| &c.value)
    }

    /// Store a computed value stamped with `epoch` and `generation`.
    ///
    /// Ignored when the object changed since `epoch` was read.
    pub fn store_cached(&mut self, key: impl Into<String>, epoch: u64, generation: u64, value: Value) {
        if epoch != self.epoch {
            return;
        }
        self.computed.insert(
            key.into(),
            CachedValue {
                epoch,
                generation,
                value,
            },
        );
    }

    /// Number of cached entries.
    pub fn cached_len(&self) -> usize {
        self.computed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_null_clears() {
        let mut obj = Object::new(ObjectId::new(1), "Element");
        obj.set("name", Value::from("a"));
        assert_eq!(obj.get("name"), Some(&Value::from("a")));
        obj.set("name", Value::Null);
        assert!(obj.get("name").is_none());
    }

    #[test]
    fn test_cache_stamps() {
        let mut obj = Object::new(ObjectId::new(1), "Element");
        obj.store_cached("qualifiedName", obj.epoch(), 0, Value::from("A::b"));
        assert_eq!(obj.cached("qualifiedName", 0), Some(&Value::from("A::b")));
        assert!(obj.cached("qualifiedName", 1).is_none());

        let stale_epoch = obj.epoch();
        obj.bump_epoch();
        assert!(obj.cached("qualifiedName", 0).is_none());
        assert_eq!(obj.cached_len(), 0);

        obj.store_cached("qualifiedName", stale_epoch, 0, Value::from("old"));
        assert_eq!(obj.cached_len(), 0);
    }
}
