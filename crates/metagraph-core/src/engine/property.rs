//! Derivation-aware property reads and validated writes.

use super::{Engine, InstanceRef};
use crate::catalog::{EndBinding, MetaAssociationEnd, MetaProperty, ValueType};
use crate::constraint::EvalContext;
use crate::error::{Error, Result, SchemaError, StateError};
use crate::storage::ObjectId;
use crate::value::Value;
use tracing::debug;

impl Engine {
    /// Value of a property or end by object id.
    ///
    /// `None` for an unknown object or an empty value.
    pub fn get_property(&self, id: ObjectId, name: &str) -> Result<Option<Value>> {
        let Some(handle) = self.get_instance(id) else {
            return Ok(None);
        };
        let value = self.get_property_value(&handle, name)?;
        let empty = value.is_null() || value.as_list().is_some_and(|items| items.is_empty());
        Ok((!empty).then_some(value))
    }

    /// Value of a property or association end.
    ///
    /// Attributes read raw storage or their derivation; ends read the link
    /// indexes, their `#opposite` inverse or their derivation. Single-valued
    /// results are scalars (`Null` when empty), multi-valued ones lists.
    pub fn get_property_value(&self, handle: &InstanceRef, name: &str) -> Result<Value> {
        let class = self
            .storage()
            .node_class(handle.id)
            .ok_or(Error::InstanceNotFound(handle.id))?;
        let handle = InstanceRef::new(handle.id, class);

        if let Some(attribute) = self.schema().find_attribute(&handle.class, name) {
            return self.read_attribute(&handle, attribute);
        }
        if let Some(binding) = self.schema().find_end(&handle.class, name) {
            return self.read_end(&handle, binding);
        }
        Err(SchemaError::UnknownProperty {
            class: handle.class,
            property: name.to_string(),
        }
        .into())
    }

    /// Write a property or association end.
    ///
    /// End writes maintain the underlying links: omitted values lose their
    /// link, new ones gain one, and writing the current value is a no-op.
    pub fn set_property(&self, id: ObjectId, name: &str, value: impl Into<Value>) -> Result<()> {
        let handle = self.require_instance(id)?;
        if let Some(attribute) = self.schema().find_attribute(&handle.class, name) {
            return self.write_attribute(&handle, attribute, value.into());
        }
        if let Some(binding) = self.schema().find_end(&handle.class, name) {
            return self.write_end(&handle, binding, value.into());
        }
        Err(SchemaError::UnknownProperty {
            class: handle.class,
            property: name.to_string(),
        }
        .into())
    }

    // ========== Reads ==========

    fn read_attribute(&self, handle: &InstanceRef, attribute: &MetaProperty) -> Result<Value> {
        if attribute.derived {
            let derivation = self
                .constraints()
                .get_derived_property(self.schema(), &handle.class, &attribute.name)
                .ok_or_else(|| SchemaError::MissingEvaluator {
                    class: handle.class.clone(),
                    property: attribute.name.clone(),
                })?;
            return self.cached_or_compute(handle, &attribute.name, || {
                let ctx = EvalContext::new(self, handle.clone(), &[]);
                (derivation.evaluator)(&ctx)
            });
        }

        let raw = self
            .storage()
            .with_node(handle.id, |n| n.get(&attribute.name).cloned())
            .flatten();
        Ok(match raw {
            Some(value) => value,
            None if attribute.is_many() => Value::List(Vec::new()),
            None => Value::Null,
        })
    }

    fn read_end(&self, handle: &InstanceRef, binding: &EndBinding) -> Result<Value> {
        let indexed = binding.is_stored()
            || (binding.end.is_opposite() && !binding.opposite.is_derived());
        if indexed {
            let mut ids = self.linked_ids(handle.id, binding);
            for subsetter in &binding.subsetted_by {
                ids.extend(self.get_property_value(handle, subsetter)?.ref_ids());
            }
            return Ok(shape_end(&binding.end, ids));
        }

        let compute = || {
            let ids = self.derive_end(handle, binding)?;
            Ok(shape_end(&binding.end, ids))
        };
        if binding.end.is_opposite() {
            // The scan reads candidates that need not be linked to `handle`.
            self.cached_if_global(handle, &binding.cache_key(), compute)
        } else {
            self.cached_or_compute(handle, &binding.cache_key(), compute)
        }
    }

    fn derive_end(&self, handle: &InstanceRef, binding: &EndBinding) -> Result<Vec<ObjectId>> {
        if binding.end.is_opposite() {
            // Paired end is derived too: scan its possible readers.
            let mut ids = Vec::new();
            for candidate in self.get_instances_by_type(&binding.end.class) {
                let paired = self.get_property_value(&candidate, &binding.opposite.name)?;
                if paired.contains_ref(handle.id) {
                    ids.push(candidate.id);
                }
            }
            return Ok(ids);
        }

        let derivation = self
            .constraints()
            .get_association_end(&binding.association, &binding.end.name)
            .or_else(|| {
                self.constraints()
                    .get_derived_property(self.schema(), &handle.class, &binding.end.name)
            })
            .ok_or_else(|| SchemaError::MissingEvaluator {
                class: handle.class.clone(),
                property: binding.end.name.clone(),
            })?;
        let ctx = EvalContext::new(self, handle.clone(), &[]);
        Ok((derivation.evaluator)(&ctx)?.ref_ids())
    }

    // ========== Writes ==========

    fn write_attribute(&self, handle: &InstanceRef, attribute: &MetaProperty, value: Value) -> Result<()> {
        if attribute.derived {
            return Err(StateError::DerivedProperty {
                class: handle.class.clone(),
                property: attribute.name.clone(),
            }
            .into());
        }
        let value = self.check_attribute_value(attribute, value)?;

        let current = self
            .storage()
            .with_node(handle.id, |n| n.get(&attribute.name).cloned())
            .flatten();
        let unchanged = match &current {
            Some(existing) => *existing == value,
            None => value.is_null(),
        };
        if unchanged {
            return Ok(());
        }
        if attribute.read_only && current.is_some() {
            return Err(StateError::ReadOnly {
                class: handle.class.clone(),
                property: attribute.name.clone(),
            }
            .into());
        }

        self.storage()
            .update_node(handle.id, |n| n.set(attribute.name.clone(), value))?;
        self.invalidate(handle.id);
        debug!(id = %handle.id, property = %attribute.name, "attribute written");
        Ok(())
    }

    /// Bring a written value into the attribute's shape and check it.
    fn check_attribute_value(&self, attribute: &MetaProperty, value: Value) -> Result<Value> {
        let mut items = value.into_items();
        if attribute.is_many() && attribute.unique {
            dedup(&mut items);
        }
        if attribute.multiplicity.exceeds_upper(items.len()) {
            return Err(StateError::Multiplicity {
                property: attribute.name.clone(),
                bounds: attribute.multiplicity.to_string(),
                actual: items.len(),
            }
            .into());
        }
        for item in &items {
            self.check_item_type(&attribute.name, &attribute.value_type, item)?;
        }

        if attribute.is_many() {
            Ok(Value::List(items))
        } else {
            Ok(items.into_iter().next().unwrap_or_default())
        }
    }

    fn check_item_type(&self, property: &str, expected: &ValueType, item: &Value) -> Result<()> {
        let accepted = match (expected, item) {
            (ValueType::Any, _) => true,
            (ValueType::Boolean, Value::Bool(_)) => true,
            (ValueType::Integer, Value::Int(_)) => true,
            (ValueType::Real, Value::Float(_) | Value::Int(_)) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::Reference(class), Value::Ref(id)) => {
                let found = self
                    .storage()
                    .node_class(*id)
                    .ok_or(Error::InstanceNotFound(*id))?;
                if !self.schema().conforms_to(&found, class) {
                    return Err(StateError::TypeMismatch {
                        property: property.to_string(),
                        expected: expected.to_string(),
                        found,
                    }
                    .into());
                }
                true
            }
            _ => false,
        };
        if accepted {
            Ok(())
        } else {
            Err(StateError::TypeMismatch {
                property: property.to_string(),
                expected: expected.to_string(),
                found: item.kind().to_string(),
            }
            .into())
        }
    }

    fn write_end(&self, handle: &InstanceRef, binding: &EndBinding, value: Value) -> Result<()> {
        let end = &binding.end;
        if !binding.is_stored() {
            return Err(StateError::DerivedProperty {
                class: handle.class.clone(),
                property: end.name.clone(),
            }
            .into());
        }

        let mut wanted = Vec::new();
        for item in value.into_items() {
            let Some(id) = item.as_ref_id() else {
                return Err(StateError::TypeMismatch {
                    property: end.name.clone(),
                    expected: ValueType::reference(end.class.as_str()).to_string(),
                    found: item.kind().to_string(),
                }
                .into());
            };
            let class = self
                .storage()
                .node_class(id)
                .ok_or(Error::InstanceNotFound(id))?;
            if !self.schema().conforms_to(&class, &end.class) {
                return Err(StateError::TypeMismatch {
                    property: end.name.clone(),
                    expected: end.class.clone(),
                    found: class,
                }
                .into());
            }
            wanted.push(id);
        }
        if end.unique {
            dedup(&mut wanted);
        }
        if end.multiplicity.exceeds_upper(wanted.len()) {
            return Err(StateError::Multiplicity {
                property: end.name.clone(),
                bounds: end.multiplicity.to_string(),
                actual: wanted.len(),
            }
            .into());
        }

        let current = self.end_links(handle.id, binding);
        let current_ids: Vec<ObjectId> = current.iter().map(|l| Self::far_end(binding, l)).collect();
        if current_ids == wanted {
            return Ok(());
        }

        // Match wanted values against existing links as a multiset.
        let mut keep = vec![false; current.len()];
        let mut additions = Vec::new();
        for &target in &wanted {
            let matched = (0..current.len()).find(|&i| !keep[i] && current_ids[i] == target);
            match matched {
                Some(i) => keep[i] = true,
                None => additions.push(target),
            }
        }
        if end.ordered {
            let resulting: Vec<ObjectId> = current_ids
                .iter()
                .zip(&keep)
                .filter(|(_, kept)| **kept)
                .map(|(id, _)| *id)
                .chain(additions.iter().copied())
                .collect();
            if resulting != wanted {
                keep.fill(false);
                additions = wanted.clone();
            }
        }

        for (link, kept) in current.iter().zip(&keep) {
            if !kept {
                self.remove_link(link)?;
            }
        }
        for target in additions {
            let (source, target) = binding.link_endpoints(handle.id, target);
            self.link_internal(&binding.association, source, target, true)?;
        }
        debug!(id = %handle.id, end = %end.name, values = wanted.len(), "end written");
        Ok(())
    }
}

/// Shape the ids reached through an end into its value.
fn shape_end(end: &MetaAssociationEnd, mut ids: Vec<ObjectId>) -> Value {
    if end.unique {
        dedup(&mut ids);
    }
    if end.multiplicity.is_many() {
        Value::refs(ids)
    } else {
        ids.first().map_or(Value::Null, |id| Value::Ref(*id))
    }
}

/// Drop repeated elements, keeping first occurrences in order.
fn dedup<T: PartialEq>(items: &mut Vec<T>) {
    let mut i = 0;
    while i < items.len() {
        if items[..i].contains(&items[i]) {
            items.remove(i);
        } else {
            i += 1;
        }
    }
}
