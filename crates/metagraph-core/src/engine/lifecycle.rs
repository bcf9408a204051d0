//! Instance deletion with composite cascade.

use super::Engine;
use crate::error::{Result, StateError};
use crate::storage::ObjectId;
use std::collections::HashSet;
use tracing::{debug, instrument};

impl Engine {
    /// Delete an instance, its composite parts (recursively) and every link
    /// touching them.
    ///
    /// Returns `false` when `id` is unknown. The whole cascade is planned
    /// before anything is removed, so exceeding the depth limit deletes
    /// nothing.
    #[instrument(skip(self))]
    pub fn delete_instance(&self, id: ObjectId) -> Result<bool> {
        if !self.storage().contains_node(id) {
            return Ok(false);
        }

        let mut visited = HashSet::new();
        let mut plan = Vec::new();
        self.plan_cascade(id, 0, &mut visited, &mut plan)?;

        for target in plan {
            if !self.storage().contains_node(target) {
                continue;
            }
            self.invalidate(target);
            let removed = self.storage().delete_node_cascade(target)?;
            self.metrics.record_links_removed(removed.len() as u64);
            self.metrics.record_instance_deleted(target != id);
            debug!(id = %target, links = removed.len(), "instance deleted");
        }
        Ok(true)
    }

    /// Post-order walk over composite parts: parts before their owner.
    fn plan_cascade(
        &self,
        id: ObjectId,
        depth: usize,
        visited: &mut HashSet<ObjectId>,
        plan: &mut Vec<ObjectId>,
    ) -> Result<()> {
        if depth > self.config.max_cascade_depth {
            return Err(StateError::CascadeDepthExceeded { depth }.into());
        }
        if !visited.insert(id) {
            return Ok(());
        }
        for part in self.part_ids(id) {
            self.plan_cascade(part, depth + 1, visited, plan)?;
        }
        plan.push(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::model;
    use crate::engine::EngineConfig;
    use crate::error::{Error, StateError};
    use crate::storage::ObjectId;
    use crate::value::Value;

    #[test]
    fn test_cascade_removes_parts_and_links() {
        let engine = model();
        let root = engine.create_instance("Package").unwrap();
        let nested = engine.create_instance("Package").unwrap();
        let leaf = engine.create_instance("Feature").unwrap();
        let bystander = engine.create_instance("Feature").unwrap();

        engine.set_property(root.id, "ownedMember", Value::refs([nested.id])).unwrap();
        engine.set_property(nested.id, "ownedMember", Value::refs([leaf.id])).unwrap();
        engine.set_property(bystander.id, "related", Value::refs([leaf.id])).unwrap();

        assert!(engine.delete_instance(root.id).unwrap());
        for gone in [&root, &nested, &leaf] {
            assert!(engine.get_instance(gone.id).is_none());
        }
        assert!(engine.get_instance(bystander.id).is_some());
        assert_eq!(engine.storage().edge_count(), 0);
        assert_eq!(
            engine.get_property_value(&bystander, "related").unwrap(),
            Value::List(vec![])
        );
        assert_eq!(engine.metrics().instances_deleted(), 3);
        assert_eq!(engine.metrics().cascade_deletes(), 2);
        engine.storage().verify_indexes().unwrap();
    }

    #[test]
    fn test_unknown_id() {
        let engine = model();
        assert!(!engine.delete_instance(ObjectId::new(42)).unwrap());
    }

    #[test]
    fn test_depth_limit_deletes_nothing() {
        let engine = model().with_config(EngineConfig::new().with_max_cascade_depth(1));
        let a = engine.create_instance("Package").unwrap();
        let b = engine.create_instance("Package").unwrap();
        let c = engine.create_instance("Package").unwrap();
        engine.set_property(a.id, "ownedMember", Value::refs([b.id])).unwrap();
        engine.set_property(b.id, "ownedMember", Value::refs([c.id])).unwrap();

        assert!(matches!(
            engine.delete_instance(a.id),
            Err(Error::State(StateError::CascadeDepthExceeded { depth: 2 }))
        ));
        assert_eq!(engine.storage().node_count(), 3);

        // Deleting one level down stays within the limit.
        assert!(engine.delete_instance(b.id).unwrap());
        assert_eq!(engine.storage().node_count(), 1);
    }
}
