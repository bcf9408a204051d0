//! Link maintenance and composite forest enforcement.

use super::{Engine, InstanceRef};
use crate::catalog::{EndBinding, EndSide};
use crate::error::{Error, Result, StateError};
use crate::storage::{Link, LinkId, ObjectId};
use std::collections::HashSet;
use tracing::debug;

impl Engine {
    /// Create a link, checking end types and upper bounds on both ends.
    ///
    /// An existing link with the same association, source and target is
    /// returned instead of creating a duplicate.
    pub fn create_link(&self, association: &str, source: ObjectId, target: ObjectId) -> Result<LinkId> {
        let assoc = self.schema().require_association(association)?;
        for (id, end) in [(source, &assoc.source), (target, &assoc.target)] {
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
        }
        if let Some(existing) = self.storage().find_edge(source, target, association) {
            return Ok(existing.id);
        }
        self.link_internal(association, source, target, false)
    }

    /// Remove the link of `association` from `source` to `target`.
    pub fn delete_link(&self, association: &str, source: ObjectId, target: ObjectId) -> Result<bool> {
        self.schema().require_association(association)?;
        match self.storage().find_edge(source, target, association) {
            Some(link) => {
                self.remove_link(&link)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Targets of the `association` links leaving `id`, in link order.
    pub fn get_linked_targets(&self, association: &str, id: ObjectId) -> Result<Vec<InstanceRef>> {
        self.schema().require_association(association)?;
        Ok(self
            .storage()
            .get_outgoing_edges(id, Some(association))
            .into_iter()
            .filter_map(|l| self.get_instance(l.target))
            .collect())
    }

    /// Sources of the `association` links entering `id`, in link order.
    pub fn get_linked_sources(&self, association: &str, id: ObjectId) -> Result<Vec<InstanceRef>> {
        self.schema().require_association(association)?;
        Ok(self
            .storage()
            .get_incoming_edges(id, Some(association))
            .into_iter()
            .filter_map(|l| self.get_instance(l.source))
            .collect())
    }

    /// The object `id` is a composite part of, if any.
    pub fn composite_owner(&self, id: ObjectId) -> Option<InstanceRef> {
        self.owner_links(id)
            .into_iter()
            .find_map(|(owner, _)| self.get_instance(owner))
    }

    /// Composite parts of `id`, in link order.
    pub fn composite_parts(&self, id: ObjectId) -> Vec<InstanceRef> {
        self.part_ids(id)
            .into_iter()
            .filter_map(|part| self.get_instance(part))
            .collect()
    }

    // ========== Internals ==========

    /// Links backing an end read from `id`, in link order.
    pub(crate) fn end_links(&self, id: ObjectId, binding: &EndBinding) -> Vec<Link> {
        if binding.reads_outgoing() {
            self.storage()
                .get_outgoing_edges(id, Some(&binding.association))
        } else {
            self.storage()
                .get_incoming_edges(id, Some(&binding.association))
        }
    }

    /// Object at the far side of a link read through `binding`.
    pub(crate) fn far_end(binding: &EndBinding, link: &Link) -> ObjectId {
        if binding.reads_outgoing() {
            link.target
        } else {
            link.source
        }
    }

    /// Ids reached through an end by the link index.
    pub(crate) fn linked_ids(&self, id: ObjectId, binding: &EndBinding) -> Vec<ObjectId> {
        self.end_links(id, binding)
            .iter()
            .map(|l| Self::far_end(binding, l))
            .collect()
    }

    /// Create a link after bound and forest checks.
    ///
    /// With `replace_single`, a full single-valued end gives up its current
    /// link instead of failing.
    pub(crate) fn link_internal(
        &self,
        association: &str,
        source: ObjectId,
        target: ObjectId,
        replace_single: bool,
    ) -> Result<LinkId> {
        let assoc = self.schema().require_association(association)?;
        let storage = self.storage();

        // The target end is read from the source object and vice versa.
        let occupancy = [
            (&assoc.target, storage.get_outgoing_edges(source, Some(association))),
            (&assoc.source, storage.get_incoming_edges(target, Some(association))),
        ];
        let mut displaced: Vec<Link> = Vec::new();
        for (end, existing) in occupancy {
            let count = existing.len() + 1;
            if !end.multiplicity.exceeds_upper(count) {
                continue;
            }
            if replace_single && end.multiplicity.upper == Some(1) {
                for link in existing {
                    if !displaced.iter().any(|d| d.id == link.id) {
                        displaced.push(link);
                    }
                }
            } else {
                return Err(StateError::Multiplicity {
                    property: end.name.clone(),
                    bounds: end.multiplicity.to_string(),
                    actual: count,
                }
                .into());
            }
        }

        self.check_forest(association, source, target, &displaced)?;
        for link in &displaced {
            self.remove_link(link)?;
        }

        let id = storage.allocate_link_id();
        storage.set_edge(Link::new(id, association, source, target))?;
        self.metrics.record_link_created();
        self.invalidate_link(source, target);
        debug!(link = %id, association, source = %source, target = %target, "link created");
        Ok(id)
    }

    /// Delete a stored link and invalidate around it.
    pub(crate) fn remove_link(&self, link: &Link) -> Result<()> {
        self.storage().delete_edge(link.id)?;
        self.metrics.record_links_removed(1);
        self.invalidate_link(link.source, link.target);
        debug!(link = %link.id, association = %link.association, "link removed");
        Ok(())
    }

    /// Composite owners of `id` with the links making them owners.
    fn owner_links(&self, id: ObjectId) -> Vec<(ObjectId, Link)> {
        let schema = self.schema();
        let storage = self.storage();
        let mut owners = Vec::new();
        for link in storage.get_incoming_edges(id, None) {
            if schema.is_composite_side(&link.association, EndSide::Target) {
                owners.push((link.source, link));
            }
        }
        for link in storage.get_outgoing_edges(id, None) {
            if schema.is_composite_side(&link.association, EndSide::Source) {
                owners.push((link.target, link));
            }
        }
        owners
    }

    /// Ids of the composite parts of `id`, without duplicates.
    pub(crate) fn part_ids(&self, id: ObjectId) -> Vec<ObjectId> {
        let schema = self.schema();
        let storage = self.storage();
        let outgoing = storage
            .get_outgoing_edges(id, None)
            .into_iter()
            .filter(|l| schema.is_composite_side(&l.association, EndSide::Target))
            .map(|l| l.target);
        let incoming = storage
            .get_incoming_edges(id, None)
            .into_iter()
            .filter(|l| schema.is_composite_side(&l.association, EndSide::Source))
            .map(|l| l.source);

        let mut parts = Vec::new();
        for part in outgoing.chain(incoming) {
            if !parts.contains(&part) {
                parts.push(part);
            }
        }
        parts
    }

    /// Reject links that would give a part a second owner or close an
    /// ownership cycle. Links in `displaced` are about to be removed.
    fn check_forest(
        &self,
        association: &str,
        source: ObjectId,
        target: ObjectId,
        displaced: &[Link],
    ) -> Result<()> {
        for side in [EndSide::Target, EndSide::Source] {
            if !self.schema().is_composite_side(association, side) {
                continue;
            }
            let (owner, part) = match side {
                EndSide::Target => (source, target),
                EndSide::Source => (target, source),
            };

            let other_owner = self
                .owner_links(part)
                .into_iter()
                .filter(|(_, link)| !displaced.iter().any(|d| d.id == link.id))
                .map(|(current, _)| current)
                .find(|current| *current != owner);
            if let Some(current) = other_owner {
                return Err(StateError::MultipleOwners {
                    part,
                    owner: current,
                }
                .into());
            }

            // Walk up from the prospective owner; reaching the part closes a cycle.
            let mut visited = HashSet::new();
            let mut cursor = Some(owner);
            while let Some(current) = cursor {
                if current == part {
                    return Err(StateError::OwnershipCycle { owner, part }.into());
                }
                if !visited.insert(current) {
                    break;
                }
                cursor = self.owner_links(current).first().map(|(o, _)| *o);
            }
        }
        Ok(())
    }
}
