//! In-memory graph store with id, type and directional indexes.
//!
//! ## Index families
//!
//! ```text
//! nodes          ObjectId -> Object
//! edges          LinkId   -> Link
//! nodes_by_type  class       -> [ObjectId]   (insertion order)
//! edges_by_type  association -> [LinkId]     (insertion order)
//! outgoing       source -> association -> [LinkId]
//! incoming       target -> association -> [LinkId]
//! ```
//!
//! Reads go straight to the sharded maps. Structural mutations (node insert
//! or removal, edge insert or removal) serialize on a writer lock so the
//! index families move in lockstep.

use super::edge::Link;
use super::id::IdAllocator;
use super::node::Object;
use super::{LinkId, ObjectId};
use crate::error::StorageError;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Edges of one node in one direction.
#[derive(Debug, Clone, Default)]
struct Adjacency {
    all: Vec<LinkId>,
    by_association: HashMap<String, Vec<LinkId>>,
}

impl Adjacency {
    fn push(&mut self, link: &Link) {
        self.all.push(link.id);
        self.by_association
            .entry(link.association.clone())
            .or_default()
            .push(link.id);
    }

    fn remove(&mut self, link: &Link) {
        self.all.retain(|id| *id != link.id);
        if let Some(bucket) = self.by_association.get_mut(&link.association) {
            bucket.retain(|id| *id != link.id);
            if bucket.is_empty() {
                self.by_association.remove(&link.association);
            }
        }
    }

    fn ids(&self, association: Option<&str>) -> Vec<LinkId> {
        match association {
            Some(name) => self.by_association.get(name).cloned().unwrap_or_default(),
            None => self.all.clone(),
        }
    }
}

/// Concurrent, schema-agnostic object graph.
#[derive(Debug)]
pub struct GraphStore {
    nodes: DashMap<ObjectId, Object>,
    edges: DashMap<LinkId, Link>,
    nodes_by_type: DashMap<String, Vec<ObjectId>>,
    edges_by_type: DashMap<String, Vec<LinkId>>,
    outgoing: DashMap<ObjectId, Adjacency>,
    incoming: DashMap<ObjectId, Adjacency>,
    ids: IdAllocator,
    writer: Mutex<()>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            edges: DashMap::new(),
            nodes_by_type: DashMap::new(),
            edges_by_type: DashMap::new(),
            outgoing: DashMap::new(),
            incoming: DashMap::new(),
            ids: IdAllocator::new(),
            writer: Mutex::new(()),
        }
    }

    /// Reserve a fresh object id.
    pub fn allocate_object_id(&self) -> ObjectId {
        self.ids.next_object()
    }

    /// Reserve a fresh link id.
    pub fn allocate_link_id(&self) -> LinkId {
        self.ids.next_link()
    }

    // ========== Nodes ==========

    /// Get a copy of a node.
    pub fn get_node(&self, id: ObjectId) -> Option<Object> {
        self.nodes.get(&id).map(|n| n.clone())
    }

    /// Run `f` against a node without copying it.
    pub fn with_node<R>(&self, id: ObjectId, f: impl FnOnce(&Object) -> R) -> Option<R> {
        self.nodes.get(&id).map(|n| f(&n))
    }

    /// Whether a node exists.
    pub fn contains_node(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Class of a node.
    pub fn node_class(&self, id: ObjectId) -> Option<String> {
        self.nodes.get(&id).map(|n| n.class.clone())
    }

    /// Insert or replace a node.
    ///
    /// Replacing keeps the class fixed; a different class is rejected.
    pub fn set_node(&self, object: Object) -> Result<(), StorageError> {
        let _guard = self.writer.lock();
        let existing = self.nodes.get(&object.id).map(|n| n.class.clone());
        match existing {
            Some(class) if class != object.class => Err(StorageError::ClassChange {
                id: object.id,
                from: class,
                to: object.class,
            }),
            Some(_) => {
                self.nodes.insert(object.id, object);
                Ok(())
            }
            None => {
                self.ids.observe_object(object.id);
                self.nodes_by_type
                    .entry(object.class.clone())
                    .or_default()
                    .push(object.id);
                debug!(id = %object.id, class = %object.class, "node inserted");
                self.nodes.insert(object.id, object);
                Ok(())
            }
        }
    }

    /// Mutate a node in place.
    pub fn update_node<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&mut Object) -> R,
    ) -> Result<R, StorageError> {
        let mut node = self
            .nodes
            .get_mut(&id)
            .ok_or(StorageError::NodeNotFound(id))?;
        Ok(f(&mut node))
    }

    /// Remove a node that no longer has edges.
    pub fn delete_node(&self, id: ObjectId) -> Result<Object, StorageError> {
        let _guard = self.writer.lock();
        if !self.nodes.contains_key(&id) {
            return Err(StorageError::NodeNotFound(id));
        }
        let edges = self.degree(id);
        if edges > 0 {
            return Err(StorageError::NodeHasEdges { node: id, edges });
        }
        self.remove_node_locked(id)
    }

    /// Remove every edge touching a node, then the node.
    ///
    /// Returns the ids of the removed edges.
    pub fn delete_node_cascade(&self, id: ObjectId) -> Result<Vec<LinkId>, StorageError> {
        let _guard = self.writer.lock();
        if !self.nodes.contains_key(&id) {
            return Err(StorageError::NodeNotFound(id));
        }
        let mut touching = self.adjacent_ids(&self.outgoing, id);
        for link in self.adjacent_ids(&self.incoming, id) {
            if !touching.contains(&link) {
                touching.push(link);
            }
        }
        for link in &touching {
            self.remove_edge_locked(*link)?;
        }
        self.remove_node_locked(id)?;
        debug!(id = %id, edges = touching.len(), "node removed with its edges");
        Ok(touching)
    }

    fn remove_node_locked(&self, id: ObjectId) -> Result<Object, StorageError> {
        let (_, object) = self
            .nodes
            .remove(&id)
            .ok_or(StorageError::NodeNotFound(id))?;
        let emptied = match self.nodes_by_type.get_mut(&object.class) {
            Some(mut bucket) => {
                bucket.retain(|n| *n != id);
                bucket.is_empty()
            }
            None => false,
        };
        if emptied {
            self.nodes_by_type.remove_if(&object.class, |_, b| b.is_empty());
        }
        self.outgoing.remove(&id);
        self.incoming.remove(&id);
        debug!(id = %id, class = %object.class, "node removed");
        Ok(object)
    }

    fn degree(&self, id: ObjectId) -> usize {
        let out = self.outgoing.get(&id).map_or(0, |a| a.all.len());
        let inc = self.incoming.get(&id).map_or(0, |a| a.all.len());
        out + inc
    }

    fn adjacent_ids(&self, index: &DashMap<ObjectId, Adjacency>, id: ObjectId) -> Vec<LinkId> {
        index.get(&id).map(|a| a.all.clone()).unwrap_or_default()
    }

    /// Ids of all nodes of exactly this class, in insertion order.
    pub fn get_nodes_by_type(&self, class: &str) -> Vec<ObjectId> {
        self.nodes_by_type
            .get(class)
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// Ids of all nodes.
    pub fn node_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.nodes.iter().map(|n| *n.key()).collect();
        ids.sort();
        ids
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ========== Edges ==========

    /// Get a copy of an edge.
    pub fn get_edge(&self, id: LinkId) -> Option<Link> {
        self.edges.get(&id).map(|e| e.clone())
    }

    /// Insert or replace an edge. Both endpoints must exist.
    pub fn set_edge(&self, link: Link) -> Result<(), StorageError> {
        let _guard = self.writer.lock();
        for endpoint in [link.source, link.target] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(StorageError::DanglingEndpoint {
                    edge: link.id,
                    node: endpoint,
                });
            }
        }
        if self.edges.contains_key(&link.id) {
            self.remove_edge_locked(link.id)?;
        }

        self.ids.observe_link(link.id);
        self.edges_by_type
            .entry(link.association.clone())
            .or_default()
            .push(link.id);
        self.outgoing.entry(link.source).or_default().push(&link);
        self.incoming.entry(link.target).or_default().push(&link);
        trace!(id = %link.id, association = %link.association, "edge inserted");
        self.edges.insert(link.id, link);
        Ok(())
    }

    /// Remove an edge.
    pub fn delete_edge(&self, id: LinkId) -> Result<Link, StorageError> {
        let _guard = self.writer.lock();
        self.remove_edge_locked(id)
    }

    fn remove_edge_locked(&self, id: LinkId) -> Result<Link, StorageError> {
        let (_, link) = self
            .edges
            .remove(&id)
            .ok_or(StorageError::EdgeNotFound(id))?;
        let emptied = match self.edges_by_type.get_mut(&link.association) {
            Some(mut bucket) => {
                bucket.retain(|e| *e != id);
                bucket.is_empty()
            }
            None => false,
        };
        if emptied {
            self.edges_by_type
                .remove_if(&link.association, |_, b| b.is_empty());
        }
        if let Some(mut adjacency) = self.outgoing.get_mut(&link.source) {
            adjacency.remove(&link);
        }
        if let Some(mut adjacency) = self.incoming.get_mut(&link.target) {
            adjacency.remove(&link);
        }
        trace!(id = %id, association = %link.association, "edge removed");
        Ok(link)
    }

    fn resolve(&self, ids: Vec<LinkId>) -> Vec<Link> {
        ids.into_iter()
            .filter_map(|id| self.edges.get(&id).map(|e| e.clone()))
            .collect()
    }

    /// Edges leaving `id`, optionally restricted to one association.
    pub fn get_outgoing_edges(&self, id: ObjectId, association: Option<&str>) -> Vec<Link> {
        let ids = self
            .outgoing
            .get(&id)
            .map(|a| a.ids(association))
            .unwrap_or_default();
        self.resolve(ids)
    }

    /// Edges entering `id`, optionally restricted to one association.
    pub fn get_incoming_edges(&self, id: ObjectId, association: Option<&str>) -> Vec<Link> {
        let ids = self
            .incoming
            .get(&id)
            .map(|a| a.ids(association))
            .unwrap_or_default();
        self.resolve(ids)
    }

    /// Ids of all edges of an association, in insertion order.
    pub fn get_edges_by_type(&self, association: &str) -> Vec<LinkId> {
        self.edges_by_type
            .get(association)
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// Find the edge of `association` from `source` to `target`.
    pub fn find_edge(&self, source: ObjectId, target: ObjectId, association: &str) -> Option<Link> {
        let ids = self
            .outgoing
            .get(&source)
            .map(|a| a.ids(Some(association)))
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.edges.get(&id).map(|e| e.clone()))
            .find(|e| e.target == target)
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All edges sorted by id.
    pub fn all_edges(&self) -> Vec<Link> {
        let mut edges: Vec<Link> = self.edges.iter().map(|e| e.value().clone()).collect();
        edges.sort_by_key(|e| e.id);
        edges
    }

    // ========== Consistency ==========

    /// Check that every index family agrees with the primary maps.
    pub fn verify_indexes(&self) -> Result<(), StorageError> {
        let _guard = self.writer.lock();
        let fail = |msg: String| Err(StorageError::IndexInconsistency(msg));

        let mut typed_nodes = 0;
        for bucket in self.nodes_by_type.iter() {
            let mut seen = HashSet::new();
            for id in bucket.value() {
                if !seen.insert(*id) {
                    return fail(format!("{} listed twice under '{}'", id, bucket.key()));
                }
                match self.nodes.get(id) {
                    Some(node) if node.class == *bucket.key() => {}
                    Some(node) => {
                        return fail(format!(
                            "{} indexed as '{}' but stored as '{}'",
                            id,
                            bucket.key(),
                            node.class
                        ))
                    }
                    None => return fail(format!("type index lists missing node {}", id)),
                }
            }
            typed_nodes += bucket.len();
        }
        if typed_nodes != self.nodes.len() {
            return fail(format!(
                "type index holds {} nodes, store holds {}",
                typed_nodes,
                self.nodes.len()
            ));
        }

        let mut typed_edges = 0;
        for bucket in self.edges_by_type.iter() {
            for id in bucket.value() {
                match self.edges.get(id) {
                    Some(edge) if edge.association == *bucket.key() => {}
                    _ => return fail(format!("association index mismatch for {}", id)),
                }
            }
            typed_edges += bucket.len();
        }
        if typed_edges != self.edges.len() {
            return fail(format!(
                "association index holds {} edges, store holds {}",
                typed_edges,
                self.edges.len()
            ));
        }

        for edge in self.edges.iter() {
            for endpoint in [edge.source, edge.target] {
                if !self.nodes.contains_key(&endpoint) {
                    return fail(format!("{} dangles at {}", edge.id, endpoint));
                }
            }
            let listed_out = self.outgoing.get(&edge.source).is_some_and(|a| {
                a.all.contains(&edge.id)
                    && a.by_association
                        .get(&edge.association)
                        .is_some_and(|b| b.contains(&edge.id))
            });
            let listed_in = self.incoming.get(&edge.target).is_some_and(|a| {
                a.all.contains(&edge.id)
                    && a.by_association
                        .get(&edge.association)
                        .is_some_and(|b| b.contains(&edge.id))
            });
            if !listed_out || !listed_in {
                return fail(format!("{} missing from a directional index", edge.id));
            }
        }

        for (name, index, outgoing) in [("outgoing", &self.outgoing, true), ("incoming", &self.incoming, false)] {
            let mut total = 0;
            for entry in index.iter() {
                let node = *entry.key();
                if !self.nodes.contains_key(&node) {
                    return fail(format!("{} index keyed by missing node {}", name, node));
                }
                let grouped: usize = entry.by_association.values().map(Vec::len).sum();
                if grouped != entry.all.len() {
                    return fail(format!("{} index of {} disagrees with itself", name, node));
                }
                for id in &entry.all {
                    let Some(edge) = self.edges.get(id) else {
                        return fail(format!("{} index lists missing edge {}", name, id));
                    };
                    let anchor = if outgoing { edge.source } else { edge.target };
                    if anchor != node {
                        return fail(format!("{} listed under wrong node {}", id, node));
                    }
                }
                total += entry.all.len();
            }
            if total != self.edges.len() {
                return fail(format!(
                    "{} index holds {} edges, store holds {}",
                    name,
                    total,
                    self.edges.len()
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn node(store: &GraphStore, class: &str) -> ObjectId {
        let id = store.allocate_object_id();
        store.set_node(Object::new(id, class)).unwrap();
        id
    }

    fn edge(store: &GraphStore, assoc: &str, s: ObjectId, t: ObjectId) -> LinkId {
        let id = store.allocate_link_id();
        store.set_edge(Link::new(id, assoc, s, t)).unwrap();
        id
    }

    #[test]
    fn test_node_insert_and_type_index() {
        let store = GraphStore::new();
        let a = node(&store, "Part");
        let b = node(&store, "Part");
        let c = node(&store, "Port");

        assert_eq!(store.get_nodes_by_type("Part"), vec![a, b]);
        assert_eq!(store.get_nodes_by_type("Port"), vec![c]);
        assert!(store.get_nodes_by_type("Missing").is_empty());
        store.verify_indexes().unwrap();
    }

    #[test]
    fn test_class_change_rejected() {
        let store = GraphStore::new();
        let a = node(&store, "Part");
        let err = store.set_node(Object::new(a, "Port")).unwrap_err();
        assert!(matches!(err, StorageError::ClassChange { .. }));

        let mut replacement = Object::new(a, "Part");
        replacement.set("name", Value::from("wheel"));
        store.set_node(replacement).unwrap();
        assert_eq!(store.get_nodes_by_type("Part"), vec![a]);
        store.verify_indexes().unwrap();
    }

    #[test]
    fn test_update_node() {
        let store = GraphStore::new();
        let a = node(&store, "Part");
        store
            .update_node(a, |n| n.set("mass", Value::Float(2.5)))
            .unwrap();
        assert_eq!(store.get_node(a).unwrap().get("mass"), Some(&Value::Float(2.5)));
        assert!(store.update_node(ObjectId::new(99), |_| ()).is_err());
    }

    #[test]
    fn test_edges_and_directional_indexes() {
        let store = GraphStore::new();
        let p = node(&store, "Part");
        let c1 = node(&store, "Part");
        let c2 = node(&store, "Part");
        let e1 = edge(&store, "Composition", p, c1);
        let e2 = edge(&store, "Composition", p, c2);
        let e3 = edge(&store, "Reference", c1, c2);

        let out: Vec<LinkId> = store.get_outgoing_edges(p, None).iter().map(|e| e.id).collect();
        assert_eq!(out, vec![e1, e2]);
        assert_eq!(store.get_outgoing_edges(c1, Some("Composition")).len(), 0);
        assert_eq!(store.get_incoming_edges(c2, None).len(), 2);
        assert_eq!(store.get_incoming_edges(c2, Some("Reference"))[0].id, e3);
        assert_eq!(store.get_edges_by_type("Composition"), vec![e1, e2]);
        assert_eq!(store.find_edge(p, c2, "Composition").unwrap().id, e2);
        assert!(store.find_edge(c2, p, "Composition").is_none());
        store.verify_indexes().unwrap();
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let store = GraphStore::new();
        let p = node(&store, "Part");
        let id = store.allocate_link_id();
        let err = store
            .set_edge(Link::new(id, "Composition", p, ObjectId::new(77)))
            .unwrap_err();
        assert!(matches!(err, StorageError::DanglingEndpoint { .. }));
        assert_eq!(store.edge_count(), 0);
        store.verify_indexes().unwrap();
    }

    #[test]
    fn test_delete_node_refuses_edges() {
        let store = GraphStore::new();
        let p = node(&store, "Part");
        let c = node(&store, "Part");
        let e = edge(&store, "Composition", p, c);

        let err = store.delete_node(c).unwrap_err();
        assert!(matches!(err, StorageError::NodeHasEdges { edges: 1, .. }));

        store.delete_edge(e).unwrap();
        store.verify_indexes().unwrap();
        store.delete_node(c).unwrap();
        assert!(!store.contains_node(c));
        store.verify_indexes().unwrap();
    }

    #[test]
    fn test_delete_node_cascade() {
        let store = GraphStore::new();
        let p = node(&store, "Part");
        let c = node(&store, "Part");
        let e1 = edge(&store, "Composition", p, c);
        let e2 = edge(&store, "Reference", c, p);
        let e3 = edge(&store, "Reference", c, c);

        let mut removed = store.delete_node_cascade(c).unwrap();
        removed.sort();
        assert_eq!(removed, vec![e1, e2, e3]);
        assert_eq!(store.edge_count(), 0);
        assert!(store.get_outgoing_edges(p, None).is_empty());
        store.verify_indexes().unwrap();
    }

    #[test]
    fn test_replace_edge_reindexes() {
        let store = GraphStore::new();
        let a = node(&store, "Part");
        let b = node(&store, "Part");
        let c = node(&store, "Part");
        let e = edge(&store, "Reference", a, b);

        store.set_edge(Link::new(e, "Reference", a, c)).unwrap();
        assert!(store.find_edge(a, b, "Reference").is_none());
        assert!(store.get_incoming_edges(b, None).is_empty());
        assert_eq!(store.find_edge(a, c, "Reference").unwrap().id, e);
        store.verify_indexes().unwrap();
    }

    #[test]
    fn test_concurrent_inserts_keep_indexes_consistent() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(GraphStore::new());
        let root = node(&store, "Part");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let id = store.allocate_object_id();
                        store.set_node(Object::new(id, "Part")).unwrap();
                        let link = store.allocate_link_id();
                        store.set_edge(Link::new(link, "Composition", root, id)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.node_count(), 401);
        assert_eq!(store.get_outgoing_edges(root, None).len(), 400);
        store.verify_indexes().unwrap();
    }
}
