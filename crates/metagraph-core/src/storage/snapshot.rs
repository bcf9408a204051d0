//! Whole-graph export and import.

use super::edge::Link;
use super::graph::GraphStore;
use super::node::Object;
use super::{LinkId, ObjectId};
use crate::error::{Error, Result, StorageError};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// A node as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Object id.
    pub id: ObjectId,
    /// Class name.
    pub class: String,
    /// Raw attribute values.
    pub properties: BTreeMap<String, Value>,
}

/// An edge as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Link id.
    pub id: LinkId,
    /// Association name.
    pub association: String,
    /// Source object.
    pub source: ObjectId,
    /// Target object.
    pub target: ObjectId,
}

/// Unversioned copy of every node and edge, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Nodes.
    pub nodes: Vec<NodeRecord>,
    /// Edges.
    pub edges: Vec<EdgeRecord>,
}

impl GraphSnapshot {
    /// Node count per class.
    pub fn type_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.class.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Edge count per association.
    pub fn association_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for edge in &self.edges {
            *counts.entry(edge.association.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Content digest (blake3, hex encoded) of the canonical JSON form.
    pub fn digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }
}

impl GraphStore {
    /// Copy every node and edge into a snapshot.
    pub fn export(&self) -> GraphSnapshot {
        let nodes = self
            .node_ids()
            .into_iter()
            .filter_map(|id| {
                self.with_node(id, |n| NodeRecord {
                    id: n.id,
                    class: n.class.clone(),
                    properties: n.properties.clone(),
                })
            })
            .collect();
        let edges = self
            .all_edges()
            .into_iter()
            .map(|e| EdgeRecord {
                id: e.id,
                association: e.association,
                source: e.source,
                target: e.target,
            })
            .collect();
        GraphSnapshot { nodes, edges }
    }

    /// Load a snapshot, keeping its ids.
    ///
    /// The whole snapshot is checked before anything is written: ids must not
    /// collide with stored ones and every edge endpoint must exist afterwards.
    pub fn import(&self, snapshot: &GraphSnapshot) -> Result<()> {
        let mut incoming_nodes = HashSet::new();
        for node in &snapshot.nodes {
            if self.contains_node(node.id) || !incoming_nodes.insert(node.id) {
                return Err(StorageError::DuplicateNode(node.id).into());
            }
        }
        let mut incoming_edges = HashSet::new();
        for edge in &snapshot.edges {
            if self.get_edge(edge.id).is_some() || !incoming_edges.insert(edge.id) {
                return Err(StorageError::DuplicateEdge(edge.id).into());
            }
            for endpoint in [edge.source, edge.target] {
                if !incoming_nodes.contains(&endpoint) && !self.contains_node(endpoint) {
                    return Err(StorageError::DanglingEndpoint {
                        edge: edge.id,
                        node: endpoint,
                    }
                    .into());
                }
            }
        }

        for node in &snapshot.nodes {
            self.set_node(Object::with_properties(
                node.id,
                node.class.clone(),
                node.properties.clone(),
            ))?;
        }
        for edge in &snapshot.edges {
            self.set_edge(Link::new(
                edge.id,
                edge.association.clone(),
                edge.source,
                edge.target,
            ))?;
        }

        info!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "snapshot imported"
        );
        Ok(())
    }
}
