//! Graph storage layer for metagraph.
//!
//! A schema-agnostic, concurrent store of objects (nodes) and links (edges)
//! with id, type and directional indexes kept in lockstep.

mod edge;
mod graph;
mod id;
mod node;
mod snapshot;

pub use edge::Link;
pub use graph::GraphStore;
pub use id::{LinkId, ObjectId};
pub use node::Object;
pub use snapshot::{EdgeRecord, GraphSnapshot, NodeRecord};
