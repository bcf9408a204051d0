//! Stored links (graph edges).

use super::{LinkId, ObjectId};
use serde::{Deserialize, Serialize};

/// A directed instance of an association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Link id.
    pub id: LinkId,
    /// Association name.
    pub association: String,
    /// Object at the association's source end.
    pub source: ObjectId,
    /// Object at the association's target end.
    pub target: ObjectId,
}

impl Link {
    /// Create a link.
    pub fn new(id: LinkId, association: impl Into<String>, source: ObjectId, target: ObjectId) -> Self {
        Self {
            id,
            association: association.into(),
            source,
            target,
        }
    }

    /// Whether the link touches `id`.
    pub fn touches(&self, id: ObjectId) -> bool {
        self.source == id || self.target == id
    }

    /// The endpoint that is not `id`.
    pub fn other_end(&self, id: ObjectId) -> ObjectId {
        if self.source == id {
            self.target
        } else {
            self.source
        }
    }
}
