//! Session context shared by every engine operation.

use crate::catalog::Schema;
use crate::constraint::ConstraintRegistry;
use crate::storage::GraphStore;
use std::sync::Arc;

/// The three collaborators an [`Engine`](super::Engine) composes.
///
/// Built once per session; the schema is frozen, storage and constraints
/// accept concurrent writes.
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Frozen schema.
    pub schema: Arc<Schema>,
    /// Object graph.
    pub storage: Arc<GraphStore>,
    /// Evaluator tables.
    pub constraints: Arc<ConstraintRegistry>,
}

impl EngineContext {
    /// Context over a schema with an empty store and registry.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
            storage: Arc::new(GraphStore::new()),
            constraints: Arc::new(ConstraintRegistry::new()),
        }
    }

    /// Context over existing collaborators.
    pub fn from_parts(
        schema: Arc<Schema>,
        storage: Arc<GraphStore>,
        constraints: Arc<ConstraintRegistry>,
    ) -> Self {
        Self {
            schema,
            storage,
            constraints,
        }
    }
}
