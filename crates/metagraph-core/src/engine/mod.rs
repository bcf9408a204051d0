//! Engine orchestrating schema, storage and constraints.
//!
//! ## Responsibilities
//!
//! ```text
//! create/delete instances ── factory, composite cascade
//! property reads          ── raw storage | derived evaluators | link indexes
//! property writes         ── validation, link maintenance, cache invalidation
//! add_child               ── ownership resolution + intermediate wiring
//! ```
//!
//! Every call is synchronous. Compound operations (ownership wiring, cascade
//! delete, multi-valued end writes) are applied step by step without rollback.

mod association;
mod cache;
mod config;
mod context;
mod factory;
mod lifecycle;
mod operation;
mod ownership;
mod property;
mod validation;

pub use config::{EngineConfig, InvalidationPolicy, DEFAULT_MAX_CASCADE_DEPTH};
pub use context::EngineContext;
pub use factory::{InitializerFn, InstanceFactory};
pub use validation::{ValidationViolation, LOWER_BOUND_CONSTRAINT};

use crate::catalog::Schema;
use crate::constraint::ConstraintRegistry;
use crate::error::{Result, SchemaError};
use crate::metrics::{new_shared_metrics, SharedEngineMetrics};
use crate::storage::{GraphSnapshot, GraphStore, ObjectId};
use crate::value::Value;
use std::fmt;
use std::sync::atomic::AtomicU64;
use tracing::{debug, info};

/// Lightweight handle to a live instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    /// Object id.
    pub id: ObjectId,
    /// Class name.
    pub class: String,
}

impl InstanceRef {
    /// Create a handle.
    pub fn new(id: ObjectId, class: impl Into<String>) -> Self {
        Self {
            id,
            class: class.into(),
        }
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class, self.id)
    }
}

impl From<&InstanceRef> for Value {
    fn from(handle: &InstanceRef) -> Self {
        Value::Ref(handle.id)
    }
}

/// Schema-driven object-graph engine.
pub struct Engine {
    context: EngineContext,
    config: EngineConfig,
    factory: InstanceFactory,
    metrics: SharedEngineMetrics,
    generation: AtomicU64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("factory", &self.factory)
            .field("instances", &self.context.storage.node_count())
            .field("links", &self.context.storage.edge_count())
            .finish()
    }
}

impl Engine {
    /// Create an engine with default configuration.
    pub fn new(context: EngineContext) -> Self {
        Self {
            context,
            config: EngineConfig::default(),
            factory: InstanceFactory::default(),
            metrics: new_shared_metrics(),
            generation: AtomicU64::new(0),
        }
    }

    /// Create an engine over a frozen schema with fresh storage and constraints.
    pub fn with_schema(schema: Schema) -> Self {
        Self::new(EngineContext::new(schema))
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the instance factory.
    pub fn with_factory(mut self, factory: InstanceFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Share an existing metrics registry.
    pub fn with_metrics(mut self, metrics: SharedEngineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// The session context.
    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// The frozen schema.
    pub fn schema(&self) -> &Schema {
        &self.context.schema
    }

    /// The graph store.
    pub fn storage(&self) -> &GraphStore {
        &self.context.storage
    }

    /// The evaluator registry.
    pub fn constraints(&self) -> &ConstraintRegistry {
        &self.context.constraints
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The metrics registry.
    pub fn metrics(&self) -> &SharedEngineMetrics {
        &self.metrics
    }

    // ========== Instances ==========

    /// Create an instance of a concrete class.
    pub fn create_instance(&self, class: &str) -> Result<InstanceRef> {
        let meta = self.schema().require_class(class)?;
        if meta.is_abstract {
            return Err(SchemaError::AbstractClass(class.to_string()).into());
        }

        let id = self.storage().allocate_object_id();
        let object = self.factory.instantiate(self.schema(), class, id);
        self.storage().set_node(object)?;
        self.invalidate(id);
        self.metrics.record_instance_created(class);
        debug!(id = %id, class, "instance created");
        Ok(InstanceRef::new(id, class))
    }

    /// Handle to a live instance.
    pub fn get_instance(&self, id: ObjectId) -> Option<InstanceRef> {
        self.storage()
            .node_class(id)
            .map(|class| InstanceRef::new(id, class))
    }

    pub(crate) fn require_instance(&self, id: ObjectId) -> Result<InstanceRef> {
        self.get_instance(id)
            .ok_or(crate::error::Error::InstanceNotFound(id))
    }

    /// Instances conforming to `class`, subclasses included.
    ///
    /// Exact-class instances come first, then each descendant in
    /// registration order; each bucket keeps creation order.
    pub fn get_instances_by_type(&self, class: &str) -> Vec<InstanceRef> {
        if !self.schema().has_class(class) {
            return Vec::new();
        }
        std::iter::once(class)
            .chain(self.schema().descendants(class).iter().map(String::as_str))
            .flat_map(|c| {
                self.storage()
                    .get_nodes_by_type(c)
                    .into_iter()
                    .map(move |id| InstanceRef::new(id, c))
            })
            .collect()
    }

    // ========== Snapshots ==========

    /// Export every instance and link.
    pub fn export(&self) -> GraphSnapshot {
        self.storage().export()
    }

    /// Import a snapshot after checking it against the schema.
    pub fn import(&self, snapshot: &GraphSnapshot) -> Result<()> {
        for node in &snapshot.nodes {
            self.schema().require_class(&node.class)?;
        }
        for edge in &snapshot.edges {
            self.schema().require_association(&edge.association)?;
        }
        self.storage().import(snapshot)?;
        self.bump_generation();
        info!(
            instances = snapshot.nodes.len(),
            links = snapshot.edges.len(),
            "model imported"
        );
        Ok(())
    }
}
