//! Metagraph Core - schema-driven in-memory object graph.
//!
//! This crate provides the metamodel registry, the indexed graph store, the
//! derivation/validation registry and the engine that ties them together.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod constraint;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod value;

pub use catalog::{
    AggregationKind, EndBinding, EndSide, MetaAssociation, MetaAssociationEnd, MetaClass,
    MetaOperation, MetaProperty, Multiplicity, OperationBody, OwnershipBinding, ResolvedOwnership,
    Schema, SchemaRegistry, ValueType, OPPOSITE, UNBOUNDED,
};
pub use constraint::{ConstraintRegistry, EvalContext};
pub use engine::{
    Engine, EngineConfig, EngineContext, InstanceFactory, InstanceRef, InvalidationPolicy,
    ValidationViolation,
};
pub use error::{Error, Result, SchemaError, StateError, StorageError};
pub use storage::{GraphSnapshot, GraphStore, Link, LinkId, Object, ObjectId};
pub use value::Value;

// Metrics exports
pub use metrics::{new_shared_metrics, EngineMetrics, SharedEngineMetrics};
