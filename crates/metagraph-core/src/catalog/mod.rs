//! Schema catalog for metagraph.
//!
//! Classes and associations are declared on a [`SchemaRegistry`], then frozen
//! into an indexed, immutable [`Schema`].

mod association;
mod class;
mod property;
mod registry;
mod schema;
mod types;

pub use association::{EndSide, MetaAssociation, MetaAssociationEnd, OPPOSITE};
pub use class::{ConstraintDecl, MetaClass, MetaOperation, OperationBody, OwnershipBinding};
pub use property::MetaProperty;
pub use registry::SchemaRegistry;
pub use schema::{EndBinding, ResolvedConstraint, ResolvedOperation, ResolvedOwnership, Schema};
pub use types::{AggregationKind, Multiplicity, ValueType, UNBOUNDED};
