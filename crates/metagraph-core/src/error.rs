//! Core error types.

use thiserror::Error;

use crate::storage::{LinkId, ObjectId};

/// Core runtime errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema construction or schema lookup error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Invalid state transition on an instance.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Graph storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Instance not found.
    #[error("instance not found: {0}")]
    InstanceNotFound(ObjectId),

    /// A derivation or operation body reported a failure.
    #[error("evaluation of '{name}' failed: {message}")]
    Evaluation {
        /// Derived property, end or operation name.
        name: String,
        /// Failure reported by the evaluator.
        message: String,
    },

    /// Snapshot serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while building or querying the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A class with this name is already registered.
    #[error("duplicate class '{0}'")]
    DuplicateClass(String),

    /// An association with this name is already registered.
    #[error("duplicate association '{0}'")]
    DuplicateAssociation(String),

    /// Unknown class name.
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    /// Unknown association name.
    #[error("unknown association '{0}'")]
    UnknownAssociation(String),

    /// Property or association end not declared anywhere in the hierarchy.
    #[error("class '{class}' has no property '{property}'")]
    UnknownProperty {
        /// Class that was queried.
        class: String,
        /// Requested property.
        property: String,
    },

    /// Operation not declared anywhere in the hierarchy.
    #[error("class '{class}' has no operation '{operation}'")]
    UnknownOperation {
        /// Class that was queried.
        class: String,
        /// Requested operation.
        operation: String,
    },

    /// `subsets`/`redefines` entry naming an end that does not exist.
    #[error("end '{end}' of association '{association}' references unknown end '{referenced}'")]
    UnknownEnd {
        /// Association declaring the reference.
        association: String,
        /// End declaring the reference.
        end: String,
        /// Missing end name.
        referenced: String,
    },

    /// Attempt to instantiate an abstract class.
    #[error("class '{0}' is abstract")]
    AbstractClass(String),

    /// The superclass graph contains a cycle.
    #[error("inheritance cycle: {}", .0.join(" -> "))]
    InheritanceCycle(Vec<String>),

    /// Invalid use of the `#opposite` sentinel.
    #[error("invalid #opposite on end '{end}' of association '{association}': {reason}")]
    InvalidOpposite {
        /// Association name.
        association: String,
        /// Offending end.
        end: String,
        /// Why the declaration is rejected.
        reason: String,
    },

    /// Two unrelated ends with the same name are visible from one class.
    #[error("class '{class}' sees end '{end}' from both '{first}' and '{second}'")]
    AmbiguousEnd {
        /// Class where the clash occurs.
        class: String,
        /// Clashing end name.
        end: String,
        /// First association.
        first: String,
        /// Second association.
        second: String,
    },

    /// A derived property has no registered evaluator.
    #[error("no evaluator registered for derived '{property}' on class '{class}'")]
    MissingEvaluator {
        /// Class that was queried.
        class: String,
        /// Derived property or end.
        property: String,
    },

    /// A native operation has no registered body.
    #[error("no implementation registered for operation '{operation}' on class '{class}'")]
    MissingImplementation {
        /// Class that was queried.
        class: String,
        /// Operation name.
        operation: String,
    },

    /// Operation declared without a body.
    #[error("operation '{operation}' of class '{class}' is abstract")]
    AbstractOperation {
        /// Declaring class.
        class: String,
        /// Operation name.
        operation: String,
    },

    /// Ownership binding that does not resolve against its class.
    #[error("invalid ownership binding on class '{class}': {reason}")]
    InvalidOwnershipBinding {
        /// Declaring class.
        class: String,
        /// What is wrong.
        reason: String,
    },

    /// No ownership binding matches a parent/child pair.
    #[error("no ownership binding composes '{child}' under '{parent}'")]
    NoOwnershipBinding {
        /// Parent class.
        parent: String,
        /// Child class.
        child: String,
    },

    /// Several equally specific ownership bindings match.
    #[error("ambiguous ownership of '{child}' under '{parent}': {}", .candidates.join(", "))]
    AmbiguousOwnership {
        /// Parent class.
        parent: String,
        /// Child class.
        child: String,
        /// Intermediate classes that tie.
        candidates: Vec<String>,
    },
}

/// Errors raised by writes that would violate instance-level rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Write attempt on a derived property or end.
    #[error("'{property}' of class '{class}' is derived and cannot be written")]
    DerivedProperty {
        /// Class of the written object.
        class: String,
        /// Derived property.
        property: String,
    },

    /// Write attempt on a read-only property that already holds a value.
    #[error("'{property}' of class '{class}' is read-only")]
    ReadOnly {
        /// Class of the written object.
        class: String,
        /// Read-only property.
        property: String,
    },

    /// Value count outside the declared bounds.
    #[error("'{property}' accepts {bounds} values, got {actual}")]
    Multiplicity {
        /// Property or end name.
        property: String,
        /// Declared bounds, e.g. `0..1`.
        bounds: String,
        /// Number of values supplied.
        actual: usize,
    },

    /// Value of the wrong type.
    #[error("'{property}' expects {expected}, got {found}")]
    TypeMismatch {
        /// Property or end name.
        property: String,
        /// Declared type.
        expected: String,
        /// Supplied type or class.
        found: String,
    },

    /// Object already has another composite owner.
    #[error("{part} is already composite-owned by {owner}")]
    MultipleOwners {
        /// Object being composed.
        part: ObjectId,
        /// Its current owner.
        owner: ObjectId,
    },

    /// Composition would make an object own itself.
    #[error("composing {part} under {owner} would create an ownership cycle")]
    OwnershipCycle {
        /// Prospective owner.
        owner: ObjectId,
        /// Prospective part.
        part: ObjectId,
    },

    /// Operation invoked with the wrong number of arguments.
    #[error("operation '{operation}' takes {expected} arguments, got {actual}")]
    ArityMismatch {
        /// Operation name.
        operation: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// Composite cascade went deeper than the configured limit.
    #[error("cascade depth {depth} exceeds limit")]
    CascadeDepthExceeded {
        /// Depth reached.
        depth: usize,
    },
}

/// Errors raised by the graph storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Node not found.
    #[error("node {0} not found")]
    NodeNotFound(ObjectId),

    /// Edge not found.
    #[error("edge {0} not found")]
    EdgeNotFound(LinkId),

    /// Edge endpoint does not exist.
    #[error("edge {edge} references missing node {node}")]
    DanglingEndpoint {
        /// Edge being written.
        edge: LinkId,
        /// Missing endpoint.
        node: ObjectId,
    },

    /// Plain node deletion while edges still touch the node.
    #[error("node {node} still has {edges} edges")]
    NodeHasEdges {
        /// Node being deleted.
        node: ObjectId,
        /// Number of touching edges.
        edges: usize,
    },

    /// Node id already present (import into a non-empty store).
    #[error("duplicate node id {0}")]
    DuplicateNode(ObjectId),

    /// Edge id already present (import into a non-empty store).
    #[error("duplicate edge id {0}")]
    DuplicateEdge(LinkId),

    /// Node class cannot change on an existing id.
    #[error("node {id} cannot change class from '{from}' to '{to}'")]
    ClassChange {
        /// Node id.
        id: ObjectId,
        /// Stored class.
        from: String,
        /// Requested class.
        to: String,
    },

    /// Index families disagree with the primary maps.
    #[error("index inconsistency: {0}")]
    IndexInconsistency(String),
}

/// Result alias for core operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
