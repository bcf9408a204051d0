//! Class definitions.

use super::property::MetaProperty;
use super::types::ValueType;
use serde::{Deserialize, Serialize};

/// A class definition (node type of the object graph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaClass {
    /// Class name (unique within schema).
    pub name: String,
    /// Direct superclasses, in declaration order.
    pub superclasses: Vec<String>,
    /// Attributes declared directly on this class.
    pub attributes: Vec<MetaProperty>,
    /// Abstract classes cannot be instantiated.
    pub is_abstract: bool,
    /// Operations declared directly on this class.
    pub operations: Vec<MetaOperation>,
    /// Constraints declared directly on this class.
    pub constraints: Vec<ConstraintDecl>,
    /// Ownership binding, for intermediate relationship classes.
    pub ownership: Option<OwnershipBinding>,
}

/// An operation declared on a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaOperation {
    /// Operation name.
    pub name: String,
    /// Parameter names, in call order.
    pub parameters: Vec<String>,
    /// Declared result type, if any.
    pub return_type: Option<ValueType>,
    /// How the operation is evaluated.
    pub body: OperationBody,
}

/// Body of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationBody {
    /// Native closure registered with the constraint registry.
    Native,
    /// Returns the (derivation-aware) value of the named property.
    Reference(String),
    /// No body; subclasses are expected to redeclare the operation.
    Abstract,
}

/// A named constraint declared on a class.
///
/// The evaluator itself lives in the constraint registry; a declaration
/// makes a globally registered evaluator of the same name apply to the class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDecl {
    /// Constraint name.
    pub name: String,
    /// Source expression, kept as documentation.
    pub expression: Option<String>,
}

/// Declares a class as the intermediate of an ownership relationship.
///
/// Both ends are association ends reachable from the declaring class; their
/// declared types give the owner and owned-element types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipBinding {
    /// End pointing to the owned element.
    pub owned_element_end: String,
    /// End pointing back to the owner.
    pub owner_end: String,
}

impl MetaClass {
    /// Create a concrete class with no superclasses.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclasses: Vec::new(),
            attributes: Vec::new(),
            is_abstract: false,
            operations: Vec::new(),
            constraints: Vec::new(),
            ownership: None,
        }
    }

    /// Create an abstract class.
    pub fn new_abstract(name: impl Into<String>) -> Self {
        Self::new(name).as_abstract()
    }

    /// Mark as abstract.
    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Add a superclass.
    pub fn extends(mut self, superclass: impl Into<String>) -> Self {
        self.superclasses.push(superclass.into());
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, attribute: MetaProperty) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add an operation.
    pub fn with_operation(mut self, operation: MetaOperation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Declare a constraint by name.
    pub fn with_constraint(mut self, name: impl Into<String>) -> Self {
        self.constraints.push(ConstraintDecl {
            name: name.into(),
            expression: None,
        });
        self
    }

    /// Declare a constraint with its documenting expression.
    pub fn with_constraint_expr(
        mut self,
        name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        self.constraints.push(ConstraintDecl {
            name: name.into(),
            expression: Some(expression.into()),
        });
        self
    }

    /// Declare this class as an ownership intermediate.
    pub fn with_ownership(
        mut self,
        owned_element_end: impl Into<String>,
        owner_end: impl Into<String>,
    ) -> Self {
        self.ownership = Some(OwnershipBinding {
            owned_element_end: owned_element_end.into(),
            owner_end: owner_end.into(),
        });
        self
    }

    /// Get a directly declared attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&MetaProperty> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get a directly declared operation by name.
    pub fn get_operation(&self, name: &str) -> Option<&MetaOperation> {
        self.operations.iter().find(|o| o.name == name)
    }
}

impl MetaOperation {
    /// Create an operation with a native body.
    pub fn native(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            body: OperationBody::Native,
        }
    }

    /// Create an operation returning the value of a property.
    pub fn reference(name: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            body: OperationBody::Reference(property.into()),
        }
    }

    /// Create an operation without a body.
    pub fn abstract_op(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            body: OperationBody::Abstract,
        }
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(name.into());
        self
    }

    /// Set the return type.
    pub fn returns(mut self, return_type: ValueType) -> Self {
        self.return_type = Some(return_type);
        self
    }
}
