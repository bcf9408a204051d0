//! Frozen schema produced by [`SchemaRegistry::build_indexes`](super::SchemaRegistry::build_indexes).

use super::association::{EndSide, MetaAssociation, MetaAssociationEnd};
use super::class::{ConstraintDecl, MetaClass, MetaOperation};
use super::property::MetaProperty;
use crate::error::SchemaError;
use crate::storage::ObjectId;
use std::collections::{HashMap, HashSet};

/// An association end as seen from a class that can read it.
#[derive(Debug, Clone, PartialEq)]
pub struct EndBinding {
    /// Association declaring the end.
    pub association: String,
    /// Side of the end within its association.
    pub side: EndSide,
    /// The end being read.
    pub end: MetaAssociationEnd,
    /// The paired end; its class is the class the end is read from.
    pub opposite: MetaAssociationEnd,
    /// Visible ends (transitively) subsetting this one.
    pub subsetted_by: Vec<String>,
}

impl EndBinding {
    /// Class the end is read from.
    pub fn owner_class(&self) -> &str {
        &self.opposite.class
    }

    /// Stable computed-value cache key, `association::end`.
    pub fn cache_key(&self) -> String {
        format!("{}::{}", self.association, self.end.name)
    }

    /// Whether values are read from stored links.
    pub fn is_stored(&self) -> bool {
        !self.end.is_derived()
    }

    /// Whether this end leads to objects held in the reading object's links
    /// as targets (outgoing direction).
    pub fn reads_outgoing(&self) -> bool {
        self.side == EndSide::Target
    }

    /// Orient a link written through this end: returns `(source, target)`.
    pub fn link_endpoints(&self, reader: ObjectId, value: ObjectId) -> (ObjectId, ObjectId) {
        match self.side {
            EndSide::Target => (reader, value),
            EndSide::Source => (value, reader),
        }
    }
}

/// An operation together with the class that declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOperation {
    /// Declaring class.
    pub declared_in: String,
    /// The declaration.
    pub operation: MetaOperation,
}

/// A constraint declaration together with the class that declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConstraint {
    /// Declaring class.
    pub declared_in: String,
    /// The declaration.
    pub decl: ConstraintDecl,
}

/// Ownership binding with its ends resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOwnership {
    /// Intermediate class to instantiate.
    pub intermediate: String,
    /// End of the intermediate leading to the owned element.
    pub owned_end: EndBinding,
    /// End of the intermediate leading back to the owner.
    pub owner_end: EndBinding,
}

impl ResolvedOwnership {
    /// Owner type, taken from the owner end.
    pub fn owner_type(&self) -> &str {
        &self.owner_end.end.class
    }

    /// Owned-element type, taken from the owned end.
    pub fn owned_type(&self) -> &str {
        &self.owned_end.end.class
    }
}

/// Per-class inherited views computed at freeze time.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClassView {
    pub(crate) ancestors: Vec<String>,
    pub(crate) precedence: Vec<String>,
    pub(crate) ancestor_set: HashSet<String>,
    pub(crate) depth: usize,
    pub(crate) descendants: Vec<String>,
    pub(crate) attributes: Vec<MetaProperty>,
    pub(crate) operations: Vec<ResolvedOperation>,
    pub(crate) constraints: Vec<ResolvedConstraint>,
    pub(crate) ends: Vec<EndBinding>,
}

/// Immutable, fully indexed schema.
///
/// Shared behind an `Arc` for unsynchronized concurrent reads.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) classes: Vec<MetaClass>,
    pub(crate) class_index: HashMap<String, usize>,
    pub(crate) associations: Vec<MetaAssociation>,
    pub(crate) association_index: HashMap<String, usize>,
    pub(crate) views: Vec<ClassView>,
    pub(crate) ownership: Vec<ResolvedOwnership>,
}

impl Schema {
    fn view(&self, class: &str) -> Option<&ClassView> {
        self.class_index.get(class).map(|&i| &self.views[i])
    }

    /// Get a class by name.
    pub fn get_class(&self, name: &str) -> Option<&MetaClass> {
        self.class_index.get(name).map(|&i| &self.classes[i])
    }

    /// Get a class by name, failing with [`SchemaError::UnknownClass`].
    pub fn require_class(&self, name: &str) -> Result<&MetaClass, SchemaError> {
        self.get_class(name)
            .ok_or_else(|| SchemaError::UnknownClass(name.to_string()))
    }

    /// All classes in registration order.
    pub fn all_classes(&self) -> &[MetaClass] {
        &self.classes
    }

    /// Whether a class is registered.
    pub fn has_class(&self, name: &str) -> bool {
        self.class_index.contains_key(name)
    }

    /// Get an association by name.
    pub fn get_association(&self, name: &str) -> Option<&MetaAssociation> {
        self.association_index
            .get(name)
            .map(|&i| &self.associations[i])
    }

    /// Get an association by name, failing with [`SchemaError::UnknownAssociation`].
    pub fn require_association(&self, name: &str) -> Result<&MetaAssociation, SchemaError> {
        self.get_association(name)
            .ok_or_else(|| SchemaError::UnknownAssociation(name.to_string()))
    }

    /// All associations in registration order.
    pub fn all_associations(&self) -> &[MetaAssociation] {
        &self.associations
    }

    /// Whether `sub` is `sup` or one of its descendants.
    pub fn conforms_to(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return self.has_class(sub);
        }
        self.view(sub)
            .is_some_and(|v| v.ancestor_set.contains(sup))
    }

    /// Ancestors of a class in declaration-order depth-first preorder,
    /// excluding the class itself.
    pub fn ancestors(&self, class: &str) -> &[String] {
        self.view(class).map_or(&[], |v| &v.ancestors)
    }

    /// Ancestors ordered so that every class precedes its own ancestors.
    ///
    /// Same as [`ancestors`](Self::ancestors) except in diamonds, where a
    /// shared ancestor moves behind every class that inherits it. Name
    /// collisions resolved through this order let the closest class win.
    pub fn precedence(&self, class: &str) -> &[String] {
        self.view(class).map_or(&[], |v| &v.precedence)
    }

    /// Descendants of a class in registration order, excluding the class itself.
    pub fn descendants(&self, class: &str) -> &[String] {
        self.view(class).map_or(&[], |v| &v.descendants)
    }

    /// Lattice depth: 0 for a root class, else one more than its deepest parent.
    pub fn depth(&self, class: &str) -> usize {
        self.view(class).map_or(0, |v| v.depth)
    }

    /// All attributes visible on a class, closest declaration winning.
    pub fn attributes(&self, class: &str) -> &[MetaProperty] {
        self.view(class).map_or(&[], |v| &v.attributes)
    }

    /// Find a visible attribute.
    pub fn find_attribute(&self, class: &str, name: &str) -> Option<&MetaProperty> {
        self.attributes(class).iter().find(|a| a.name == name)
    }

    /// All association ends readable from a class.
    pub fn ends(&self, class: &str) -> &[EndBinding] {
        self.view(class).map_or(&[], |v| &v.ends)
    }

    /// Navigable ends readable from a class.
    pub fn navigable_ends(&self, class: &str) -> impl Iterator<Item = &EndBinding> {
        self.ends(class).iter().filter(|b| b.end.navigable)
    }

    /// Find a readable end by name.
    pub fn find_end(&self, class: &str, name: &str) -> Option<&EndBinding> {
        self.ends(class).iter().find(|b| b.end.name == name)
    }

    /// All operations visible on a class.
    pub fn operations(&self, class: &str) -> &[ResolvedOperation] {
        self.view(class).map_or(&[], |v| &v.operations)
    }

    /// Find a visible operation; the closest declaration wins.
    pub fn find_operation(&self, class: &str, name: &str) -> Option<&ResolvedOperation> {
        self.operations(class)
            .iter()
            .find(|o| o.operation.name == name)
    }

    /// All constraint declarations visible on a class.
    pub fn constraint_decls(&self, class: &str) -> &[ResolvedConstraint] {
        self.view(class).map_or(&[], |v| &v.constraints)
    }

    /// All resolved ownership bindings.
    pub fn ownership_bindings(&self) -> &[ResolvedOwnership] {
        &self.ownership
    }

    /// Whether the end at `side` of an association is composite.
    ///
    /// Objects at a composite side are parts of the object at the other side.
    pub fn is_composite_side(&self, association: &str, side: EndSide) -> bool {
        self.get_association(association)
            .is_some_and(|a| a.end(side).is_composite())
    }

    /// Select the most specific ownership binding composing `child_class`
    /// under `parent_class`.
    ///
    /// Candidates are bindings whose owner type is a supertype-or-self of the
    /// parent class and whose owned type is a supertype-or-self of the child
    /// class. Candidates dominated on both ends are dropped; remaining ties
    /// are broken by deeper owned type, deeper owner type, then by the owned
    /// end specializing (`subsets`/`redefines`) another candidate's owned end.
    pub fn resolve_ownership(
        &self,
        parent_class: &str,
        child_class: &str,
    ) -> Result<&ResolvedOwnership, SchemaError> {
        let candidates: Vec<&ResolvedOwnership> = self
            .ownership
            .iter()
            .filter(|b| {
                self.get_class(&b.intermediate)
                    .is_some_and(|c| !c.is_abstract)
                    && self.conforms_to(parent_class, b.owner_type())
                    && self.conforms_to(child_class, b.owned_type())
            })
            .collect();

        if candidates.is_empty() {
            return Err(SchemaError::NoOwnershipBinding {
                parent: parent_class.to_string(),
                child: child_class.to_string(),
            });
        }

        let dominates = |a: &ResolvedOwnership, b: &ResolvedOwnership| {
            let owned = self.conforms_to(a.owned_type(), b.owned_type());
            let owner = self.conforms_to(a.owner_type(), b.owner_type());
            owned && owner && (a.owned_type() != b.owned_type() || a.owner_type() != b.owner_type())
        };

        let mut best: Vec<&ResolvedOwnership> = candidates
            .iter()
            .copied()
            .filter(|b| !candidates.iter().any(|a| dominates(a, b)))
            .collect();

        let max_owned = best
            .iter()
            .map(|b| self.depth(b.owned_type()))
            .max()
            .unwrap_or(0);
        best.retain(|b| self.depth(b.owned_type()) == max_owned);

        let max_owner = best
            .iter()
            .map(|b| self.depth(b.owner_type()))
            .max()
            .unwrap_or(0);
        best.retain(|b| self.depth(b.owner_type()) == max_owner);

        if best.len() > 1 {
            let specializes = |a: &ResolvedOwnership, b: &ResolvedOwnership| {
                let target = &b.owned_end.end.name;
                a.owned_end.end.name != *target
                    && (a.owned_end.end.subsets.contains(target)
                        || a.owned_end.end.redefines.contains(target))
            };
            let snapshot = best.clone();
            best.retain(|b| !snapshot.iter().any(|a| specializes(a, b)));
        }

        match best.as_slice() {
            [single] => Ok(single),
            _ => Err(SchemaError::AmbiguousOwnership {
                parent: parent_class.to_string(),
                child: child_class.to_string(),
                candidates: best.iter().map(|b| b.intermediate.clone()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{
        MetaAssociation, MetaAssociationEnd, MetaClass, MetaOperation, MetaProperty,
        Multiplicity, SchemaRegistry, ValueType,
    };
    use crate::error::SchemaError;

    fn diamond() -> crate::catalog::Schema {
        let mut registry = SchemaRegistry::new();
        registry
            .register_class(
                MetaClass::new_abstract("Element")
                    .with_attribute(MetaProperty::new("name", ValueType::String))
                    .with_operation(MetaOperation::reference("label", "name")),
            )
            .unwrap();
        registry
            .register_class(
                MetaClass::new("Namespace")
                    .extends("Element")
                    .with_constraint("namesUnique"),
            )
            .unwrap();
        registry
            .register_class(
                MetaClass::new("Type")
                    .extends("Namespace")
                    .with_attribute(MetaProperty::new("name", ValueType::String).read_only()),
            )
            .unwrap();
        registry
            .register_class(MetaClass::new("Feature").extends("Type").extends("Element"))
            .unwrap();
        registry.build_indexes().unwrap()
    }

    #[test]
    fn test_ancestors_and_depth() {
        let schema = diamond();
        assert_eq!(schema.ancestors("Feature"), ["Type", "Namespace", "Element"]);
        assert_eq!(schema.depth("Element"), 0);
        assert_eq!(schema.depth("Feature"), 3);
        assert_eq!(schema.descendants("Namespace"), ["Type", "Feature"]);
        assert!(schema.conforms_to("Feature", "Element"));
        assert!(!schema.conforms_to("Element", "Feature"));
        assert!(!schema.conforms_to("Missing", "Missing"));
    }

    #[test]
    fn test_closest_attribute_wins() {
        let schema = diamond();
        let name = schema.find_attribute("Feature", "name").unwrap();
        assert!(name.read_only);
        assert!(!schema.find_attribute("Namespace", "name").unwrap().read_only);

        let op = schema.find_operation("Feature", "label").unwrap();
        assert_eq!(op.declared_in, "Element");
        assert_eq!(schema.constraint_decls("Feature")[0].declared_in, "Namespace");
    }

    #[test]
    fn test_shared_ancestor_yields_to_closer_class() {
        // D(B, C) with B and C both extending A.
        let mut registry = SchemaRegistry::new();
        registry
            .register_class(
                MetaClass::new("A")
                    .with_attribute(MetaProperty::new("kind", ValueType::String))
                    .with_operation(MetaOperation::reference("describe", "kind"))
                    .with_constraint("checked"),
            )
            .unwrap();
        registry.register_class(MetaClass::new("B").extends("A")).unwrap();
        registry
            .register_class(
                MetaClass::new("C")
                    .extends("A")
                    .with_attribute(MetaProperty::new("kind", ValueType::String).read_only())
                    .with_operation(MetaOperation::reference("describe", "kind"))
                    .with_constraint("checked"),
            )
            .unwrap();
        registry
            .register_class(MetaClass::new("D").extends("B").extends("C"))
            .unwrap();
        let schema = registry.build_indexes().unwrap();

        assert_eq!(schema.ancestors("D"), ["B", "A", "C"]);
        assert_eq!(schema.precedence("D"), ["B", "C", "A"]);
        assert!(schema.find_attribute("D", "kind").unwrap().read_only);
        assert_eq!(schema.find_operation("D", "describe").unwrap().declared_in, "C");
        assert_eq!(schema.constraint_decls("D")[0].declared_in, "C");
        assert_eq!(schema.constraint_decls("D").len(), 1);
    }

    #[test]
    fn test_ends_visible_through_inheritance() {
        let mut registry = SchemaRegistry::new();
        registry.register_class(MetaClass::new("Namespace")).unwrap();
        registry.register_class(MetaClass::new("Package").extends("Namespace")).unwrap();
        registry.register_class(MetaClass::new("Element")).unwrap();
        registry
            .register_association(MetaAssociation::new(
                "NamespaceMembers",
                MetaAssociationEnd::new("namespace", "Namespace").non_navigable().opposite(),
                MetaAssociationEnd::new("member", "Element").with_multiplicity(Multiplicity::many()),
            ))
            .unwrap();
        let schema = registry.build_indexes().unwrap();

        let member = schema.find_end("Package", "member").unwrap();
        assert_eq!(member.owner_class(), "Namespace");
        assert!(member.reads_outgoing());
        assert_eq!(member.cache_key(), "NamespaceMembers::member");

        let namespace = schema.find_end("Element", "namespace").unwrap();
        assert!(!namespace.is_stored());
        assert_eq!(schema.navigable_ends("Element").count(), 0);
        assert!(schema.find_end("Element", "member").is_none());
    }

    #[test]
    fn test_redefined_end_hidden() {
        let mut registry = SchemaRegistry::new();
        registry.register_class(MetaClass::new("Type")).unwrap();
        registry.register_class(MetaClass::new("Class").extends("Type")).unwrap();
        registry.register_class(MetaClass::new("Feature")).unwrap();
        registry
            .register_association(MetaAssociation::new(
                "TypeFeatures",
                MetaAssociationEnd::new("typeOwner", "Type"),
                MetaAssociationEnd::new("feature", "Feature").with_multiplicity(Multiplicity::many()),
            ))
            .unwrap();
        registry
            .register_association(MetaAssociation::new(
                "ClassAttributes",
                MetaAssociationEnd::new("classOwner", "Class"),
                MetaAssociationEnd::new("attribute", "Feature")
                    .with_multiplicity(Multiplicity::many())
                    .redefines("feature"),
            ))
            .unwrap();
        let schema = registry.build_indexes().unwrap();

        assert!(schema.find_end("Type", "feature").is_some());
        assert!(schema.find_end("Class", "feature").is_none());
        assert!(schema.find_end("Class", "attribute").is_some());
    }

    #[test]
    fn test_subsetting_ends_recorded() {
        let mut registry = SchemaRegistry::new();
        registry.register_class(MetaClass::new("Type")).unwrap();
        registry.register_class(MetaClass::new("Feature")).unwrap();
        registry
            .register_association(MetaAssociation::new(
                "TypeFeatures",
                MetaAssociationEnd::new("typeWithFeature", "Type").non_navigable(),
                MetaAssociationEnd::new("feature", "Feature").with_multiplicity(Multiplicity::many()),
            ))
            .unwrap();
        registry
            .register_association(MetaAssociation::new(
                "TypeOwnedFeatures",
                MetaAssociationEnd::new("owningType", "Type"),
                MetaAssociationEnd::new("ownedFeature", "Feature")
                    .with_multiplicity(Multiplicity::many())
                    .subsets("feature"),
            ))
            .unwrap();
        let schema = registry.build_indexes().unwrap();

        let feature = schema.find_end("Type", "feature").unwrap();
        assert_eq!(feature.subsetted_by, vec!["ownedFeature".to_string()]);
    }

    #[test]
    fn test_ambiguous_end_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register_class(MetaClass::new("A")).unwrap();
        registry.register_class(MetaClass::new("B")).unwrap();
        registry.register_class(MetaClass::new("C").extends("A").extends("B")).unwrap();
        registry.register_class(MetaClass::new("X")).unwrap();
        registry
            .register_association(MetaAssociation::new(
                "AX",
                MetaAssociationEnd::new("a", "A"),
                MetaAssociationEnd::new("x", "X"),
            ))
            .unwrap();
        registry
            .register_association(MetaAssociation::new(
                "BX",
                MetaAssociationEnd::new("b", "B"),
                MetaAssociationEnd::new("x", "X"),
            ))
            .unwrap();

        let err = registry.build_indexes().unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Schema(SchemaError::AmbiguousEnd { ref class, .. }) if class == "C"
        ));
    }
}
