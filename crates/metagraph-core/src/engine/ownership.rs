//! Composition of children under parents through intermediate classes.

use super::{Engine, InstanceRef};
use crate::error::Result;
use crate::storage::ObjectId;
use tracing::{debug, instrument, warn};

impl Engine {
    /// Compose `child` under `parent`.
    ///
    /// Picks the most specific ownership binding for the two classes,
    /// instantiates its intermediate class and links parent to intermediate,
    /// then intermediate to child. Returns the intermediate. A failure after
    /// the intermediate exists leaves the partial wiring in place.
    #[instrument(skip(self))]
    pub fn add_child(&self, parent: ObjectId, child: ObjectId) -> Result<InstanceRef> {
        let parent = self.require_instance(parent)?;
        let child = self.require_instance(child)?;
        let binding = self.schema().resolve_ownership(&parent.class, &child.class)?;

        let intermediate = self.create_instance(&binding.intermediate)?;
        let steps = [(&binding.owner_end, parent.id), (&binding.owned_end, child.id)];
        for (completed, (end, value)) in steps.into_iter().enumerate() {
            let (source, target) = end.link_endpoints(intermediate.id, value);
            if let Err(err) = self.link_internal(&end.association, source, target, false) {
                warn!(
                    intermediate = %intermediate,
                    completed,
                    error = %err,
                    "ownership wiring partially applied"
                );
                return Err(err);
            }
        }

        debug!(parent = %parent, child = %child, intermediate = %intermediate, "child composed");
        Ok(intermediate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MetaAssociation, MetaAssociationEnd, MetaClass, Multiplicity, SchemaRegistry};
    use crate::error::{Error, SchemaError, StateError};
    use crate::value::Value;

    /// `Membership` composes any `Element` under a `Namespace`;
    /// `FeatureMembership` composes `Feature`s under `Type`s.
    fn engine() -> Engine {
        let mut registry = SchemaRegistry::new();
        registry.register_class(MetaClass::new("Element")).unwrap();
        registry.register_class(MetaClass::new("Namespace").extends("Element")).unwrap();
        registry.register_class(MetaClass::new("Type").extends("Namespace")).unwrap();
        registry.register_class(MetaClass::new("Feature").extends("Type")).unwrap();
        registry
            .register_class(
                MetaClass::new("Membership")
                    .extends("Element")
                    .with_ownership("memberElement", "membershipNamespace"),
            )
            .unwrap();
        registry
            .register_class(
                MetaClass::new("FeatureMembership")
                    .extends("Membership")
                    .with_ownership("ownedMemberFeature", "owningType"),
            )
            .unwrap();

        registry
            .register_association(MetaAssociation::composite(
                "NamespaceMemberships",
                "Namespace",
                "membershipNamespace",
                "Membership",
                "ownedMembership",
            ))
            .unwrap();
        registry
            .register_association(MetaAssociation::new(
                "MembershipElements",
                MetaAssociationEnd::new("owningMembership", "Membership"),
                MetaAssociationEnd::new("memberElement", "Element").composite(),
            ))
            .unwrap();
        registry
            .register_association(MetaAssociation::composite(
                "TypeFeatureMemberships",
                "Type",
                "owningType",
                "FeatureMembership",
                "ownedFeatureMembership",
            ))
            .unwrap();
        registry
            .register_association(MetaAssociation::new(
                "FeatureMembershipFeatures",
                MetaAssociationEnd::new("owningFeatureMembership", "FeatureMembership"),
                MetaAssociationEnd::new("ownedMemberFeature", "Feature")
                    .with_multiplicity(Multiplicity::optional())
                    .composite(),
            ))
            .unwrap();
        Engine::with_schema(registry.build_indexes().unwrap())
    }

    #[test]
    fn test_general_binding() {
        let engine = engine();
        let ns = engine.create_instance("Namespace").unwrap();
        let feature = engine.create_instance("Feature").unwrap();

        let membership = engine.add_child(ns.id, feature.id).unwrap();
        assert_eq!(membership.class, "Membership");
        assert_eq!(
            engine.get_property_value(&ns, "ownedMembership").unwrap(),
            Value::refs([membership.id])
        );
        assert_eq!(
            engine.get_property_value(&membership, "memberElement").unwrap(),
            Value::Ref(feature.id)
        );
        assert_eq!(engine.composite_owner(feature.id), Some(membership.clone()));
        assert_eq!(engine.composite_owner(membership.id), Some(ns));
    }

    #[test]
    fn test_most_specific_binding() {
        let engine = engine();
        let ty = engine.create_instance("Type").unwrap();
        let feature = engine.create_instance("Feature").unwrap();

        let membership = engine.add_child(ty.id, feature.id).unwrap();
        assert_eq!(membership.class, "FeatureMembership");
        assert_eq!(
            engine.get_property_value(&feature, "owningFeatureMembership").unwrap(),
            Value::Ref(membership.id)
        );
        assert_eq!(
            engine.get_property_value(&membership, "owningType").unwrap(),
            Value::Ref(ty.id)
        );
    }

    #[test]
    fn test_no_binding() {
        let engine = engine();
        let element = engine.create_instance("Element").unwrap();
        let feature = engine.create_instance("Feature").unwrap();

        assert!(matches!(
            engine.add_child(element.id, feature.id),
            Err(Error::Schema(SchemaError::NoOwnershipBinding { .. }))
        ));
        assert!(matches!(
            engine.add_child(element.id, ObjectId::new(999)),
            Err(Error::InstanceNotFound(_))
        ));
        assert_eq!(engine.storage().node_count(), 2);
    }

    #[test]
    fn test_partial_wiring_left_in_place() {
        let engine = engine();
        let first = engine.create_instance("Namespace").unwrap();
        let second = engine.create_instance("Namespace").unwrap();
        let element = engine.create_instance("Element").unwrap();
        engine.add_child(first.id, element.id).unwrap();

        // The element already has an owning membership.
        let err = engine.add_child(second.id, element.id).unwrap_err();
        assert!(matches!(err, Error::State(StateError::Multiplicity { .. })));
        let orphans = engine.get_instances_by_type("Membership");
        assert_eq!(orphans.len(), 2);
        assert_eq!(engine.composite_parts(second.id).len(), 1);
    }
}
