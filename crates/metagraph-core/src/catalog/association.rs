//! Association definitions between classes.

use super::types::{AggregationKind, Multiplicity};
use serde::{Deserialize, Serialize};

/// Derivation sentinel marking an end as the inverse of its paired end.
pub const OPPOSITE: &str = "#opposite";

/// Which end of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndSide {
    /// End typed by the class of a link's source object.
    Source,
    /// End typed by the class of a link's target object.
    Target,
}

impl EndSide {
    /// The other side.
    pub fn other(self) -> Self {
        match self {
            EndSide::Source => EndSide::Target,
            EndSide::Target => EndSide::Source,
        }
    }
}

/// One end of an association.
///
/// An end is read from instances of the class at the *other* end: the
/// target end named `children` is the property `children` of source objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaAssociationEnd {
    /// End name, used as the property name on the opposite class.
    pub name: String,
    /// Class of the objects at this end.
    pub class: String,
    /// Value count bounds.
    pub multiplicity: Multiplicity,
    /// Whether the end can be navigated to from the opposite class.
    pub navigable: bool,
    /// Ownership strength; composite makes the objects at this end parts of
    /// the object the end is read from.
    pub aggregation: AggregationKind,
    /// Whether the end is computed rather than stored.
    pub derived: bool,
    /// Derivation: [`OPPOSITE`] or an evaluator name.
    pub derivation: Option<String>,
    /// Whether multi-valued contents keep insertion order.
    pub ordered: bool,
    /// Whether multi-valued contents reject duplicates.
    pub unique: bool,
    /// Ends whose values include this end's values.
    pub subsets: Vec<String>,
    /// Ends this end replaces in the classes where it is visible.
    pub redefines: Vec<String>,
}

/// A typed, bidirectional relationship between two classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaAssociation {
    /// Association name (unique within schema).
    pub name: String,
    /// End at link sources.
    pub source: MetaAssociationEnd,
    /// End at link targets.
    pub target: MetaAssociationEnd,
}

impl MetaAssociationEnd {
    /// Create a navigable, stored end with `0..1` multiplicity.
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            multiplicity: Multiplicity::optional(),
            navigable: true,
            aggregation: AggregationKind::None,
            derived: false,
            derivation: None,
            ordered: false,
            unique: true,
            subsets: Vec::new(),
            redefines: Vec::new(),
        }
    }

    /// Set the multiplicity.
    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    /// Mark as not navigable.
    pub fn non_navigable(mut self) -> Self {
        self.navigable = false;
        self
    }

    /// Mark as composite.
    pub fn composite(mut self) -> Self {
        self.aggregation = AggregationKind::Composite;
        self
    }

    /// Mark as shared aggregation.
    pub fn shared(mut self) -> Self {
        self.aggregation = AggregationKind::Shared;
        self
    }

    /// Mark as ordered.
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Allow duplicate values.
    pub fn non_unique(mut self) -> Self {
        self.unique = false;
        self
    }

    /// Mark as the derived inverse of the paired end.
    pub fn opposite(mut self) -> Self {
        self.derived = true;
        self.derivation = Some(OPPOSITE.to_string());
        self
    }

    /// Mark as derived by a registered evaluator.
    pub fn derived(mut self, derivation: impl Into<String>) -> Self {
        self.derived = true;
        self.derivation = Some(derivation.into());
        self
    }

    /// Declare that this end subsets another end.
    pub fn subsets(mut self, end: impl Into<String>) -> Self {
        self.subsets.push(end.into());
        self
    }

    /// Declare that this end redefines another end.
    pub fn redefines(mut self, end: impl Into<String>) -> Self {
        self.redefines.push(end.into());
        self
    }

    /// Whether this end uses the [`OPPOSITE`] sentinel.
    pub fn is_opposite(&self) -> bool {
        self.derivation.as_deref() == Some(OPPOSITE)
    }

    /// Whether values of this end are computed.
    pub fn is_derived(&self) -> bool {
        self.derived || self.derivation.is_some()
    }

    /// Whether this end is a composite part end.
    pub fn is_composite(&self) -> bool {
        self.aggregation == AggregationKind::Composite
    }
}

impl MetaAssociation {
    /// Create an association from its two ends.
    pub fn new(
        name: impl Into<String>,
        source: MetaAssociationEnd,
        target: MetaAssociationEnd,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            target,
        }
    }

    /// Create a composite association: `owner` owns `parts`.
    ///
    /// The owner end is `0..1` and the parts end `0..*` composite.
    pub fn composite(
        name: impl Into<String>,
        owner_class: impl Into<String>,
        owner_end: impl Into<String>,
        part_class: impl Into<String>,
        parts_end: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            MetaAssociationEnd::new(owner_end, owner_class),
            MetaAssociationEnd::new(parts_end, part_class)
                .with_multiplicity(Multiplicity::many())
                .composite(),
        )
    }

    /// Get an end by side.
    pub fn end(&self, side: EndSide) -> &MetaAssociationEnd {
        match side {
            EndSide::Source => &self.source,
            EndSide::Target => &self.target,
        }
    }

    /// Get an end by name.
    pub fn end_named(&self, name: &str) -> Option<(EndSide, &MetaAssociationEnd)> {
        if self.source.name == name {
            Some((EndSide::Source, &self.source))
        } else if self.target.name == name {
            Some((EndSide::Target, &self.target))
        } else {
            None
        }
    }

    /// Both ends with their sides.
    pub fn ends(&self) -> [(EndSide, &MetaAssociationEnd); 2] {
        [(EndSide::Source, &self.source), (EndSide::Target, &self.target)]
    }
}
