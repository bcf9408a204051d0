//! Mutable schema registry and the freeze step that indexes it.

use super::association::MetaAssociation;
use super::class::MetaClass;
use super::schema::{
    ClassView, EndBinding, ResolvedConstraint, ResolvedOperation, ResolvedOwnership, Schema,
};
use crate::error::{Result, SchemaError};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Collects class and association declarations before the schema is frozen.
///
/// Registration fails fast on duplicates, inheritance cycles and invalid
/// `#opposite` declarations. [`build_indexes`](Self::build_indexes) consumes
/// the registry, so a schema can no longer change once it is in use.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    classes: Vec<MetaClass>,
    class_index: HashMap<String, usize>,
    associations: Vec<MetaAssociation>,
    association_index: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class.
    pub fn register_class(&mut self, class: MetaClass) -> Result<()> {
        if self.class_index.contains_key(&class.name) {
            return Err(SchemaError::DuplicateClass(class.name).into());
        }

        // A new class can only close a cycle through registered classes that
        // already list it as a superclass.
        for superclass in &class.superclasses {
            let mut path = vec![class.name.clone()];
            let mut visited = HashSet::new();
            if self.path_to(superclass, &class.name, &mut path, &mut visited) {
                return Err(SchemaError::InheritanceCycle(path).into());
            }
        }

        debug!(class = %class.name, superclasses = ?class.superclasses, "registered class");
        self.class_index.insert(class.name.clone(), self.classes.len());
        self.classes.push(class);
        Ok(())
    }

    /// Depth-first search for `target` starting at `from`, recording the path.
    fn path_to(
        &self,
        from: &str,
        target: &str,
        path: &mut Vec<String>,
        visited: &mut HashSet<String>,
    ) -> bool {
        path.push(from.to_string());
        if from == target {
            return true;
        }
        if visited.insert(from.to_string()) {
            if let Some(&i) = self.class_index.get(from) {
                for next in &self.classes[i].superclasses {
                    if self.path_to(next, target, path, visited) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }

    /// Register an association.
    pub fn register_association(&mut self, association: MetaAssociation) -> Result<()> {
        if self.association_index.contains_key(&association.name) {
            return Err(SchemaError::DuplicateAssociation(association.name).into());
        }

        if association.source.is_opposite() && association.target.is_opposite() {
            return Err(SchemaError::InvalidOpposite {
                association: association.name.clone(),
                end: association.target.name.clone(),
                reason: "#opposite declared on both ends".to_string(),
            }
            .into());
        }
        for (_, end) in association.ends() {
            if end.is_opposite() && end.navigable {
                return Err(SchemaError::InvalidOpposite {
                    association: association.name.clone(),
                    end: end.name.clone(),
                    reason: "#opposite end must not be navigable".to_string(),
                }
                .into());
            }
        }

        debug!(association = %association.name, "registered association");
        self.association_index
            .insert(association.name.clone(), self.associations.len());
        self.associations.push(association);
        Ok(())
    }

    /// Get a registered class.
    pub fn get_class(&self, name: &str) -> Option<&MetaClass> {
        self.class_index.get(name).map(|&i| &self.classes[i])
    }

    /// Get a registered association.
    pub fn get_association(&self, name: &str) -> Option<&MetaAssociation> {
        self.association_index
            .get(name)
            .map(|&i| &self.associations[i])
    }

    /// Number of registered classes.
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Resolve every reference, compute inherited views and freeze the schema.
    pub fn build_indexes(self) -> Result<Schema> {
        self.check_references()?;
        self.topological_order()?;

        let mut views: Vec<ClassView> = vec![ClassView::default(); self.classes.len()];

        for (i, class) in self.classes.iter().enumerate() {
            let mut ancestors = Vec::new();
            let mut seen = HashSet::new();
            seen.insert(class.name.clone());
            self.collect_ancestors(class, &mut ancestors, &mut seen);
            views[i].ancestor_set = ancestors.iter().cloned().collect();
            views[i].ancestors = ancestors;
        }

        let precedence: Vec<Vec<String>> = views
            .iter()
            .map(|view| self.precedence_order(&view.ancestors, &views))
            .collect();
        for (view, order) in views.iter_mut().zip(precedence) {
            view.precedence = order;
        }

        // Depth needs parents first; memoize recursively.
        let mut depths: HashMap<String, usize> = HashMap::new();
        for class in &self.classes {
            self.depth_of(&class.name, &mut depths);
        }

        for (i, class) in self.classes.iter().enumerate() {
            views[i].depth = depths.get(&class.name).copied().unwrap_or(0);
            let ancestors = views[i].ancestors.clone();
            for ancestor in &ancestors {
                if let Some(&a) = self.class_index.get(ancestor) {
                    views[a].descendants.push(class.name.clone());
                }
            }
        }

        for i in 0..self.classes.len() {
            let lineage: Vec<&MetaClass> = std::iter::once(&self.classes[i])
                .chain(
                    views[i]
                        .precedence
                        .iter()
                        .filter_map(|a| self.get_class(a)),
                )
                .collect();

            let mut attribute_names = HashSet::new();
            let mut operation_names = HashSet::new();
            let mut constraint_names = HashSet::new();
            for declaring in &lineage {
                for attribute in &declaring.attributes {
                    if attribute_names.insert(attribute.name.clone()) {
                        views[i].attributes.push(attribute.clone());
                    }
                }
                for operation in &declaring.operations {
                    if operation_names.insert(operation.name.clone()) {
                        views[i].operations.push(ResolvedOperation {
                            declared_in: declaring.name.clone(),
                            operation: operation.clone(),
                        });
                    }
                }
                for decl in &declaring.constraints {
                    if constraint_names.insert(decl.name.clone()) {
                        views[i].constraints.push(ResolvedConstraint {
                            declared_in: declaring.name.clone(),
                            decl: decl.clone(),
                        });
                    }
                }
            }

            let ends = self.visible_ends(&self.classes[i].name, &views[i])?;
            views[i].ends = ends;
        }

        let ownership = self.resolve_bindings(&views)?;

        info!(
            classes = self.classes.len(),
            associations = self.associations.len(),
            ownership_bindings = ownership.len(),
            "schema frozen"
        );

        Ok(Schema {
            classes: self.classes,
            class_index: self.class_index,
            associations: self.associations,
            association_index: self.association_index,
            views,
            ownership,
        })
    }

    /// Superclasses, end types, reference types and `subsets`/`redefines`
    /// must all resolve.
    fn check_references(&self) -> Result<()> {
        for class in &self.classes {
            for superclass in &class.superclasses {
                if !self.class_index.contains_key(superclass) {
                    return Err(SchemaError::UnknownClass(superclass.clone()).into());
                }
            }
            for attribute in &class.attributes {
                if let Some(target) = attribute.value_type.referenced_class() {
                    if !self.class_index.contains_key(target) {
                        return Err(SchemaError::UnknownClass(target.to_string()).into());
                    }
                }
            }
        }

        let end_names: HashSet<&str> = self
            .associations
            .iter()
            .flat_map(|a| [a.source.name.as_str(), a.target.name.as_str()])
            .collect();

        for association in &self.associations {
            for (_, end) in association.ends() {
                if !self.class_index.contains_key(&end.class) {
                    return Err(SchemaError::UnknownClass(end.class.clone()).into());
                }
                for referenced in end.subsets.iter().chain(&end.redefines) {
                    if !end_names.contains(referenced.as_str()) {
                        return Err(SchemaError::UnknownEnd {
                            association: association.name.clone(),
                            end: end.name.clone(),
                            referenced: referenced.clone(),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Topological order (superclasses first), rejecting cycles.
    fn topological_order(&self) -> Result<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        fn visit(
            registry: &SchemaRegistry,
            i: usize,
            marks: &mut [Mark],
            stack: &mut Vec<String>,
            order: &mut Vec<String>,
        ) -> std::result::Result<(), SchemaError> {
            let class = &registry.classes[i];
            match marks[i] {
                Mark::Done => return Ok(()),
                Mark::Visiting => {
                    let start = stack.iter().position(|n| *n == class.name).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(class.name.clone());
                    return Err(SchemaError::InheritanceCycle(cycle));
                }
                Mark::Unvisited => {}
            }
            marks[i] = Mark::Visiting;
            stack.push(class.name.clone());
            for superclass in &class.superclasses {
                if let Some(&s) = registry.class_index.get(superclass) {
                    visit(registry, s, marks, stack, order)?;
                }
            }
            stack.pop();
            marks[i] = Mark::Done;
            order.push(class.name.clone());
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.classes.len()];
        let mut order = Vec::with_capacity(self.classes.len());
        let mut stack = Vec::new();
        for i in 0..self.classes.len() {
            visit(self, i, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    /// Declaration-order depth-first preorder, skipping repeats.
    fn collect_ancestors(
        &self,
        class: &MetaClass,
        out: &mut Vec<String>,
        seen: &mut HashSet<String>,
    ) {
        for superclass in &class.superclasses {
            if seen.insert(superclass.clone()) {
                out.push(superclass.clone());
                if let Some(parent) = self.get_class(superclass) {
                    self.collect_ancestors(parent, out, seen);
                }
            }
        }
    }

    /// Stable reordering of a depth-first ancestor list in which no class
    /// follows one of its own ancestors.
    fn precedence_order(&self, ancestors: &[String], views: &[ClassView]) -> Vec<String> {
        let inherits = |class: &str, ancestor: &str| {
            self.class_index
                .get(class)
                .is_some_and(|&c| views[c].ancestor_set.contains(ancestor))
        };
        let mut pending: Vec<&String> = ancestors.iter().collect();
        let mut order = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let next = pending
                .iter()
                .position(|candidate| {
                    !pending
                        .iter()
                        .any(|other| inherits(other.as_str(), candidate.as_str()))
                })
                .unwrap_or(0);
            order.push(pending.remove(next).clone());
        }
        order
    }

    fn depth_of(&self, name: &str, depths: &mut HashMap<String, usize>) -> usize {
        if let Some(&d) = depths.get(name) {
            return d;
        }
        let depth = match self.get_class(name) {
            Some(class) if !class.superclasses.is_empty() => {
                let mut deepest = 0;
                for superclass in &class.superclasses {
                    deepest = deepest.max(self.depth_of(superclass, depths));
                }
                deepest + 1
            }
            _ => 0,
        };
        depths.insert(name.to_string(), depth);
        depth
    }

    fn conforms(&self, class: &str, view: &ClassView, sup: &str) -> bool {
        class == sup || view.ancestor_set.contains(sup)
    }

    /// Ends readable from `class`: navigable or derived ends whose opposite
    /// class is `class` or an ancestor, minus redefined ends, with name
    /// overlaps resolved to the most specific owner.
    fn visible_ends(&self, class: &str, view: &ClassView) -> Result<Vec<EndBinding>> {
        let mut candidates: Vec<EndBinding> = Vec::new();
        for association in &self.associations {
            for (side, end) in association.ends() {
                let opposite = association.end(side.other());
                if !(end.navigable || end.is_derived()) {
                    continue;
                }
                if !self.conforms(class, view, &opposite.class) {
                    continue;
                }
                candidates.push(EndBinding {
                    association: association.name.clone(),
                    side,
                    end: end.clone(),
                    opposite: opposite.clone(),
                    subsetted_by: Vec::new(),
                });
            }
        }

        let redefined: HashSet<(String, String)> = candidates
            .iter()
            .flat_map(|b| {
                b.end
                    .redefines
                    .iter()
                    .filter(move |r| **r != b.end.name)
                    .map(move |r| (r.clone(), b.association.clone()))
            })
            .collect();
        candidates.retain(|b| {
            !redefined
                .iter()
                .any(|(name, by)| *name == b.end.name && *by != b.association)
        });

        // Name overlaps: keep the ends whose owner is not strictly more
        // general than another candidate's owner.
        let mut ends: Vec<EndBinding> = Vec::new();
        for binding in &candidates {
            if ends.iter().any(|e| e.end.name == binding.end.name) {
                continue;
            }
            let same_name: Vec<&EndBinding> = candidates
                .iter()
                .filter(|b| b.end.name == binding.end.name)
                .collect();
            let best: Vec<&EndBinding> = same_name
                .iter()
                .copied()
                .filter(|b| {
                    !same_name.iter().any(|o| {
                        o.owner_class() != b.owner_class()
                            && self.is_ancestor_of(b.owner_class(), o.owner_class())
                    })
                })
                .collect();
            match best.as_slice() {
                [single] => ends.push((*single).clone()),
                [first, second, ..] => {
                    return Err(SchemaError::AmbiguousEnd {
                        class: class.to_string(),
                        end: binding.end.name.clone(),
                        first: first.association.clone(),
                        second: second.association.clone(),
                    }
                    .into())
                }
                [] => {}
            }
        }

        // Transitive subsetting among the visible ends.
        let snapshot = ends.clone();
        for binding in &mut ends {
            let mut pending = vec![binding.end.name.clone()];
            let mut seen: HashSet<String> = HashSet::new();
            seen.insert(binding.end.name.clone());
            while let Some(name) = pending.pop() {
                for other in &snapshot {
                    if other.end.subsets.contains(&name) && seen.insert(other.end.name.clone()) {
                        binding.subsetted_by.push(other.end.name.clone());
                        pending.push(other.end.name.clone());
                    }
                }
            }
        }

        Ok(ends)
    }

    /// Whether `ancestor` is a strict ancestor of `class`.
    fn is_ancestor_of(&self, ancestor: &str, class: &str) -> bool {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        if let Some(c) = self.get_class(class) {
            self.collect_ancestors(c, &mut out, &mut seen);
        }
        out.iter().any(|a| a == ancestor)
    }

    fn resolve_bindings(&self, views: &[ClassView]) -> Result<Vec<ResolvedOwnership>> {
        let mut resolved = Vec::new();
        for (i, class) in self.classes.iter().enumerate() {
            let Some(binding) = &class.ownership else {
                continue;
            };
            let find = |name: &str| -> Result<EndBinding> {
                let end = views[i]
                    .ends
                    .iter()
                    .find(|b| b.end.name == name)
                    .ok_or_else(|| SchemaError::InvalidOwnershipBinding {
                        class: class.name.clone(),
                        reason: format!("end '{}' is not reachable from the class", name),
                    })?;
                if !end.is_stored() {
                    return Err(SchemaError::InvalidOwnershipBinding {
                        class: class.name.clone(),
                        reason: format!("end '{}' is derived", name),
                    }
                    .into());
                }
                Ok(end.clone())
            };
            let owned_end = find(&binding.owned_element_end)?;
            let owner_end = find(&binding.owner_end)?;
            if owned_end.association == owner_end.association && owned_end.side == owner_end.side {
                return Err(SchemaError::InvalidOwnershipBinding {
                    class: class.name.clone(),
                    reason: "owner and owned element use the same end".to_string(),
                }
                .into());
            }
            resolved.push(ResolvedOwnership {
                intermediate: class.name.clone(),
                owned_end,
                owner_end,
            });
        }
        Ok(resolved)
    }
}
