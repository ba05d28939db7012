//! Inheritance relations between model classes.
//!
//! Only supertypes declared in the analyzed sources take part; library
//! supertypes are opaque.
use crate::ast::Visibility;
use crate::model::{ClassId, FieldId, MethodId, Project};
use crate::provider::InheritorSearch;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Superclass of `class` when it is a model class.
pub fn superclass(project: &Project, class: ClassId) -> Option<ClassId> {
    project
        .class(class)
        .decl
        .superclass
        .as_ref()
        .and_then(|t| t.resolved_class())
        .filter(|c| c.is_source())
        .and_then(|c| project.find_class(&c.qualified_name))
}

/// Superclass and implemented interfaces found in the model.
pub fn direct_supertypes(project: &Project, class: ClassId) -> Vec<ClassId> {
    let decl = &project.class(class).decl;
    decl.superclass
        .iter()
        .chain(decl.interfaces.iter())
        .filter_map(|t| t.resolved_class())
        .filter(|c| c.is_source())
        .filter_map(|c| project.find_class(&c.qualified_name))
        .filter(|id| *id != class)
        .collect()
}

/// Every transitive supertype, nearest first. Cycles are cut.
pub fn supertypes(project: &Project, class: ClassId) -> Vec<ClassId> {
    let mut seen = BTreeSet::from([class]);
    let mut order = Vec::new();
    let mut queue: VecDeque<ClassId> = direct_supertypes(project, class).into();
    while let Some(next) = queue.pop_front() {
        if !seen.insert(next) {
            continue;
        }
        order.push(next);
        queue.extend(direct_supertypes(project, next));
    }
    order
}

/// Whether `ancestor` is a transitive supertype of `class`.
pub fn is_inheritor(project: &Project, class: ClassId, ancestor: &str) -> bool {
    supertypes(project, class)
        .into_iter()
        .any(|s| project.class(s).qualified_name == ancestor)
}

fn can_override(project: &Project, method: MethodId) -> bool {
    let m = project.method(method);
    !m.is_constructor() && !m.is_static() && m.visibility() != Visibility::Private
}

/// Methods of supertypes that `method` overrides: same name and arity,
/// neither side a constructor, static or private.
pub fn super_methods(project: &Project, method: MethodId) -> Vec<MethodId> {
    if !can_override(project, method) {
        return Vec::new();
    }
    let m = project.method(method);
    supertypes(project, m.class)
        .into_iter()
        .flat_map(|s| project.class(s).methods.iter().copied())
        .filter(|c| can_override(project, *c))
        .filter(|c| {
            let other = project.method(*c);
            other.name == m.name && other.arity() == m.arity()
        })
        .collect()
}

/// Whether `test` overrides `method`.
pub fn overrides(project: &Project, test: MethodId, method: MethodId) -> bool {
    test != method && super_methods(project, test).contains(&method)
}

/// Non-constructor methods visible in `class`: its own plus those of its
/// supertypes that no other method in the set overrides.
pub fn all_methods(project: &Project, class: ClassId) -> Vec<MethodId> {
    let candidates: Vec<MethodId> = std::iter::once(class)
        .chain(supertypes(project, class))
        .flat_map(|c| project.class(c).methods.iter().copied())
        .filter(|m| !project.method(*m).is_constructor())
        .collect();
    candidates
        .iter()
        .copied()
        .filter(|m| !candidates.iter().any(|t| overrides(project, *t, *m)))
        .collect()
}

/// Fields declared by `class` and all its supertypes.
pub fn all_fields(project: &Project, class: ClassId) -> Vec<FieldId> {
    std::iter::once(class)
        .chain(supertypes(project, class))
        .flat_map(|c| project.class(c).fields.iter().copied())
        .collect()
}

/// Inheritor lookup built from the supertypes declared in a project.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    children: BTreeMap<String, BTreeSet<String>>,
    interfaces: BTreeSet<String>,
}

impl HierarchyIndex {
    pub fn new(project: &Project) -> Self {
        let mut index = HierarchyIndex::default();
        for (_, class) in project.classes() {
            if class.is_interface() {
                index.interfaces.insert(class.qualified_name.clone());
            }
            let decl = &class.decl;
            for parent in decl
                .superclass
                .iter()
                .chain(decl.interfaces.iter())
                .filter_map(|t| t.resolved_class())
            {
                index
                    .children
                    .entry(parent.qualified_name.clone())
                    .or_default()
                    .insert(class.qualified_name.clone());
            }
        }
        index
    }
}

impl InheritorSearch for HierarchyIndex {
    fn inheritors(&self, class: &str, deep: bool) -> Vec<String> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([class.to_string()]);
        while let Some(next) = queue.pop_front() {
            if let Some(children) = self.children.get(&next) {
                for child in children {
                    if child != class && found.insert(child.clone()) && deep {
                        queue.push_back(child.clone());
                    }
                }
            }
        }
        found
            .into_iter()
            .filter(|c| !self.interfaces.contains(c))
            .collect()
    }
}

/// Memoized count of non-interface inheritors at any depth.
///
/// One cache belongs to one analysis run.
#[derive(Debug, Default)]
pub struct SubclassCache {
    counts: HashMap<String, usize>,
}

impl SubclassCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&mut self, search: &dyn InheritorSearch, class: &str) -> usize {
        if let Some(n) = self.counts.get(class) {
            return *n;
        }
        let n = search.inheritors(class, true).len();
        self.counts.insert(class.to_string(), n);
        n
    }
}
