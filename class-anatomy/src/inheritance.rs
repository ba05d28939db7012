//! Inheritance metrics: DIT, NOC, NOOM and NOAM.
use crate::hierarchy;
use crate::model::{ClassId, Project};
use crate::provider::InheritorSearch;
use crate::value::Value;
use std::collections::BTreeSet;

/// Length of the chain of model superclasses above `class`.
pub fn dit(project: &Project, class: ClassId) -> Value {
    if !project.class(class).is_concrete() {
        return Value::Undefined;
    }
    let mut seen = BTreeSet::from([class]);
    let mut depth = 0usize;
    let mut current = class;
    while let Some(parent) = hierarchy::superclass(project, current) {
        if !seen.insert(parent) {
            break;
        }
        depth += 1;
        current = parent;
    }
    Value::from(depth)
}

/// Direct non-interface inheritors. Undefined for classes that cannot be
/// extended.
pub fn noc(project: &Project, search: &dyn InheritorSearch, class: ClassId) -> Value {
    let c = project.class(class);
    if !c.is_concrete() || c.modifiers().is_final {
        return Value::Undefined;
    }
    Value::from(search.inheritors(&c.qualified_name, false).len())
}

/// Instance methods split into (overriding, added).
fn split(project: &Project, class: ClassId) -> (usize, usize) {
    project
        .class(class)
        .methods
        .iter()
        .filter(|m| {
            let m = project.method(**m);
            !m.is_constructor() && !m.is_static()
        })
        .fold((0, 0), |(o, a), m| {
            if hierarchy::super_methods(project, *m).is_empty() {
                (o, a + 1)
            } else {
                (o + 1, a)
            }
        })
}

pub fn noom(project: &Project, class: ClassId) -> Value {
    if !project.class(class).is_concrete() {
        return Value::Undefined;
    }
    Value::from(split(project, class).0)
}

pub fn noam(project: &Project, class: ClassId) -> Value {
    if !project.class(class).is_concrete() {
        return Value::Undefined;
    }
    Value::from(split(project, class).1)
}
