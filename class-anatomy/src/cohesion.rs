//! Lack of cohesion (LCOM) and tight class cohesion (TCC).
use crate::ast::{self, CallExpr, FieldAccessExpr, Visit};
use crate::model::{ClassId, FieldId, MethodId, Project};
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Methods every class gets by convention; they say nothing about cohesion.
pub const BOILERPLATE_METHODS: [&str; 7] = [
    "toString",
    "equals",
    "hashCode",
    "finalize",
    "clone",
    "readObject",
    "writeObject",
];

/// Instance methods taking part in cohesion: no constructors, no static
/// methods, nothing from [`BOILERPLATE_METHODS`].
pub fn applicable_methods(project: &Project, class: ClassId) -> Vec<MethodId> {
    project
        .class(class)
        .methods
        .iter()
        .copied()
        .filter(|m| {
            let m = project.method(*m);
            !m.is_constructor() && !m.is_static() && !BOILERPLATE_METHODS.contains(&m.name.as_str())
        })
        .collect()
}

struct Usage<'a> {
    project: &'a Project,
    class: ClassId,
    fields: BTreeSet<FieldId>,
    calls: BTreeSet<(String, usize)>,
}

impl Visit for Usage<'_> {
    fn visit_field_access(&mut self, access: &FieldAccessExpr) {
        if let Some(target) = &access.target {
            let class = self.project.class(self.class);
            if target.owner.qualified_name == class.qualified_name {
                let own = class.fields.iter().copied().find(|f| {
                    let f = self.project.field(*f);
                    f.name == target.name && !f.is_static()
                });
                if let Some(f) = own {
                    self.fields.insert(f);
                }
            }
        }
        if let Some(q) = &access.qualifier {
            self.visit_node(q);
        }
    }

    fn visit_call(&mut self, call: &CallExpr) {
        if let Some(target) = &call.target {
            if target.owner.qualified_name == self.project.class(self.class).qualified_name {
                self.calls.insert((target.name.clone(), target.arity));
            }
        }
        ast::walk_call(self, call);
    }
}

/// Instance fields of its own class a method reads or writes, and the own
/// methods it calls by `(name, arity)`.
fn usage(project: &Project, method: MethodId) -> (BTreeSet<FieldId>, BTreeSet<(String, usize)>) {
    let m = project.method(method);
    let mut v = Usage {
        project,
        class: m.class,
        fields: BTreeSet::new(),
        calls: BTreeSet::new(),
    };
    for n in &m.decl.body {
        v.visit_node(n);
    }
    (v.fields, v.calls)
}

/// Field usage and symmetric call links among the applicable methods.
pub struct CohesionGraph {
    pub methods: Vec<MethodId>,
    pub fields: BTreeMap<MethodId, BTreeSet<FieldId>>,
    pub links: BTreeMap<MethodId, BTreeSet<MethodId>>,
}

impl CohesionGraph {
    pub fn new(project: &Project, class: ClassId) -> Self {
        let methods = applicable_methods(project, class);
        let mut fields = BTreeMap::new();
        let mut links: BTreeMap<MethodId, BTreeSet<MethodId>> =
            methods.iter().map(|m| (*m, BTreeSet::new())).collect();
        for m in &methods {
            let (used, calls) = usage(project, *m);
            fields.insert(*m, used);
            for callee in &methods {
                let c = project.method(*callee);
                if callee != m && calls.contains(&(c.name.clone(), c.arity())) {
                    links.entry(*m).or_default().insert(*callee);
                    links.entry(*callee).or_default().insert(*m);
                }
            }
        }
        Self {
            methods,
            fields,
            links,
        }
    }
}

/// Partition methods into groups connected through shared fields or calls.
///
/// A component grows by absorbing any method whose fields intersect the
/// component's running field union, or which is call-linked to a method
/// already in it. Methods that neither touch a field nor take part in a
/// call link are left out.
pub fn components<M, F>(
    methods: &[M],
    fields: &BTreeMap<M, BTreeSet<F>>,
    links: &BTreeMap<M, BTreeSet<M>>,
) -> Vec<BTreeSet<M>>
where
    M: Ord + Copy,
    F: Ord + Clone,
{
    let no_fields = BTreeSet::new();
    let no_links = BTreeSet::new();
    let fields_of = |m: &M| fields.get(m).unwrap_or(&no_fields);
    let links_of = |m: &M| links.get(m).unwrap_or(&no_links);

    let mut remaining: Vec<M> = methods
        .iter()
        .copied()
        .filter(|m| !fields_of(m).is_empty() || !links_of(m).is_empty())
        .collect();
    let mut result = Vec::new();
    while !remaining.is_empty() {
        let seed = remaining.remove(0);
        let mut members = BTreeSet::from([seed]);
        let mut union: BTreeSet<F> = fields_of(&seed).clone();
        loop {
            let before = members.len();
            remaining.retain(|m| {
                let shares = !fields_of(m).is_disjoint(&union);
                let linked = !links_of(m).is_disjoint(&members);
                if shares || linked {
                    members.insert(*m);
                    union.extend(fields_of(m).iter().cloned());
                    false
                } else {
                    true
                }
            });
            if members.len() == before {
                break;
            }
        }
        result.push(members);
    }
    result
}

/// Number of connected components; 0 when no method touches a field or
/// calls another applicable method, even though applicable methods exist.
///
/// Undefined for non-concrete classes and for classes without applicable
/// methods.
pub fn lcom(project: &Project, class: ClassId) -> Value {
    if !project.class(class).is_concrete() {
        return Value::Undefined;
    }
    let graph = CohesionGraph::new(project, class);
    if graph.methods.is_empty() {
        return Value::Undefined;
    }
    Value::from(components(&graph.methods, &graph.fields, &graph.links).len())
}

/// Share of method pairs using at least one common field; 1 for a single
/// method.
pub fn tcc(project: &Project, class: ClassId) -> Value {
    if !project.class(class).is_concrete() {
        return Value::Undefined;
    }
    let graph = CohesionGraph::new(project, class);
    let n = graph.methods.len();
    match n {
        0 => Value::Undefined,
        1 => Value::from(1usize),
        _ => {
            let empty = BTreeSet::new();
            let mut connected = 0usize;
            for (i, a) in graph.methods.iter().enumerate() {
                let fa = graph.fields.get(a).unwrap_or(&empty);
                for b in &graph.methods[i + 1..] {
                    let fb = graph.fields.get(b).unwrap_or(&empty);
                    if !fa.is_disjoint(fb) {
                        connected += 1;
                    }
                }
            }
            Value::ratio(connected, n * (n - 1) / 2).unwrap_or(Value::Undefined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(u8, &str)]) -> BTreeMap<u8, BTreeSet<char>> {
        entries
            .iter()
            .map(|(m, f)| (*m, f.chars().collect()))
            .collect()
    }

    #[test]
    fn fields_chain_into_one_component() {
        let fields = map(&[(1, "a"), (2, "b"), (3, "ab")]);
        let c = components(&[1, 2, 3], &fields, &BTreeMap::new());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn call_links_join_components() {
        let fields = map(&[(1, "a"), (2, "b")]);
        let links = BTreeMap::from([(1u8, BTreeSet::from([2u8])), (2u8, BTreeSet::from([1u8]))]);
        assert_eq!(components(&[1, 2], &fields, &links).len(), 1);
        assert_eq!(components(&[1, 2], &fields, &BTreeMap::new()).len(), 2);
    }

    #[test]
    fn methods_without_fields_or_links_are_ignored() {
        let fields = map(&[(1, "a"), (2, "")]);
        assert_eq!(components(&[1, 2], &fields, &BTreeMap::new()).len(), 1);
        assert!(components(&[2], &fields, &BTreeMap::new()).is_empty());
    }
}
