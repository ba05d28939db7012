//! Coupling metrics: CBO, RFC, DAC and MPC.
use crate::ast::{self, CallExpr, NewExpr, TypeDecl, Visit};
use crate::dependencies::DependencyGraph;
use crate::model::{ClassId, Project};
use crate::value::Value;
use std::collections::BTreeSet;

/// Distinct classes `class` depends on or is depended on by.
pub fn cbo(project: &Project, graph: &DependencyGraph, class: ClassId) -> Value {
    let c = project.class(class);
    if !c.is_concrete() {
        return Value::Undefined;
    }
    let name = &c.qualified_name;
    let mut coupled = graph.class_dependencies(name);
    coupled.extend(graph.class_dependents(name));
    Value::from(coupled.len())
}

/// Collects call targets in a class body without entering local or
/// anonymous class bodies.
#[derive(Default)]
struct Calls {
    targets: BTreeSet<(String, String, usize)>,
    sites: Vec<String>,
}

impl Visit for Calls {
    fn visit_call(&mut self, call: &CallExpr) {
        if let Some(target) = &call.target {
            self.targets.insert(target.key());
            self.sites.push(target.owner.qualified_name.clone());
        }
        ast::walk_call(self, call);
    }

    fn visit_new(&mut self, expr: &NewExpr) {
        if let Some(ctor) = &expr.constructor {
            self.targets.insert(ctor.key());
        }
        ast::walk_new(self, expr);
    }

    fn visit_local_class(&mut self, _decl: &TypeDecl) {}

    fn visit_anonymous_class(&mut self, _decl: &TypeDecl) {}
}

fn calls(project: &Project, class: ClassId) -> Calls {
    let mut v = Calls::default();
    let c = project.class(class);
    for m in &c.methods {
        for n in &project.method(*m).decl.body {
            v.visit_node(n);
        }
    }
    for f in &c.fields {
        if let Some(init) = &project.field(*f).decl.initializer {
            v.visit_node(init);
        }
    }
    for n in &c.decl.initializers {
        v.visit_node(n);
    }
    v
}

/// Own methods plus every distinct method or constructor invoked from the
/// class body.
pub fn rfc(project: &Project, class: ClassId) -> Value {
    let c = project.class(class);
    if !c.is_concrete() {
        return Value::Undefined;
    }
    let mut response: BTreeSet<(String, String, usize)> = c
        .methods
        .iter()
        .map(|m| {
            let m = project.method(*m);
            (c.qualified_name.clone(), m.name.clone(), m.arity())
        })
        .collect();
    response.extend(calls(project, class).targets);
    Value::from(response.len())
}

/// Call sites whose target lives in another class.
pub fn mpc(project: &Project, class: ClassId) -> Value {
    let c = project.class(class);
    if !c.is_concrete() {
        return Value::Undefined;
    }
    let own = &c.qualified_name;
    let n = calls(project, class)
        .sites
        .iter()
        .filter(|owner| *owner != own)
        .count();
    Value::from(n)
}

/// Distinct classes used as field types, other than the class itself.
pub fn dac(project: &Project, class: ClassId) -> Value {
    let c = project.class(class);
    if !c.is_concrete() {
        return Value::Undefined;
    }
    let types: BTreeSet<&str> = c
        .fields
        .iter()
        .filter_map(|f| project.field(*f).decl.ty.resolved_class())
        .filter(|t| t.is_source() || t.origin == ast::Origin::Library)
        .map(|t| t.qualified_name.as_str())
        .filter(|t| *t != c.qualified_name)
        .collect();
    Value::from(types.len())
}
