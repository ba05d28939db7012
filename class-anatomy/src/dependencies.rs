//! Class and package dependency graph.
use crate::ast::{self, CallExpr, ClassRef, FieldAccessExpr, TypeDecl, TypeRef, Visit};
use crate::model::Project;
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Multiset counting how often each element was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Bag<T: Ord> {
    counts: BTreeMap<T, usize>,
}

impl<T: Ord> Default for Bag<T> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<T: Ord> Bag<T> {
    pub fn add(&mut self, item: T) {
        *self.counts.entry(item).or_insert(0) += 1;
    }

    pub fn count(&self, item: &T) -> usize {
        self.counts.get(item).copied().unwrap_or(0)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.counts.contains_key(item)
    }

    /// Distinct elements.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.counts.keys()
    }

    /// Number of distinct elements.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Dependencies between classes, and from classes to other packages.
///
/// Keys are qualified class names. The class maps are mirror images: `B`
/// is in the dependencies of `A` exactly when `A` is in the dependents of
/// `B`, with equal multiplicity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DependencyGraph {
    class_dependencies: BTreeMap<String, Bag<String>>,
    class_dependents: BTreeMap<String, Bag<String>>,
    package_dependencies: BTreeMap<String, Bag<String>>,
    package_dependents: BTreeMap<String, Bag<String>>,
    #[serde(skip)]
    packages: BTreeMap<String, String>,
}

impl DependencyGraph {
    /// Build the graph from scratch by walking every class of `project`.
    pub fn build(project: &Project) -> Self {
        info!("building dependency graph for {} classes", project.class_count());
        let mut graph = DependencyGraph::default();
        for (id, class) in project.classes() {
            if let Some(pkg) = project.package_name_of(id) {
                graph
                    .packages
                    .insert(class.qualified_name.clone(), pkg.to_string());
            }
        }
        let mut visitor = DependencyVisitor {
            project,
            graph: &mut graph,
            stack: Vec::new(),
        };
        for (id, class) in project.classes() {
            visitor.stack.push(Frame {
                class: class.qualified_name.clone(),
                package: project.package_name_of(id).map(str::to_string),
            });
            ast::walk_type_decl(&mut visitor, &class.decl);
            visitor.stack.pop();
        }
        debug!(
            "dependency graph has {} dependent classes",
            graph.class_dependencies.len()
        );
        graph
    }

    fn set<'a>(map: &'a BTreeMap<String, Bag<String>>, key: &str) -> BTreeSet<&'a str> {
        map.get(key)
            .map(|b| b.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Classes `class` depends on.
    pub fn class_dependencies(&self, class: &str) -> BTreeSet<&str> {
        Self::set(&self.class_dependencies, class)
    }

    /// Classes depending on `class`.
    pub fn class_dependents(&self, class: &str) -> BTreeSet<&str> {
        Self::set(&self.class_dependents, class)
    }

    /// Packages other than its own that `class` depends on.
    pub fn package_dependencies(&self, class: &str) -> BTreeSet<&str> {
        Self::set(&self.package_dependencies, class)
    }

    /// Packages other than its own whose classes depend on `class`.
    pub fn package_dependents(&self, class: &str) -> BTreeSet<&str> {
        Self::set(&self.package_dependents, class)
    }

    /// How many references from `from` to `to` were recorded.
    pub fn multiplicity(&self, from: &str, to: &str) -> usize {
        self.class_dependencies
            .get(from)
            .map(|b| b.count(&to.to_string()))
            .unwrap_or(0)
    }

    /// Dependents of `class` living outside `package`.
    pub fn dependents_outside(&self, class: &str, package: &str) -> BTreeSet<&str> {
        self.class_dependents(class)
            .into_iter()
            .filter(|d| self.packages.get(*d).map(String::as_str) != Some(package))
            .collect()
    }

    /// Every recorded `(from, to, multiplicity)` class edge.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.class_dependencies.iter().flat_map(|(from, bag)| {
            bag.counts
                .iter()
                .map(move |(to, n)| (from.as_str(), to.as_str(), *n))
        })
    }

    pub fn dependents_edges(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.class_dependents.iter().flat_map(|(to, bag)| {
            bag.counts
                .iter()
                .map(move |(from, n)| (to.as_str(), from.as_str(), *n))
        })
    }

    /// Package to package adjacency derived from the class edges.
    pub fn package_graph(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (class, deps) in &self.package_dependencies {
            if let Some(pkg) = self.packages.get(class) {
                graph
                    .entry(pkg.clone())
                    .or_default()
                    .extend(deps.iter().cloned());
            }
        }
        graph
    }

    fn record(&mut self, from: &Frame, target: &ClassRef, target_package: Option<&str>) {
        if target.qualified_name == from.class {
            return;
        }
        self.class_dependencies
            .entry(from.class.clone())
            .or_default()
            .add(target.qualified_name.clone());
        self.class_dependents
            .entry(target.qualified_name.clone())
            .or_default()
            .add(from.class.clone());
        if let (Some(own), Some(other)) = (from.package.as_deref(), target_package) {
            if own != other {
                self.package_dependencies
                    .entry(from.class.clone())
                    .or_default()
                    .add(other.to_string());
                self.package_dependents
                    .entry(target.qualified_name.clone())
                    .or_default()
                    .add(own.to_string());
            }
        }
    }
}

struct Frame {
    class: String,
    package: Option<String>,
}

/// Records every class referenced from the body of the current class.
/// Local classes become the current class while their body is walked;
/// anonymous class bodies are attributed to the enclosing class.
struct DependencyVisitor<'a> {
    project: &'a Project,
    graph: &'a mut DependencyGraph,
    stack: Vec<Frame>,
}

impl DependencyVisitor<'_> {
    fn record(&mut self, target: &ClassRef) {
        if !target.is_source() {
            return;
        }
        let Some(from) = self.stack.last() else {
            return;
        };
        let target_package = self
            .project
            .find_class(&target.qualified_name)
            .and_then(|id| self.project.package_name_of(id));
        self.graph.record(from, target, target_package);
    }
}

impl Visit for DependencyVisitor<'_> {
    fn visit_type_ref(&mut self, ty: &TypeRef) {
        if let TypeRef::Class {
            target: Some(target),
            ..
        } = ty
        {
            self.record(target);
        }
        ast::walk_type_ref(self, ty);
    }

    fn visit_call(&mut self, call: &CallExpr) {
        if let Some(target) = &call.target {
            self.record(&target.owner);
        }
        ast::walk_call(self, call);
    }

    fn visit_field_access(&mut self, access: &FieldAccessExpr) {
        if let Some(target) = &access.target {
            self.record(&target.owner);
        }
        if let Some(q) = &access.qualifier {
            self.visit_node(q);
        }
    }

    fn visit_local_class(&mut self, decl: &TypeDecl) {
        let Some(enclosing) = self.stack.last() else {
            return;
        };
        let class = if !decl.qualified_name.is_empty() {
            decl.qualified_name.clone()
        } else if !decl.name.is_empty() {
            format!("{}.{}", enclosing.class, decl.name)
        } else {
            // nameless bodies stay with the enclosing class
            ast::walk_type_decl(self, decl);
            return;
        };
        let package = enclosing.package.clone();
        self.stack.push(Frame { class, package });
        ast::walk_type_decl(self, decl);
        self.stack.pop();
    }
}
