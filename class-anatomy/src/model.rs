//! In-memory project model populated by the builder and the calculators.
//!
//! Entities live in arenas owned by [`Project`] and refer to each other by
//! index, so parent links and child lists never form ownership cycles.
use crate::ast::{FieldDecl, MethodDecl, Modifiers, TypeDecl, TypeKind, Visibility};
use crate::metrics::{Metric, MetricKind, MetricSet};
use crate::value::Value;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MethodId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FieldId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub qualified_name: String,
    pub parent: Option<PackageId>,
    pub packages: Vec<PackageId>,
    pub classes: Vec<ClassId>,
    pub metrics: MetricSet,
}

#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub qualified_name: String,
    pub package: Option<PackageId>,
    /// Enclosing class for nested classes.
    pub parent: Option<ClassId>,
    pub classes: Vec<ClassId>,
    pub methods: Vec<MethodId>,
    pub fields: Vec<FieldId>,
    /// Declaration with nested types moved out into `classes`.
    pub decl: TypeDecl,
    pub metrics: MetricSet,
}

impl Class {
    pub fn kind(&self) -> TypeKind {
        self.decl.kind
    }

    pub fn modifiers(&self) -> &Modifiers {
        &self.decl.modifiers
    }

    pub fn is_interface(&self) -> bool {
        self.decl.kind == TypeKind::Interface
    }

    /// Abstract classes and interfaces.
    pub fn is_abstract(&self) -> bool {
        self.is_interface() || self.decl.modifiers.is_abstract
    }

    /// A plain class: not an interface, enum, annotation, anonymous, local
    /// or type-parameter class.
    pub fn is_concrete(&self) -> bool {
        self.decl.kind == TypeKind::Class
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub class: ClassId,
    pub decl: MethodDecl,
    pub metrics: MetricSet,
}

impl Method {
    pub fn is_constructor(&self) -> bool {
        self.decl.is_constructor
    }

    pub fn is_static(&self) -> bool {
        self.decl.modifiers.is_static
    }

    pub fn visibility(&self) -> Visibility {
        self.decl.modifiers.visibility
    }

    pub fn arity(&self) -> usize {
        self.decl.arity()
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub class: ClassId,
    pub decl: FieldDecl,
}

impl Field {
    pub fn is_static(&self) -> bool {
        self.decl.modifiers.is_static
    }

    pub fn visibility(&self) -> Visibility {
        self.decl.modifiers.visibility
    }
}

#[derive(Debug, Clone, Default)]
pub struct Project {
    pub name: String,
    pub(crate) packages: Vec<Package>,
    pub(crate) roots: Vec<PackageId>,
    pub(crate) package_index: BTreeMap<String, PackageId>,
    pub(crate) classes: Vec<Class>,
    pub(crate) class_index: HashMap<String, ClassId>,
    /// Top-level classes of units without a package.
    pub(crate) orphans: Vec<ClassId>,
    pub(crate) methods: Vec<Method>,
    pub(crate) fields: Vec<Field>,
    pub metrics: MetricSet,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0]
    }

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.0]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    pub fn find_package(&self, qualified_name: &str) -> Option<PackageId> {
        self.package_index.get(qualified_name).copied()
    }

    pub fn find_class(&self, qualified_name: &str) -> Option<ClassId> {
        self.class_index.get(qualified_name).copied()
    }

    pub fn root_packages(&self) -> &[PackageId] {
        &self.roots
    }

    pub fn orphan_classes(&self) -> &[ClassId] {
        &self.orphans
    }

    /// Every package, ordered by qualified name.
    pub fn packages(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.package_index
            .values()
            .map(move |&id| (id, &self.packages[id.0]))
    }

    /// Every class including nested ones, in creation order.
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes.iter().enumerate().map(|(i, c)| (ClassId(i), c))
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Qualified name of the package containing `class`.
    pub fn package_name_of(&self, class: ClassId) -> Option<&str> {
        self.class(class)
            .package
            .map(|p| self.package(p).qualified_name.as_str())
    }

    pub(crate) fn push_package(&mut self, package: Package) -> PackageId {
        let id = PackageId(self.packages.len());
        self.package_index.insert(package.qualified_name.clone(), id);
        self.packages.push(package);
        id
    }

    pub(crate) fn package_mut(&mut self, id: PackageId) -> &mut Package {
        &mut self.packages[id.0]
    }

    pub(crate) fn push_class(&mut self, class: Class) -> ClassId {
        let id = ClassId(self.classes.len());
        self.class_index.insert(class.qualified_name.clone(), id);
        self.classes.push(class);
        id
    }

    pub(crate) fn class_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id.0]
    }

    pub(crate) fn push_method(&mut self, method: Method) -> MethodId {
        let id = MethodId(self.methods.len());
        self.methods.push(method);
        id
    }

    pub(crate) fn push_field(&mut self, field: Field) -> FieldId {
        let id = FieldId(self.fields.len());
        self.fields.push(field);
        id
    }

    pub(crate) fn set_class_metric(&mut self, id: ClassId, metric: Metric) {
        self.classes[id.0].metrics.insert(metric);
    }

    pub(crate) fn set_package_metric(&mut self, id: PackageId, metric: Metric) {
        self.packages[id.0].metrics.insert(metric);
    }

    pub(crate) fn set_project_metric(&mut self, metric: Metric) {
        self.metrics.insert(metric);
    }

    /// Convenience lookup of a class metric by qualified class name.
    pub fn class_metric(&self, qualified_name: &str, kind: MetricKind) -> Option<&Value> {
        self.find_class(qualified_name)
            .and_then(|id| self.class(id).metrics.value(kind))
    }

    pub fn package_metric(&self, qualified_name: &str, kind: MetricKind) -> Option<&Value> {
        self.find_package(qualified_name)
            .and_then(|id| self.package(id).metrics.value(kind))
    }
}
