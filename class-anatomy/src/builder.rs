//! Builds the project model from compilation units.
use crate::ast::{CompilationUnit, TypeDecl};
use crate::model::{Class, ClassId, Field, Method, Package, PackageId, Project};
use crate::metrics::MetricSet;
use log::{debug, warn};

/// Adds compilation units to an existing project.
///
/// Packages are created on demand with every missing ancestor. A package
/// introduced above an existing chain is spliced in: descendants already
/// hanging from the nearest ancestor (or from the roots) move under it.
pub struct ProjectModelBuilder<'a> {
    project: &'a mut Project,
}

impl<'a> ProjectModelBuilder<'a> {
    pub fn new(project: &'a mut Project) -> Self {
        Self { project }
    }

    /// Add every top-level type of `unit` and return the created classes.
    pub fn add_unit(&mut self, unit: &CompilationUnit) -> Vec<ClassId> {
        debug!("adding unit {}", unit.path);
        let package = match unit.package.as_deref() {
            Some(q) => {
                let id = self.ensure_package(q);
                if id.is_none() {
                    warn!("{}: invalid package name '{}'", unit.path, q);
                }
                id
            }
            None => None,
        };
        let mut added = Vec::new();
        for decl in &unit.types {
            if let Some(id) = self.add_type(decl, package, None) {
                match package {
                    Some(p) => self.project.package_mut(p).classes.push(id),
                    None => self.project.orphans.push(id),
                }
                added.push(id);
            }
        }
        added
    }

    /// Find the package named `qualified_name`, creating it and any missing
    /// ancestors. Returns `None` for an empty or malformed name.
    pub fn ensure_package(&mut self, qualified_name: &str) -> Option<PackageId> {
        if qualified_name.is_empty() || qualified_name.split('.').any(str::is_empty) {
            return None;
        }
        if let Some(id) = self.project.find_package(qualified_name) {
            return Some(id);
        }
        let (parent, name) = match qualified_name.rsplit_once('.') {
            Some((parent, name)) => (self.ensure_package(parent), name),
            None => (None, qualified_name),
        };
        let id = self.project.push_package(Package {
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            parent,
            packages: Vec::new(),
            classes: Vec::new(),
            metrics: MetricSet::default(),
        });
        let siblings = match parent {
            Some(p) => std::mem::take(&mut self.project.package_mut(p).packages),
            None => std::mem::take(&mut self.project.roots),
        };
        let prefix = format!("{}.", qualified_name);
        let (moved, kept): (Vec<_>, Vec<_>) = siblings
            .into_iter()
            .partition(|s| self.project.package(*s).qualified_name.starts_with(&prefix));
        for m in &moved {
            debug!(
                "splicing {} under {}",
                self.project.package(*m).qualified_name,
                qualified_name
            );
            let child = self.project.package_mut(*m);
            child.parent = Some(id);
            if let Some((_, simple)) = child.qualified_name.rsplit_once('.') {
                child.name = simple.to_string();
            }
        }
        self.project.package_mut(id).packages = moved;
        let mut kept = kept;
        kept.push(id);
        match parent {
            Some(p) => self.project.package_mut(p).packages = kept,
            None => self.project.roots = kept,
        }
        Some(id)
    }

    fn add_type(
        &mut self,
        decl: &TypeDecl,
        package: Option<PackageId>,
        parent: Option<ClassId>,
    ) -> Option<ClassId> {
        let qualified_name = if !decl.qualified_name.is_empty() {
            decl.qualified_name.clone()
        } else {
            let prefix = match parent {
                Some(c) => Some(self.project.class(c).qualified_name.as_str()),
                None => package.map(|p| self.project.package(p).qualified_name.as_str()),
            };
            match prefix {
                Some(prefix) => format!("{}.{}", prefix, decl.name),
                None => decl.name.clone(),
            }
        };
        if self.project.find_class(&qualified_name).is_some() {
            warn!("duplicate class {} skipped", qualified_name);
            return None;
        }
        let mut own = decl.clone();
        own.qualified_name = qualified_name.clone();
        let nested = std::mem::take(&mut own.nested);

        let id = self.project.push_class(Class {
            name: decl.name.clone(),
            qualified_name,
            package,
            parent,
            classes: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            decl: own,
            metrics: MetricSet::default(),
        });
        for m in &decl.methods {
            let mid = self.project.push_method(Method {
                name: m.name.clone(),
                class: id,
                decl: m.clone(),
                metrics: MetricSet::default(),
            });
            self.project.class_mut(id).methods.push(mid);
        }
        for f in &decl.fields {
            let fid = self.project.push_field(Field {
                name: f.name.clone(),
                class: id,
                decl: f.clone(),
            });
            self.project.class_mut(id).fields.push(fid);
        }
        for n in &nested {
            if let Some(child) = self.add_type(n, package, Some(id)) {
                self.project.class_mut(id).classes.push(child);
            }
        }
        Some(id)
    }
}

/// Build a project from every unit.
pub fn build_project<'u>(
    name: &str,
    units: impl IntoIterator<Item = &'u CompilationUnit>,
) -> Project {
    let mut project = Project::new(name);
    let mut builder = ProjectModelBuilder::new(&mut project);
    for unit in units {
        builder.add_unit(unit);
    }
    project
}

/// Build an isolated project holding one file. The file's package becomes a
/// single root under its full qualified name.
pub fn build_single_file(name: &str, unit: &CompilationUnit) -> Project {
    let mut project = Project::new(name);
    if let Some(q) = unit.package.as_deref().filter(|q| !q.is_empty()) {
        let id = project.push_package(Package {
            name: q.to_string(),
            qualified_name: q.to_string(),
            parent: None,
            packages: Vec::new(),
            classes: Vec::new(),
            metrics: MetricSet::default(),
        });
        project.roots.push(id);
    }
    ProjectModelBuilder::new(&mut project).add_unit(unit);
    project
}
