//! Serializable view of an analysis, and the metrics falling outside their
//! expected ranges.
use crate::analysis::Analysis;
use crate::ast::TypeKind;
use crate::metrics::{Metric, MetricSet};
use crate::model::{ClassId, PackageId, Project};
use crate::value::{Range, Value};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProjectReport {
    pub name: String,
    pub metrics: MetricSet,
    pub packages: Vec<PackageReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub orphan_classes: Vec<ClassReport>,
}

#[derive(Debug, Serialize)]
pub struct PackageReport {
    pub name: String,
    pub metrics: MetricSet,
    pub classes: Vec<ClassReport>,
}

#[derive(Debug, Serialize)]
pub struct ClassReport {
    pub name: String,
    pub kind: TypeKind,
    pub metrics: MetricSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependents: Option<Vec<String>>,
}

/// A metric whose value lies outside its range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeViolation {
    pub entity: String,
    pub metric: String,
    pub value: Value,
    pub range: Range,
}

fn class_report(analysis: &Analysis, id: ClassId, details: bool) -> ClassReport {
    let class = analysis.project.class(id);
    let list = |set: std::collections::BTreeSet<&str>| -> Vec<String> {
        set.into_iter().map(str::to_string).collect()
    };
    ClassReport {
        name: class.qualified_name.clone(),
        kind: class.kind(),
        metrics: class.metrics.clone(),
        dependencies: details.then(|| list(analysis.graph.class_dependencies(&class.qualified_name))),
        dependents: details.then(|| list(analysis.graph.class_dependents(&class.qualified_name))),
    }
}

fn package_report(analysis: &Analysis, id: PackageId, details: bool) -> PackageReport {
    let package = analysis.project.package(id);
    PackageReport {
        name: package.qualified_name.clone(),
        metrics: package.metrics.clone(),
        classes: package
            .classes
            .iter()
            .flat_map(|c| nested_classes(&analysis.project, *c))
            .map(|c| class_report(analysis, c, details))
            .collect(),
    }
}

/// `class` followed by its nested classes, depth first.
fn nested_classes(project: &Project, class: ClassId) -> Vec<ClassId> {
    let mut out = vec![class];
    for c in &project.class(class).classes {
        out.extend(nested_classes(project, *c));
    }
    out
}

/// Packages ordered by qualified name. With `details` every class lists its
/// dependencies and dependents.
pub fn project_report(analysis: &Analysis, details: bool) -> ProjectReport {
    let project = &analysis.project;
    ProjectReport {
        name: project.name.clone(),
        metrics: project.metrics.clone(),
        packages: project
            .packages()
            .map(|(id, _)| package_report(analysis, id, details))
            .collect(),
        orphan_classes: project
            .orphan_classes()
            .iter()
            .flat_map(|c| nested_classes(project, *c))
            .map(|c| class_report(analysis, c, details))
            .collect(),
    }
}

fn violations_of(entity: &str, metrics: &MetricSet, out: &mut Vec<RangeViolation>) {
    out.extend(metrics.iter().filter(|m| !m.within_range()).map(|m: &Metric| {
        RangeViolation {
            entity: entity.to_string(),
            metric: m.name.clone(),
            value: m.value.clone(),
            range: m.range.clone(),
        }
    }));
}

/// Every metric of the project, its packages and classes outside its range.
/// Undefined values and undefined ranges never violate.
pub fn range_violations(project: &Project) -> Vec<RangeViolation> {
    let mut out = Vec::new();
    violations_of(&project.name, &project.metrics, &mut out);
    for (_, package) in project.packages() {
        violations_of(&package.qualified_name, &package.metrics, &mut out);
    }
    for (_, class) in project.classes() {
        violations_of(&class.qualified_name, &class.metrics, &mut out);
    }
    out
}
