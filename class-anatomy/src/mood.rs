//! Project level MOOD metrics: hiding, inheritance, coupling and
//! polymorphism factors.
use crate::ast::Visibility;
use crate::dependencies::{Bag, DependencyGraph};
use crate::hierarchy::{self, SubclassCache};
use crate::metrics::{Metric, MetricKind, RangeRegistry};
use crate::model::{Class, ClassId, Project};
use crate::provider::InheritorSearch;
use crate::value::Value;
use log::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct MoodFactors {
    pub ahf: Value,
    pub aif: Value,
    pub mhf: Value,
    pub mif: Value,
    pub cf: Value,
    pub pf: Value,
}

/// How widely one member is visible, summed over a project.
#[derive(Debug, Default)]
struct Hiding {
    members: usize,
    public: usize,
    package_visible: Bag<String>,
    protected_visibility: usize,
}

impl Hiding {
    fn add(
        &mut self,
        member: Visibility,
        class: &Class,
        package: &str,
        subclasses: impl FnOnce() -> usize,
    ) {
        self.members += 1;
        let owner = class.modifiers().visibility;
        if member == Visibility::Private || owner == Visibility::Private {
            return;
        }
        if member == Visibility::Protected || owner == Visibility::Protected {
            self.protected_visibility += subclasses();
        } else if (member == Visibility::Public || class.is_interface())
            && owner == Visibility::Public
        {
            self.public += 1;
        } else {
            self.package_visible.add(package.to_string());
        }
    }

    /// 1 - visibility / (members * (classes - 1)); undefined without members
    /// or with a single class.
    fn factor(&self, classes: usize, per_package: &Bag<String>) -> Value {
        let others = classes.saturating_sub(1);
        let mut visibility = self.public * others + self.protected_visibility;
        for package in per_package.iter() {
            visibility += self.package_visible.count(package)
                * per_package.count(package).saturating_sub(1);
        }
        let denominator = Value::from(self.members * others);
        let numerator = denominator.minus(&Value::from(visibility));
        numerator
            .divide(&denominator)
            .map(Value::normalized)
            .unwrap_or(Value::Undefined)
    }
}

fn ratio_or_undefined(numerator: usize, denominator: usize) -> Value {
    Value::ratio(numerator, denominator)
        .map(Value::normalized)
        .unwrap_or(Value::Undefined)
}

/// Computes the six MOOD factors over every model class.
pub struct MoodCalculator<'a> {
    search: &'a dyn InheritorSearch,
}

impl<'a> MoodCalculator<'a> {
    pub fn new(search: &'a dyn InheritorSearch) -> Self {
        Self { search }
    }

    pub fn compute(
        &self,
        project: &Project,
        graph: &DependencyGraph,
        cache: &mut SubclassCache,
    ) -> MoodFactors {
        let mut classes = 0usize;
        let mut per_package: Bag<String> = Bag::default();
        let mut attributes = Hiding::default();
        let mut methods = Hiding::default();
        let (mut available_fields, mut inherited_fields) = (0usize, 0usize);
        let (mut available_methods, mut inherited_methods) = (0usize, 0usize);
        let mut coupling = 0usize;
        let (mut overriding, mut potentials) = (0usize, 0usize);

        for (id, class) in project.classes() {
            let package = project.package_name_of(id).unwrap_or_default();
            classes += 1;
            per_package.add(package.to_string());

            for f in hierarchy::all_fields(project, id) {
                let field = project.field(f);
                if field.class == id {
                    available_fields += 1;
                } else if field.visibility() != Visibility::Private {
                    available_fields += 1;
                    inherited_fields += 1;
                }
            }

            for m in hierarchy::all_methods(project, id) {
                let method = project.method(m);
                if method.class == id {
                    available_methods += 1;
                } else if method.visibility() != Visibility::Private {
                    available_methods += 1;
                    inherited_methods += 1;
                }
            }

            coupling += graph
                .class_dependencies(&class.qualified_name)
                .into_iter()
                .filter(|d| !hierarchy::is_inheritor(project, id, d))
                .count();

            let (added, overridden) = self.added_and_overriding(project, id);
            overriding += overridden;
            if added > 0 {
                potentials += added * cache.count(self.search, &class.qualified_name);
            }

            for f in &class.fields {
                let visibility = project.field(*f).visibility();
                attributes.add(visibility, class, package, || {
                    cache.count(self.search, &class.qualified_name)
                });
            }
            for m in &class.methods {
                let visibility = project.method(*m).visibility();
                methods.add(visibility, class, package, || {
                    cache.count(self.search, &class.qualified_name)
                });
            }
        }

        debug!(
            "mood totals: classes={} coupling={} overriding={} potentials={}",
            classes, coupling, overriding, potentials
        );
        let pairs = classes * classes.saturating_sub(1) / 2;
        MoodFactors {
            ahf: attributes.factor(classes, &per_package),
            aif: ratio_or_undefined(inherited_fields, available_fields),
            mhf: methods.factor(classes, &per_package),
            mif: ratio_or_undefined(inherited_methods, available_methods),
            cf: ratio_or_undefined(coupling, pairs),
            pf: if potentials == 0 {
                Value::from(1usize)
            } else {
                ratio_or_undefined(overriding, potentials)
            },
        }
    }

    /// (added, overriding) instance methods declared by `class`.
    fn added_and_overriding(&self, project: &Project, class: ClassId) -> (usize, usize) {
        let mut added = 0;
        let mut overriding = 0;
        for m in &project.class(class).methods {
            let method = project.method(*m);
            if method.is_constructor() || method.is_static() {
                continue;
            }
            if hierarchy::super_methods(project, *m).is_empty() {
                added += 1;
            } else {
                overriding += 1;
            }
        }
        (added, overriding)
    }

    /// Attach the factors to the project.
    pub fn calculate(
        &self,
        project: &mut Project,
        graph: &DependencyGraph,
        cache: &mut SubclassCache,
        ranges: &RangeRegistry,
    ) {
        info!("calculating project metrics");
        let f = self.compute(project, graph, cache);
        for (kind, value) in [
            (MetricKind::Ahf, f.ahf),
            (MetricKind::Aif, f.aif),
            (MetricKind::Mhf, f.mhf),
            (MetricKind::Mif, f.mif),
            (MetricKind::Cf, f.cf),
            (MetricKind::Pf, f.pf),
        ] {
            project.set_project_metric(Metric::new(kind, value, ranges));
        }
    }
}
