//! Package level metrics after Robert C. Martin, plus package statistics
//! and dependency cycles.
use crate::ast::TypeKind;
use crate::dependencies::DependencyGraph;
use crate::metrics::{EmptyPackageAbstractness, Metric, MetricKind, RangeRegistry};
use crate::model::{PackageId, Project};
use crate::value::Value;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Default)]
struct Totals<'a> {
    dependents: BTreeSet<&'a str>,
    efferent: usize,
    classes: usize,
    abstracts: usize,
    interfaces: usize,
}

/// Computed Robert-Martin values of one package.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageMetrics {
    pub ce: Value,
    pub ca: Value,
    pub instability: Value,
    pub abstractness: Value,
    pub distance: Value,
    pub concrete: usize,
    pub abstracts: usize,
    pub interfaces: usize,
}

/// Computes Ce, Ca, I, A and D for every package.
pub struct RobertMartinCalculator {
    empty: EmptyPackageAbstractness,
}

impl Default for RobertMartinCalculator {
    fn default() -> Self {
        Self::new(EmptyPackageAbstractness::Abstract)
    }
}

impl RobertMartinCalculator {
    pub fn new(empty: EmptyPackageAbstractness) -> Self {
        Self { empty }
    }

    /// Values per package id. Anonymous and local classes do not count.
    pub fn compute(&self, project: &Project, graph: &DependencyGraph) -> BTreeMap<PackageId, PackageMetrics> {
        let mut totals: HashMap<PackageId, Totals> = HashMap::new();
        for (id, class) in project.classes() {
            let (Some(pkg), Some(pkg_name)) = (class.package, project.package_name_of(id)) else {
                continue;
            };
            if matches!(class.kind(), TypeKind::Anonymous | TypeKind::Local) {
                continue;
            }
            let t = totals.entry(pkg).or_default();
            t.dependents
                .extend(graph.dependents_outside(&class.qualified_name, pkg_name));
            t.efferent += graph.package_dependencies(&class.qualified_name).len();
            t.classes += 1;
            if class.is_abstract() {
                t.abstracts += 1;
            }
            if class.is_interface() {
                t.interfaces += 1;
            }
        }

        let mut result = BTreeMap::new();
        for (id, package) in project.packages() {
            let t = totals.remove(&id).unwrap_or_default();
            let ce = t.efferent;
            let ca = t.dependents.len();
            let instability = if ca + ce == 0 {
                Value::from(1usize)
            } else {
                Value::ratio(ce, ca + ce).unwrap_or(Value::Undefined)
            };
            let abstractness = if t.classes == 0 {
                match self.empty {
                    EmptyPackageAbstractness::Abstract => Value::from(1usize),
                    EmptyPackageAbstractness::Concrete => Value::from(0usize),
                }
            } else {
                Value::ratio(t.abstracts, t.classes).unwrap_or(Value::Undefined)
            };
            let distance = Value::from(1usize)
                .minus(&instability)
                .minus(&abstractness)
                .abs()
                .normalized();
            debug!(
                "package {}: Ce={} Ca={} I={} A={} D={}",
                package.qualified_name, ce, ca, instability, abstractness, distance
            );
            result.insert(
                id,
                PackageMetrics {
                    ce: Value::from(ce),
                    ca: Value::from(ca),
                    instability: instability.normalized(),
                    abstractness: abstractness.normalized(),
                    distance,
                    concrete: t.classes - t.abstracts,
                    abstracts: t.abstracts,
                    interfaces: t.interfaces,
                },
            );
        }
        result
    }

    /// Attach the metrics to every package of `project`.
    pub fn calculate(&self, project: &mut Project, graph: &DependencyGraph, ranges: &RangeRegistry) {
        info!("calculating package metrics");
        let computed = self.compute(project, graph);
        for (id, m) in computed {
            let metrics = [
                (MetricKind::Ce, m.ce),
                (MetricKind::Ca, m.ca),
                (MetricKind::I, m.instability),
                (MetricKind::A, m.abstractness),
                (MetricKind::D, m.distance),
                (MetricKind::Pnocc, Value::from(m.concrete)),
                (MetricKind::Pnoac, Value::from(m.abstracts)),
                (MetricKind::Pnoi, Value::from(m.interfaces)),
            ];
            for (kind, value) in metrics {
                project.set_package_metric(id, Metric::new(kind, value, ranges));
            }
        }
    }
}

/// Package dependency cycles found with Tarjan's strongly connected
/// components algorithm. Each cycle lists its packages in discovery order.
pub fn package_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let graph: BTreeMap<String, Vec<String>> = graph
        .package_graph()
        .into_iter()
        .map(|(k, v)| (k, v.into_iter().collect()))
        .collect();

    struct Tarjan<'g> {
        graph: &'g BTreeMap<String, Vec<String>>,
        index: usize,
        stack: Vec<&'g str>,
        indices: HashMap<&'g str, usize>,
        lowlink: HashMap<&'g str, usize>,
        on_stack: HashSet<&'g str>,
        result: Vec<Vec<String>>,
    }

    impl<'g> Tarjan<'g> {
        fn strongconnect(&mut self, v: &'g str) {
            self.indices.insert(v, self.index);
            self.lowlink.insert(v, self.index);
            self.index += 1;
            self.stack.push(v);
            self.on_stack.insert(v);

            let graph = self.graph;
            if let Some(neigh) = graph.get(v) {
                for w in neigh {
                    let w = w.as_str();
                    if !self.indices.contains_key(w) {
                        self.strongconnect(w);
                        let lw = self.lowlink[w];
                        if lw < self.lowlink[v] {
                            self.lowlink.insert(v, lw);
                        }
                    } else if self.on_stack.contains(w) {
                        let iw = self.indices[w];
                        if iw < self.lowlink[v] {
                            self.lowlink.insert(v, iw);
                        }
                    }
                }
            }

            if self.indices.get(v) == self.lowlink.get(v) {
                let mut scc = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.remove(w);
                    scc.push(w.to_string());
                    if w == v {
                        break;
                    }
                }
                if scc.len() > 1 {
                    scc.reverse();
                    self.result.push(scc);
                }
            }
        }
    }

    let mut tarjan = Tarjan {
        graph: &graph,
        index: 0,
        stack: Vec::new(),
        indices: HashMap::new(),
        lowlink: HashMap::new(),
        on_stack: HashSet::new(),
        result: Vec::new(),
    };
    for v in graph.keys() {
        if !tarjan.indices.contains_key(v.as_str()) {
            tarjan.strongconnect(v);
        }
    }
    tarjan.result
}
