//! Runs a full analysis: scope, model, dependency graph, class metrics and
//! the package and project aggregates.
use crate::ast::CompilationUnit;
use crate::builder::{build_project, ProjectModelBuilder};
use crate::calculator::{CalculatorRegistry, ClassContext};
use crate::dependencies::DependencyGraph;
use crate::hierarchy::{HierarchyIndex, SubclassCache};
use crate::metrics::{Config, EmptyPackageAbstractness, Metric, RangeRegistry};
use crate::model::Project;
use crate::mood::MoodCalculator;
use crate::package::{package_cycles, RobertMartinCalculator};
use crate::provider::{InheritorSearch, NoProgress, Progress, ScopeWalker};
use crate::value::ValueError;
use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis cancelled")]
    Cancelled,
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cannot parse {path}: {message}")]
    Parse { path: String, message: String },
}

/// Settings of one run.
pub struct AnalysisOptions {
    pub ranges: RangeRegistry,
    pub calculators: CalculatorRegistry,
    pub empty_package_abstractness: EmptyPackageAbstractness,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            ranges: RangeRegistry::with_defaults(),
            calculators: CalculatorRegistry::all(),
            empty_package_abstractness: EmptyPackageAbstractness::default(),
        }
    }
}

impl AnalysisOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ranges: RangeRegistry::from_config(config),
            calculators: match &config.metrics {
                Some(names) => CalculatorRegistry::from_names(names),
                None => CalculatorRegistry::all(),
            },
            empty_package_abstractness: config.empty_package_abstractness,
        }
    }
}

/// Result of a run.
#[derive(Debug)]
pub struct Analysis {
    pub project: Project,
    pub graph: DependencyGraph,
    pub package_cycles: Vec<Vec<String>>,
}

/// Analyze every unit of `scope`, finding inheritors from the model.
pub fn analyze(
    name: &str,
    scope: &dyn ScopeWalker,
    options: &AnalysisOptions,
    progress: &dyn Progress,
) -> Result<Analysis, AnalysisError> {
    let project = build_from_scope(name, scope, progress)?;
    let index = HierarchyIndex::new(&project);
    Ok(calculate(project, options, &index))
}

/// Like [`analyze`] with an external inheritor search.
pub fn analyze_with_inheritors(
    name: &str,
    scope: &dyn ScopeWalker,
    options: &AnalysisOptions,
    progress: &dyn Progress,
    inheritors: &dyn InheritorSearch,
) -> Result<Analysis, AnalysisError> {
    let project = build_from_scope(name, scope, progress)?;
    Ok(calculate(project, options, inheritors))
}

/// Analyze in-memory units with default options.
pub fn analyze_units(name: &str, units: &[CompilationUnit]) -> Analysis {
    let project = build_project(name, units);
    let index = HierarchyIndex::new(&project);
    calculate(project, &AnalysisOptions::default(), &index)
}

fn build_from_scope(
    name: &str,
    scope: &dyn ScopeWalker,
    progress: &dyn Progress,
) -> Result<Project, AnalysisError> {
    let total = scope.unit_count();
    info!("building model from {} units", total);
    let mut project = Project::new(name);
    let mut builder = ProjectModelBuilder::new(&mut project);
    let mut done = 0usize;
    scope.walk(&mut |unit| {
        if progress.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        builder.add_unit(unit);
        done += 1;
        if total > 0 {
            progress.set_fraction(done as f64 / total as f64);
        }
        Ok(())
    })?;
    if progress.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }
    Ok(project)
}

/// Compute every metric over a built project.
pub fn calculate(
    mut project: Project,
    options: &AnalysisOptions,
    inheritors: &dyn InheritorSearch,
) -> Analysis {
    let graph = DependencyGraph::build(&project);

    info!("calculating class metrics");
    let mut computed = Vec::new();
    {
        let ctx = ClassContext {
            project: &project,
            graph: &graph,
            inheritors,
        };
        for (id, class) in project.classes() {
            debug!("class {}", class.qualified_name);
            for calc in options.calculators.iter() {
                let value = calc.calculate(&ctx, id);
                computed.push((id, Metric::new(calc.kind(), value, &options.ranges)));
            }
        }
    }
    for (id, metric) in computed {
        project.set_class_metric(id, metric);
    }

    RobertMartinCalculator::new(options.empty_package_abstractness).calculate(
        &mut project,
        &graph,
        &options.ranges,
    );
    let mut cache = SubclassCache::new();
    MoodCalculator::new(inheritors).calculate(&mut project, &graph, &mut cache, &options.ranges);

    let package_cycles = package_cycles(&graph);
    Analysis {
        project,
        graph,
        package_cycles,
    }
}

/// Analyze without progress reporting.
pub fn analyze_scope(
    name: &str,
    scope: &dyn ScopeWalker,
    options: &AnalysisOptions,
) -> Result<Analysis, AnalysisError> {
    analyze(name, scope, options, &NoProgress)
}
