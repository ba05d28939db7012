//! Object-oriented structural metrics over a declaration model.
//!
//! Declarations come from a [`DeclarationProvider`]: serialized units on
//! disk or Rust crates lowered by [`rust_source`]. [`analysis::analyze`]
//! builds the project model and dependency graph and attaches class,
//! package and project metrics.

pub mod analysis;
pub mod ast;
pub mod builder;
pub mod calculator;
pub mod cohesion;
pub mod coupling;
pub mod dependencies;
pub mod hierarchy;
pub mod inheritance;
pub mod metrics;
pub mod model;
pub mod mood;
pub mod package;
pub mod provider;
pub mod report;
pub mod rust_source;
mod utils;
pub mod value;
pub use utils::error_with_location;

pub use analysis::{
    analyze, analyze_scope, analyze_units, analyze_with_inheritors, calculate, Analysis,
    AnalysisError, AnalysisOptions,
};
pub use builder::{build_project, build_single_file, ProjectModelBuilder};
pub use calculator::{CalculatorRegistry, ClassContext, ClassMetricCalculator};
pub use dependencies::{Bag, DependencyGraph};
pub use hierarchy::{HierarchyIndex, SubclassCache};
pub use metrics::{
    Config, EmptyPackageAbstractness, Metric, MetricKind, MetricLevel, MetricSet, RangeConfig,
    RangeRegistry,
};
pub use model::{Class, ClassId, Field, FieldId, Method, MethodId, Package, PackageId, Project};
pub use mood::{MoodCalculator, MoodFactors};
pub use package::{package_cycles, PackageMetrics, RobertMartinCalculator};
pub use provider::{
    DeclarationProvider, InheritorSearch, LogProgress, NoProgress, Progress, ScopeWalker,
    SerializedDeclarations, UnitScope,
};
pub use report::{project_report, range_violations, ProjectReport, RangeViolation};
pub use rust_source::{RustCrate, RustSourceProvider};
pub use value::{Range, Value, ValueError};

#[cfg(test)]
mod tests;
