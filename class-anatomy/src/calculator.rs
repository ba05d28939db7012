//! Per-class metric calculators and the registry selecting them.
use crate::dependencies::DependencyGraph;
use crate::metrics::{MetricKind, MetricLevel};
use crate::model::{ClassId, Project};
use crate::provider::InheritorSearch;
use crate::value::Value;
use crate::{cohesion, coupling, inheritance};
use log::warn;

/// Everything a class calculator may read.
pub struct ClassContext<'a> {
    pub project: &'a Project,
    pub graph: &'a DependencyGraph,
    pub inheritors: &'a dyn InheritorSearch,
}

pub trait ClassMetricCalculator {
    fn kind(&self) -> MetricKind;
    fn calculate(&self, ctx: &ClassContext<'_>, class: ClassId) -> Value;
}

macro_rules! calculator {
    ($name:ident, $kind:expr, |$ctx:ident, $class:ident| $body:expr) => {
        pub struct $name;

        impl ClassMetricCalculator for $name {
            fn kind(&self) -> MetricKind {
                $kind
            }

            fn calculate(&self, $ctx: &ClassContext<'_>, $class: ClassId) -> Value {
                $body
            }
        }
    };
}

calculator!(LcomCalculator, MetricKind::Lcom, |ctx, class| cohesion::lcom(
    ctx.project,
    class
));
calculator!(TccCalculator, MetricKind::Tcc, |ctx, class| cohesion::tcc(
    ctx.project,
    class
));
calculator!(CboCalculator, MetricKind::Cbo, |ctx, class| coupling::cbo(
    ctx.project,
    ctx.graph,
    class
));
calculator!(RfcCalculator, MetricKind::Rfc, |ctx, class| coupling::rfc(
    ctx.project,
    class
));
calculator!(DacCalculator, MetricKind::Dac, |ctx, class| coupling::dac(
    ctx.project,
    class
));
calculator!(MpcCalculator, MetricKind::Mpc, |ctx, class| coupling::mpc(
    ctx.project,
    class
));
calculator!(DitCalculator, MetricKind::Dit, |ctx, class| inheritance::dit(
    ctx.project,
    class
));
calculator!(NocCalculator, MetricKind::Noc, |ctx, class| inheritance::noc(
    ctx.project,
    ctx.inheritors,
    class
));
calculator!(NoomCalculator, MetricKind::Noom, |ctx, class| inheritance::noom(
    ctx.project,
    class
));
calculator!(NoamCalculator, MetricKind::Noam, |ctx, class| inheritance::noam(
    ctx.project,
    class
));
calculator!(NoaCalculator, MetricKind::Noa, |ctx, class| {
    let c = ctx.project.class(class);
    if !c.is_concrete() {
        return Value::Undefined;
    }
    Value::from(c.fields.len())
});
calculator!(NomCalculator, MetricKind::Nom, |ctx, class| {
    let project = ctx.project;
    let c = project.class(class);
    if !c.is_concrete() {
        return Value::Undefined;
    }
    let n = c
        .methods
        .iter()
        .filter(|m| !project.method(**m).is_constructor())
        .count();
    Value::from(n)
});

fn calculator_for(kind: MetricKind) -> Option<Box<dyn ClassMetricCalculator>> {
    let calc: Box<dyn ClassMetricCalculator> = match kind {
        MetricKind::Lcom => Box::new(LcomCalculator),
        MetricKind::Tcc => Box::new(TccCalculator),
        MetricKind::Cbo => Box::new(CboCalculator),
        MetricKind::Rfc => Box::new(RfcCalculator),
        MetricKind::Dit => Box::new(DitCalculator),
        MetricKind::Noc => Box::new(NocCalculator),
        MetricKind::Dac => Box::new(DacCalculator),
        MetricKind::Mpc => Box::new(MpcCalculator),
        MetricKind::Noa => Box::new(NoaCalculator),
        MetricKind::Nom => Box::new(NomCalculator),
        MetricKind::Noom => Box::new(NoomCalculator),
        MetricKind::Noam => Box::new(NoamCalculator),
        _ => return None,
    };
    Some(calc)
}

/// The class calculators enabled for a run, in registry order.
pub struct CalculatorRegistry {
    calculators: Vec<Box<dyn ClassMetricCalculator>>,
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::all()
    }
}

impl CalculatorRegistry {
    pub fn all() -> Self {
        Self {
            calculators: MetricKind::ALL
                .into_iter()
                .filter(|k| k.level() == MetricLevel::Class)
                .filter_map(calculator_for)
                .collect(),
        }
    }

    /// Calculators for the named metrics. Unknown or non-class names are
    /// skipped with a warning.
    pub fn from_names(names: &[String]) -> Self {
        let mut calculators: Vec<Box<dyn ClassMetricCalculator>> = Vec::new();
        for name in names {
            match MetricKind::from_name(name).and_then(calculator_for) {
                Some(calc) if !calculators.iter().any(|c| c.kind() == calc.kind()) => {
                    calculators.push(calc)
                }
                Some(_) => {}
                None => warn!("no class metric named {}", name),
            }
        }
        Self { calculators }
    }

    /// Add or replace the calculator for its kind.
    pub fn register(&mut self, calculator: Box<dyn ClassMetricCalculator>) {
        let kind = calculator.kind();
        self.calculators.retain(|c| c.kind() != kind);
        self.calculators.push(calculator);
    }

    pub fn get(&self, kind: MetricKind) -> Option<&dyn ClassMetricCalculator> {
        self.calculators
            .iter()
            .find(|c| c.kind() == kind)
            .map(|c| c.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ClassMetricCalculator> {
        self.calculators.iter().map(|c| c.as_ref())
    }

    pub fn kinds(&self) -> Vec<MetricKind> {
        self.iter().map(|c| c.kind()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_class_metric() {
        let kinds = CalculatorRegistry::all().kinds();
        assert_eq!(kinds.len(), 12);
        assert!(kinds.contains(&MetricKind::Lcom));
        assert!(!kinds.contains(&MetricKind::Ce));
    }

    #[test]
    fn registry_from_names_skips_unknown() {
        let names = vec!["cbo".to_string(), "D".to_string(), "CBO".to_string(), "x".to_string()];
        assert_eq!(CalculatorRegistry::from_names(&names).kinds(), vec![MetricKind::Cbo]);
    }
}
