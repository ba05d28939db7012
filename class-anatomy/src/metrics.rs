use crate::value::{Range, Value};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Scope a metric kind is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricLevel {
    Class,
    Package,
    Project,
}

/// Every metric the engine knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MetricKind {
    Lcom,
    Tcc,
    Cbo,
    Rfc,
    Dit,
    Noc,
    Dac,
    Mpc,
    Noa,
    Nom,
    Noom,
    Noam,
    Ce,
    Ca,
    I,
    A,
    D,
    Pnocc,
    Pnoac,
    Pnoi,
    Ahf,
    Aif,
    Mhf,
    Mif,
    Cf,
    Pf,
}

impl MetricKind {
    pub const ALL: [MetricKind; 26] = [
        MetricKind::Lcom,
        MetricKind::Tcc,
        MetricKind::Cbo,
        MetricKind::Rfc,
        MetricKind::Dit,
        MetricKind::Noc,
        MetricKind::Dac,
        MetricKind::Mpc,
        MetricKind::Noa,
        MetricKind::Nom,
        MetricKind::Noom,
        MetricKind::Noam,
        MetricKind::Ce,
        MetricKind::Ca,
        MetricKind::I,
        MetricKind::A,
        MetricKind::D,
        MetricKind::Pnocc,
        MetricKind::Pnoac,
        MetricKind::Pnoi,
        MetricKind::Ahf,
        MetricKind::Aif,
        MetricKind::Mhf,
        MetricKind::Mif,
        MetricKind::Cf,
        MetricKind::Pf,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Lcom => "LCOM",
            MetricKind::Tcc => "TCC",
            MetricKind::Cbo => "CBO",
            MetricKind::Rfc => "RFC",
            MetricKind::Dit => "DIT",
            MetricKind::Noc => "NOC",
            MetricKind::Dac => "DAC",
            MetricKind::Mpc => "MPC",
            MetricKind::Noa => "NOA",
            MetricKind::Nom => "NOM",
            MetricKind::Noom => "NOOM",
            MetricKind::Noam => "NOAM",
            MetricKind::Ce => "Ce",
            MetricKind::Ca => "Ca",
            MetricKind::I => "I",
            MetricKind::A => "A",
            MetricKind::D => "D",
            MetricKind::Pnocc => "PNOCC",
            MetricKind::Pnoac => "PNOAC",
            MetricKind::Pnoi => "PNOI",
            MetricKind::Ahf => "AHF",
            MetricKind::Aif => "AIF",
            MetricKind::Mhf => "MHF",
            MetricKind::Mif => "MIF",
            MetricKind::Cf => "CF",
            MetricKind::Pf => "PF",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MetricKind::Lcom => "Lack Of Cohesion Of Methods",
            MetricKind::Tcc => "Tight Class Cohesion",
            MetricKind::Cbo => "Coupling Between Objects",
            MetricKind::Rfc => "Response For A Class",
            MetricKind::Dit => "Depth Of Inheritance Tree",
            MetricKind::Noc => "Number Of Children",
            MetricKind::Dac => "Data Abstraction Coupling",
            MetricKind::Mpc => "Message Passing Coupling",
            MetricKind::Noa => "Number Of Attributes",
            MetricKind::Nom => "Number Of Methods",
            MetricKind::Noom => "Number Of Overridden Methods",
            MetricKind::Noam => "Number Of Added Methods",
            MetricKind::Ce => "Efferent Coupling",
            MetricKind::Ca => "Afferent Coupling",
            MetricKind::I => "Instability",
            MetricKind::A => "Abstractness",
            MetricKind::D => "Normalized Distance From Main Sequence",
            MetricKind::Pnocc => "Number Of Concrete Classes",
            MetricKind::Pnoac => "Number Of Abstract Classes",
            MetricKind::Pnoi => "Number Of Interfaces",
            MetricKind::Ahf => "Attribute Hiding Factor",
            MetricKind::Aif => "Attribute Inheritance Factor",
            MetricKind::Mhf => "Method Hiding Factor",
            MetricKind::Mif => "Method Inheritance Factor",
            MetricKind::Cf => "Coupling Factor",
            MetricKind::Pf => "Polymorphism Factor",
        }
    }

    pub fn level(self) -> MetricLevel {
        match self {
            MetricKind::Lcom
            | MetricKind::Tcc
            | MetricKind::Cbo
            | MetricKind::Rfc
            | MetricKind::Dit
            | MetricKind::Noc
            | MetricKind::Dac
            | MetricKind::Mpc
            | MetricKind::Noa
            | MetricKind::Nom
            | MetricKind::Noom
            | MetricKind::Noam => MetricLevel::Class,
            MetricKind::Ce
            | MetricKind::Ca
            | MetricKind::I
            | MetricKind::A
            | MetricKind::D
            | MetricKind::Pnocc
            | MetricKind::Pnoac
            | MetricKind::Pnoi => MetricLevel::Package,
            _ => MetricLevel::Project,
        }
    }

    /// Case-insensitive lookup by short name.
    pub fn from_name(name: &str) -> Option<MetricKind> {
        MetricKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Built-in acceptable range; `None` for kinds without one.
    fn default_bounds(self) -> Option<(&'static str, &'static str)> {
        let bounds = match self {
            MetricKind::Lcom => ("0", "500"),
            MetricKind::Tcc => ("0.33", "1"),
            MetricKind::Cbo => ("0", "13"),
            MetricKind::Rfc => ("0", "44"),
            MetricKind::Dit => ("0", "5"),
            MetricKind::Noc => ("0", "100"),
            MetricKind::Dac => ("0", "15"),
            MetricKind::Mpc => ("0", "10"),
            MetricKind::Noa => ("0", "40"),
            MetricKind::Nom => ("0", "25"),
            MetricKind::Noom => ("0", "3"),
            MetricKind::Noam => ("0", "10"),
            MetricKind::Ce => ("0", "20"),
            MetricKind::Ca => ("0", "500"),
            MetricKind::I => ("0", "1"),
            MetricKind::A => ("0", "1"),
            MetricKind::D => ("0", "0.7"),
            MetricKind::Ahf => ("0.677", "1"),
            MetricKind::Aif => ("0.374", "0.757"),
            MetricKind::Mhf => ("0.095", "0.369"),
            MetricKind::Mif => ("0.609", "0.844"),
            MetricKind::Cf => ("0", "0.243"),
            MetricKind::Pf => ("0.017", "0.151"),
            MetricKind::Pnocc | MetricKind::Pnoac | MetricKind::Pnoi => return None,
        };
        Some(bounds)
    }

    pub fn default_range(self) -> Range {
        match self.default_bounds() {
            Some((from, to)) => match (from.parse::<Value>(), to.parse::<Value>()) {
                (Ok(from), Ok(to)) => Range::new(from, to),
                _ => Range::UNDEFINED,
            },
            None => Range::UNDEFINED,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named, described value with the range it is checked against.
#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
    pub description: String,
    pub value: Value,
    pub range: Range,
}

impl Metric {
    pub fn new(kind: MetricKind, value: Value, ranges: &RangeRegistry) -> Self {
        Self {
            name: kind.name().to_string(),
            description: kind.description().to_string(),
            value,
            range: ranges.range(kind.name()),
        }
    }

    pub fn within_range(&self) -> bool {
        self.range.includes(&self.value)
    }
}

/// Metrics compare by name, description and value; the range is configuration.
impl PartialEq for Metric {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.value == other.value
    }
}

/// Metrics of one entity keyed by short name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<String, Metric>);

impl MetricSet {
    pub fn insert(&mut self, metric: Metric) {
        self.0.insert(metric.name.clone(), metric);
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.0.get(name)
    }

    /// Value of `kind`, `None` if it was never computed.
    pub fn value(&self, kind: MetricKind) -> Option<&Value> {
        self.0.get(kind.name()).map(|m| &m.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Acceptable ranges keyed by metric short name.
#[derive(Debug, Clone)]
pub struct RangeRegistry {
    ranges: BTreeMap<String, Range>,
}

impl Default for RangeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RangeRegistry {
    pub fn empty() -> Self {
        Self {
            ranges: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let ranges = MetricKind::ALL
            .into_iter()
            .map(|k| (k.name().to_string(), k.default_range()))
            .collect();
        Self { ranges }
    }

    /// Defaults overridden by the `ranges` table of `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::with_defaults();
        for (name, rc) in &config.ranges {
            let key = match MetricKind::from_name(name) {
                Some(kind) => kind.name().to_string(),
                None => {
                    warn!("ignoring range for unknown metric {}", name);
                    continue;
                }
            };
            let range = match (&rc.from, &rc.to) {
                (Some(from), Some(to)) => Range::new(from.clone(), to.clone()),
                _ => Range::UNDEFINED,
            };
            registry.set(&key, range);
        }
        registry
    }

    pub fn set(&mut self, name: &str, range: Range) {
        self.ranges.insert(name.to_string(), range);
    }

    pub fn range(&self, name: &str) -> Range {
        self.ranges.get(name).cloned().unwrap_or(Range::UNDEFINED)
    }
}

/// Bounds of one configured range. Omitting either bound disables the check.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct RangeConfig {
    #[serde(default)]
    pub from: Option<Value>,
    #[serde(default)]
    pub to: Option<Value>,
}

/// Which abstractness a package without classes reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPackageAbstractness {
    /// A = 1.0
    #[default]
    Abstract,
    /// A = 0.0
    Concrete,
}

/// Root structure for configuration files.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub ranges: BTreeMap<String, RangeConfig>,
    /// Class metrics to compute; all of them when absent.
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    #[serde(default)]
    pub empty_package_abstractness: EmptyPackageAbstractness,
}

impl Config {
    /// Read a TOML, YAML or JSON configuration file, chosen by extension.
    pub fn load(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
        let text = crate::loc_try!(std::fs::read_to_string(path));
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => crate::loc_try!(serde_yaml::from_str(&text)),
            Some("json") => crate::loc_try!(serde_json::from_str(&text)),
            _ => crate::loc_try!(toml::from_str(&text)),
        };
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_case_insensitively() {
        for kind in MetricKind::ALL {
            assert_eq!(MetricKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(MetricKind::from_name("lcom"), Some(MetricKind::Lcom));
        assert_eq!(MetricKind::from_name("WMC"), None);
    }

    #[test]
    fn default_ranges_are_exact() {
        let r = RangeRegistry::with_defaults();
        let ahf = r.range("AHF");
        assert!(ahf.includes(&"0.677".parse().unwrap()));
        assert!(!ahf.includes(&"0.6769".parse().unwrap()));
        assert!(r.range("PNOI").is_undefined());
        assert!(r.range("XYZ").is_undefined());
    }

    #[test]
    fn config_overrides_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            metrics = ["LCOM", "CBO"]
            empty_package_abstractness = "concrete"
            [ranges.CBO]
            from = 0
            to = 5
            [ranges.cf]
            from = 0.1
            to = 0.2
            [ranges.DIT]
            "#,
        )
        .unwrap();
        let r = RangeRegistry::from_config(&cfg);
        assert!(!r.range("CBO").includes(&Value::from(6usize)));
        assert!(r.range("CF").includes(&"0.2".parse().unwrap()));
        assert!(r.range("DIT").is_undefined());
        assert_eq!(cfg.empty_package_abstractness, EmptyPackageAbstractness::Concrete);
        assert_eq!(cfg.metrics.as_deref().map(|m| m.len()), Some(2));
    }

    #[test]
    fn metric_equality_ignores_range() {
        let a = Metric::new(MetricKind::Cbo, Value::from(3usize), &RangeRegistry::empty());
        let b = Metric::new(MetricKind::Cbo, Value::real(3.0), &RangeRegistry::default());
        assert_eq!(a, b);
        assert!(b.within_range());
    }
}
