//! Seams to the outside world: where declarations come from, how a scope
//! is walked, how inheritors are found and how progress is reported.
use crate::analysis::AnalysisError;
use crate::ast::CompilationUnit;
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Source of resolved compilation units.
pub trait DeclarationProvider {
    fn compilation_units(&self) -> Result<Vec<CompilationUnit>, Box<dyn std::error::Error>>;
}

/// A finite set of units the engine iterates over.
pub trait ScopeWalker {
    fn unit_count(&self) -> usize;

    /// Feed every unit to `visitor`, stopping at the first error.
    fn walk(
        &self,
        visitor: &mut dyn FnMut(&CompilationUnit) -> Result<(), AnalysisError>,
    ) -> Result<(), AnalysisError>;
}

/// Finds the classes extending or implementing a class.
pub trait InheritorSearch {
    /// Qualified names of the non-interface inheritors of `class`; direct
    /// ones only unless `deep`.
    fn inheritors(&self, class: &str, deep: bool) -> Vec<String>;
}

/// Progress reporting and cooperative cancellation.
pub trait Progress {
    fn is_cancelled(&self) -> bool {
        false
    }

    fn set_fraction(&self, _fraction: f64) {}
}

/// Never cancels, reports nothing.
pub struct NoProgress;

impl Progress for NoProgress {}

/// Reports progress through the log.
pub struct LogProgress;

impl Progress for LogProgress {
    fn set_fraction(&self, fraction: f64) {
        debug!("progress {:.0}%", fraction * 100.0);
    }
}

/// An in-memory scope.
#[derive(Debug, Clone, Default)]
pub struct UnitScope {
    units: Vec<CompilationUnit>,
}

impl UnitScope {
    pub fn new(units: Vec<CompilationUnit>) -> Self {
        Self { units }
    }

    pub fn from_provider(
        provider: &dyn DeclarationProvider,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(provider.compilation_units()?))
    }

    pub fn units(&self) -> &[CompilationUnit] {
        &self.units
    }
}

impl From<Vec<CompilationUnit>> for UnitScope {
    fn from(units: Vec<CompilationUnit>) -> Self {
        Self::new(units)
    }
}

impl ScopeWalker for UnitScope {
    fn unit_count(&self) -> usize {
        self.units.len()
    }

    fn walk(
        &self,
        visitor: &mut dyn FnMut(&CompilationUnit) -> Result<(), AnalysisError>,
    ) -> Result<(), AnalysisError> {
        for unit in &self.units {
            visitor(unit)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnitFile {
    Many(Vec<CompilationUnit>),
    One(CompilationUnit),
}

/// Reads serialized units (`*.json`, `*.yaml`, `*.yml`) below a directory.
///
/// Files are read in file-name order. A file may hold one unit or a list.
pub struct SerializedDeclarations {
    root: PathBuf,
}

impl SerializedDeclarations {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(path: &Path) -> Result<Vec<CompilationUnit>, Box<dyn std::error::Error>> {
        let text = crate::loc_try!(std::fs::read_to_string(path));
        let parsed: UnitFile = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => crate::loc_try!(serde_json::from_str(&text)),
            _ => crate::loc_try!(serde_yaml::from_str(&text)),
        };
        Ok(match parsed {
            UnitFile::Many(units) => units,
            UnitFile::One(unit) => vec![unit],
        })
    }
}

impl DeclarationProvider for SerializedDeclarations {
    fn compilation_units(&self) -> Result<Vec<CompilationUnit>, Box<dyn std::error::Error>> {
        let mut units = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = crate::loc_try!(entry);
            let is_unit = entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| matches!(e, "json" | "yaml" | "yml"));
            if !is_unit {
                continue;
            }
            debug!("reading {}", entry.path().display());
            match Self::read(entry.path()) {
                Ok(found) => units.extend(found),
                Err(e) => warn!("skipping {}: {}", entry.path().display(), e),
            }
        }
        Ok(units)
    }
}
