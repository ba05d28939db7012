//! CLI entry point for the class-anatomy tool.
use clap::{Arg, ArgAction, Command};
use class_anatomy::{
    analyze, project_report, range_violations, Analysis, AnalysisOptions, Config, LogProgress,
    MetricKind, ProjectReport, RangeViolation, RustSourceProvider, SerializedDeclarations,
    UnitScope,
};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

const CONFIG_TEMPLATE: &str = "# Configuration for class-anatomy\n\n\
# Class metrics to compute. All of them when absent.\n\
# metrics = [\"LCOM\", \"TCC\", \"CBO\", \"RFC\", \"DIT\", \"NOC\"]\n\n\
# Abstractness of a package without classes: \"abstract\" (1.0) or \"concrete\" (0.0)\n\
empty_package_abstractness = \"abstract\"\n\n\
# Acceptable ranges, inclusive. Leave out a bound to disable the check.\n\
[ranges.LCOM]\nfrom = 0\nto = 500\n\n\
[ranges.TCC]\nfrom = 0.33\nto = 1.0\n\n\
[ranges.CBO]\nfrom = 0\nto = 13\n\n\
[ranges.RFC]\nfrom = 0\nto = 44\n\n\
[ranges.DIT]\nfrom = 0\nto = 5\n\n\
[ranges.NOC]\nfrom = 0\nto = 100\n\n\
[ranges.D]\nfrom = 0\nto = 0.7\n\n\
[ranges.CF]\nfrom = 0\nto = 0.243\n";

fn init_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let p = path.as_ref();
    if p.exists() {
        eprintln!("{} already exists", p.display());
        return Ok(());
    }
    std::fs::write(p, CONFIG_TEMPLATE)?;
    println!("created {}", p.display());
    Ok(())
}

fn metrics_help() -> String {
    let mut lines = vec!["Metrics:".to_string()];
    for kind in MetricKind::ALL {
        let range = kind.default_range();
        lines.push(format!(
            "  {:<5} - {} ({:?}, default range {})",
            kind.name(),
            kind.description(),
            kind.level(),
            range
        ));
    }
    lines.join("\n")
}

#[derive(Serialize)]
struct Warnings {
    package_cycles: Vec<Vec<String>>,
    range_violations: Vec<RangeViolation>,
}

#[derive(Serialize, Clone)]
struct ToolInfo {
    version: &'static str,
    target: String,
}

#[derive(Serialize)]
struct Meta {
    #[serde(rename = "class-anatomy")]
    class_anatomy: ToolInfo,
    config: Config,
}

#[derive(Serialize)]
struct OutputRoot {
    meta: Meta,
    project: ProjectReport,
    warnings: Warnings,
}

/// Package dependency graph renderings.
mod package_graph {
    use class_anatomy::{Analysis, MetricKind, ProjectReport};

    fn sanitize(name: &str) -> String {
        name.replace(['.', '-'], "_")
    }

    fn label(report: &ProjectReport, package: &str, newline: &str) -> String {
        let metric = |kind: MetricKind| {
            report
                .packages
                .iter()
                .find(|p| p.name == package)
                .and_then(|p| p.metrics.get(kind.name()))
                .map(|m| m.value.to_string())
                .unwrap_or_else(|| "N/A".to_string())
        };
        format!(
            "{}{}ce={} ca={}{}i={} a={} d={}",
            package,
            newline,
            metric(MetricKind::Ce),
            metric(MetricKind::Ca),
            newline,
            metric(MetricKind::I),
            metric(MetricKind::A),
            metric(MetricKind::D),
        )
    }

    pub(super) fn dot(analysis: &Analysis, report: &ProjectReport) -> String {
        let mut out = String::new();
        out.push_str("digraph class_anatomy {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box];\n");
        for package in &report.packages {
            out.push_str(&format!(
                "    \"{}\" [label=\"{}\"];\n",
                sanitize(&package.name),
                label(report, &package.name, "\\n")
            ));
        }
        for (from, targets) in analysis.graph.package_graph() {
            for to in targets {
                out.push_str(&format!(
                    "    \"{}\" -> \"{}\";\n",
                    sanitize(&from),
                    sanitize(&to)
                ));
            }
        }
        out.push_str("}\n");
        out
    }

    pub(super) fn mermaid(analysis: &Analysis, report: &ProjectReport) -> String {
        let mut out = String::new();
        out.push_str("graph LR\n");
        for package in &report.packages {
            out.push_str(&format!(
                "    {}[\"{}\"]\n",
                sanitize(&package.name),
                label(report, &package.name, "<br/>")
            ));
        }
        for (from, targets) in analysis.graph.package_graph() {
            for to in targets {
                out.push_str(&format!("    {} --> {}\n", sanitize(&from), sanitize(&to)));
            }
        }
        out
    }
}

fn emit_results(
    analysis: &Analysis,
    format: &str,
    show_all: bool,
    config: Config,
    violations: Vec<RangeViolation>,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = OutputRoot {
        meta: Meta {
            class_anatomy: ToolInfo {
                version: env!("CARGO_PKG_VERSION"),
                target: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            },
            config,
        },
        project: project_report(analysis, show_all),
        warnings: Warnings {
            package_cycles: analysis.package_cycles.clone(),
            range_violations: violations,
        },
    };
    let out_str = match format {
        "json" => class_anatomy::loc_try!(serde_json::to_string(&root)),
        "yaml" => class_anatomy::loc_try!(serde_yaml::to_string(&root)),
        "dot" => package_graph::dot(analysis, &root.project),
        "mermaid" => package_graph::mermaid(analysis, &root.project),
        other => {
            eprintln!("unknown output format: {}", other);
            return Ok(());
        }
    };
    println!("{}", out_str);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    info!("reading config {}", path.display());
    match Config::load(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to read config: {}", e);
            Config::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .format_source_path(true)
        .format_line_number(true)
        .init();

    let matches = Command::new("class-anatomy")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_flag(true)
        .after_help(metrics_help())
        .subcommand(
            Command::new("init")
                .about("Generate a template range config")
                .arg(
                    Arg::new("path")
                        .value_name("PATH")
                        .help("Where to create the config file")
                        .required(false),
                ),
        )
        .arg(
            Arg::new("all")
                .short('a')
                .long("all")
                .help("Show class dependencies and dependents")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("decls")
                .long("decls")
                .value_name("DIR")
                .help("Analyze serialized declaration units under DIR instead of the workspace"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Output format: json, yaml, dot or mermaid")
                .value_name("FORMAT")
                .default_value("json"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to range config file (TOML, YAML or JSON)")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("fail-on-violation")
                .long("fail-on-violation")
                .help("Exit with status 1 when a metric is outside its range")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("help")
                .short('h')
                .action(ArgAction::Help)
                .long("help")
                .visible_short_alias('?')
                .help("Show this help message"),
        )
        .get_matches();

    if let Some(("init", sub_m)) = matches.subcommand() {
        let path = sub_m
            .get_one::<String>("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".anatomy.toml"));
        return init_config(path);
    }

    let show_all = matches.get_flag("all");
    let fail_on_violation = matches.get_flag("fail-on-violation");
    let format = matches
        .get_one::<String>("output")
        .map(|s| s.as_str())
        .unwrap_or("json");

    let (name, scope, root) = match matches.get_one::<String>("decls") {
        Some(dir) => {
            let dir = PathBuf::from(dir);
            let provider = SerializedDeclarations::new(&dir);
            let scope = class_anatomy::loc_try!(UnitScope::from_provider(&provider));
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "declarations".to_string());
            (name, scope, PathBuf::from("."))
        }
        None => {
            let mut cmd = cargo_metadata::MetadataCommand::new();
            cmd.no_deps();
            let metadata = class_anatomy::loc_try!(cmd.exec());
            let provider = RustSourceProvider::from_metadata(&metadata)?;
            info!("analyzing crates {:?}", provider.crate_names());
            let scope = class_anatomy::loc_try!(UnitScope::from_provider(&provider));
            let root = PathBuf::from(metadata.workspace_root.as_std_path());
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "workspace".to_string());
            (name, scope, root)
        }
    };

    let config_path: Option<PathBuf> = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .or_else(|| {
            let default = root.join(".anatomy.toml");
            if default.exists() {
                Some(default)
            } else {
                None
            }
        });
    let config = load_config(config_path.as_deref());
    let options = AnalysisOptions::from_config(&config);

    let analysis = class_anatomy::loc_try!(analyze(&name, &scope, &options, &LogProgress));
    let violations = range_violations(&analysis.project);
    let violated = !violations.is_empty();
    class_anatomy::loc_try!(emit_results(
        &analysis, format, show_all, config, violations
    ));
    if fail_on_violation && violated {
        std::process::exit(1);
    }
    Ok(())
}
