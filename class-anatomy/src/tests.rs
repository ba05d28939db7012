use crate::{
    analysis::{analyze, analyze_units, analyze_with_inheritors, calculate, AnalysisError, AnalysisOptions},
    ast::{
        ClassRef, CompilationUnit, FieldDecl, FieldRef, MethodDecl, MethodRef, Modifiers, Node,
        TypeDecl, TypeKind, TypeRef,
    },
    builder::{build_project, build_single_file, ProjectModelBuilder},
    dependencies::DependencyGraph,
    hierarchy::{HierarchyIndex, SubclassCache},
    metrics::{Config, EmptyPackageAbstractness, MetricKind},
    mood::MoodCalculator,
    package::{package_cycles, RobertMartinCalculator},
    provider::{DeclarationProvider, InheritorSearch, NoProgress, Progress, SerializedDeclarations, UnitScope},
    report::{project_report, range_violations},
    rust_source::{module_path, RustCrate, RustSourceProvider},
    value::{Range, Value},
    Analysis,
};
use std::cell::Cell;
use std::path::Path;

fn int() -> TypeRef {
    TypeRef::primitive("int")
}

fn src(q: &str) -> ClassRef {
    ClassRef::source(q)
}

fn reads(owner: &str, fields: &[&str]) -> Vec<Node> {
    fields
        .iter()
        .map(|f| Node::field_access(FieldRef::new(src(owner), *f)))
        .collect()
}

fn method(name: &str, body: Vec<Node>) -> MethodDecl {
    MethodDecl::new(name).with_body(body)
}

fn class_with(q: &str, fields: &[&str], methods: Vec<MethodDecl>) -> TypeDecl {
    let mut decl = TypeDecl::class(q);
    for f in fields {
        decl = decl.with_field(FieldDecl::new(*f, int()));
    }
    for m in methods {
        decl = decl.with_method(m);
    }
    decl
}

fn unit(package: &str, types: Vec<TypeDecl>) -> CompilationUnit {
    let mut unit = CompilationUnit::new(format!("{}.java", package.replace('.', "/")), Some(package));
    unit.types = types;
    unit
}

fn class_metric(analysis: &Analysis, class: &str, kind: MetricKind) -> Value {
    analysis
        .project
        .class_metric(class, kind)
        .cloned()
        .unwrap_or(Value::Undefined)
}

fn package_metric(analysis: &Analysis, package: &str, kind: MetricKind) -> Value {
    analysis
        .project
        .package_metric(package, kind)
        .cloned()
        .unwrap_or(Value::Undefined)
}

fn project_metric(analysis: &Analysis, kind: MetricKind) -> Value {
    analysis
        .project
        .metrics
        .value(kind)
        .cloned()
        .unwrap_or(Value::Undefined)
}

fn ratio(n: usize, d: usize) -> Value {
    Value::ratio(n, d).unwrap()
}

#[test]
fn lcom_is_one_when_every_method_shares_a_field() {
    let a = class_with(
        "p.Counter",
        &["count"],
        vec![
            method("get", reads("p.Counter", &["count"])),
            method("inc", reads("p.Counter", &["count"])),
            method("reset", reads("p.Counter", &["count"])),
        ],
    );
    let analysis = analyze_units("t", &[unit("p", vec![a])]);
    assert_eq!(class_metric(&analysis, "p.Counter", MetricKind::Lcom), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "p.Counter", MetricKind::Tcc), Value::from(1usize));
}

#[test]
fn lcom_counts_disjoint_field_users() {
    let owner = "p.Bag";
    let a = class_with(
        owner,
        &["a", "b", "c", "d"],
        vec![
            method("useA", reads(owner, &["a"])),
            method("useB", reads(owner, &["b"])),
            method("useC", reads(owner, &["c"])),
            method("useD", reads(owner, &["d"])),
            method("idle", Vec::new()),
        ],
    );
    let analysis = analyze_units("t", &[unit("p", vec![a])]);
    assert_eq!(class_metric(&analysis, owner, MetricKind::Lcom), Value::from(4usize));
}

#[test]
fn lcom_joins_groups_through_a_bridge_method() {
    let owner = "p.Split";
    let call = |name: &str| Node::call(MethodRef::new(src(owner), name, 0));
    let a = class_with(
        owner,
        &["a", "b", "c", "d"],
        vec![
            method("a1", reads(owner, &["a"])),
            method("a2", reads(owner, &["a"])),
            method("b1", reads(owner, &["b"])),
            method("b2", reads(owner, &["b"])),
            method("bridge", vec![call("a1"), call("b1")]),
            method("cUser", reads(owner, &["c"])),
            method("dUser", reads(owner, &["d"])),
            method("idle", Vec::new()),
        ],
    );
    let analysis = analyze_units("t", &[unit("p", vec![a])]);
    assert_eq!(class_metric(&analysis, owner, MetricKind::Lcom), Value::from(3usize));
}

#[test]
fn tcc_counts_field_sharing_pairs_only() {
    let owner = "p.Pairs";
    let mut methods = Vec::new();
    for name in ["m1", "m2", "m3"] {
        methods.push(method(name, reads(owner, &["x"])));
    }
    for name in ["m4", "m5", "m6"] {
        methods.push(method(name, reads(owner, &["y"])));
    }
    methods.push(method("m7", vec![Node::call(MethodRef::new(src(owner), "m1", 0))]));
    methods.push(method("m8", Vec::new()));
    let analysis = analyze_units("t", &[unit("p", vec![class_with(owner, &["x", "y"], methods)])]);
    let tcc = class_metric(&analysis, owner, MetricKind::Tcc);
    assert_eq!(tcc, ratio(6, 28));
    assert_eq!(tcc.to_string(), "0.2143");
    assert_eq!(class_metric(&analysis, owner, MetricKind::Lcom), Value::from(2usize));
}

#[test]
fn cohesion_is_undefined_for_interfaces_and_static_only_classes() {
    let iface = TypeDecl::interface("p.Shape").with_method(
        MethodDecl::new("area").with_modifiers(Modifiers::public().with_abstract()),
    );
    let statics = class_with(
        "p.Util",
        &["cache"],
        vec![MethodDecl::new("help")
            .with_modifiers(Modifiers::public().with_static())
            .with_body(reads("p.Util", &["cache"]))],
    );
    let boiler = class_with("p.Plain", &[], vec![method("toString", Vec::new())]);
    let analysis = analyze_units("t", &[unit("p", vec![iface, statics, boiler])]);
    for class in ["p.Shape", "p.Util", "p.Plain"] {
        assert!(class_metric(&analysis, class, MetricKind::Lcom).is_undefined(), "{}", class);
        assert!(class_metric(&analysis, class, MetricKind::Tcc).is_undefined(), "{}", class);
    }
    assert_ne!(class_metric(&analysis, "p.Shape", MetricKind::Lcom), Value::from(0usize));
}

fn coupling_units() -> Vec<CompilationUnit> {
    let b = TypeDecl::class("q.B").with_method(method("go", Vec::new()));
    let c = TypeDecl::class("q.C").with_method(MethodDecl::constructor("C"));
    let go = || Node::call(MethodRef::new(src("q.B"), "go", 0));
    let a = TypeDecl::class("p.A")
        .with_field(FieldDecl::new("b", TypeRef::class(src("q.B"))))
        .with_field(FieldDecl::new("other", TypeRef::class(src("q.B"))))
        .with_field(FieldDecl::new(
            "name",
            TypeRef::class(ClassRef::library("java.lang.String")),
        ))
        .with_field(FieldDecl::new("n", int()))
        .with_method(method(
            "run",
            vec![
                go(),
                go(),
                Node::call(MethodRef::new(src("p.A"), "helper", 0)),
                Node::new_object(
                    TypeRef::class(src("q.C")),
                    Some(MethodRef::new(src("q.C"), "C", 0)),
                ),
            ],
        ))
        .with_method(method("helper", Vec::new()));
    vec![unit("p", vec![a]), unit("q", vec![b, c])]
}

#[test]
fn coupling_metrics() {
    let analysis = analyze_units("t", &coupling_units());
    assert_eq!(class_metric(&analysis, "p.A", MetricKind::Cbo), Value::from(2usize));
    assert_eq!(class_metric(&analysis, "q.B", MetricKind::Cbo), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "p.A", MetricKind::Rfc), Value::from(4usize));
    assert_eq!(class_metric(&analysis, "p.A", MetricKind::Mpc), Value::from(2usize));
    assert_eq!(class_metric(&analysis, "p.A", MetricKind::Dac), Value::from(2usize));
    assert_eq!(class_metric(&analysis, "p.A", MetricKind::Noa), Value::from(4usize));
    assert_eq!(class_metric(&analysis, "q.C", MetricKind::Nom), Value::from(0usize));
}

#[test]
fn coupling_and_size_metrics_are_undefined_for_enums_and_interfaces() {
    let b = TypeDecl::class("p.B").with_method(method("run", Vec::new()));
    let color = TypeDecl::new(TypeKind::Enum, "p.Color")
        .with_field(FieldDecl::new("b", TypeRef::class(src("p.B"))))
        .with_method(method(
            "paint",
            vec![Node::call(MethodRef::new(src("p.B"), "run", 0))],
        ));
    let iface = TypeDecl::interface("p.I").extends(src("p.B"));
    let analysis = analyze_units("t", &[unit("p", vec![b, color, iface])]);
    for class in ["p.Color", "p.I"] {
        for kind in [
            MetricKind::Cbo,
            MetricKind::Rfc,
            MetricKind::Dac,
            MetricKind::Mpc,
            MetricKind::Dit,
            MetricKind::Noa,
            MetricKind::Nom,
        ] {
            assert!(
                class_metric(&analysis, class, kind).is_undefined(),
                "{} {}",
                class,
                kind.name()
            );
        }
    }
    assert_eq!(class_metric(&analysis, "p.B", MetricKind::Cbo), Value::from(2usize));
    assert!(range_violations(&analysis.project)
        .iter()
        .all(|v| v.entity != "p.Color" && v.entity != "p.I"));
}

#[test]
fn dependency_maps_are_symmetric_and_rebuildable() {
    let project = build_project("t", &coupling_units());
    let graph = DependencyGraph::build(&project);
    assert_eq!(graph, DependencyGraph::build(&project));
    for (from, to, n) in graph.edges() {
        assert!(graph.class_dependents(to).contains(from));
        assert_eq!(
            graph.dependents_edges().find(|(t, f, _)| *t == to && *f == from).map(|e| e.2),
            Some(n)
        );
    }
    assert_eq!(graph.multiplicity("p.A", "q.B"), 4);
    assert!(!graph.class_dependencies("p.A").contains("java.lang.String"));
    assert_eq!(
        graph.package_dependencies("p.A").into_iter().collect::<Vec<_>>(),
        vec!["q"]
    );
}

#[test]
fn local_classes_own_their_references_and_anonymous_ones_do_not() {
    let local = TypeDecl::new(TypeKind::Local, "p.A.Helper")
        .with_field(FieldDecl::new("b", TypeRef::class(src("q.B"))));
    let anonymous = TypeDecl::new(TypeKind::Anonymous, "p.A$1")
        .with_field(FieldDecl::new("c", TypeRef::class(src("q.C"))));
    let mut creation = Node::new_object(TypeRef::class(src("q.Base")), None);
    if let Node::New(n) = &mut creation {
        n.body = Some(Box::new(anonymous));
    }
    let a = TypeDecl::class("p.A").with_method(method(
        "run",
        vec![Node::LocalClass(Box::new(local)), creation],
    ));
    let q = unit(
        "q",
        vec![TypeDecl::class("q.B"), TypeDecl::class("q.C"), TypeDecl::class("q.Base")],
    );
    let project = build_project("t", &[unit("p", vec![a]), q]);
    let graph = DependencyGraph::build(&project);
    let deps = graph.class_dependencies("p.A");
    assert!(deps.contains("q.C"));
    assert!(deps.contains("q.Base"));
    assert!(!deps.contains("q.B"));
    assert!(graph.class_dependencies("p.A.Helper").contains("q.B"));
}

#[test]
fn unnamed_local_classes_are_kept_apart() {
    let local = |name: &str, target: &str| {
        let mut decl = TypeDecl::new(TypeKind::Local, "")
            .with_field(FieldDecl::new("x", TypeRef::class(src(target))));
        decl.name = name.to_string();
        Node::LocalClass(Box::new(decl))
    };
    let a = TypeDecl::class("p.A").with_method(method("run", vec![local("Helper", "q.B")]));
    let z = TypeDecl::class("p.Z").with_method(method("run", vec![local("Helper", "q.C")]));
    let q = unit("q", vec![TypeDecl::class("q.B"), TypeDecl::class("q.C")]);
    let project = build_project("t", &[unit("p", vec![a, z]), q]);
    let graph = DependencyGraph::build(&project);
    assert!(graph.class_dependencies("").is_empty());
    assert_eq!(
        graph.class_dependencies("p.A.Helper").into_iter().collect::<Vec<_>>(),
        vec!["q.B"]
    );
    assert_eq!(
        graph.class_dependencies("p.Z.Helper").into_iter().collect::<Vec<_>>(),
        vec!["q.C"]
    );
    assert_eq!(
        graph.class_dependents("q.B").into_iter().collect::<Vec<_>>(),
        vec!["p.A.Helper"]
    );
}

#[test]
fn inheritance_metrics() {
    let base = TypeDecl::class("p.Base")
        .with_method(method("run", Vec::new()))
        .with_method(MethodDecl::constructor("Base"));
    let mid = TypeDecl::class("p.Mid")
        .extends(src("p.Base"))
        .with_method(method("run", Vec::new()))
        .with_method(method("extra", Vec::new()));
    let leaf = TypeDecl::class("p.Leaf").extends(src("p.Mid"));
    let sealed = TypeDecl::class("p.Sealed").with_modifiers(Modifiers::public().with_final());
    let iface = TypeDecl::interface("p.Iface");
    let imp = TypeDecl::class("p.Impl").implements(src("p.Iface"));
    let analysis = analyze_units("t", &[unit("p", vec![base, mid, leaf, sealed, iface, imp])]);

    assert_eq!(class_metric(&analysis, "p.Base", MetricKind::Dit), Value::from(0usize));
    assert_eq!(class_metric(&analysis, "p.Mid", MetricKind::Dit), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "p.Leaf", MetricKind::Dit), Value::from(2usize));
    assert_eq!(class_metric(&analysis, "p.Base", MetricKind::Noc), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "p.Leaf", MetricKind::Noc), Value::from(0usize));
    assert!(class_metric(&analysis, "p.Sealed", MetricKind::Noc).is_undefined());
    assert!(class_metric(&analysis, "p.Iface", MetricKind::Noc).is_undefined());
    assert_eq!(class_metric(&analysis, "p.Mid", MetricKind::Noom), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "p.Mid", MetricKind::Noam), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "p.Base", MetricKind::Noam), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "p.Base", MetricKind::Nom), Value::from(1usize));
}

struct FixedInheritors;

impl InheritorSearch for FixedInheritors {
    fn inheritors(&self, class: &str, _deep: bool) -> Vec<String> {
        if class == "p.Base" {
            vec!["x.One".to_string(), "x.Two".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[test]
fn noc_uses_the_given_inheritor_search() {
    let scope = UnitScope::new(vec![unit("p", vec![TypeDecl::class("p.Base")])]);
    let analysis = analyze_with_inheritors(
        "t",
        &scope,
        &AnalysisOptions::default(),
        &NoProgress,
        &FixedInheritors,
    )
    .unwrap();
    assert_eq!(class_metric(&analysis, "p.Base", MetricKind::Noc), Value::from(2usize));
}

fn depends_on(q: &str, targets: &[&str]) -> TypeDecl {
    let mut decl = TypeDecl::class(q);
    for (i, t) in targets.iter().enumerate() {
        decl = decl.with_field(FieldDecl::new(format!("f{}", i), TypeRef::class(src(t))));
    }
    decl
}

#[test]
fn robert_martin_metrics() {
    let units = vec![
        unit("a", vec![depends_on("a.A", &["b.B", "c.C", "d.D"])]),
        unit("b", vec![TypeDecl::class("b.B")]),
        unit("c", vec![TypeDecl::class("c.C")]),
        unit("d", vec![TypeDecl::class("d.D"), TypeDecl::interface("d.Port")]),
        unit("x.y", vec![TypeDecl::class("x.y.Z")]),
    ];
    let analysis = analyze_units("t", &units);
    assert_eq!(package_metric(&analysis, "a", MetricKind::Ce), Value::from(3usize));
    assert_eq!(package_metric(&analysis, "a", MetricKind::Ca), Value::from(0usize));
    assert_eq!(package_metric(&analysis, "a", MetricKind::I), Value::from(1usize));
    assert_eq!(package_metric(&analysis, "b", MetricKind::Ca), Value::from(1usize));
    assert_eq!(package_metric(&analysis, "b", MetricKind::I), Value::from(0usize));
    assert_eq!(package_metric(&analysis, "b", MetricKind::D), Value::from(1usize));
    assert_eq!(package_metric(&analysis, "d", MetricKind::A), ratio(1, 2));
    assert_eq!(package_metric(&analysis, "d", MetricKind::Pnoi), Value::from(1usize));
    assert_eq!(package_metric(&analysis, "d", MetricKind::Pnocc), Value::from(1usize));
    // no coupling at all still counts as unstable
    assert_eq!(package_metric(&analysis, "x.y", MetricKind::I), Value::from(1usize));
    // "x" holds no classes
    assert_eq!(package_metric(&analysis, "x", MetricKind::A), Value::from(1usize));
    assert_eq!(package_metric(&analysis, "x", MetricKind::D), Value::from(1usize));

    let concrete = RobertMartinCalculator::new(EmptyPackageAbstractness::Concrete)
        .compute(&analysis.project, &analysis.graph);
    let x = analysis.project.find_package("x").unwrap();
    assert_eq!(concrete[&x].abstractness, Value::from(0usize));
    assert_eq!(concrete[&x].distance, Value::from(0usize));
}

#[test]
fn package_cycles_are_reported() {
    let units = vec![
        unit("a", vec![depends_on("a.A", &["b.B"])]),
        unit("b", vec![depends_on("b.B", &["a.A"])]),
        unit("c", vec![depends_on("c.C", &["a.A"])]),
    ];
    let analysis = analyze_units("t", &units);
    assert_eq!(analysis.package_cycles, vec![vec!["a".to_string(), "b".to_string()]]);
    assert_eq!(package_cycles(&analysis.graph), analysis.package_cycles);
}

fn mood_units() -> Vec<CompilationUnit> {
    let base = TypeDecl::class("p.Base")
        .with_field(FieldDecl::new("state", int()))
        .with_method(method("m", Vec::new()));
    let sub = TypeDecl::class("p.Sub")
        .extends(src("p.Base"))
        .with_method(method(
            "m",
            vec![Node::call(MethodRef::new(src("p.Util"), "help", 0))],
        ));
    let sub2 = TypeDecl::class("p.Sub2").extends(src("p.Base"));
    let util = TypeDecl::class("p.Util");
    vec![unit("p", vec![base, sub, sub2, util])]
}

#[test]
fn mood_factors() {
    let analysis = analyze_units("t", &mood_units());
    assert_eq!(project_metric(&analysis, MetricKind::Ahf), Value::from(1usize));
    assert_eq!(project_metric(&analysis, MetricKind::Aif), Value::from(0usize));
    assert_eq!(project_metric(&analysis, MetricKind::Mhf), Value::from(0usize));
    assert_eq!(project_metric(&analysis, MetricKind::Mif), ratio(1, 3));
    assert_eq!(project_metric(&analysis, MetricKind::Cf), ratio(1, 6));
    assert_eq!(project_metric(&analysis, MetricKind::Pf), ratio(1, 2));
}

#[test]
fn subclass_counts_are_memoized_per_cache() {
    let project = build_project("t", &mood_units());
    let index = HierarchyIndex::new(&project);
    let mut cache = SubclassCache::new();
    assert_eq!(cache.count(&index, "p.Base"), 2);
    assert_eq!(cache.count(&FixedInheritors, "p.Base"), 2);
    let graph = DependencyGraph::build(&project);
    let fresh = MoodCalculator::new(&index).compute(&project, &graph, &mut SubclassCache::new());
    assert_eq!(fresh.pf, ratio(1, 2));
}

#[test]
fn builder_splices_less_qualified_packages() {
    let mut project = build_single_file("t", &unit("a.b.c", vec![TypeDecl::class("a.b.c.C")]));
    assert_eq!(project.root_packages().len(), 1);
    ProjectModelBuilder::new(&mut project).add_unit(&unit("a.b", vec![TypeDecl::class("a.b.B")]));

    let a = project.find_package("a").unwrap();
    let ab = project.find_package("a.b").unwrap();
    let abc = project.find_package("a.b.c").unwrap();
    assert_eq!(project.root_packages(), &[a]);
    assert_eq!(project.package(ab).parent, Some(a));
    assert_eq!(project.package(abc).parent, Some(ab));
    assert_eq!(project.package(abc).name, "c");
    assert_eq!(project.package(ab).packages, vec![abc]);
    assert_eq!(project.package_name_of(project.find_class("a.b.c.C").unwrap()), Some("a.b.c"));
}

#[test]
fn builder_handles_orphans_nested_and_duplicates() {
    let mut orphan = CompilationUnit::new("Main.java", None);
    orphan.types.push(TypeDecl::class("Main"));
    let mut outer = TypeDecl::class("p.Outer");
    let mut inner = TypeDecl::class("");
    inner.name = "Inner".to_string();
    outer = outer.with_nested(inner);
    let units = vec![
        orphan,
        unit("p", vec![outer]),
        unit("p", vec![TypeDecl::class("p.Outer")]),
        unit("a..b", vec![TypeDecl::class("Broken")]),
    ];
    let project = build_project("t", &units);

    assert_eq!(project.orphan_classes().len(), 2);
    let main = project.find_class("Main").unwrap();
    assert_eq!(project.class(main).package, None);
    let outer = project.find_class("p.Outer").unwrap();
    let inner = project.find_class("p.Outer.Inner").unwrap();
    assert_eq!(project.class(outer).classes, vec![inner]);
    assert_eq!(project.class(inner).parent, Some(outer));
    assert_eq!(project.package(project.find_package("p").unwrap()).classes, vec![outer]);
    assert_eq!(project.class_count(), 4);
}

struct CancelAfterFirst {
    seen: Cell<usize>,
}

impl Progress for CancelAfterFirst {
    fn is_cancelled(&self) -> bool {
        self.seen.get() > 0
    }

    fn set_fraction(&self, _fraction: f64) {
        self.seen.set(self.seen.get() + 1);
    }
}

#[test]
fn analysis_stops_between_units_when_cancelled() {
    let scope = UnitScope::new(coupling_units());
    let progress = CancelAfterFirst { seen: Cell::new(0) };
    let result = analyze("t", &scope, &AnalysisOptions::default(), &progress);
    assert!(matches!(result, Err(AnalysisError::Cancelled)));
    assert_eq!(progress.seen.get(), 1);
}

#[test]
fn configured_metrics_and_ranges_drive_violations() {
    let config: Config = toml::from_str(
        r#"
        metrics = ["CBO"]
        [ranges.CBO]
        from = 0
        to = 1
        "#,
    )
    .unwrap();
    let options = AnalysisOptions::from_config(&config);
    let project = build_project("t", &coupling_units());
    let index = HierarchyIndex::new(&project);
    let analysis = calculate(project, &options, &index);

    let a = analysis.project.find_class("p.A").unwrap();
    assert!(analysis.project.class(a).metrics.get("LCOM").is_none());
    let cbo = analysis.project.class(a).metrics.get("CBO").unwrap();
    assert_eq!(cbo.range, Range::new(Value::from(0usize), Value::from(1usize)));

    // AIF of a hierarchy-free project falls below its default range too
    let violations: Vec<_> = range_violations(&analysis.project)
        .into_iter()
        .filter(|v| v.metric == "CBO")
        .collect();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].entity, "p.A");
    assert_eq!(violations[0].metric, "CBO");
    assert_eq!(violations[0].value, Value::from(2usize));
}

#[test]
fn report_lists_packages_and_details() {
    let analysis = analyze_units("t", &coupling_units());
    let report = project_report(&analysis, true);
    let names: Vec<&str> = report.packages.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["p", "q"]);
    let a = &report.packages[0].classes[0];
    assert_eq!(a.name, "p.A");
    assert_eq!(
        a.dependencies.as_deref(),
        Some(&["q.B".to_string(), "q.C".to_string()][..])
    );
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["packages"][1]["metrics"]["Ca"]["value"], 1);
    assert!(project_report(&analysis, false).packages[0].classes[0].dependencies.is_none());
}

#[test]
fn serialized_declarations_skip_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let units = coupling_units();
    std::fs::write(
        dir.path().join("a.json"),
        serde_json::to_string(&units).unwrap(),
    )
    .unwrap();
    std::fs::write(dir.path().join("b.yaml"), "path: [unclosed").unwrap();
    std::fs::write(dir.path().join("c.txt"), "ignored").unwrap();
    let read = SerializedDeclarations::new(dir.path()).compilation_units().unwrap();
    assert_eq!(read, units);
}

#[test]
fn module_paths_follow_file_layout() {
    let root = Path::new("src");
    assert!(module_path(root, Path::new("src/lib.rs")).is_empty());
    assert!(module_path(root, Path::new("src/main.rs")).is_empty());
    assert_eq!(module_path(root, Path::new("src/model/mod.rs")), vec!["model"]);
    assert_eq!(module_path(root, Path::new("src/model/store.rs")), vec!["model", "store"]);
}

const GEOMETRY: &str = r#"
    pub trait Shape {
        fn area(&self) -> f64;
    }

    pub struct Point {
        x: i64,
        y: i64,
    }

    impl Point {
        pub fn new(x: i64, y: i64) -> Self {
            Point { x, y }
        }
        pub fn x(&self) -> i64 {
            self.x
        }
        pub fn sum(&self) -> i64 {
            self.x + self.y
        }
        fn origin() -> i64 {
            0
        }
    }

    pub struct Circle {
        center: Point,
        r: f64,
    }

    impl Shape for Circle {
        fn area(&self) -> f64 {
            self.r * self.r
        }
    }

    impl Circle {
        pub fn shift(&self) -> i64 {
            let p = Point::new(1, 2);
            p.sum() + self.center.x()
        }
    }

    #[cfg(test)]
    mod tests {
        pub struct Hidden;
    }
"#;

fn geometry_units() -> Vec<CompilationUnit> {
    let file: syn::File = syn::parse_str(GEOMETRY).unwrap();
    RustSourceProvider::new(vec![RustCrate::new("geo").with_file("", file)]).lower()
}

#[test]
fn rust_types_lower_to_declarations() {
    let units = geometry_units();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].package.as_deref(), Some("geo"));
    let names: Vec<&str> = units[0].types.iter().map(|t| t.qualified_name.as_str()).collect();
    assert_eq!(names, vec!["geo.Shape", "geo.Point", "geo.Circle"]);

    let shape = &units[0].types[0];
    assert_eq!(shape.kind, TypeKind::Interface);
    assert!(shape.methods[0].modifiers.is_abstract);

    let point = &units[0].types[1];
    assert!(point.modifiers.is_final);
    let new = point.methods.iter().find(|m| m.name == "new").unwrap();
    assert!(new.is_constructor);
    let origin = point.methods.iter().find(|m| m.name == "origin").unwrap();
    assert!(origin.modifiers.is_static);
    assert_eq!(origin.modifiers.visibility, crate::ast::Visibility::Private);

    let circle = &units[0].types[2];
    assert_eq!(circle.interfaces, vec![TypeRef::class(src("geo.Shape"))]);
    let area = circle.methods.iter().find(|m| m.name == "area").unwrap();
    assert_eq!(area.modifiers.visibility, crate::ast::Visibility::Public);
}

#[test]
fn rust_sources_feed_the_metrics() {
    let analysis = analyze_units("geo", &geometry_units());
    let deps: Vec<&str> = analysis.graph.class_dependencies("geo.Circle").into_iter().collect();
    assert_eq!(deps, vec!["geo.Point", "geo.Shape"]);
    assert_eq!(class_metric(&analysis, "geo.Point", MetricKind::Lcom), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "geo.Point", MetricKind::Tcc), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "geo.Circle", MetricKind::Rfc), Value::from(5usize));
    assert_eq!(class_metric(&analysis, "geo.Circle", MetricKind::Dac), Value::from(1usize));
    assert!(class_metric(&analysis, "geo.Point", MetricKind::Noc).is_undefined());
    assert_eq!(class_metric(&analysis, "geo.Circle", MetricKind::Dit), Value::from(0usize));
}

#[test]
fn rust_imports_resolve_across_modules() {
    let root: syn::File = syn::parse_str(
        r#"
        use crate::model::Store;

        pub struct Service {
            store: Store,
        }

        impl Service {
            pub fn run(&self) {
                self.store.save();
            }
        }
        "#,
    )
    .unwrap();
    let model: syn::File = syn::parse_str(
        r#"
        pub struct Store;

        impl Store {
            pub fn save(&self) {}
        }
        "#,
    )
    .unwrap();
    let krate = RustCrate::new("app")
        .with_file("", root)
        .with_file("model", model);
    let units = RustSourceProvider::new(vec![krate]).lower();
    let analysis = analyze_units("app", &units);

    assert!(analysis.graph.class_dependencies("app.Service").contains("app.model.Store"));
    assert_eq!(package_metric(&analysis, "app", MetricKind::Ce), Value::from(1usize));
    assert_eq!(package_metric(&analysis, "app.model", MetricKind::Ca), Value::from(1usize));
    assert_eq!(class_metric(&analysis, "app.Service", MetricKind::Mpc), Value::from(1usize));
}
