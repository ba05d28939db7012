//! Declaration provider for Rust sources.
//!
//! Structs become classes, enums enums and traits interfaces. Methods of
//! `impl` blocks attach to their self type and `impl Trait for T` adds the
//! trait to the interfaces of `T`. Packages are `crate[.module...]`.
//!
//! Names are resolved against a symbol table of every type declared in the
//! analyzed crates, the `use` items of the enclosing module and the local
//! bindings of a body. Anything that cannot be resolved is left unresolved.
use crate::ast::{
    self, CallExpr, ClassRef, CompilationUnit, FieldDecl, LambdaExpr, LocalVariable, MethodDecl,
    MethodRef, Modifiers, NewExpr, Node, Param, TypeCheck, TypeDecl, TypeKind, TypeParam, TypeRef,
    TypeUse,
};
use crate::provider::DeclarationProvider;
use crate::utils::{has_test_attr, path_idents};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use syn::punctuated::Punctuated;
use syn::visit::Visit as SynVisit;
use walkdir::WalkDir;

const PRIMITIVES: &[&str] = &[
    "bool", "char", "str", "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64",
    "i128", "isize", "f32", "f64",
];

/// Wrappers looked through when typing receivers and return values.
const WRAPPERS: &[&str] = &[
    "Box", "Rc", "Arc", "RefCell", "Cell", "Mutex", "RwLock", "Option", "Result", "Cow",
];

/// A parsed source file and the module path it defines.
pub struct SourceFile {
    pub path: String,
    pub module: Vec<String>,
    pub file: syn::File,
}

/// The sources of one crate.
pub struct RustCrate {
    pub name: String,
    pub files: Vec<SourceFile>,
}

impl RustCrate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
        }
    }

    /// Add a file defining `module` (`"a::b"`, or `""` for the crate root).
    pub fn with_file(mut self, module: &str, file: syn::File) -> Self {
        let module: Vec<String> = module
            .split("::")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let path = if module.is_empty() {
            "src/lib.rs".to_string()
        } else {
            format!("src/{}.rs", module.join("/"))
        };
        self.files.push(SourceFile { path, module, file });
        self
    }
}

/// Module path defined by `file` below the source directory `src_dir`.
///
/// `lib.rs` and `main.rs` at the top and every `mod.rs` name their parent.
pub fn module_path(src_dir: &Path, file: &Path) -> Vec<String> {
    let rel = file.strip_prefix(src_dir).unwrap_or(file);
    let mut parts: Vec<String> = rel
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect();
    if let Some(last) = parts.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(&last).to_string();
        let crate_root = parts.is_empty() && (stem == "lib" || stem == "main");
        if stem != "mod" && !crate_root {
            parts.push(stem);
        }
    }
    parts
}

fn package_source_dirs(package: &cargo_metadata::Package) -> BTreeSet<PathBuf> {
    let mut dirs = BTreeSet::new();
    for target in &package.targets {
        if target.kind.iter().any(|k| k == "lib" || k == "bin") {
            if let Some(parent) = Path::new(&target.src_path).parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
    }
    if dirs.is_empty() {
        if let Some(manifest_dir) = package.manifest_path.parent() {
            dirs.insert(manifest_dir.join("src").into());
        }
    }
    dirs
}

fn parse_dir(dir: &Path) -> Result<Vec<SourceFile>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = crate::loc_try!(entry);
        if entry.file_type().is_file()
            && entry.path().extension().map(|s| s == "rs").unwrap_or(false)
        {
            if entry.path().components().any(|c| c.as_os_str() == "tests") {
                continue;
            }
            debug!("parsing {}", entry.path().display());
            let content = crate::loc_try!(fs::read_to_string(entry.path()));
            let file = crate::loc_try!(syn::parse_file(&content));
            files.push(SourceFile {
                path: entry.path().display().to_string(),
                module: module_path(dir, entry.path()),
                file,
            });
        }
    }
    Ok(files)
}

/// Library target name of a package, falling back to the package name.
pub fn crate_name(package: &cargo_metadata::Package) -> String {
    package
        .targets
        .iter()
        .find(|t| t.kind.iter().any(|k| k == "lib"))
        .map(|t| t.name.clone())
        .unwrap_or_else(|| package.name.clone())
        .replace('-', "_")
}

/// Parse every Rust file of the package's library and binary targets.
/// Files under a `tests` directory are skipped.
pub fn parse_package(
    package: &cargo_metadata::Package,
) -> Result<RustCrate, Box<dyn std::error::Error>> {
    info!("reading crate {}", package.name);
    let mut krate = RustCrate::new(crate_name(package));
    for dir in package_source_dirs(package) {
        krate.files.extend(parse_dir(&dir)?);
    }
    Ok(krate)
}

/// Lowers a set of crates analyzed together.
pub struct RustSourceProvider {
    crates: Vec<RustCrate>,
}

impl RustSourceProvider {
    pub fn new(crates: Vec<RustCrate>) -> Self {
        Self { crates }
    }

    /// Every workspace member of `metadata`.
    pub fn from_metadata(
        metadata: &cargo_metadata::Metadata,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!(
            "found {} workspace members",
            metadata.workspace_members.len()
        );
        let mut seen = HashSet::new();
        let mut crates = Vec::new();
        for id in &metadata.workspace_members {
            let package = &metadata[id];
            if !seen.insert(crate_name(package)) {
                continue;
            }
            crates.push(parse_package(package)?);
        }
        Ok(Self::new(crates))
    }

    pub fn crate_names(&self) -> Vec<&str> {
        self.crates.iter().map(|c| c.name.as_str()).collect()
    }

    /// Lower every crate into units, one per module.
    pub fn lower(&self) -> Vec<CompilationUnit> {
        let mut modules = Vec::new();
        for krate in &self.crates {
            for file in &krate.files {
                if has_test_attr(&file.file.attrs) {
                    continue;
                }
                let package = std::iter::once(krate.name.as_str())
                    .chain(file.module.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(".");
                push_module(&krate.name, &file.path, package, &file.file.items, &mut modules);
            }
        }
        let index = Index::build(&self.crates, &modules);
        let mut units: Vec<CompilationUnit> =
            modules.iter().map(|m| lower_module(&index, m)).collect();
        attach_impls(&index, &modules, &mut units);
        units.sort_by(|a, b| a.package.cmp(&b.package));
        debug!("lowered {} modules", units.len());
        units
    }
}

impl DeclarationProvider for RustSourceProvider {
    fn compilation_units(&self) -> Result<Vec<CompilationUnit>, Box<dyn std::error::Error>> {
        Ok(self.lower())
    }
}

/// Items of one module, file or inline.
struct Module<'f> {
    krate: &'f str,
    package: String,
    path: &'f str,
    /// Local name to full path, from `use` items.
    imports: HashMap<String, Vec<String>>,
    items: Vec<&'f syn::Item>,
}

fn push_module<'f>(
    krate: &'f str,
    path: &'f str,
    package: String,
    items: &'f [syn::Item],
    out: &mut Vec<Module<'f>>,
) {
    let mut module = Module {
        krate,
        package: package.clone(),
        path,
        imports: HashMap::new(),
        items: Vec::new(),
    };
    for item in items {
        match item {
            syn::Item::Use(u) if !has_test_attr(&u.attrs) => {
                collect_imports(&u.tree, Vec::new(), &mut module.imports)
            }
            syn::Item::Mod(m) if !has_test_attr(&m.attrs) => {
                if let Some((_, inner)) = &m.content {
                    push_module(krate, path, format!("{}.{}", package, m.ident), inner, out);
                }
            }
            syn::Item::Struct(s) if !has_test_attr(&s.attrs) => module.items.push(item),
            syn::Item::Enum(e) if !has_test_attr(&e.attrs) => module.items.push(item),
            syn::Item::Trait(t) if !has_test_attr(&t.attrs) => module.items.push(item),
            syn::Item::Impl(i) if !has_test_attr(&i.attrs) => module.items.push(item),
            _ => {}
        }
    }
    out.push(module);
}

fn collect_imports(tree: &syn::UseTree, prefix: Vec<String>, map: &mut HashMap<String, Vec<String>>) {
    match tree {
        syn::UseTree::Path(p) => {
            let mut next = prefix;
            next.push(p.ident.to_string());
            collect_imports(&p.tree, next, map);
        }
        syn::UseTree::Name(n) => {
            let ident = n.ident.to_string();
            if ident == "self" {
                if let Some(last) = prefix.last() {
                    map.insert(last.clone(), prefix.clone());
                }
            } else {
                let mut full = prefix;
                full.push(ident.clone());
                map.insert(ident, full);
            }
        }
        syn::UseTree::Rename(r) => {
            let mut full = prefix;
            full.push(r.ident.to_string());
            map.insert(r.rename.to_string(), full);
        }
        syn::UseTree::Group(g) => {
            for t in &g.items {
                collect_imports(t, prefix.clone(), map);
            }
        }
        syn::UseTree::Glob(_) => {}
    }
}

#[derive(Debug, Clone)]
struct MethodSig {
    name: String,
    arity: usize,
    constructor: bool,
    returns: Option<ClassRef>,
}

/// Everything declared in the analyzed crates.
#[derive(Default)]
struct Index {
    crates: BTreeSet<String>,
    packages: BTreeSet<String>,
    kinds: BTreeMap<String, TypeKind>,
    by_simple: HashMap<String, Vec<String>>,
    methods: HashMap<String, Vec<MethodSig>>,
    fields: HashMap<String, HashMap<String, Option<ClassRef>>>,
    traits: HashMap<String, Vec<String>>,
}

impl Index {
    fn build(crates: &[RustCrate], modules: &[Module<'_>]) -> Self {
        let mut index = Index {
            crates: crates.iter().map(|c| c.name.clone()).collect(),
            ..Index::default()
        };
        for m in modules {
            let mut pkg = m.package.as_str();
            index.packages.insert(pkg.to_string());
            while let Some((parent, _)) = pkg.rsplit_once('.') {
                index.packages.insert(parent.to_string());
                pkg = parent;
            }
            for item in &m.items {
                let (ident, kind) = match item {
                    syn::Item::Struct(s) => (&s.ident, TypeKind::Class),
                    syn::Item::Enum(e) => (&e.ident, TypeKind::Enum),
                    syn::Item::Trait(t) => (&t.ident, TypeKind::Interface),
                    _ => continue,
                };
                let q = format!("{}.{}", m.package, ident);
                index.kinds.insert(q.clone(), kind);
                index
                    .by_simple
                    .entry(ident.to_string())
                    .or_default()
                    .push(q);
            }
        }

        let mut methods: HashMap<String, Vec<MethodSig>> = HashMap::new();
        let mut fields: HashMap<String, HashMap<String, Option<ClassRef>>> = HashMap::new();
        let mut traits: HashMap<String, Vec<String>> = HashMap::new();
        for m in modules {
            let base = Scope::new(&index, m);
            for item in &m.items {
                match item {
                    syn::Item::Struct(s) => {
                        let q = format!("{}.{}", m.package, s.ident);
                        let scope = base.with_current(&q).with_generics(&s.generics);
                        let entry = fields.entry(q).or_default();
                        for (i, f) in s.fields.iter().enumerate() {
                            let name = field_name(f, i);
                            entry.insert(name, value_class(&scope.lower_type(&f.ty)));
                        }
                    }
                    syn::Item::Trait(t) => {
                        let q = format!("{}.{}", m.package, t.ident);
                        let scope = base.with_current(&q).with_generics(&t.generics);
                        let sigs = methods.entry(q).or_default();
                        for ti in &t.items {
                            if let syn::TraitItem::Fn(f) = ti {
                                sigs.push(scope.signature(&f.sig));
                            }
                        }
                    }
                    syn::Item::Impl(imp) => {
                        let scope = base.with_generics(&imp.generics);
                        let Some(target) = scope.impl_target(&imp.self_ty) else {
                            continue;
                        };
                        let scope = scope.with_current(&target);
                        if let Some((_, path, _)) = &imp.trait_ {
                            if let Some(t) = scope.lower_path(path).resolved_class() {
                                if t.is_source() {
                                    traits
                                        .entry(target.clone())
                                        .or_default()
                                        .push(t.qualified_name.clone());
                                }
                            }
                        }
                        let sigs = methods.entry(target).or_default();
                        for ii in &imp.items {
                            if let syn::ImplItem::Fn(f) = ii {
                                if !has_test_attr(&f.attrs) {
                                    sigs.push(scope.signature(&f.sig));
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        index.methods = methods;
        index.fields = fields;
        index.traits = traits;
        index
    }

    /// Method `name` of `owner` or of a trait it implements, with the
    /// class actually declaring it.
    fn find_method(&self, owner: &str, name: &str) -> Option<(String, &MethodSig)> {
        if let Some(sig) = self
            .methods
            .get(owner)
            .and_then(|sigs| sigs.iter().find(|s| s.name == name))
        {
            return Some((owner.to_string(), sig));
        }
        for t in self.traits.get(owner).into_iter().flatten() {
            if let Some(sig) = self
                .methods
                .get(t)
                .and_then(|sigs| sigs.iter().find(|s| s.name == name))
            {
                return Some((t.clone(), sig));
            }
        }
        None
    }

    fn field_class(&self, owner: &str, name: &str) -> Option<ClassRef> {
        self.fields.get(owner)?.get(name)?.clone()
    }

    fn has_field(&self, owner: &str, name: &str) -> bool {
        self.fields
            .get(owner)
            .is_some_and(|f| f.contains_key(name))
    }
}

fn field_name(field: &syn::Field, position: usize) -> String {
    field
        .ident
        .as_ref()
        .map(|i| i.to_string())
        .unwrap_or_else(|| position.to_string())
}

fn member_name(member: &syn::Member) -> String {
    match member {
        syn::Member::Named(i) => i.to_string(),
        syn::Member::Unnamed(idx) => idx.index.to_string(),
    }
}

fn pat_name(pat: &syn::Pat) -> Option<String> {
    match pat {
        syn::Pat::Ident(p) => Some(p.ident.to_string()),
        syn::Pat::Type(p) => pat_name(&p.pat),
        syn::Pat::Reference(r) => pat_name(&r.pat),
        _ => None,
    }
}

fn visibility(vis: &syn::Visibility) -> ast::Visibility {
    match vis {
        syn::Visibility::Public(_) => ast::Visibility::Public,
        syn::Visibility::Restricted(_) => ast::Visibility::Package,
        syn::Visibility::Inherited => ast::Visibility::Private,
    }
}

/// Class a value of type `ty` dispatches on, looking through wrappers.
fn value_class(ty: &TypeRef) -> Option<ClassRef> {
    match ty {
        TypeRef::Class {
            target: Some(t),
            args,
        } => {
            let simple = t.qualified_name.rsplit('.').next().unwrap_or_default();
            if !t.is_source() && WRAPPERS.contains(&simple) {
                args.first().and_then(value_class)
            } else {
                Some(t.clone())
            }
        }
        _ => None,
    }
}

/// Name resolution context of one module, optionally inside a type.
#[derive(Clone)]
struct Scope<'a> {
    index: &'a Index,
    krate: &'a str,
    package: &'a str,
    imports: &'a HashMap<String, Vec<String>>,
    current: Option<String>,
    generics: BTreeSet<String>,
}

impl<'a> Scope<'a> {
    fn new(index: &'a Index, module: &'a Module<'a>) -> Self {
        Self {
            index,
            krate: module.krate,
            package: &module.package,
            imports: &module.imports,
            current: None,
            generics: BTreeSet::new(),
        }
    }

    fn with_current(&self, current: &str) -> Self {
        let mut s = self.clone();
        s.current = Some(current.to_string());
        s
    }

    fn with_generics(&self, generics: &syn::Generics) -> Self {
        let mut s = self.clone();
        s.generics
            .extend(generics.type_params().map(|p| p.ident.to_string()));
        s
    }

    /// Package named by a path prefix, if it is a known module path.
    fn package_of(&self, prefix: &[String]) -> Option<String> {
        let (first, rest) = prefix.split_first()?;
        let mut base: Vec<&str> = match first.as_str() {
            "crate" => vec![self.krate],
            "self" => self.package.split('.').collect(),
            "super" => {
                let mut p: Vec<&str> = self.package.split('.').collect();
                if p.len() > 1 {
                    p.pop();
                }
                p
            }
            name if self.index.crates.contains(name) => vec![name],
            _ => {
                let relative = format!("{}.{}", self.package, prefix.join("."));
                return self.index.packages.contains(&relative).then_some(relative);
            }
        };
        for seg in rest {
            if seg == "super" {
                if base.len() > 1 {
                    base.pop();
                }
            } else {
                base.push(seg);
            }
        }
        Some(base.join("."))
    }

    /// Among declared types named `name`, the one this scope means.
    fn pick(&self, name: &str, krate: Option<&str>) -> Option<String> {
        let candidates: Vec<&String> = self
            .index
            .by_simple
            .get(name)?
            .iter()
            .filter(|q| krate.map_or(true, |k| q.starts_with(&format!("{}.", k))))
            .collect();
        let local = format!("{}.{}", self.package, name);
        if let Some(q) = candidates.iter().find(|q| ***q == local) {
            return Some((*q).clone());
        }
        let own_crate = format!("{}.", self.krate);
        let in_crate: Vec<&&String> = candidates
            .iter()
            .filter(|q| q.starts_with(&own_crate))
            .collect();
        match (in_crate.as_slice(), candidates.as_slice()) {
            ([one], _) => Some((**one).clone()),
            ([], [one]) => Some((*one).clone()),
            _ => None,
        }
    }

    /// Resolve a type path. Unknown paths are library types; ambiguous
    /// ones are unresolved.
    fn resolve(&self, segments: &[String]) -> Option<ClassRef> {
        let first = segments.first()?;
        if segments.len() == 1 && first == "Self" {
            return self.current.clone().map(ClassRef::source);
        }
        let segs: Vec<String> = match self.imports.get(first) {
            Some(full) => full.iter().chain(segments[1..].iter()).cloned().collect(),
            None => segments.to_vec(),
        };
        let (name, prefix) = segs.split_last()?;
        if prefix.is_empty() && PRIMITIVES.contains(&name.as_str()) {
            return None;
        }
        let package = self.package_of(prefix);
        if let Some(pkg) = &package {
            let q = format!("{}.{}", pkg, name);
            if self.index.kinds.contains_key(&q) {
                return Some(ClassRef::source(q));
            }
        }
        let external = !prefix.is_empty() && package.is_none();
        if !external && self.index.by_simple.contains_key(name) {
            let krate = package
                .as_deref()
                .and_then(|p| p.split('.').next());
            return self.pick(name, krate).map(ClassRef::source);
        }
        Some(ClassRef::library(segs.join(".")))
    }

    /// Resolve a path used as a value prefix (`T::f`, `T::CONST`). Library
    /// results must look like a type name.
    fn resolve_value_type(&self, segments: &[String]) -> Option<ClassRef> {
        let resolved = self.resolve(segments)?;
        if resolved.is_source() {
            return Some(resolved);
        }
        let last = resolved.qualified_name.rsplit('.').next().unwrap_or_default();
        last.chars()
            .next()
            .is_some_and(char::is_uppercase)
            .then_some(resolved)
    }

    fn impl_target(&self, ty: &syn::Type) -> Option<String> {
        match ty {
            syn::Type::Path(p) if p.qself.is_none() => self
                .resolve(&path_idents(&p.path))
                .filter(ClassRef::is_source)
                .map(|c| c.qualified_name),
            syn::Type::Reference(r) => self.impl_target(&r.elem),
            syn::Type::Paren(p) => self.impl_target(&p.elem),
            syn::Type::Group(g) => self.impl_target(&g.elem),
            _ => None,
        }
    }

    fn lower_type(&self, ty: &syn::Type) -> TypeRef {
        match ty {
            syn::Type::Path(p) if p.qself.is_none() => self.lower_path(&p.path),
            syn::Type::Reference(r) => self.lower_type(&r.elem),
            syn::Type::Paren(p) => self.lower_type(&p.elem),
            syn::Type::Group(g) => self.lower_type(&g.elem),
            syn::Type::Ptr(p) => self.lower_type(&p.elem),
            syn::Type::Slice(s) => TypeRef::array(self.lower_type(&s.elem)),
            syn::Type::Array(a) => TypeRef::array(self.lower_type(&a.elem)),
            syn::Type::Tuple(t) if t.elems.is_empty() => TypeRef::primitive("()"),
            syn::Type::Tuple(t) => TypeRef::Class {
                target: None,
                args: t.elems.iter().map(|e| self.lower_type(e)).collect(),
            },
            syn::Type::ImplTrait(it) => self.first_bound(&it.bounds),
            syn::Type::TraitObject(o) => self.first_bound(&o.bounds),
            _ => TypeRef::unresolved(),
        }
    }

    fn first_bound<'b>(
        &self,
        bounds: impl IntoIterator<Item = &'b syn::TypeParamBound>,
    ) -> TypeRef {
        self.bounds(bounds)
            .into_iter()
            .next()
            .unwrap_or_else(TypeRef::unresolved)
    }

    fn bounds<'b>(&self, bounds: impl IntoIterator<Item = &'b syn::TypeParamBound>) -> Vec<TypeRef> {
        bounds
            .into_iter()
            .filter_map(|b| match b {
                syn::TypeParamBound::Trait(t) => Some(self.lower_path(&t.path)),
                _ => None,
            })
            .collect()
    }

    fn lower_path(&self, path: &syn::Path) -> TypeRef {
        let segs = path_idents(path);
        if let [only] = segs.as_slice() {
            if self.generics.contains(only) {
                return TypeRef::TypeParameter {
                    name: only.clone(),
                    bounds: Vec::new(),
                };
            }
            if PRIMITIVES.contains(&only.as_str()) {
                return TypeRef::primitive(only.clone());
            }
        }
        let mut args = Vec::new();
        for seg in &path.segments {
            match &seg.arguments {
                syn::PathArguments::AngleBracketed(a) => {
                    for arg in &a.args {
                        match arg {
                            syn::GenericArgument::Type(t) => args.push(self.lower_type(t)),
                            syn::GenericArgument::AssocType(at) => {
                                args.push(self.lower_type(&at.ty))
                            }
                            _ => {}
                        }
                    }
                }
                syn::PathArguments::Parenthesized(p) => {
                    args.extend(p.inputs.iter().map(|t| self.lower_type(t)));
                    if let syn::ReturnType::Type(_, t) = &p.output {
                        args.push(self.lower_type(t));
                    }
                }
                syn::PathArguments::None => {}
            }
        }
        TypeRef::Class {
            target: self.resolve(&segs),
            args,
        }
    }

    fn type_params(&self, generics: &syn::Generics) -> Vec<TypeParam> {
        generics
            .type_params()
            .map(|p| TypeParam {
                name: p.ident.to_string(),
                bounds: self.bounds(&p.bounds),
            })
            .collect()
    }

    fn signature(&self, sig: &syn::Signature) -> MethodSig {
        let scope = self.with_generics(&sig.generics);
        let has_receiver = sig.receiver().is_some();
        let returned = match &sig.output {
            syn::ReturnType::Type(_, t) => Some(scope.lower_type(t)),
            syn::ReturnType::Default => None,
        };
        let returns_self = match (&returned, &self.current) {
            (Some(TypeRef::Class { target: Some(t), .. }), Some(current)) => {
                t.qualified_name == *current
            }
            _ => false,
        };
        MethodSig {
            name: sig.ident.to_string(),
            arity: sig.inputs.len() - usize::from(has_receiver),
            constructor: !has_receiver && returns_self,
            returns: returned.as_ref().and_then(value_class),
        }
    }

    fn method_ref(&self, owner: &ClassRef, name: &str, argc: usize) -> Option<MethodRef> {
        if owner.is_source() {
            self.index
                .find_method(&owner.qualified_name, name)
                .map(|(o, sig)| MethodRef::new(ClassRef::source(o), name, sig.arity))
        } else {
            Some(MethodRef::new(owner.clone(), name, argc))
        }
    }

    /// Lower a function. Declarations without a body are abstract.
    fn lower_fn(
        &self,
        sig: &syn::Signature,
        vis: ast::Visibility,
        block: Option<&syn::Block>,
    ) -> MethodDecl {
        let scope = self.with_generics(&sig.generics);
        let signature = self.signature(sig);
        let mut locals = HashMap::new();
        let mut params = Vec::new();
        for input in &sig.inputs {
            if let syn::FnArg::Typed(pt) = input {
                let name = pat_name(&pt.pat).unwrap_or_else(|| "_".to_string());
                let ty = scope.lower_type(&pt.ty);
                if let Some(c) = value_class(&ty) {
                    locals.insert(name.clone(), c);
                }
                params.push(Param { name, ty });
            }
        }
        let mut modifiers = Modifiers {
            visibility: vis,
            ..Modifiers::default()
        };
        modifiers.is_static = sig.receiver().is_none() && !signature.constructor;
        modifiers.is_abstract = block.is_none();
        let body = match block {
            Some(b) => {
                let mut lowering = BodyLowering {
                    scope: &scope,
                    locals,
                    out: Vec::new(),
                };
                lowering.visit_block(b);
                lowering.out
            }
            None => Vec::new(),
        };
        MethodDecl {
            name: signature.name,
            is_constructor: signature.constructor,
            modifiers,
            type_params: scope.type_params(&sig.generics),
            params,
            return_type: match &sig.output {
                syn::ReturnType::Type(_, t) => Some(scope.lower_type(t)),
                syn::ReturnType::Default => None,
            },
            throws: Vec::new(),
            body,
        }
    }
}

/// Turns a function body into declaration nodes.
struct BodyLowering<'s, 'a> {
    scope: &'s Scope<'a>,
    locals: HashMap<String, ClassRef>,
    out: Vec<Node>,
}

impl BodyLowering<'_, '_> {
    /// Static type of an expression when it can be told locally.
    fn infer(&self, expr: &syn::Expr) -> Option<ClassRef> {
        match expr {
            syn::Expr::Path(p) if p.qself.is_none() => match path_idents(&p.path).as_slice() {
                [one] if one == "self" => self.scope.current.clone().map(ClassRef::source),
                [one] => self.locals.get(one).cloned(),
                _ => None,
            },
            syn::Expr::Paren(e) => self.infer(&e.expr),
            syn::Expr::Reference(r) => self.infer(&r.expr),
            syn::Expr::Group(g) => self.infer(&g.expr),
            syn::Expr::Try(t) => self.infer(&t.expr),
            syn::Expr::Field(f) => {
                let base = self.infer(&f.base)?;
                self.scope
                    .index
                    .field_class(&base.qualified_name, &member_name(&f.member))
            }
            syn::Expr::MethodCall(mc) => {
                let receiver = self.infer(&mc.receiver)?;
                let (_, sig) = self
                    .scope
                    .index
                    .find_method(&receiver.qualified_name, &mc.method.to_string())?;
                sig.returns.clone()
            }
            syn::Expr::Call(call) => {
                let syn::Expr::Path(p) = &*call.func else {
                    return None;
                };
                let segs = path_idents(&p.path);
                let (name, prefix) = segs.split_last()?;
                if prefix.is_empty() {
                    return self.scope.resolve(&segs).filter(ClassRef::is_source);
                }
                let owner = self.scope.resolve_value_type(prefix)?;
                if !owner.is_source() {
                    return matches!(name.as_str(), "new" | "default" | "from").then_some(owner);
                }
                let (_, sig) = self.scope.index.find_method(&owner.qualified_name, name)?;
                if sig.constructor {
                    Some(owner)
                } else {
                    sig.returns.clone()
                }
            }
            syn::Expr::Struct(s) if s.qself.is_none() => self
                .scope
                .resolve(&path_idents(&s.path))
                .filter(ClassRef::is_source),
            _ => None,
        }
    }

    fn lower_path_call(&mut self, path: &syn::Path, argc: usize) {
        let segs = path_idents(path);
        let Some((name, prefix)) = segs.split_last() else {
            return;
        };
        if prefix.is_empty() {
            if let Some(class) = self
                .scope
                .resolve_value_type(&segs)
                .filter(ClassRef::is_source)
            {
                self.out.push(Node::new_object(TypeRef::class(class), None));
            }
            return;
        }
        let Some(owner) = self.scope.resolve_value_type(prefix) else {
            return;
        };
        if !owner.is_source() {
            self.out.push(Node::call(MethodRef::new(owner, name.clone(), argc)));
            return;
        }
        let node = match self.scope.index.find_method(&owner.qualified_name, name) {
            Some((declaring, sig)) => {
                let target = MethodRef::new(ClassRef::source(declaring), name.clone(), sig.arity);
                if sig.constructor {
                    Node::new_object(TypeRef::class(owner), Some(target))
                } else {
                    Node::call(target)
                }
            }
            None => Node::TypeReference(TypeUse {
                ty: TypeRef::class(owner),
            }),
        };
        self.out.push(node);
    }

    fn lower_macro(&mut self, mac: &syn::Macro) {
        let parsed =
            mac.parse_body_with(Punctuated::<syn::Expr, syn::Token![,]>::parse_terminated);
        if let Ok(args) = parsed {
            for e in &args {
                SynVisit::visit_expr(self, e);
            }
        }
    }
}

impl<'ast> SynVisit<'ast> for BodyLowering<'_, '_> {
    fn visit_local(&mut self, local: &'ast syn::Local) {
        let inferred = local.init.as_ref().and_then(|i| self.infer(&i.expr));
        match &local.pat {
            syn::Pat::Type(pt) => {
                if let Some(name) = pat_name(&pt.pat) {
                    let ty = self.scope.lower_type(&pt.ty);
                    if let Some(c) = value_class(&ty) {
                        self.locals.insert(name.clone(), c);
                    }
                    self.out.push(Node::LocalVariable(LocalVariable {
                        name,
                        ty,
                        init: None,
                    }));
                }
            }
            syn::Pat::Ident(id) => {
                if let Some(c) = inferred {
                    self.locals.insert(id.ident.to_string(), c);
                }
            }
            _ => {}
        }
        if let Some(init) = &local.init {
            self.visit_expr(&init.expr);
            if let Some((_, diverge)) = &init.diverge {
                self.visit_expr(diverge);
            }
        }
    }

    fn visit_expr_method_call(&mut self, mc: &'ast syn::ExprMethodCall) {
        let name = mc.method.to_string();
        let target = self
            .infer(&mc.receiver)
            .and_then(|owner| self.scope.method_ref(&owner, &name, mc.args.len()));
        let type_args = mc
            .turbofish
            .iter()
            .flat_map(|t| t.args.iter())
            .filter_map(|a| match a {
                syn::GenericArgument::Type(t) => Some(self.scope.lower_type(t)),
                _ => None,
            })
            .collect();
        self.out.push(Node::Call(CallExpr {
            target,
            receiver: None,
            type_args,
            args: Vec::new(),
        }));
        self.visit_expr(&mc.receiver);
        for a in &mc.args {
            self.visit_expr(a);
        }
    }

    fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
        match &*call.func {
            syn::Expr::Path(p) if p.qself.is_none() => {
                self.lower_path_call(&p.path, call.args.len());
                for a in &call.args {
                    self.visit_expr(a);
                }
            }
            _ => syn::visit::visit_expr_call(self, call),
        }
    }

    fn visit_expr_struct(&mut self, s: &'ast syn::ExprStruct) {
        if s.qself.is_none() {
            let segs = path_idents(&s.path);
            let class = self
                .scope
                .resolve(&segs)
                .filter(ClassRef::is_source)
                .or_else(|| {
                    let (_, prefix) = segs.split_last()?;
                    self.scope
                        .resolve_value_type(prefix)
                        .filter(ClassRef::is_source)
                });
            if let Some(class) = class {
                self.out.push(Node::New(NewExpr {
                    ty: TypeRef::class(class),
                    constructor: None,
                    args: Vec::new(),
                    body: None,
                }));
            }
        }
        for f in &s.fields {
            self.visit_expr(&f.expr);
        }
        if let Some(rest) = &s.rest {
            self.visit_expr(rest);
        }
    }

    fn visit_expr_field(&mut self, f: &'ast syn::ExprField) {
        let name = member_name(&f.member);
        if let Some(base) = self.infer(&f.base).filter(ClassRef::is_source) {
            if self.scope.index.has_field(&base.qualified_name, &name) {
                self.out
                    .push(Node::field_access(ast::FieldRef::new(base, name)));
            }
        }
        self.visit_expr(&f.base);
    }

    fn visit_expr_cast(&mut self, c: &'ast syn::ExprCast) {
        self.out.push(Node::Cast(TypeCheck {
            operand: Box::new(Node::block(Vec::new())),
            ty: self.scope.lower_type(&c.ty),
        }));
        self.visit_expr(&c.expr);
    }

    fn visit_expr_closure(&mut self, c: &'ast syn::ExprClosure) {
        let saved = std::mem::take(&mut self.out);
        let mut params = Vec::new();
        for input in &c.inputs {
            if let syn::Pat::Type(pt) = input {
                if let Some(name) = pat_name(&pt.pat) {
                    let ty = self.scope.lower_type(&pt.ty);
                    if let Some(cls) = value_class(&ty) {
                        self.locals.insert(name.clone(), cls);
                    }
                    params.push(Param { name, ty });
                }
            }
        }
        self.visit_expr(&c.body);
        let body = std::mem::replace(&mut self.out, saved);
        self.out.push(Node::Lambda(LambdaExpr {
            functional_interface: None,
            params,
            body,
        }));
    }

    fn visit_expr_path(&mut self, p: &'ast syn::ExprPath) {
        if p.qself.is_some() {
            return;
        }
        let segs = path_idents(&p.path);
        let class = match segs.split_last() {
            Some((_, prefix)) if !prefix.is_empty() => self.scope.resolve_value_type(prefix),
            Some((only, _)) if !self.locals.contains_key(only) && only != "self" => {
                self.scope.resolve_value_type(&segs)
            }
            _ => None,
        };
        if let Some(class) = class.filter(ClassRef::is_source) {
            self.out.push(Node::TypeReference(TypeUse {
                ty: TypeRef::class(class),
            }));
        }
    }

    fn visit_expr_macro(&mut self, m: &'ast syn::ExprMacro) {
        self.lower_macro(&m.mac);
    }

    fn visit_stmt_macro(&mut self, m: &'ast syn::StmtMacro) {
        self.lower_macro(&m.mac);
    }

    // nested items are not part of the enclosing body
    fn visit_item(&mut self, _item: &'ast syn::Item) {}
}

fn lower_module(index: &Index, module: &Module<'_>) -> CompilationUnit {
    let mut unit = CompilationUnit::new(module.path, Some(module.package.as_str()));
    let base = Scope::new(index, module);
    for item in &module.items {
        let decl = match item {
            syn::Item::Struct(s) => {
                let q = format!("{}.{}", module.package, s.ident);
                let scope = base.with_current(&q).with_generics(&s.generics);
                let mut decl = TypeDecl::new(TypeKind::Class, q.as_str());
                decl.modifiers = Modifiers {
                    visibility: visibility(&s.vis),
                    ..Modifiers::default()
                }
                .with_final();
                decl.type_params = scope.type_params(&s.generics);
                for (i, f) in s.fields.iter().enumerate() {
                    decl.fields.push(
                        FieldDecl::new(field_name(f, i), scope.lower_type(&f.ty)).with_modifiers(
                            Modifiers {
                                visibility: visibility(&f.vis),
                                ..Modifiers::default()
                            },
                        ),
                    );
                }
                decl
            }
            syn::Item::Enum(e) => {
                let q = format!("{}.{}", module.package, e.ident);
                let scope = base.with_current(&q).with_generics(&e.generics);
                let mut decl = TypeDecl::new(TypeKind::Enum, q.as_str());
                decl.modifiers = Modifiers {
                    visibility: visibility(&e.vis),
                    ..Modifiers::default()
                }
                .with_final();
                decl.type_params = scope.type_params(&e.generics);
                for v in &e.variants {
                    for f in &v.fields {
                        decl.initializers.push(Node::TypeReference(TypeUse {
                            ty: scope.lower_type(&f.ty),
                        }));
                    }
                }
                decl
            }
            syn::Item::Trait(t) => {
                let q = format!("{}.{}", module.package, t.ident);
                let scope = base.with_current(&q).with_generics(&t.generics);
                let mut decl = TypeDecl::new(TypeKind::Interface, q.as_str());
                decl.modifiers = Modifiers {
                    visibility: visibility(&t.vis),
                    ..Modifiers::default()
                }
                .with_abstract();
                decl.type_params = scope.type_params(&t.generics);
                decl.interfaces = scope.bounds(&t.supertraits);
                for ti in &t.items {
                    if let syn::TraitItem::Fn(f) = ti {
                        decl.methods.push(scope.lower_fn(
                            &f.sig,
                            ast::Visibility::Public,
                            f.default.as_ref(),
                        ));
                    }
                }
                decl
            }
            _ => continue,
        };
        unit.types.push(decl);
    }
    unit
}

/// Attach the methods and implemented traits of every `impl` block to the
/// declaration of its self type.
fn attach_impls(index: &Index, modules: &[Module<'_>], units: &mut [CompilationUnit]) {
    let mut methods: HashMap<String, Vec<MethodDecl>> = HashMap::new();
    let mut interfaces: HashMap<String, Vec<TypeRef>> = HashMap::new();
    for module in modules {
        let base = Scope::new(index, module);
        for item in &module.items {
            let syn::Item::Impl(imp) = item else {
                continue;
            };
            let scope = base.with_generics(&imp.generics);
            let Some(target) = scope.impl_target(&imp.self_ty) else {
                continue;
            };
            let scope = scope.with_current(&target);
            let trait_impl = imp.trait_.is_some();
            if let Some((_, path, _)) = &imp.trait_ {
                interfaces
                    .entry(target.clone())
                    .or_default()
                    .push(scope.lower_path(path));
            }
            for ii in &imp.items {
                let syn::ImplItem::Fn(f) = ii else {
                    continue;
                };
                if has_test_attr(&f.attrs) {
                    continue;
                }
                let vis = if trait_impl {
                    ast::Visibility::Public
                } else {
                    visibility(&f.vis)
                };
                methods
                    .entry(target.clone())
                    .or_default()
                    .push(scope.lower_fn(&f.sig, vis, Some(&f.block)));
            }
        }
    }
    for unit in units.iter_mut() {
        for decl in unit.types.iter_mut() {
            if let Some(ms) = methods.remove(&decl.qualified_name) {
                decl.methods.extend(ms);
            }
            if let Some(is) = interfaces.remove(&decl.qualified_name) {
                decl.interfaces.extend(is);
            }
        }
    }
}
