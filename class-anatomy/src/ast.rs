//! Declaration AST handed over by a declaration provider.
//!
//! Providers resolve names before producing these trees: every reference
//! carries the qualified name of its target and where the target comes from.
//! A reference that could not be resolved is `None` and is skipped by every
//! calculator.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    #[default]
    Package,
    Private,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

impl Modifiers {
    pub fn public() -> Self {
        Self {
            visibility: Visibility::Public,
            ..Self::default()
        }
    }

    pub fn private() -> Self {
        Self {
            visibility: Visibility::Private,
            ..Self::default()
        }
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn with_final(mut self) -> Self {
        self.is_final = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Enum,
    Annotation,
    Anonymous,
    Local,
    TypeParameter,
}

/// Where a referenced class is declared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Source,
    Library,
    Anonymous,
    TypeParameter,
}

/// Resolved reference to a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassRef {
    pub qualified_name: String,
    #[serde(default)]
    pub origin: Origin,
}

impl ClassRef {
    pub fn source(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            origin: Origin::Source,
        }
    }

    pub fn library(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            origin: Origin::Library,
        }
    }

    pub fn is_source(&self) -> bool {
        self.origin == Origin::Source
    }
}

/// Resolved reference to a method. `arity` disambiguates overloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef {
    pub owner: ClassRef,
    pub name: String,
    #[serde(default)]
    pub arity: usize,
}

impl MethodRef {
    pub fn new(owner: ClassRef, name: impl Into<String>, arity: usize) -> Self {
        Self {
            owner,
            name: name.into(),
            arity,
        }
    }

    /// Identity of the target independent of how the owner was reached.
    pub fn key(&self) -> (String, String, usize) {
        (
            self.owner.qualified_name.clone(),
            self.name.clone(),
            self.arity,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    pub owner: ClassRef,
    pub name: String,
}

impl FieldRef {
    pub fn new(owner: ClassRef, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeRef {
    Class {
        #[serde(default)]
        target: Option<ClassRef>,
        #[serde(default)]
        args: Vec<TypeRef>,
    },
    Array {
        component: Box<TypeRef>,
    },
    Wildcard {
        #[serde(default)]
        bound: Option<Box<TypeRef>>,
    },
    Primitive {
        name: String,
    },
    TypeParameter {
        name: String,
        #[serde(default)]
        bounds: Vec<TypeRef>,
    },
}

impl TypeRef {
    pub fn class(target: ClassRef) -> Self {
        TypeRef::Class {
            target: Some(target),
            args: Vec::new(),
        }
    }

    pub fn generic(target: ClassRef, args: Vec<TypeRef>) -> Self {
        TypeRef::Class {
            target: Some(target),
            args,
        }
    }

    pub fn unresolved() -> Self {
        TypeRef::Class {
            target: None,
            args: Vec::new(),
        }
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        TypeRef::Primitive { name: name.into() }
    }

    pub fn array(component: TypeRef) -> Self {
        TypeRef::Array {
            component: Box::new(component),
        }
    }

    /// Innermost element type of a (possibly nested) array.
    pub fn deep_component(&self) -> &TypeRef {
        match self {
            TypeRef::Array { component } => component.deep_component(),
            other => other,
        }
    }

    /// Class named by the deep component, if resolved.
    pub fn resolved_class(&self) -> Option<&ClassRef> {
        match self.deep_component() {
            TypeRef::Class { target, .. } => target.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    #[serde(default)]
    pub bounds: Vec<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    #[serde(default)]
    pub target: Option<MethodRef>,
    #[serde(default)]
    pub receiver: Option<Box<Node>>,
    #[serde(default)]
    pub type_args: Vec<TypeRef>,
    #[serde(default)]
    pub args: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAccessExpr {
    #[serde(default)]
    pub target: Option<FieldRef>,
    #[serde(default)]
    pub qualifier: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeUse {
    pub ty: TypeRef,
}

/// Object creation, optionally with an anonymous class body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpr {
    pub ty: TypeRef,
    #[serde(default)]
    pub constructor: Option<MethodRef>,
    #[serde(default)]
    pub args: Vec<Node>,
    #[serde(default)]
    pub body: Option<Box<TypeDecl>>,
}

/// `instanceof` checks and casts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCheck {
    pub operand: Box<Node>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaExpr {
    #[serde(default)]
    pub functional_interface: Option<TypeRef>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVariable {
    pub name: String,
    pub ty: TypeRef,
    #[serde(default)]
    pub init: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// Body element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Call(CallExpr),
    FieldAccess(FieldAccessExpr),
    TypeReference(TypeUse),
    New(NewExpr),
    InstanceOf(TypeCheck),
    Cast(TypeCheck),
    Lambda(LambdaExpr),
    LocalVariable(LocalVariable),
    LocalClass(Box<TypeDecl>),
    Block(Block),
}

impl Node {
    pub fn call(target: MethodRef) -> Self {
        Node::Call(CallExpr {
            target: Some(target),
            receiver: None,
            type_args: Vec::new(),
            args: Vec::new(),
        })
    }

    pub fn field_access(target: FieldRef) -> Self {
        Node::FieldAccess(FieldAccessExpr {
            target: Some(target),
            qualifier: None,
        })
    }

    pub fn new_object(ty: TypeRef, constructor: Option<MethodRef>) -> Self {
        Node::New(NewExpr {
            ty,
            constructor,
            args: Vec::new(),
            body: None,
        })
    }

    pub fn block(nodes: Vec<Node>) -> Self {
        Node::Block(Block { nodes })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub type_params: Vec<TypeParam>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    #[serde(default)]
    pub throws: Vec<TypeRef>,
    #[serde(default)]
    pub body: Vec<Node>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_constructor: false,
            modifiers: Modifiers::public(),
            type_params: Vec::new(),
            params: Vec::new(),
            return_type: None,
            throws: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn constructor(name: impl Into<String>) -> Self {
        Self {
            is_constructor: true,
            ..Self::new(name)
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn with_body(mut self, body: Vec<Node>) -> Self {
        self.body = body;
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub initializer: Option<Node>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            modifiers: Modifiers::private(),
            initializer: None,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    /// Fully qualified, dot separated. Derived from the package when empty.
    #[serde(default)]
    pub qualified_name: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub superclass: Option<TypeRef>,
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    #[serde(default)]
    pub type_params: Vec<TypeParam>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub initializers: Vec<Node>,
    #[serde(default)]
    pub nested: Vec<TypeDecl>,
}

impl TypeDecl {
    pub fn new(kind: TypeKind, qualified_name: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        let name = qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&qualified_name)
            .to_string();
        Self {
            name,
            qualified_name,
            kind,
            modifiers: Modifiers::public(),
            superclass: None,
            interfaces: Vec::new(),
            type_params: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            initializers: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn class(qualified_name: impl Into<String>) -> Self {
        Self::new(TypeKind::Class, qualified_name)
    }

    pub fn interface(qualified_name: impl Into<String>) -> Self {
        Self::new(TypeKind::Interface, qualified_name)
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn extends(mut self, superclass: ClassRef) -> Self {
        self.superclass = Some(TypeRef::class(superclass));
        self
    }

    pub fn implements(mut self, interface: ClassRef) -> Self {
        self.interfaces.push(TypeRef::class(interface));
        self
    }

    pub fn with_field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_nested(mut self, nested: TypeDecl) -> Self {
        self.nested.push(nested);
        self
    }

    /// Reference to this declaration as seen from other code.
    pub fn class_ref(&self) -> ClassRef {
        let origin = match self.kind {
            TypeKind::Anonymous => Origin::Anonymous,
            TypeKind::TypeParameter => Origin::TypeParameter,
            _ => Origin::Source,
        };
        ClassRef {
            qualified_name: self.qualified_name.clone(),
            origin,
        }
    }
}

/// One source file worth of declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub path: String,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

impl CompilationUnit {
    pub fn new(path: impl Into<String>, package: Option<&str>) -> Self {
        Self {
            path: path.into(),
            package: package.map(str::to_string),
            types: Vec::new(),
        }
    }

    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.push(decl);
        self
    }
}

/// Visitor over declarations. Every method defaults to walking its children,
/// so implementors override only the node kinds they care about.
pub trait Visit {
    fn visit_type_decl(&mut self, decl: &TypeDecl) {
        walk_type_decl(self, decl);
    }

    fn visit_method(&mut self, method: &MethodDecl) {
        walk_method(self, method);
    }

    fn visit_field(&mut self, field: &FieldDecl) {
        walk_field(self, field);
    }

    fn visit_type_param(&mut self, param: &TypeParam) {
        for b in &param.bounds {
            self.visit_type_ref(b);
        }
    }

    fn visit_type_ref(&mut self, ty: &TypeRef) {
        walk_type_ref(self, ty);
    }

    fn visit_node(&mut self, node: &Node) {
        walk_node(self, node);
    }

    fn visit_call(&mut self, call: &CallExpr) {
        walk_call(self, call);
    }

    fn visit_field_access(&mut self, access: &FieldAccessExpr) {
        if let Some(q) = &access.qualifier {
            self.visit_node(q);
        }
    }

    fn visit_new(&mut self, expr: &NewExpr) {
        walk_new(self, expr);
    }

    fn visit_instance_of(&mut self, check: &TypeCheck) {
        self.visit_node(&check.operand);
        self.visit_type_ref(&check.ty);
    }

    fn visit_cast(&mut self, check: &TypeCheck) {
        self.visit_node(&check.operand);
        self.visit_type_ref(&check.ty);
    }

    fn visit_lambda(&mut self, lambda: &LambdaExpr) {
        walk_lambda(self, lambda);
    }

    fn visit_local_variable(&mut self, var: &LocalVariable) {
        self.visit_type_ref(&var.ty);
        if let Some(init) = &var.init {
            self.visit_node(init);
        }
    }

    fn visit_local_class(&mut self, decl: &TypeDecl) {
        self.visit_type_decl(decl);
    }

    fn visit_anonymous_class(&mut self, decl: &TypeDecl) {
        self.visit_type_decl(decl);
    }
}

pub fn walk_type_decl<V: Visit + ?Sized>(v: &mut V, decl: &TypeDecl) {
    if let Some(s) = &decl.superclass {
        v.visit_type_ref(s);
    }
    for i in &decl.interfaces {
        v.visit_type_ref(i);
    }
    for p in &decl.type_params {
        v.visit_type_param(p);
    }
    for f in &decl.fields {
        v.visit_field(f);
    }
    for m in &decl.methods {
        v.visit_method(m);
    }
    for n in &decl.initializers {
        v.visit_node(n);
    }
    for n in &decl.nested {
        v.visit_type_decl(n);
    }
}

pub fn walk_method<V: Visit + ?Sized>(v: &mut V, method: &MethodDecl) {
    for p in &method.type_params {
        v.visit_type_param(p);
    }
    for p in &method.params {
        v.visit_type_ref(&p.ty);
    }
    if let Some(r) = &method.return_type {
        v.visit_type_ref(r);
    }
    for t in &method.throws {
        v.visit_type_ref(t);
    }
    for n in &method.body {
        v.visit_node(n);
    }
}

pub fn walk_field<V: Visit + ?Sized>(v: &mut V, field: &FieldDecl) {
    v.visit_type_ref(&field.ty);
    if let Some(init) = &field.initializer {
        v.visit_node(init);
    }
}

pub fn walk_type_ref<V: Visit + ?Sized>(v: &mut V, ty: &TypeRef) {
    match ty {
        TypeRef::Class { args, .. } => {
            for a in args {
                v.visit_type_ref(a);
            }
        }
        TypeRef::Array { component } => v.visit_type_ref(component),
        TypeRef::Wildcard { bound } => {
            if let Some(b) = bound {
                v.visit_type_ref(b);
            }
        }
        TypeRef::TypeParameter { bounds, .. } => {
            for b in bounds {
                v.visit_type_ref(b);
            }
        }
        TypeRef::Primitive { .. } => {}
    }
}

pub fn walk_node<V: Visit + ?Sized>(v: &mut V, node: &Node) {
    match node {
        Node::Call(c) => v.visit_call(c),
        Node::FieldAccess(f) => v.visit_field_access(f),
        Node::TypeReference(t) => v.visit_type_ref(&t.ty),
        Node::New(n) => v.visit_new(n),
        Node::InstanceOf(c) => v.visit_instance_of(c),
        Node::Cast(c) => v.visit_cast(c),
        Node::Lambda(l) => v.visit_lambda(l),
        Node::LocalVariable(l) => v.visit_local_variable(l),
        Node::LocalClass(d) => v.visit_local_class(d),
        Node::Block(b) => {
            for n in &b.nodes {
                v.visit_node(n);
            }
        }
    }
}

pub fn walk_call<V: Visit + ?Sized>(v: &mut V, call: &CallExpr) {
    if let Some(r) = &call.receiver {
        v.visit_node(r);
    }
    for t in &call.type_args {
        v.visit_type_ref(t);
    }
    for a in &call.args {
        v.visit_node(a);
    }
}

pub fn walk_new<V: Visit + ?Sized>(v: &mut V, expr: &NewExpr) {
    v.visit_type_ref(&expr.ty);
    for a in &expr.args {
        v.visit_node(a);
    }
    if let Some(body) = &expr.body {
        v.visit_anonymous_class(body);
    }
}

pub fn walk_lambda<V: Visit + ?Sized>(v: &mut V, lambda: &LambdaExpr) {
    if let Some(fi) = &lambda.functional_interface {
        v.visit_type_ref(fi);
    }
    for p in &lambda.params {
        v.visit_type_ref(&p.ty);
    }
    for n in &lambda.body {
        v.visit_node(n);
    }
}
