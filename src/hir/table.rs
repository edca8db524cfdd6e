//! Declaration tables: one immutable symbol table per module.
//!
//! [`DeclarationTable::build`] turns a module's ordered declaration records
//! into symbols with declared types. Class members live in per-class member
//! tables. Redefinitions follow textual semantics (the later declaration
//! wins) and every one of them is recorded as a [`Redefinition`].
//!
//! Annotations are resolved against builtin scalar names, the classes of the
//! same module, and names the module imports. Imported names stay name keyed
//! ([`SymbolRef`]) and are checked against the registry when used; anything
//! else becomes [`Type::Unknown`].

use indexmap::IndexMap;
use indexmap::map::Entry;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::{SmolStr, format_smolstr};
use tracing::debug;

use super::decl::{
    ClassDecl, ConstantDecl, Declaration, DeclarationKind, FunctionDecl, ParamDecl, TypeExpr,
};
use super::error::BuildError;
use super::ids::{ModuleName, SymbolRef};
use super::imports::ImportStatement;
use super::types::{FunctionType, ParamType, Type};
use crate::base::TextRange;

// ============================================================================
// SYMBOLS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Class,
    Function,
    Constant,
    Method,
    Attribute,
}

impl SymbolKind {
    pub fn display(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Constant => "constant",
            SymbolKind::Method => "method",
            SymbolKind::Attribute => "attribute",
        }
    }
}

/// A named entity declared in a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: SmolStr,
    pub kind: SymbolKind,
    pub declared_type: Type,
    pub owning_module: ModuleName,
    pub range: TextRange,
}

/// Whether a class member is reachable from the class object or only from
/// instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberBinding {
    Instance,
    Class,
}

/// The receiver of an attribute access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberAccess {
    /// `instance.attr` sees every member.
    Instance,
    /// `Class.attr` sees class-level members only.
    Class,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub symbol: Symbol,
    pub binding: MemberBinding,
}

impl Member {
    fn visible_to(&self, access: MemberAccess) -> bool {
        access == MemberAccess::Instance || self.binding == MemberBinding::Class
    }
}

/// A class with its member table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassInfo {
    pub symbol: SymbolRef,
    /// Bases declared in the same module, in declaration order.
    pub bases: Vec<SymbolRef>,
    pub members: IndexMap<SmolStr, Member>,
}

// ============================================================================
// REDEFINITIONS
// ============================================================================

/// The explicit outcome of inserting a name into a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Fresh,
    /// The name was already declared; the new declaration replaces it.
    Redefined { previous: TextRange },
}

/// A name declared more than once in the same scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redefinition {
    /// `None` for module scope, otherwise the class path.
    pub scope: Option<SmolStr>,
    pub name: SmolStr,
    pub previous: TextRange,
    pub current: TextRange,
}

fn insert_last_wins<T>(
    map: &mut IndexMap<SmolStr, T>,
    name: SmolStr,
    value: T,
    range_of: impl Fn(&T) -> TextRange,
) -> InsertOutcome {
    match map.entry(name) {
        Entry::Occupied(mut entry) => {
            let previous = range_of(entry.get());
            entry.insert(value);
            InsertOutcome::Redefined { previous }
        }
        Entry::Vacant(entry) => {
            entry.insert(value);
            InsertOutcome::Fresh
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// The exported symbols of one module.
///
/// Immutable once built; a reload builds a new table and swaps it into the
/// registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclarationTable {
    module: ModuleName,
    symbols: IndexMap<SmolStr, Symbol>,
    classes: FxHashMap<SmolStr, ClassInfo>,
    redefinitions: Vec<Redefinition>,
}

impl DeclarationTable {
    /// Build a table from a module's declarations.
    ///
    /// Fails on the first malformed record or invalid identifier; no partial
    /// table is produced.
    pub fn build(module: ModuleName, declarations: &[Declaration]) -> Result<Self, BuildError> {
        Self::build_with_imports(module, declarations, &[])
    }

    /// Like [`DeclarationTable::build`], letting annotations name what the
    /// module imports (`from base import Widget` then `-> Widget`).
    pub fn build_with_imports(
        module: ModuleName,
        declarations: &[Declaration],
        imports: &[ImportStatement],
    ) -> Result<Self, BuildError> {
        let mut builder = TableBuilder::new(module);
        builder.collect_imports(imports);
        builder.collect_classes(None, declarations)?;
        builder.add_module_declarations(declarations)?;
        let table = builder.finish();

        debug!(
            module = %table.module,
            symbols = table.symbols.len(),
            classes = table.classes.len(),
            redefinitions = table.redefinitions.len(),
            "built declaration table"
        );
        Ok(table)
    }

    pub fn module(&self) -> &ModuleName {
        &self.module
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Names a star import binds: those not starting with an underscore.
    pub fn public_names(&self) -> impl Iterator<Item = &SmolStr> {
        self.symbols.keys().filter(|name| !name.starts_with('_'))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Look up a class by its dotted path (`Outer.Inner`).
    pub fn class(&self, path: &str) -> Option<&ClassInfo> {
        self.classes.get(path)
    }

    pub fn redefinitions(&self) -> &[Redefinition] {
        &self.redefinitions
    }

    /// Find a member on a class or, depth-first, on its same-module bases.
    pub fn lookup_member(&self, class: &str, name: &str, access: MemberAccess) -> Option<&Member> {
        let mut visited = FxHashSet::default();
        self.lookup_member_inner(class, name, access, &mut visited)
    }

    fn lookup_member_inner<'t>(
        &'t self,
        class: &str,
        name: &str,
        access: MemberAccess,
        visited: &mut FxHashSet<SmolStr>,
    ) -> Option<&'t Member> {
        let info = self.classes.get(class)?;
        if !visited.insert(info.symbol.path.clone()) {
            return None;
        }

        if let Some(member) = info.members.get(name).filter(|m| m.visible_to(access)) {
            return Some(member);
        }

        info.bases
            .iter()
            .find_map(|base| self.lookup_member_inner(&base.path, name, access, visited))
    }

    /// Iterate classes in path order, for deterministic output.
    pub fn classes(&self) -> impl Iterator<Item = &ClassInfo> {
        let mut classes: Vec<_> = self.classes.values().collect();
        classes.sort_by(|a, b| a.symbol.path.cmp(&b.symbol.path));
        classes.into_iter()
    }
}

// ============================================================================
// BUILDER
// ============================================================================

const SCALAR_NAMES: &[&str] = &[
    "int", "str", "bool", "float", "bytes", "complex", "object", "bytearray",
];

const CONTAINER_NAMES: &[&str] = &["list", "dict", "set", "frozenset", "tuple", "type"];

/// Prefixes that do not change what a name means in an annotation.
const TRANSPARENT_MODULES: &[&str] = &[
    "typing.",
    "typing_extensions.",
    "builtins.",
    "collections.abc.",
];

struct TableBuilder {
    module: ModuleName,
    /// Paths of every class that survives last-wins shadowing.
    class_paths: FxHashSet<SmolStr>,
    /// Local names bound by `from M import N [as A]`.
    imported_names: FxHashMap<SmolStr, SymbolRef>,
    /// Local names bound by `import M [as A]`.
    imported_modules: FxHashMap<SmolStr, ModuleName>,
    symbols: IndexMap<SmolStr, Symbol>,
    classes: FxHashMap<SmolStr, ClassInfo>,
    redefinitions: Vec<Redefinition>,
}

impl TableBuilder {
    fn new(module: ModuleName) -> Self {
        Self {
            module,
            class_paths: FxHashSet::default(),
            imported_names: FxHashMap::default(),
            imported_modules: FxHashMap::default(),
            symbols: IndexMap::new(),
            classes: FxHashMap::default(),
            redefinitions: Vec::new(),
        }
    }

    fn finish(self) -> DeclarationTable {
        DeclarationTable {
            module: self.module,
            symbols: self.symbols,
            classes: self.classes,
            redefinitions: self.redefinitions,
        }
    }

    fn path(scope: Option<&str>, name: &str) -> SmolStr {
        match scope {
            Some(scope) => format_smolstr!("{scope}.{name}"),
            None => SmolStr::new(name),
        }
    }

    /// Record what import statements bind. Typing modules are skipped: their
    /// names are handled as annotation syntax, not as classes.
    fn collect_imports(&mut self, imports: &[ImportStatement]) {
        for stmt in imports {
            match stmt {
                ImportStatement::From { module, names, .. } => {
                    if is_transparent_module(module) {
                        continue;
                    }
                    for imported in names {
                        self.imported_names.insert(
                            imported.local_name().clone(),
                            SymbolRef::new(module.clone(), imported.name.clone()),
                        );
                    }
                }
                ImportStatement::Module { module, alias, .. } => {
                    let local = alias
                        .clone()
                        .unwrap_or_else(|| SmolStr::new(module.as_str()));
                    self.imported_modules.insert(local, module.clone());
                }
                // Star imports bind names we cannot see at build time.
                ImportStatement::FromStar { .. } => {}
            }
        }
    }

    /// An imported class named by `name`: either a name bound by a `from`
    /// import, or `alias.Class` through a module import.
    fn imported_class(&self, name: &str) -> Option<SymbolRef> {
        if let Some(symbol) = self.imported_names.get(name) {
            return Some(symbol.clone());
        }
        let (prefix, class) = name.rsplit_once('.')?;
        if let Some(module) = self.imported_modules.get(prefix) {
            return Some(SymbolRef::new(module.clone(), class));
        }
        // `pkg.Class` after `from . import pkg`.
        let base = self.imported_names.get(prefix)?;
        Some(SymbolRef::new(base.module.child(&base.path), class))
    }

    /// First pass: validate records and find the classes annotations may name,
    /// so forward references resolve.
    fn collect_classes(
        &mut self,
        scope: Option<&str>,
        declarations: &[Declaration],
    ) -> Result<(), BuildError> {
        let mut winners: IndexMap<&str, &Declaration> = IndexMap::new();
        for decl in declarations {
            self.validate(decl)?;
            winners.insert(decl.name.as_str(), decl);
        }

        for (name, decl) in winners {
            if let DeclarationKind::Class(class) = &decl.kind {
                let path = Self::path(scope, name);
                self.collect_classes(Some(&path), &class.body)?;
                self.class_paths.insert(path);
            }
        }
        Ok(())
    }

    fn validate(&self, decl: &Declaration) -> Result<(), BuildError> {
        if let DeclarationKind::Malformed { message } = &decl.kind {
            return Err(BuildError::Malformed {
                module: self.module.clone(),
                message: message.clone(),
                range: decl.range,
            });
        }

        let invalid = |name: &SmolStr| BuildError::InvalidName {
            module: self.module.clone(),
            name: name.clone(),
            range: decl.range,
        };
        if !is_identifier(&decl.name) {
            return Err(invalid(&decl.name));
        }
        if let DeclarationKind::Function(func) = &decl.kind {
            if let Some(param) = func.params.iter().find(|p| !is_identifier(&p.name)) {
                return Err(invalid(&param.name));
            }
        }
        Ok(())
    }

    fn add_module_declarations(&mut self, declarations: &[Declaration]) -> Result<(), BuildError> {
        for decl in declarations {
            let (kind, declared_type) = match &decl.kind {
                DeclarationKind::Class(class) => {
                    let class_ref = SymbolRef::new(self.module.clone(), decl.name.clone());
                    self.add_class(&class_ref, class);
                    (SymbolKind::Class, Type::Class(class_ref))
                }
                DeclarationKind::Function(func) => {
                    let symbol = SymbolRef::new(self.module.clone(), decl.name.clone());
                    let signature = self.signature(func, None).with_symbol(symbol);
                    (SymbolKind::Function, Type::Function(signature))
                }
                DeclarationKind::Constant(constant) => {
                    (SymbolKind::Constant, self.constant_type(constant, None))
                }
                // Rejected by `validate`.
                DeclarationKind::Malformed { .. } => continue,
            };

            let symbol = Symbol {
                name: decl.name.clone(),
                kind,
                declared_type,
                owning_module: self.module.clone(),
                range: decl.range,
            };
            let outcome = insert_last_wins(&mut self.symbols, decl.name.clone(), symbol, |s| {
                s.range
            });
            self.record(None, &decl.name, decl.range, outcome);
        }
        Ok(())
    }

    fn record(
        &mut self,
        scope: Option<&SmolStr>,
        name: &SmolStr,
        current: TextRange,
        outcome: InsertOutcome,
    ) {
        if let InsertOutcome::Redefined { previous } = outcome {
            debug!(module = %self.module, name = %name, "redefinition, keeping latest");
            self.redefinitions.push(Redefinition {
                scope: scope.cloned(),
                name: name.clone(),
                previous,
                current,
            });
        }
    }

    fn add_class(&mut self, class_ref: &SymbolRef, class: &ClassDecl) {
        let enclosing = class_ref.path.as_str();
        let bases = class
            .bases
            .iter()
            .filter_map(|base| match base {
                TypeExpr::Name(name) => self.class_path(name, enclosing_scope(enclosing)),
                _ => None,
            })
            .map(|path| SymbolRef::new(self.module.clone(), path))
            .collect();

        let mut members = IndexMap::new();
        for decl in &class.body {
            let Some(member) = self.member(class_ref, decl) else {
                continue;
            };
            let outcome = insert_last_wins(&mut members, decl.name.clone(), member, |m| {
                m.symbol.range
            });
            self.record(Some(&class_ref.path), &decl.name, decl.range, outcome);
        }

        self.classes.insert(
            class_ref.path.clone(),
            ClassInfo {
                symbol: class_ref.clone(),
                bases,
                members,
            },
        );
    }

    fn member(&mut self, class_ref: &SymbolRef, decl: &Declaration) -> Option<Member> {
        let enclosing = Some(class_ref);
        let (kind, declared_type, binding) = match &decl.kind {
            DeclarationKind::Function(func) => {
                // Setters and deleters do not change the property's type.
                if func
                    .decorators
                    .iter()
                    .any(|d| d.ends_with(".setter") || d.ends_with(".deleter"))
                {
                    return None;
                }

                let symbol = class_ref.member(&decl.name);
                let signature = self.signature(func, enclosing).with_symbol(symbol);
                if func.has_decorator("property") || func.has_decorator("cached_property") {
                    let ty = *signature.ret;
                    (SymbolKind::Attribute, ty, MemberBinding::Instance)
                } else if func.has_decorator("staticmethod") {
                    (SymbolKind::Method, Type::Function(signature), MemberBinding::Class)
                } else if func.has_decorator("classmethod") {
                    let bound = signature.bind_receiver();
                    (SymbolKind::Method, Type::Function(bound), MemberBinding::Class)
                } else {
                    let bound = signature.bind_receiver();
                    (SymbolKind::Method, Type::Function(bound), MemberBinding::Instance)
                }
            }
            DeclarationKind::Constant(constant) => {
                let binding = if constant.assigned || is_class_var(constant.annotation.as_ref()) {
                    MemberBinding::Class
                } else {
                    MemberBinding::Instance
                };
                (
                    SymbolKind::Attribute,
                    self.constant_type(constant, enclosing),
                    binding,
                )
            }
            DeclarationKind::Class(class) => {
                let nested = class_ref.member(&decl.name);
                self.add_class(&nested, class);
                (SymbolKind::Class, Type::Class(nested), MemberBinding::Class)
            }
            DeclarationKind::Malformed { .. } => return None,
        };

        Some(Member {
            symbol: Symbol {
                name: decl.name.clone(),
                kind,
                declared_type,
                owning_module: self.module.clone(),
                range: decl.range,
            },
            binding,
        })
    }

    fn signature(&self, func: &FunctionDecl, enclosing: Option<&SymbolRef>) -> FunctionType {
        let params = func
            .params
            .iter()
            .map(|param: &ParamDecl| ParamType {
                name: param.name.clone(),
                kind: param.kind,
                ty: param
                    .annotation
                    .as_ref()
                    .map(|ann| self.resolve_annotation(ann, enclosing)),
                has_default: param.has_default,
            })
            .collect();
        let ret = func
            .returns
            .as_ref()
            .map_or(Type::Unknown, |ann| self.resolve_annotation(ann, enclosing));
        FunctionType::new(params, ret)
    }

    fn constant_type(&self, constant: &ConstantDecl, enclosing: Option<&SymbolRef>) -> Type {
        if let Some(annotation) = &constant.annotation {
            return self.resolve_annotation(annotation, enclosing);
        }
        constant
            .value
            .and_then(|literal| literal.scalar_name())
            .map_or(Type::Unknown, Type::scalar)
    }

    /// The path of a same-module class named `name` as seen from `scope`.
    fn class_path(&self, name: &str, scope: Option<&str>) -> Option<SmolStr> {
        // Names inside a class body see that class's nested classes first.
        let mut scope = scope;
        while let Some(current) = scope {
            let candidate = format_smolstr!("{current}.{name}");
            if self.class_paths.contains(&candidate) {
                return Some(candidate);
            }
            scope = enclosing_scope(current);
        }
        self.class_paths.get(name).cloned()
    }

    fn resolve_annotation(&self, annotation: &TypeExpr, enclosing: Option<&SymbolRef>) -> Type {
        match annotation {
            TypeExpr::NoneType => Type::scalar("None"),
            TypeExpr::Name(name) => {
                let bare = strip_transparent(name);
                if bare == "Self" {
                    return enclosing.map_or(Type::Unknown, |class| Type::Instance(class.clone()));
                }
                if SCALAR_NAMES.contains(&bare) || CONTAINER_NAMES.contains(&bare) {
                    return Type::scalar(bare);
                }
                if let Some(container) = typing_alias(bare) {
                    return Type::scalar(container);
                }
                if let Some(path) = self.class_path(name, enclosing.map(|c| c.path.as_str())) {
                    return Type::Instance(SymbolRef::new(self.module.clone(), path));
                }
                self.imported_class(name).map_or(Type::Unknown, Type::Instance)
            }
            TypeExpr::Generic { base, args } => {
                let bare = strip_transparent(base);
                match bare {
                    "ClassVar" | "Final" | "Annotated" | "Required" | "NotRequired" => args
                        .first()
                        .map_or(Type::Unknown, |inner| self.resolve_annotation(inner, enclosing)),
                    "Optional" => match args.as_slice() {
                        [inner] => self.scalar_union(
                            &[inner.clone(), TypeExpr::NoneType],
                            enclosing,
                        ),
                        _ => Type::Unknown,
                    },
                    "Union" => self.scalar_union(args, enclosing),
                    "type" | "Type" => match args.as_slice() {
                        [inner] => match self.resolve_annotation(inner, enclosing) {
                            Type::Instance(class) => Type::Class(class),
                            _ => Type::Unknown,
                        },
                        _ => Type::Unknown,
                    },
                    _ => {
                        let container = typing_alias(bare).unwrap_or(bare);
                        if !CONTAINER_NAMES.contains(&container) {
                            return Type::Unknown;
                        }
                        match self.render_scalar_args(args, enclosing) {
                            Some(rendered) => {
                                Type::scalar(format_smolstr!("{container}[{rendered}]"))
                            }
                            None => Type::Unknown,
                        }
                    }
                }
            }
            TypeExpr::Union(members) => self.scalar_union(members, enclosing),
            TypeExpr::List(_) | TypeExpr::Ellipsis | TypeExpr::Opaque => Type::Unknown,
        }
    }

    /// A union is scalar when every member is.
    fn scalar_union(&self, members: &[TypeExpr], enclosing: Option<&SymbolRef>) -> Type {
        let mut rendered: Vec<SmolStr> = Vec::new();
        for member in members {
            match self.resolve_annotation(member, enclosing) {
                Type::Scalar(name) => {
                    if !rendered.contains(&name) {
                        rendered.push(name);
                    }
                }
                _ => return Type::Unknown,
            }
        }
        match rendered.len() {
            0 => Type::Unknown,
            _ => Type::scalar(rendered.join(" | ")),
        }
    }

    fn render_scalar_args(
        &self,
        args: &[TypeExpr],
        enclosing: Option<&SymbolRef>,
    ) -> Option<String> {
        let mut rendered = Vec::with_capacity(args.len());
        for arg in args {
            let text = match arg {
                TypeExpr::Ellipsis => SmolStr::new("..."),
                TypeExpr::List(items) => {
                    format_smolstr!("[{}]", self.render_scalar_args(items, enclosing)?)
                }
                other => match self.resolve_annotation(other, enclosing) {
                    Type::Scalar(name) => name,
                    _ => return None,
                },
            };
            rendered.push(text);
        }
        Some(rendered.join(", "))
    }
}

fn enclosing_scope(path: &str) -> Option<&str> {
    path.rsplit_once('.').map(|(scope, _)| scope)
}

fn is_transparent_module(module: &ModuleName) -> bool {
    module.as_str() == "__future__"
        || TRANSPARENT_MODULES
            .iter()
            .any(|prefix| prefix.strip_suffix('.') == Some(module.as_str()))
}

fn strip_transparent(name: &str) -> &str {
    TRANSPARENT_MODULES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

/// `typing.List` and friends name builtin containers.
fn typing_alias(name: &str) -> Option<&'static str> {
    match name {
        "List" => Some("list"),
        "Dict" => Some("dict"),
        "Set" => Some("set"),
        "FrozenSet" => Some("frozenset"),
        "Tuple" => Some("tuple"),
        "Type" => Some("type"),
        _ => None,
    }
}

fn is_class_var(annotation: Option<&TypeExpr>) -> bool {
    matches!(
        annotation,
        Some(TypeExpr::Generic { base, .. }) if strip_transparent(base) == "ClassVar"
    ) || matches!(annotation, Some(TypeExpr::Name(name)) if strip_transparent(name) == "ClassVar")
}

/// Identifier check per the Unicode XID rules Python uses.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || unicode_ident::is_xid_start(first) => {
            chars.all(unicode_ident::is_xid_continue)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::decl::{LiteralKind, ParamKind};

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    fn method(name: &str, params: &[&str], returns: Option<TypeExpr>) -> Declaration {
        Declaration::function(
            name,
            TextRange::default(),
            FunctionDecl {
                params: params.iter().map(|p| ParamDecl::new(*p, None)).collect(),
                returns,
                decorators: Vec::new(),
            },
        )
    }

    fn annotated(name: &str, annotation: TypeExpr) -> Declaration {
        Declaration::constant(
            name,
            TextRange::default(),
            ConstantDecl {
                annotation: Some(annotation),
                ..ConstantDecl::default()
            },
        )
    }

    fn fixture_declarations() -> Vec<Declaration> {
        vec![
            Declaration::class(
                "MyClass",
                range(0, 10),
                ClassDecl {
                    bases: Vec::new(),
                    body: vec![
                        method("__init__", &["self", "x"], Some(TypeExpr::NoneType)),
                        method("get_value", &["self"], Some(TypeExpr::name("bool"))),
                    ],
                },
            ),
            Declaration::function(
                "utility_function",
                range(20, 30),
                FunctionDecl {
                    params: vec![
                        ParamDecl::new("a", Some(TypeExpr::name("int"))),
                        ParamDecl::new("b", Some(TypeExpr::name("str"))),
                    ],
                    returns: Some(TypeExpr::name("bool")),
                    decorators: Vec::new(),
                },
            ),
            annotated("MY_CONSTANT", TypeExpr::name("int")),
        ]
    }

    #[test]
    fn test_build_fixture_table() {
        let module = ModuleName::new("types_stub");
        let table = DeclarationTable::build(module, &fixture_declarations()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get("MyClass").map(|s| s.kind), Some(SymbolKind::Class));
        assert_eq!(
            table.get("MY_CONSTANT").map(|s| &s.declared_type),
            Some(&Type::scalar("int"))
        );

        let Some(Type::Function(func)) = table.get("utility_function").map(|s| &s.declared_type)
        else {
            panic!("expected function type");
        };
        assert_eq!(func.params.len(), 2);
        assert_eq!(*func.ret, Type::scalar("bool"));
    }

    #[test]
    fn test_every_symbol_is_owned_by_the_table_module() {
        let module = ModuleName::new("types_stub");
        let table = DeclarationTable::build(module.clone(), &fixture_declarations()).unwrap();
        assert!(table.symbols().all(|s| s.owning_module == module));
        for class in table.classes() {
            assert!(class.members.values().all(|m| m.symbol.owning_module == module));
        }
    }

    #[test]
    fn test_methods_have_receiver_elided() {
        let module = ModuleName::new("types_stub");
        let table = DeclarationTable::build(module, &fixture_declarations()).unwrap();

        let member = table
            .lookup_member("MyClass", "get_value", MemberAccess::Instance)
            .unwrap();
        let Type::Function(func) = &member.symbol.declared_type else {
            panic!("expected method signature");
        };
        assert!(func.params.is_empty());
        assert_eq!(
            func.symbol.as_ref().map(ToString::to_string).as_deref(),
            Some("types_stub.MyClass.get_value")
        );

        // Instance methods are not class-level members.
        assert!(table
            .lookup_member("MyClass", "get_value", MemberAccess::Class)
            .is_none());
    }

    #[test]
    fn test_redefinition_last_wins() {
        let declarations = vec![
            Declaration::constant(
                "VALUE",
                range(0, 5),
                ConstantDecl {
                    value: Some(LiteralKind::Int),
                    assigned: true,
                    ..ConstantDecl::default()
                },
            ),
            Declaration::constant(
                "VALUE",
                range(10, 15),
                ConstantDecl {
                    value: Some(LiteralKind::Str),
                    assigned: true,
                    ..ConstantDecl::default()
                },
            ),
        ];
        let table = DeclarationTable::build(ModuleName::new("m"), &declarations).unwrap();

        assert_eq!(
            table.get("VALUE").map(|s| &s.declared_type),
            Some(&Type::scalar("str"))
        );
        assert_eq!(
            table.redefinitions(),
            &[Redefinition {
                scope: None,
                name: "VALUE".into(),
                previous: range(0, 5),
                current: range(10, 15),
            }]
        );
    }

    #[test]
    fn test_malformed_declaration_fails_build() {
        let declarations = vec![
            annotated("OK", TypeExpr::name("int")),
            Declaration {
                name: SmolStr::default(),
                range: range(4, 9),
                kind: DeclarationKind::Malformed {
                    message: "unexpected token".into(),
                },
            },
        ];
        let error = DeclarationTable::build(ModuleName::new("m"), &declarations).unwrap_err();
        assert_eq!(error.range(), range(4, 9));
        assert!(matches!(error, BuildError::Malformed { .. }));
    }

    #[test]
    fn test_invalid_identifier_fails_build() {
        let error = DeclarationTable::build(
            ModuleName::new("m"),
            &[annotated("1abc", TypeExpr::name("int"))],
        )
        .unwrap_err();
        assert!(matches!(error, BuildError::InvalidName { ref name, .. } if name == "1abc"));

        // Non-ASCII identifiers are fine.
        let non_ascii = [annotated("größe", TypeExpr::name("int"))];
        assert!(DeclarationTable::build(ModuleName::new("m"), &non_ascii).is_ok());
    }

    #[test]
    fn test_annotation_resolution() {
        let declarations = vec![
            Declaration::class("Node", TextRange::default(), ClassDecl::default()),
            annotated("a", TypeExpr::generic("list", vec![TypeExpr::name("int")])),
            annotated(
                "b",
                TypeExpr::generic("typing.Optional", vec![TypeExpr::name("str")]),
            ),
            annotated("c", TypeExpr::Union(vec![TypeExpr::name("int"), TypeExpr::NoneType])),
            annotated("d", TypeExpr::name("Node")),
            annotated("e", TypeExpr::name("Later")),
            annotated("f", TypeExpr::name("SomethingElse")),
            annotated(
                "g",
                TypeExpr::generic(
                    "Dict",
                    vec![TypeExpr::name("str"), TypeExpr::name("Node")],
                ),
            ),
            annotated("h", TypeExpr::generic("type", vec![TypeExpr::name("Node")])),
            Declaration::class("Later", TextRange::default(), ClassDecl::default()),
        ];
        let table = DeclarationTable::build(ModuleName::new("m"), &declarations).unwrap();
        let ty = |name: &str| table.get(name).map(|s| s.declared_type.clone()).unwrap();

        assert_eq!(ty("a"), Type::scalar("list[int]"));
        assert_eq!(ty("b"), Type::scalar("str | None"));
        assert_eq!(ty("c"), Type::scalar("int | None"));
        assert_eq!(ty("d"), Type::Instance(SymbolRef::new(ModuleName::new("m"), "Node")));
        assert_eq!(ty("e"), Type::Instance(SymbolRef::new(ModuleName::new("m"), "Later")));
        assert_eq!(ty("f"), Type::Unknown);
        assert_eq!(ty("g"), Type::Unknown);
        assert_eq!(ty("h"), Type::Class(SymbolRef::new(ModuleName::new("m"), "Node")));
    }

    #[test]
    fn test_member_bindings() {
        let mut make = method("make", &[], Some(TypeExpr::name("Self")));
        let mut build = method("build", &["cls", "size"], Some(TypeExpr::name("Self")));
        let mut size = method("size", &["self"], Some(TypeExpr::name("int")));
        let mut setter = method("size", &["self", "value"], None);
        for (decl, decorator) in [
            (&mut make, "staticmethod"),
            (&mut build, "classmethod"),
            (&mut size, "property"),
            (&mut setter, "size.setter"),
        ] {
            if let DeclarationKind::Function(func) = &mut decl.kind {
                func.decorators.push(decorator.into());
            }
        }

        let declarations = vec![Declaration::class(
            "Box",
            TextRange::default(),
            ClassDecl {
                bases: Vec::new(),
                body: vec![
                    make,
                    build,
                    size,
                    setter,
                    annotated("label", TypeExpr::name("str")),
                    annotated(
                        "count",
                        TypeExpr::generic("ClassVar", vec![TypeExpr::name("int")]),
                    ),
                ],
            },
        )];
        let table = DeclarationTable::build(ModuleName::new("m"), &declarations).unwrap();
        let box_ref = SymbolRef::new(ModuleName::new("m"), "Box");

        let class_level = |name: &str| table.lookup_member("Box", name, MemberAccess::Class);
        assert!(class_level("make").is_some());
        assert!(class_level("count").is_some());
        assert!(class_level("label").is_none());
        assert!(class_level("size").is_none());

        let Some(Type::Function(build)) = class_level("build").map(|m| &m.symbol.declared_type)
        else {
            panic!("expected classmethod");
        };
        assert_eq!(build.params.len(), 1);
        assert_eq!(*build.ret, Type::Instance(box_ref));

        let size = table.lookup_member("Box", "size", MemberAccess::Instance).unwrap();
        assert_eq!(size.symbol.kind, SymbolKind::Attribute);
        assert_eq!(size.symbol.declared_type, Type::scalar("int"));
    }

    #[test]
    fn test_member_lookup_walks_bases() {
        let declarations = vec![
            Declaration::class(
                "Base",
                TextRange::default(),
                ClassDecl {
                    bases: vec![TypeExpr::name("Derived")],
                    body: vec![method("shared", &["self"], Some(TypeExpr::name("int")))],
                },
            ),
            Declaration::class(
                "Derived",
                TextRange::default(),
                ClassDecl {
                    bases: vec![TypeExpr::name("Base"), TypeExpr::name("external.Mixin")],
                    body: Vec::new(),
                },
            ),
        ];
        let table = DeclarationTable::build(ModuleName::new("m"), &declarations).unwrap();

        assert!(table
            .lookup_member("Derived", "shared", MemberAccess::Instance)
            .is_some());
        // Cyclic bases terminate.
        assert!(table
            .lookup_member("Derived", "missing", MemberAccess::Instance)
            .is_none());
        assert_eq!(table.class("Derived").map(|c| c.bases.len()), Some(1));
    }

    #[test]
    fn test_nested_classes() {
        let declarations = vec![Declaration::class(
            "Outer",
            TextRange::default(),
            ClassDecl {
                bases: Vec::new(),
                body: vec![
                    Declaration::class("Inner", TextRange::default(), ClassDecl::default()),
                    method("make", &["self"], Some(TypeExpr::name("Inner"))),
                ],
            },
        )];
        let table = DeclarationTable::build(ModuleName::new("m"), &declarations).unwrap();
        let inner = SymbolRef::new(ModuleName::new("m"), "Outer.Inner");

        assert!(table.class("Outer.Inner").is_some());
        let make = table.lookup_member("Outer", "make", MemberAccess::Instance).unwrap();
        let Type::Function(func) = &make.symbol.declared_type else {
            panic!("expected method");
        };
        assert_eq!(*func.ret, Type::Instance(inner.clone()));
        assert_eq!(
            table
                .lookup_member("Outer", "Inner", MemberAccess::Class)
                .map(|m| &m.symbol.declared_type),
            Some(&Type::Class(inner))
        );
    }

    #[test]
    fn test_param_kinds_survive() {
        let mut star = ParamDecl::new("args", Some(TypeExpr::name("int")));
        star.kind = ParamKind::VarArgs;
        let table = DeclarationTable::build(
            ModuleName::new("m"),
            &[Declaration::function(
                "f",
                TextRange::default(),
                FunctionDecl {
                    params: vec![star],
                    returns: None,
                    decorators: Vec::new(),
                },
            )],
        )
        .unwrap();
        let Some(Type::Function(func)) = table.get("f").map(|s| &s.declared_type) else {
            panic!("expected function");
        };
        assert_eq!(func.params[0].kind, ParamKind::VarArgs);
        assert_eq!(*func.ret, Type::Unknown);
    }

    #[test]
    fn test_annotations_through_imports() {
        use crate::hir::imports::ImportedName;

        let imports = vec![
            ImportStatement::From {
                module: ModuleName::new("base_mod"),
                names: vec![
                    ImportedName {
                        name: "Widget".into(),
                        alias: None,
                        range: TextRange::default(),
                    },
                    ImportedName {
                        name: "Gadget".into(),
                        alias: Some("G".into()),
                        range: TextRange::default(),
                    },
                ],
                module_range: TextRange::default(),
                range: TextRange::default(),
            },
            ImportStatement::From {
                module: ModuleName::new("typing"),
                names: vec![ImportedName {
                    name: "Any".into(),
                    alias: None,
                    range: TextRange::default(),
                }],
                module_range: TextRange::default(),
                range: TextRange::default(),
            },
            ImportStatement::Module {
                module: ModuleName::new("shapes"),
                alias: Some("sh".into()),
                module_range: TextRange::default(),
                range: TextRange::default(),
            },
        ];
        let declarations = vec![
            method("make", &[], Some(TypeExpr::name("Widget"))),
            method("gadget", &[], Some(TypeExpr::name("G"))),
            method("square", &[], Some(TypeExpr::name("sh.Square"))),
            method("anything", &[], Some(TypeExpr::name("Any"))),
        ];
        let module = ModuleName::new("factory");
        let table = DeclarationTable::build_with_imports(module, &declarations, &imports).unwrap();
        let ret = |name: &str| match table.get(name).map(|s| &s.declared_type) {
            Some(Type::Function(func)) => (*func.ret).clone(),
            other => panic!("expected function, got {other:?}"),
        };

        assert_eq!(
            ret("make"),
            Type::Instance(SymbolRef::new(ModuleName::new("base_mod"), "Widget"))
        );
        assert_eq!(
            ret("gadget"),
            Type::Instance(SymbolRef::new(ModuleName::new("base_mod"), "Gadget"))
        );
        assert_eq!(
            ret("square"),
            Type::Instance(SymbolRef::new(ModuleName::new("shapes"), "Square"))
        );
        assert_eq!(ret("anything"), Type::Unknown);

        // Without the imports the same names are unknown.
        let plain = DeclarationTable::build(ModuleName::new("factory"), &declarations).unwrap();
        let Some(Type::Function(func)) = plain.get("make").map(|s| &s.declared_type) else {
            panic!("expected function");
        };
        assert_eq!(*func.ret, Type::Unknown);
    }
}
