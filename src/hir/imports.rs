//! Import binding and per-document local scopes.
//!
//! The binder maps each imported name onto an entry of the source module's
//! declaration table, as found in one registry snapshot. One bad name never
//! blocks the rest of the statement: it is bound to an [`Unresolved`] reason
//! instead.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tracing::trace;

use super::ids::{ModuleName, SymbolRef};
use super::registry::RegistrySnapshot;
use super::resolve::Unresolved;
use crate::base::{TextRange, TextSize};
use crate::syntax::Expr;

// ============================================================================
// INPUT
// ============================================================================

/// An import statement, with relative module names already resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportStatement {
    /// `from M import a, b as c`
    From {
        module: ModuleName,
        names: Vec<ImportedName>,
        module_range: TextRange,
        range: TextRange,
    },
    /// `from M import *`
    FromStar {
        module: ModuleName,
        module_range: TextRange,
        range: TextRange,
    },
    /// `import a.b` binds `a`; `import a.b as c` binds `c` to `a.b`.
    Module {
        module: ModuleName,
        alias: Option<SmolStr>,
        module_range: TextRange,
        range: TextRange,
    },
}

impl ImportStatement {
    pub fn module(&self) -> &ModuleName {
        match self {
            ImportStatement::From { module, .. }
            | ImportStatement::FromStar { module, .. }
            | ImportStatement::Module { module, .. } => module,
        }
    }

    /// Where the module path is written.
    pub fn module_range(&self) -> TextRange {
        match self {
            ImportStatement::From { module_range, .. }
            | ImportStatement::FromStar { module_range, .. }
            | ImportStatement::Module { module_range, .. } => *module_range,
        }
    }

    /// Names bound by the statement become visible after it ends.
    pub fn visible_from(&self) -> TextSize {
        match self {
            ImportStatement::From { range, .. }
            | ImportStatement::FromStar { range, .. }
            | ImportStatement::Module { range, .. } => range.end(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedName {
    pub name: SmolStr,
    pub alias: Option<SmolStr>,
    pub range: TextRange,
}

impl ImportedName {
    pub fn local_name(&self) -> &SmolStr {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

/// `name = value` or `name: T [= value]` at module level.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalAssignment {
    pub name: SmolStr,
    pub range: TextRange,
    pub annotation: Option<Expr>,
    pub value: Option<Expr>,
    /// The assignment is only visible to code after its statement.
    pub available_from: TextSize,
}

// ============================================================================
// BINDINGS
// ============================================================================

/// A local name bound by an import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportBinding {
    pub local_name: SmolStr,
    pub source_module: ModuleName,
    /// The imported name, or `None` for `import m`.
    pub source_name: Option<SmolStr>,
    /// Where the imported name is written.
    pub range: TextRange,
    /// Where the source module is written.
    pub module_range: TextRange,
    pub visible_from: TextSize,
    pub target: BindingTarget,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingTarget {
    /// A top-level symbol of the source module.
    Symbol(SymbolRef),
    /// A module object (`import m`, or `from pkg import submodule`).
    Module(ModuleName),
    /// The name could not be bound when the statement was processed.
    Unresolved(Unresolved),
}

/// Binds import statements against one registry snapshot.
#[derive(Clone, Copy, Debug)]
pub struct ImportBinder<'a> {
    snapshot: &'a RegistrySnapshot,
}

impl<'a> ImportBinder<'a> {
    pub fn new(snapshot: &'a RegistrySnapshot) -> Self {
        Self { snapshot }
    }

    /// Produce one binding per name the statement introduces.
    pub fn bind(&self, stmt: &ImportStatement) -> Vec<ImportBinding> {
        let visible_from = stmt.visible_from();
        let module_range = stmt.module_range();
        match stmt {
            ImportStatement::From { module, names, .. } => names
                .iter()
                .map(|imported| ImportBinding {
                    local_name: imported.local_name().clone(),
                    source_module: module.clone(),
                    source_name: Some(imported.name.clone()),
                    range: imported.range,
                    module_range,
                    visible_from,
                    target: self.bind_name(module, &imported.name),
                })
                .collect(),

            ImportStatement::FromStar { module, .. } => match self.snapshot.get(module) {
                Some(table) => table
                    .public_names()
                    .map(|name| ImportBinding {
                        local_name: name.clone(),
                        source_module: module.clone(),
                        source_name: Some(name.clone()),
                        range: module_range,
                        module_range,
                        visible_from,
                        target: BindingTarget::Symbol(SymbolRef::new(module.clone(), name.clone())),
                    })
                    .collect(),
                None => {
                    trace!(module = %module, "star import from missing module binds nothing");
                    Vec::new()
                }
            },

            ImportStatement::Module { module, alias, .. } => {
                // `import a.b` binds the top-level package `a`.
                let (local_name, bound) = match alias {
                    Some(alias) => (alias.clone(), module.clone()),
                    None => {
                        let root = module.root();
                        (SmolStr::new(root.as_str()), root)
                    }
                };
                let target = if self.snapshot.has_module(module) {
                    BindingTarget::Module(bound.clone())
                } else {
                    BindingTarget::Unresolved(Unresolved::MissingModule {
                        module: module.clone(),
                    })
                };
                vec![ImportBinding {
                    local_name,
                    source_module: bound,
                    source_name: None,
                    range: module_range,
                    module_range,
                    visible_from,
                    target,
                }]
            }
        }
    }

    fn bind_name(&self, module: &ModuleName, name: &SmolStr) -> BindingTarget {
        let Some(table) = self.snapshot.get(module) else {
            // `from pkg import sub` where only `pkg.sub` is loaded.
            let submodule = module.child(name);
            if self.snapshot.get(&submodule).is_some() {
                return BindingTarget::Module(submodule);
            }
            return BindingTarget::Unresolved(Unresolved::MissingModule {
                module: module.clone(),
            });
        };

        if table.get(name).is_some() {
            return BindingTarget::Symbol(SymbolRef::new(module.clone(), name.clone()));
        }

        let submodule = module.child(name);
        if self.snapshot.get(&submodule).is_some() {
            BindingTarget::Module(submodule)
        } else {
            BindingTarget::Unresolved(Unresolved::MissingName {
                module: module.clone(),
                name: name.clone(),
            })
        }
    }
}

// ============================================================================
// LOCAL SCOPE
// ============================================================================

/// Everything a document binds at module level, ordered by position.
///
/// Built once per document version against a registry snapshot and read by
/// the resolver. Rebuilt wholesale when an imported module changes.
#[derive(Clone, Debug, Default)]
pub struct LocalScope {
    module: Option<ModuleName>,
    assignments: IndexMap<SmolStr, Vec<LocalAssignment>>,
    imports: IndexMap<SmolStr, Vec<ImportBinding>>,
    dependencies: FxHashSet<ModuleName>,
}

impl LocalScope {
    /// A scope with no bindings, for a module with no imports or assignments.
    pub fn empty(module: ModuleName) -> Self {
        Self {
            module: Some(module),
            ..Self::default()
        }
    }

    /// Bind a document's imports against `snapshot` and index its assignments.
    pub fn build(
        module: ModuleName,
        imports: &[ImportStatement],
        assignments: &[LocalAssignment],
        snapshot: &RegistrySnapshot,
    ) -> Self {
        let binder = ImportBinder::new(snapshot);
        let mut scope = Self::empty(module);

        for stmt in imports {
            let imported = stmt.module();
            scope.dependencies.insert(imported.clone());
            // A module import also depends on the package it binds.
            scope.dependencies.insert(imported.root());

            for binding in binder.bind(stmt) {
                if let BindingTarget::Module(target) = &binding.target {
                    scope.dependencies.insert(target.clone());
                }
                scope
                    .imports
                    .entry(binding.local_name.clone())
                    .or_default()
                    .push(binding);
            }
        }

        for assignment in assignments {
            scope
                .assignments
                .entry(assignment.name.clone())
                .or_default()
                .push(assignment.clone());
        }

        trace!(
            module = %scope.module_name(),
            imports = scope.imports.len(),
            assignments = scope.assignments.len(),
            "built local scope"
        );
        scope
    }

    pub fn module(&self) -> Option<&ModuleName> {
        self.module.as_ref()
    }

    fn module_name(&self) -> &str {
        self.module.as_ref().map_or("", ModuleName::as_str)
    }

    /// The latest assignment to `name` visible at `offset`.
    pub fn assignment(&self, name: &str, offset: TextSize) -> Option<&LocalAssignment> {
        self.assignments
            .get(name)?
            .iter()
            .rev()
            .find(|a| a.available_from <= offset)
    }

    /// The latest import binding for `name` visible at `offset`.
    pub fn import(&self, name: &str, offset: TextSize) -> Option<&ImportBinding> {
        self.imports
            .get(name)?
            .iter()
            .rev()
            .find(|b| b.visible_from <= offset)
    }

    /// All import bindings in source order.
    pub fn import_bindings(&self) -> impl Iterator<Item = &ImportBinding> {
        let mut bindings: Vec<_> = self.imports.values().flatten().collect();
        bindings.sort_by_key(|b| b.range.start());
        bindings.into_iter()
    }

    /// All assignments in source order.
    pub fn assignments(&self) -> impl Iterator<Item = &LocalAssignment> {
        let mut assignments: Vec<_> = self.assignments.values().flatten().collect();
        assignments.sort_by_key(|a| a.range.start());
        assignments.into_iter()
    }

    /// Whether a change to `module` could change what this scope binds.
    pub fn depends_on(&self, module: &ModuleName) -> bool {
        self.dependencies.contains(module)
            || module
                .parent()
                .is_some_and(|parent| self.dependencies.contains(&parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::decl::{ConstantDecl, Declaration, TypeExpr};
    use crate::hir::registry::ModuleRegistry;
    use crate::hir::table::DeclarationTable;

    fn stub_registry() -> ModuleRegistry {
        let registry = ModuleRegistry::new();
        let table = DeclarationTable::build(
            ModuleName::new("types_stub"),
            &[
                Declaration::constant(
                    "MY_CONSTANT",
                    TextRange::default(),
                    ConstantDecl {
                        annotation: Some(TypeExpr::name("int")),
                        ..ConstantDecl::default()
                    },
                ),
                Declaration::constant("_private", TextRange::default(), ConstantDecl::default()),
            ],
        )
        .unwrap();
        registry.publish(table);
        registry
    }

    fn from_import(module: &str, names: &[&str]) -> ImportStatement {
        ImportStatement::From {
            module: ModuleName::new(module),
            names: names
                .iter()
                .map(|n| ImportedName {
                    name: SmolStr::new(n),
                    alias: None,
                    range: TextRange::default(),
                })
                .collect(),
            module_range: TextRange::default(),
            range: TextRange::new(0.into(), 10.into()),
        }
    }

    #[test]
    fn test_bind_partial_failure() {
        let registry = stub_registry();
        let snapshot = registry.snapshot();
        let bindings =
            ImportBinder::new(&snapshot).bind(&from_import("types_stub", &["MY_CONSTANT", "Nope"]));

        assert_eq!(bindings.len(), 2);
        assert!(matches!(bindings[0].target, BindingTarget::Symbol(_)));
        assert_eq!(
            bindings[1].target,
            BindingTarget::Unresolved(Unresolved::MissingName {
                module: ModuleName::new("types_stub"),
                name: "Nope".into(),
            })
        );
    }

    #[test]
    fn test_bind_missing_module() {
        let registry = stub_registry();
        let snapshot = registry.snapshot();
        let bindings = ImportBinder::new(&snapshot).bind(&from_import("missing", &["a", "b"]));

        assert!(bindings.iter().all(|b| matches!(
            b.target,
            BindingTarget::Unresolved(Unresolved::MissingModule { .. })
        )));
    }

    #[test]
    fn test_star_import_skips_private_names() {
        let registry = stub_registry();
        let snapshot = registry.snapshot();
        let bindings = ImportBinder::new(&snapshot).bind(&ImportStatement::FromStar {
            module: ModuleName::new("types_stub"),
            module_range: TextRange::default(),
            range: TextRange::default(),
        });

        let names: Vec<_> = bindings.iter().map(|b| b.local_name.as_str()).collect();
        assert_eq!(names, vec!["MY_CONSTANT"]);
    }

    #[test]
    fn test_module_import_binds_root() {
        let registry = ModuleRegistry::new();
        registry.publish(DeclarationTable::build(ModuleName::new("pkg.sub"), &[]).unwrap());
        let snapshot = registry.snapshot();

        let bindings = ImportBinder::new(&snapshot).bind(&ImportStatement::Module {
            module: ModuleName::new("pkg.sub"),
            alias: None,
            module_range: TextRange::default(),
            range: TextRange::default(),
        });
        assert_eq!(bindings[0].local_name, "pkg");
        assert_eq!(
            bindings[0].target,
            BindingTarget::Module(ModuleName::new("pkg"))
        );
    }

    #[test]
    fn test_scope_visibility_by_offset() {
        let registry = stub_registry();
        let scope = LocalScope::build(
            ModuleName::new("usage"),
            &[from_import("types_stub", &["MY_CONSTANT"])],
            &[],
            &registry.snapshot(),
        );

        assert!(scope.import("MY_CONSTANT", 5.into()).is_none());
        assert!(scope.import("MY_CONSTANT", 10.into()).is_some());
        assert!(scope.depends_on(&ModuleName::new("types_stub")));
        assert!(!scope.depends_on(&ModuleName::new("other")));
    }
}
