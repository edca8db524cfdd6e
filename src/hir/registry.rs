//! The module registry: the set of loaded declaration tables.
//!
//! Readers take an [`Arc<RegistrySnapshot>`] and keep using it for as long as
//! they like; nothing in a snapshot ever changes. Writers build a new snapshot
//! from the current one and swap it in, so a query never observes a half
//! published reload.

use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, error, info};

use super::error::BuildError;
use super::ids::ModuleName;
use super::lower::lower_module;
use super::table::DeclarationTable;
use crate::syntax;

/// Declarations for the builtin scalar classes and functions.
const BUILTINS_STUB: &str = include_str!("builtins.pyi");

static BUILTINS: LazyLock<Result<Arc<DeclarationTable>, BuildError>> = LazyLock::new(|| {
    let module = ModuleName::builtins();
    let parse = syntax::parse(BUILTINS_STUB);
    let lowered = lower_module(&module, false, &parse.file);
    DeclarationTable::build(module, &lowered.declarations).map(Arc::new)
});

/// The builtins table, built once per process.
pub fn builtins_table() -> Result<Arc<DeclarationTable>, BuildError> {
    BUILTINS.clone()
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// An immutable view of every loaded module.
#[derive(Clone, Debug, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    modules: IndexMap<ModuleName, Arc<DeclarationTable>>,
}

impl RegistrySnapshot {
    /// Increases by one with every published change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, module: &ModuleName) -> Option<&Arc<DeclarationTable>> {
        self.modules.get(module)
    }

    pub fn builtins(&self) -> Option<&Arc<DeclarationTable>> {
        self.modules.get(&ModuleName::builtins())
    }

    /// Whether `module` or any of its submodules is loaded.
    ///
    /// A package with only submodule stubs can still be imported.
    pub fn has_module(&self, module: &ModuleName) -> bool {
        self.modules.contains_key(module)
            || self.modules.keys().any(|loaded| {
                loaded
                    .as_str()
                    .strip_prefix(module.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
            })
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleName> {
        self.modules.keys()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Owns the current snapshot and publishes new ones.
#[derive(Debug)]
pub struct ModuleRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    /// A registry holding only the builtins table.
    pub fn new() -> Self {
        let registry = Self::empty();
        match builtins_table() {
            Ok(table) => {
                registry.update(vec![table], &[]);
            }
            Err(err) => error!(error = %err, "builtins declarations failed to build"),
        }
        registry
    }

    /// A registry with no modules at all, not even builtins.
    pub fn empty() -> Self {
        Self {
            current: RwLock::new(Arc::new(RegistrySnapshot::default())),
        }
    }

    /// The current snapshot. Cheap; later publishes do not affect it.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Add or replace one module's table. Returns the new generation.
    pub fn publish(&self, table: DeclarationTable) -> u64 {
        self.update(vec![Arc::new(table)], &[])
    }

    /// Add or replace several tables in one step, so readers see all of them
    /// or none.
    pub fn publish_all(&self, tables: Vec<DeclarationTable>) -> u64 {
        self.update(tables.into_iter().map(Arc::new).collect(), &[])
    }

    /// Publish `tables` and drop `withdrawn` as a single new snapshot.
    pub fn update(&self, tables: Vec<Arc<DeclarationTable>>, withdrawn: &[ModuleName]) -> u64 {
        let mut current = self.current.write();
        let mut next = RegistrySnapshot::clone(&current);
        next.generation += 1;
        for module in withdrawn {
            if next.modules.shift_remove(module).is_some() {
                debug!(module = %module, "withdrawing module");
            }
        }
        for table in tables {
            debug!(module = %table.module(), symbols = table.len(), "publishing module");
            next.modules.insert(table.module().clone(), table);
        }
        let generation = next.generation;
        *current = Arc::new(next);
        info!(generation, modules = current.len(), "registry snapshot published");
        generation
    }

    /// Drop a module. Returns whether it was loaded.
    pub fn invalidate(&self, module: &ModuleName) -> bool {
        let mut current = self.current.write();
        if !current.modules.contains_key(module) {
            return false;
        }
        let mut next = RegistrySnapshot::clone(&current);
        next.generation += 1;
        next.modules.shift_remove(module);
        *current = Arc::new(next);
        debug!(module = %module, "module invalidated");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::decl::{ConstantDecl, Declaration, TypeExpr};
    use crate::hir::types::Type;
    use crate::base::TextRange;

    fn table(module: &str, constant: &str, ty: &str) -> DeclarationTable {
        DeclarationTable::build(
            ModuleName::new(module),
            &[Declaration::constant(
                constant,
                TextRange::default(),
                ConstantDecl {
                    annotation: Some(TypeExpr::name(ty)),
                    ..ConstantDecl::default()
                },
            )],
        )
        .unwrap()
    }

    #[test]
    fn test_builtins_table_builds() {
        let builtins = builtins_table().unwrap();
        for name in ["int", "str", "float", "bool", "list", "dict", "len", "print"] {
            assert!(builtins.get(name).is_some(), "missing builtin {name}");
        }
        assert_eq!(
            builtins.get("len").map(|s| match &s.declared_type {
                Type::Function(f) => (*f.ret).clone(),
                other => other.clone(),
            }),
            Some(Type::scalar("int"))
        );
    }

    #[test]
    fn test_new_registry_seeds_builtins() {
        let registry = ModuleRegistry::new();
        let snapshot = registry.snapshot();
        assert!(snapshot.builtins().is_some());
        assert_eq!(snapshot.generation(), 1);
        assert!(ModuleRegistry::empty().snapshot().builtins().is_none());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_publishes() {
        let registry = ModuleRegistry::new();
        registry.publish(table("m", "A", "int"));
        let before = registry.snapshot();

        registry.publish(table("m", "A", "str"));
        let after = registry.snapshot();

        let declared = |snapshot: &RegistrySnapshot| {
            snapshot
                .get(&ModuleName::new("m"))
                .and_then(|t| t.get("A"))
                .map(|s| s.declared_type.clone())
        };
        assert_eq!(declared(&before), Some(Type::scalar("int")));
        assert_eq!(declared(&after), Some(Type::scalar("str")));
        assert_eq!(after.generation(), before.generation() + 1);
    }

    #[test]
    fn test_publish_all_is_one_generation() {
        let registry = ModuleRegistry::empty();
        let generation = registry.publish_all(vec![table("a", "X", "int"), table("b", "Y", "int")]);
        assert_eq!(generation, 1);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_has_module_sees_packages() {
        let registry = ModuleRegistry::empty();
        registry.publish(table("pkg.sub", "X", "int"));
        let snapshot = registry.snapshot();

        assert!(snapshot.has_module(&ModuleName::new("pkg")));
        assert!(snapshot.has_module(&ModuleName::new("pkg.sub")));
        assert!(!snapshot.has_module(&ModuleName::new("pk")));
        assert!(!snapshot.has_module(&ModuleName::new("pkg.other")));
    }

    #[test]
    fn test_invalidate() {
        let registry = ModuleRegistry::empty();
        registry.publish(table("m", "A", "int"));
        assert!(registry.invalidate(&ModuleName::new("m")));
        assert!(!registry.invalidate(&ModuleName::new("m")));
        assert!(registry.snapshot().get(&ModuleName::new("m")).is_none());
    }
}
