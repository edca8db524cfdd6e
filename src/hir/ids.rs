//! Semantic identifiers for modules and symbols.
//!
//! Cross-module references are name-keyed: a [`SymbolRef`] names a module and
//! a path inside it, and is looked up in the registry at use time. Nothing
//! here keeps a declaration table alive.

use std::fmt;
use std::path::Path;

use smol_str::SmolStr;

/// A dotted module name such as `types_stub` or `pkg.sub`.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ModuleName(SmolStr);

impl ModuleName {
    /// The module that holds builtin names.
    pub const BUILTINS: &'static str = "builtins";

    #[inline]
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    pub fn builtins() -> Self {
        Self::new(Self::BUILTINS)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_builtins(&self) -> bool {
        self.0 == Self::BUILTINS
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The enclosing package, if any: `a.b.c` → `a.b`.
    pub fn parent(&self) -> Option<ModuleName> {
        self.0.rsplit_once('.').map(|(parent, _)| ModuleName::new(parent))
    }

    /// The first component: `a.b.c` → `a`.
    pub fn root(&self) -> ModuleName {
        match self.0.split_once('.') {
            Some((root, _)) => ModuleName::new(root),
            None => self.clone(),
        }
    }

    pub fn child(&self, name: &str) -> ModuleName {
        ModuleName::new(smol_str::format_smolstr!("{}.{}", self.0, name))
    }

    /// Resolve a relative import (`from ..x import y`) against this module.
    ///
    /// `is_package` says whether this module is a package `__init__`, in which
    /// case one leading dot refers to the module itself. Returns `None` when
    /// the dots climb above the top-level package.
    pub fn resolve_relative(
        &self,
        is_package: bool,
        level: u32,
        tail: Option<&str>,
    ) -> Option<ModuleName> {
        if level == 0 {
            return tail.map(ModuleName::new);
        }

        let mut parts: Vec<&str> = self.components().collect();
        if !is_package {
            parts.pop();
        }
        for _ in 1..level {
            parts.pop()?;
        }
        if let Some(tail) = tail {
            parts.push(tail);
        }

        if parts.is_empty() {
            None
        } else {
            Some(ModuleName::new(parts.join(".")))
        }
    }

    /// Derive a module name from a path relative to a search root.
    ///
    /// `pkg/mod.pyi` → `pkg.mod`, `pkg/__init__.pyi` → `pkg`. Returns `None` if
    /// a component is not valid UTF-8 or the path names no module.
    pub fn from_relative_path(path: &Path) -> Option<(ModuleName, bool)> {
        let stem = path.file_stem()?.to_str()?;
        let mut parts = Vec::new();
        if let Some(parent) = path.parent() {
            for component in parent.components() {
                parts.push(component.as_os_str().to_str()?);
            }
        }

        let is_package = stem == "__init__";
        if !is_package {
            parts.push(stem);
        }
        if parts.is_empty() {
            return None;
        }
        Some((ModuleName::new(parts.join(".")), is_package))
    }
}

impl fmt::Debug for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleName({})", self.0)
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A non-owning reference to a symbol: its module plus a dotted path inside
/// that module (`MyClass`, `Outer.Inner`, `MyClass.get_value`).
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SymbolRef {
    pub module: ModuleName,
    pub path: SmolStr,
}

impl SymbolRef {
    #[inline]
    pub fn new(module: ModuleName, path: impl Into<SmolStr>) -> Self {
        Self {
            module,
            path: path.into(),
        }
    }

    /// The last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    /// A reference to a member nested under this symbol.
    pub fn member(&self, name: &str) -> SymbolRef {
        SymbolRef::new(
            self.module.clone(),
            smol_str::format_smolstr!("{}.{}", self.path, name),
        )
    }
}

impl fmt::Debug for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolRef({}.{})", self.module, self.path)
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.path)
    }
}
