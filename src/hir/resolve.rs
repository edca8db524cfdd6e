//! Expression resolution: from syntax to declared types.
//!
//! The [`Resolver`] answers "what type does this expression have?" using only
//! declared information: no inference, no narrowing, no generics.
//!
//! # Lookup order for a bare name at an offset
//!
//! 1. The later of the latest visible module-level assignment and the latest
//!    visible import binding
//! 2. The document's own declaration table, when it is a loaded module
//! 3. Builtins
//!
//! An annotated assignment (`x: MyClass = ...`) takes its type from the
//! annotation when that names a class, and from its value otherwise.
//!
//! An assignment's value is resolved at its own position, which precedes the
//! point where the assignment becomes visible. Self-referential assignments
//! therefore see an earlier binding or nothing, and resolution terminates.

use std::sync::Arc;

use smol_str::{SmolStr, format_smolstr};
use thiserror::Error;
use tracing::trace;

use super::ids::{ModuleName, SymbolRef};
use super::imports::{BindingTarget, ImportBinding, LocalAssignment, LocalScope};
use super::registry::RegistrySnapshot;
use super::table::{DeclarationTable, MemberAccess, Symbol};
use super::types::Type;
use crate::base::TextSize;
use crate::syntax::{Expr, ExprKind, Literal};

// ============================================================================
// FAILURE REASONS
// ============================================================================

/// Why an expression has no declared type.
///
/// Resolution failures are values, not errors to propagate to the caller of a
/// query: they become the `Unknown` type with this reason attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unresolved {
    #[error("name '{name}' is not defined")]
    UnboundName { name: SmolStr },

    #[error("'{name}' refers to '{symbol}', which no longer exists")]
    StaleBinding { name: SmolStr, symbol: SymbolRef },

    #[error("module '{module}' is not loaded")]
    MissingModule { module: ModuleName },

    #[error("module '{module}' has no symbol '{name}'")]
    MissingName { module: ModuleName, name: SmolStr },

    #[error("'{ty}' has no attribute '{attr}'")]
    MissingAttribute { ty: SmolStr, attr: SmolStr },

    #[error("'{ty}' is not callable")]
    NotCallable { ty: SmolStr },

    #[error("{what} expressions are not resolved")]
    UnsupportedExpression { what: &'static str },

    #[error("'{what}' has no declared type")]
    NoDeclaredType { what: SmolStr },
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves expressions of one document against one registry snapshot.
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'a> {
    snapshot: &'a RegistrySnapshot,
    scope: &'a LocalScope,
}

impl<'a> Resolver<'a> {
    pub fn new(snapshot: &'a RegistrySnapshot, scope: &'a LocalScope) -> Self {
        Self { snapshot, scope }
    }

    /// The declared type of `expr`, or [`Type::Unknown`].
    pub fn resolve(&self, expr: &Expr) -> Type {
        self.try_resolve(expr).unwrap_or_else(|reason| {
            trace!(range = ?expr.range, %reason, "expression unresolved");
            Type::Unknown
        })
    }

    /// The declared type of `expr`, or why there is none.
    ///
    /// Never returns `Ok(Type::Unknown)`.
    pub fn try_resolve(&self, expr: &Expr) -> Result<Type, Unresolved> {
        match &expr.kind {
            ExprKind::Name(name) => self.resolve_name(name, expr.range.start()),
            ExprKind::Call { callee, .. } => {
                let callee = self.try_resolve(callee)?;
                self.call(&callee)
            }
            ExprKind::Attribute { base, attr } => {
                let base = self.try_resolve(base)?;
                self.attribute(&base, &attr.text)
            }
            ExprKind::Literal(literal) => literal_type(literal),
            ExprKind::Subscript { .. } => Err(Unresolved::UnsupportedExpression {
                what: "subscript",
            }),
            ExprKind::BinOp { .. } => Err(Unresolved::UnsupportedExpression {
                what: "operator",
            }),
            ExprKind::Other(_) => Err(Unresolved::UnsupportedExpression { what: "compound" }),
        }
    }

    /// The type a reference to `name` at `at` would see.
    ///
    /// Of the assignments and imports visible at `at`, the textually later
    /// one wins. Names bound by neither come from the module's own table and
    /// then from builtins.
    pub fn resolve_name(&self, name: &str, at: TextSize) -> Result<Type, Unresolved> {
        match (self.scope.assignment(name, at), self.scope.import(name, at)) {
            (Some(assignment), Some(binding))
                if binding.visible_from > assignment.available_from =>
            {
                return self.imported(name, binding);
            }
            (Some(assignment), _) => return self.assigned(assignment),
            (None, Some(binding)) => return self.imported(name, binding),
            (None, None) => {}
        }

        if let Some(symbol) = self.own_symbol(name) {
            return declared_type(symbol);
        }

        if let Some(symbol) = self.snapshot.builtins().and_then(|t| t.get(name)) {
            return declared_type(symbol);
        }

        Err(Unresolved::UnboundName {
            name: SmolStr::new(name),
        })
    }

    fn assigned(&self, assignment: &LocalAssignment) -> Result<Type, Unresolved> {
        trace!(name = %assignment.name, "resolved to local assignment");
        if let Some(annotation) = &assignment.annotation {
            if let Ok(ty) = self.annotation(&assignment.name, annotation) {
                return Ok(ty);
            }
            // Annotations that are not plain class references (`list[int]`)
            // were already resolved by the table builder.
            let declared = self
                .own_symbol(&assignment.name)
                .filter(|symbol| symbol.range == assignment.range)
                .map(|symbol| &symbol.declared_type)
                .filter(|ty| !ty.is_unknown());
            if let Some(ty) = declared {
                return Ok(ty.clone());
            }
        }

        match &assignment.value {
            Some(value) => self.try_resolve(value),
            None => Err(Unresolved::NoDeclaredType {
                what: assignment.name.clone(),
            }),
        }
    }

    /// The type an annotation declares: `x: MyClass` is an instance of the
    /// class the name refers to.
    fn annotation(&self, name: &SmolStr, annotation: &Expr) -> Result<Type, Unresolved> {
        match self.try_resolve(annotation)? {
            class @ Type::Class(_) => self.call(&class),
            _ => Err(Unresolved::NoDeclaredType { what: name.clone() }),
        }
    }

    fn imported(&self, name: &str, binding: &ImportBinding) -> Result<Type, Unresolved> {
        trace!(name, source = %binding.source_module, "resolved to import binding");
        match &binding.target {
            BindingTarget::Symbol(symbol) => {
                let declared = self
                    .symbol(symbol)
                    .ok_or_else(|| Unresolved::StaleBinding {
                        name: SmolStr::new(name),
                        symbol: symbol.clone(),
                    })?;
                declared_type(declared)
            }
            BindingTarget::Module(module) => {
                if self.snapshot.has_module(module) {
                    Ok(Type::Module(module.clone()))
                } else {
                    Err(Unresolved::MissingModule {
                        module: module.clone(),
                    })
                }
            }
            BindingTarget::Unresolved(reason) => Err(reason.clone()),
        }
    }

    fn own_symbol(&self, name: &str) -> Option<&'a Symbol> {
        let module = self.scope.module()?;
        self.snapshot.get(module)?.get(name)
    }

    /// The type of `base.attr`.
    pub fn attribute(&self, base: &Type, attr: &str) -> Result<Type, Unresolved> {
        let missing = || Unresolved::MissingAttribute {
            ty: format_smolstr!("{base}"),
            attr: SmolStr::new(attr),
        };

        match base {
            Type::Instance(class) => self.member(class, attr, MemberAccess::Instance, missing),
            Type::Class(class) => self.member(class, attr, MemberAccess::Class, missing),
            Type::Scalar(name) => {
                // Members come from the builtin class of the base name.
                let class = scalar_class(name).ok_or_else(missing)?;
                let builtins = self.snapshot.builtins().ok_or_else(missing)?;
                let member = builtins
                    .lookup_member(class, attr, MemberAccess::Instance)
                    .ok_or_else(missing)?;
                member_type(&member.symbol, attr)
            }
            Type::Module(module) => {
                if let Some(symbol) = self.snapshot.get(module).and_then(|t| t.get(attr)) {
                    return declared_type(symbol);
                }
                let submodule = module.child(attr);
                if self.snapshot.has_module(&submodule) {
                    return Ok(Type::Module(submodule));
                }
                Err(missing())
            }
            Type::Function(_) | Type::Unknown => Err(missing()),
        }
    }

    /// The type of calling a value of type `callee`.
    ///
    /// Arguments are not checked; only the declared result matters.
    pub fn call(&self, callee: &Type) -> Result<Type, Unresolved> {
        let not_callable = || Unresolved::NotCallable {
            ty: format_smolstr!("{callee}"),
        };

        match callee {
            Type::Function(func) => {
                if func.ret.is_unknown() {
                    let what = func
                        .symbol
                        .as_ref()
                        .map_or_else(|| SmolStr::new("call"), |s| format_smolstr!("{s}"));
                    return Err(Unresolved::NoDeclaredType { what });
                }
                Ok((*func.ret).clone())
            }
            // Calling a builtin class produces its scalar value.
            Type::Class(class) if class.module.is_builtins() => {
                Ok(Type::Scalar(class.path.clone()))
            }
            Type::Class(class) => Ok(Type::Instance(class.clone())),
            Type::Instance(class) => {
                let table = self.table(&class.module)?;
                match table
                    .lookup_member(&class.path, "__call__", MemberAccess::Instance)
                    .map(|m| &m.symbol.declared_type)
                {
                    Some(method @ Type::Function(_)) => self.call(method),
                    _ => Err(not_callable()),
                }
            }
            Type::Scalar(_) | Type::Module(_) | Type::Unknown => Err(not_callable()),
        }
    }

    fn member(
        &self,
        class: &SymbolRef,
        attr: &str,
        access: MemberAccess,
        missing: impl FnOnce() -> Unresolved,
    ) -> Result<Type, Unresolved> {
        let table = self.table(&class.module)?;
        let member = table
            .lookup_member(&class.path, attr, access)
            .ok_or_else(missing)?;
        member_type(&member.symbol, attr)
    }

    fn table(&self, module: &ModuleName) -> Result<&'a DeclarationTable, Unresolved> {
        self.snapshot
            .get(module)
            .map(Arc::as_ref)
            .ok_or_else(|| Unresolved::MissingModule {
                module: module.clone(),
            })
    }

    fn symbol(&self, symbol: &SymbolRef) -> Option<&'a Symbol> {
        self.snapshot.get(&symbol.module)?.get(&symbol.path)
    }
}

fn declared_type(symbol: &Symbol) -> Result<Type, Unresolved> {
    member_type(symbol, &symbol.name)
}

fn member_type(symbol: &Symbol, what: &str) -> Result<Type, Unresolved> {
    if symbol.declared_type.is_unknown() {
        return Err(Unresolved::NoDeclaredType {
            what: SmolStr::new(what),
        });
    }
    Ok(symbol.declared_type.clone())
}

fn literal_type(literal: &Literal) -> Result<Type, Unresolved> {
    let name = match literal {
        Literal::Int => "int",
        Literal::Float => "float",
        Literal::Str(_) => "str",
        Literal::Bytes => "bytes",
        Literal::Bool(_) => "bool",
        Literal::None => "None",
        Literal::Ellipsis => {
            return Err(Unresolved::UnsupportedExpression { what: "ellipsis" });
        }
    };
    Ok(Type::scalar(name))
}

/// The builtin class whose members a scalar value has.
///
/// `list[int]` has the members of `list`; unions have no single class.
fn scalar_class(name: &str) -> Option<&str> {
    if name.contains('|') {
        return None;
    }
    let base = name.split_once('[').map_or(name, |(base, _)| base);
    Some(base.trim())
}
