//! Resolved type values.
//!
//! Types are immutable values. Class and instance types name their class by
//! [`SymbolRef`]; the declaration table that owns the class is looked up in the
//! registry whenever members are needed.

use smol_str::SmolStr;

use super::decl::ParamKind;
use super::ids::{ModuleName, SymbolRef};

/// The resolved type of a symbol or expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    /// The class object itself, e.g. the value of the name `MyClass`.
    Class(SymbolRef),
    /// A callable signature.
    Function(FunctionType),
    /// A builtin value type, rendered by name (`int`, `list[str]`, `int | None`).
    Scalar(SmolStr),
    /// An instance of a user-declared class.
    Instance(SymbolRef),
    /// A module object bound by `import m`.
    Module(ModuleName),
    /// Resolution produced nothing useful.
    Unknown,
}

impl Type {
    pub fn scalar(name: impl Into<SmolStr>) -> Self {
        Type::Scalar(name.into())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// The module the type comes from.
    pub fn origin_module(&self) -> Option<ModuleName> {
        match self {
            Type::Class(class) | Type::Instance(class) => Some(class.module.clone()),
            Type::Function(func) => func.symbol.as_ref().map(|s| s.module.clone()),
            Type::Scalar(_) => Some(ModuleName::builtins()),
            Type::Module(module) => Some(module.clone()),
            Type::Unknown => None,
        }
    }

    /// Module-qualified name, e.g. `types_stub.MyClass` or `builtins.int`.
    pub fn qualified_name(&self) -> Option<String> {
        match self {
            Type::Class(class) | Type::Instance(class) => Some(class.to_string()),
            Type::Function(func) => func.symbol.as_ref().map(ToString::to_string),
            Type::Scalar(name) if is_plain_name(name) => {
                Some(format!("{}.{}", ModuleName::BUILTINS, name))
            }
            Type::Module(module) => Some(module.to_string()),
            Type::Scalar(_) | Type::Unknown => None,
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// A function or method signature.
///
/// Bound methods carry their signature with the receiver already dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionType {
    pub params: Vec<ParamType>,
    pub ret: Box<Type>,
    /// The declaring symbol, for display and origin reporting.
    pub symbol: Option<SymbolRef>,
}

impl FunctionType {
    pub fn new(params: Vec<ParamType>, ret: Type) -> Self {
        Self {
            params,
            ret: Box::new(ret),
            symbol: None,
        }
    }

    pub fn with_symbol(mut self, symbol: SymbolRef) -> Self {
        self.symbol = Some(symbol);
        self
    }

    /// Drop the implicit receiver (`self` or `cls`), if present.
    pub fn bind_receiver(mut self) -> Self {
        if self
            .params
            .first()
            .is_some_and(|p| p.kind == ParamKind::Positional)
        {
            self.params.remove(0);
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamType {
    pub name: SmolStr,
    pub kind: ParamKind,
    /// `None` when the parameter carries no annotation.
    pub ty: Option<Type>,
    pub has_default: bool,
}
