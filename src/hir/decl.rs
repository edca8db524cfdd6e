//! Declaration records: the builder's input.
//!
//! A module arrives as an ordered sequence of [`Declaration`]s. They are plain
//! data produced by lowering a parsed stub (see [`super::lower`]) but can just
//! as well be constructed by hand.

use smol_str::SmolStr;

use crate::base::TextRange;

/// One top-level or class-level declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub name: SmolStr,
    pub range: TextRange,
    pub kind: DeclarationKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeclarationKind {
    Class(ClassDecl),
    Function(FunctionDecl),
    Constant(ConstantDecl),
    /// A construct the parser could not make sense of. Building a table from
    /// a sequence containing one of these fails.
    Malformed { message: SmolStr },
}

impl Declaration {
    pub fn class(name: impl Into<SmolStr>, range: TextRange, class: ClassDecl) -> Self {
        Self {
            name: name.into(),
            range,
            kind: DeclarationKind::Class(class),
        }
    }

    pub fn function(name: impl Into<SmolStr>, range: TextRange, func: FunctionDecl) -> Self {
        Self {
            name: name.into(),
            range,
            kind: DeclarationKind::Function(func),
        }
    }

    pub fn constant(name: impl Into<SmolStr>, range: TextRange, constant: ConstantDecl) -> Self {
        Self {
            name: name.into(),
            range,
            kind: DeclarationKind::Constant(constant),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassDecl {
    pub bases: Vec<TypeExpr>,
    pub body: Vec<Declaration>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunctionDecl {
    pub params: Vec<ParamDecl>,
    pub returns: Option<TypeExpr>,
    /// Dotted decorator names, e.g. `staticmethod`, `size.setter`.
    pub decorators: Vec<SmolStr>,
}

impl FunctionDecl {
    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators
            .iter()
            .any(|d| d == name || d.rsplit('.').next() == Some(name))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamDecl {
    pub name: SmolStr,
    pub kind: ParamKind,
    pub annotation: Option<TypeExpr>,
    pub has_default: bool,
}

impl ParamDecl {
    pub fn new(name: impl Into<SmolStr>, annotation: Option<TypeExpr>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Positional,
            annotation,
            has_default: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Positional,
    KeywordOnly,
    VarArgs,
    KwArgs,
}

/// `NAME: T`, `NAME: T = v` or `NAME = <literal>`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstantDecl {
    pub annotation: Option<TypeExpr>,
    /// The syntactic form of the assigned literal, if any.
    pub value: Option<LiteralKind>,
    /// Whether a value was assigned at all (literal or not).
    pub assigned: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Int,
    Float,
    Str,
    Bytes,
    Bool,
    None,
    Ellipsis,
}

impl LiteralKind {
    /// The scalar type a literal of this form declares. `...` declares nothing.
    pub fn scalar_name(self) -> Option<&'static str> {
        match self {
            LiteralKind::Int => Some("int"),
            LiteralKind::Float => Some("float"),
            LiteralKind::Str => Some("str"),
            LiteralKind::Bytes => Some("bytes"),
            LiteralKind::Bool => Some("bool"),
            LiteralKind::None => Some("None"),
            LiteralKind::Ellipsis => None,
        }
    }
}

/// A type annotation as written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    /// `int`, `MyClass`, `typing.Any`, `Outer.Inner`
    Name(SmolStr),
    /// `list[int]`, `dict[str, int]`, `Optional[T]`
    Generic { base: SmolStr, args: Vec<TypeExpr> },
    /// `A | B`
    Union(Vec<TypeExpr>),
    /// `[int, str]` inside `Callable[...]`
    List(Vec<TypeExpr>),
    /// `None`
    NoneType,
    /// `...` inside `tuple[int, ...]`
    Ellipsis,
    /// Anything else (string forward references that are not names, calls, ...).
    Opaque,
}

impl TypeExpr {
    pub fn name(name: impl Into<SmolStr>) -> Self {
        TypeExpr::Name(name.into())
    }

    pub fn generic(base: impl Into<SmolStr>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Generic {
            base: base.into(),
            args,
        }
    }
}
