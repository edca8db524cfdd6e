//! Syntax tree for the Python stub/usage subset.
//!
//! Nodes are plain owned data with byte ranges. The semantic layer reads
//! them for one build or query and never keeps references into them.

use smol_str::SmolStr;

use crate::base::{TextRange, TextSize};

/// A parsed file: its top-level statements in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceFile {
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// `import a.b as c, d`
    Import(Vec<ImportAlias>),
    /// `from .m import a, b as c` / `from m import *`
    FromImport(FromImport),
    ClassDef(ClassDef),
    FunctionDef(FunctionDef),
    /// `a = b = value`
    Assign { targets: Vec<Expr>, value: Expr },
    /// `target: annotation [= value]`
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    Expr(Expr),
    Pass,
    /// A compound or simple statement we parse past without modelling.
    Opaque,
    /// A statement the parser could not make sense of.
    Error(SmolStr),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub text: SmolStr,
    pub range: TextRange,
}

/// `a.b.c` in import statements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DottedName {
    pub parts: Vec<Ident>,
}

impl DottedName {
    pub fn text(&self) -> SmolStr {
        let parts: Vec<&str> = self.parts.iter().map(|p| p.text.as_str()).collect();
        SmolStr::new(parts.join("."))
    }

    pub fn range(&self) -> TextRange {
        match (self.parts.first(), self.parts.last()) {
            (Some(first), Some(last)) => first.range.cover(last.range),
            _ => TextRange::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportAlias {
    pub path: DottedName,
    pub alias: Option<Ident>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FromImport {
    /// Number of leading dots for relative imports.
    pub level: u32,
    pub module: Option<DottedName>,
    pub names: FromNames,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FromNames {
    Star(TextRange),
    Names(Vec<FromName>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FromName {
    pub name: Ident,
    pub alias: Option<Ident>,
}

impl FromName {
    /// The name this import introduces into the importing module.
    pub fn local(&self) -> &Ident {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassDef {
    pub name: Ident,
    pub bases: Vec<Arg>,
    pub decorators: Vec<Expr>,
    pub body: Vec<Stmt>,
}

/// A function signature. Bodies are skipped by the parser.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: Ident,
    pub params: Vec<Param>,
    pub returns: Option<Expr>,
    pub decorators: Vec<Expr>,
    pub is_async: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub kind: ParamKind,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Positional,
    KeywordOnly,
    /// `*args`
    VarArgs,
    /// `**kwargs`
    KwArgs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub range: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Name(SmolStr),
    Call { callee: Box<Expr>, args: Vec<Arg> },
    Attribute { base: Box<Expr>, attr: Ident },
    Subscript { base: Box<Expr>, items: Vec<Expr> },
    BinOp {
        lhs: Box<Expr>,
        op: SmolStr,
        rhs: Box<Expr>,
    },
    Literal(Literal),
    /// Containers, unary operators, conditionals and the like.
    Other(Vec<Expr>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Int,
    Float,
    Str(SmolStr),
    Bytes,
    Bool(bool),
    None,
    Ellipsis,
}

/// A call argument or class base; `name` is set for keyword arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Arg {
    pub name: Option<Ident>,
    pub value: Expr,
}

impl Expr {
    pub fn new(kind: ExprKind, range: TextRange) -> Self {
        Self { kind, range }
    }

    pub fn as_name(&self) -> Option<&SmolStr> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Name(_) | ExprKind::Literal(_) => Vec::new(),
            ExprKind::Call { callee, args } => std::iter::once(callee.as_ref())
                .chain(args.iter().map(|arg| &arg.value))
                .collect(),
            ExprKind::Attribute { base, .. } => vec![base.as_ref()],
            ExprKind::Subscript { base, items } => {
                std::iter::once(base.as_ref()).chain(items.iter()).collect()
            }
            ExprKind::BinOp { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            ExprKind::Other(children) => children.iter().collect(),
        }
    }

    /// The smallest expression within `self` whose range contains `offset`.
    pub fn node_at(&self, offset: TextSize) -> Option<&Expr> {
        if !self.range.contains(offset) {
            return None;
        }
        self.children()
            .into_iter()
            .find_map(|child| child.node_at(offset))
            .or(Some(self))
    }
}

/// What sits under a cursor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeAt<'a> {
    /// An expression in a module-level statement.
    Expr(&'a Expr),
    /// A name bound by the enclosing statement: assignment targets, imported
    /// names, class/function/constant names. Its type is whatever a reference
    /// just after the statement would see.
    Binding {
        name: &'a SmolStr,
        range: TextRange,
        visible_from: TextSize,
    },
}

impl SourceFile {
    /// Find the smallest node whose span contains `offset`.
    ///
    /// Only module-level statements are searched; class bodies and function
    /// bodies are not query targets.
    pub fn node_at(&self, offset: TextSize) -> Option<NodeAt<'_>> {
        let stmt = self.body.iter().find(|s| s.range.contains(offset))?;
        stmt.node_at(offset)
    }
}

impl Stmt {
    fn binding<'a>(&self, ident: &'a Ident) -> NodeAt<'a> {
        NodeAt::Binding {
            name: &ident.text,
            range: ident.range,
            visible_from: self.range.end(),
        }
    }

    fn node_at(&self, offset: TextSize) -> Option<NodeAt<'_>> {
        match &self.kind {
            StmtKind::Import(aliases) => aliases.iter().find_map(|alias| {
                let local = alias.alias.as_ref().or(alias.path.parts.first())?;
                let hit = alias.path.range().contains(offset)
                    || alias.alias.as_ref().is_some_and(|a| a.range.contains(offset));
                hit.then(|| self.binding(local))
            }),
            StmtKind::FromImport(from) => match &from.names {
                FromNames::Star(_) => None,
                FromNames::Names(names) => names
                    .iter()
                    .find(|n| {
                        n.name.range.contains(offset)
                            || n.alias.as_ref().is_some_and(|a| a.range.contains(offset))
                    })
                    .map(|n| self.binding(n.local())),
            },
            StmtKind::ClassDef(class) => {
                if class.name.range.contains(offset) {
                    return Some(self.binding(&class.name));
                }
                expr_at(
                    class
                        .decorators
                        .iter()
                        .chain(class.bases.iter().map(|b| &b.value)),
                    offset,
                )
            }
            StmtKind::FunctionDef(func) => {
                if func.name.range.contains(offset) {
                    return Some(self.binding(&func.name));
                }
                expr_at(
                    func.decorators
                        .iter()
                        .chain(func.params.iter().flat_map(|p| {
                            p.annotation.iter().chain(p.default.iter())
                        }))
                        .chain(func.returns.iter()),
                    offset,
                )
            }
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    if let ExprKind::Name(name) = &target.kind {
                        if target.range.contains(offset) {
                            return Some(NodeAt::Binding {
                                name,
                                range: target.range,
                                visible_from: self.range.end(),
                            });
                        }
                    }
                }
                expr_at(targets.iter().chain(std::iter::once(value)), offset)
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                if let ExprKind::Name(name) = &target.kind {
                    if target.range.contains(offset) {
                        return Some(NodeAt::Binding {
                            name,
                            range: target.range,
                            visible_from: self.range.end(),
                        });
                    }
                }
                expr_at(
                    std::iter::once(target)
                        .chain(std::iter::once(annotation))
                        .chain(value.iter()),
                    offset,
                )
            }
            StmtKind::Expr(expr) => expr.node_at(offset).map(NodeAt::Expr),
            StmtKind::Pass | StmtKind::Opaque | StmtKind::Error(_) => None,
        }
    }
}

fn expr_at<'a>(mut exprs: impl Iterator<Item = &'a Expr>, offset: TextSize) -> Option<NodeAt<'a>> {
    exprs.find_map(|e| e.node_at(offset)).map(NodeAt::Expr)
}
