//! Lowering from the syntax tree to declaration records.
//!
//! One pass over the module-level statements produces three things:
//! declarations for the table builder, import statements for the binder,
//! and the plain assignments a local scope needs to answer queries.

use smol_str::SmolStr;

use super::decl::{
    ClassDecl, ConstantDecl, Declaration, DeclarationKind, FunctionDecl, LiteralKind, ParamDecl,
    ParamKind, TypeExpr,
};
use super::ids::ModuleName;
use super::imports::{ImportStatement, ImportedName, LocalAssignment};
use crate::syntax::{self, Expr, ExprKind, FromNames, Literal, SourceFile, Stmt, StmtKind};

/// The semantic view of one parsed file.
#[derive(Clone, Debug, Default)]
pub struct LoweredModule {
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportStatement>,
    pub assignments: Vec<LocalAssignment>,
}

/// Lower a parsed module. `is_package` is true for `__init__` files, which
/// changes how relative imports resolve.
pub fn lower_module(module: &ModuleName, is_package: bool, file: &SourceFile) -> LoweredModule {
    let mut lowered = LoweredModule::default();

    for stmt in &file.body {
        match &stmt.kind {
            StmtKind::Import(aliases) => {
                for alias in aliases {
                    lowered.imports.push(ImportStatement::Module {
                        module: ModuleName::new(alias.path.text()),
                        alias: alias.alias.as_ref().map(|a| a.text.clone()),
                        module_range: alias.path.range(),
                        range: stmt.range,
                    });
                }
            }
            StmtKind::FromImport(from) => {
                let tail = from.module.as_ref().map(|m| m.text());
                let module_range = from
                    .module
                    .as_ref()
                    .map_or(stmt.range, syntax::DottedName::range);
                let source = module
                    .resolve_relative(is_package, from.level, tail.as_deref())
                    .unwrap_or_else(|| unresolvable_relative(from.level, tail.as_deref()));

                lowered.imports.push(match &from.names {
                    FromNames::Star(_) => ImportStatement::FromStar {
                        module: source,
                        module_range,
                        range: stmt.range,
                    },
                    FromNames::Names(names) => ImportStatement::From {
                        module: source,
                        names: names
                            .iter()
                            .map(|n| ImportedName {
                                name: n.name.text.clone(),
                                alias: n.alias.as_ref().map(|a| a.text.clone()),
                                range: n.name.range,
                            })
                            .collect(),
                        module_range,
                        range: stmt.range,
                    },
                });
            }
            StmtKind::Assign { targets, value } => {
                for target in targets {
                    let ExprKind::Name(name) = &target.kind else {
                        continue;
                    };
                    lowered.assignments.push(LocalAssignment {
                        name: name.clone(),
                        range: target.range,
                        annotation: None,
                        value: Some(value.clone()),
                        available_from: stmt.range.end(),
                    });
                    if let Some(literal) = literal_kind(value) {
                        lowered.declarations.push(Declaration::constant(
                            name.clone(),
                            target.range,
                            ConstantDecl {
                                annotation: None,
                                value: Some(literal),
                                assigned: true,
                            },
                        ));
                    }
                }
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                // Also a table constant, but only the scope sees the imports
                // the annotation may name.
                if let ExprKind::Name(name) = &target.kind {
                    lowered.assignments.push(LocalAssignment {
                        name: name.clone(),
                        range: target.range,
                        annotation: Some(annotation.clone()),
                        value: value.clone(),
                        available_from: stmt.range.end(),
                    });
                }
                lowered.declarations.extend(lower_declaration(stmt));
            }
            _ => lowered.declarations.extend(lower_declaration(stmt)),
        }
    }

    lowered
}

fn unresolvable_relative(level: u32, tail: Option<&str>) -> ModuleName {
    let dots = ".".repeat(level as usize);
    ModuleName::new(format!("{dots}{}", tail.unwrap_or_default()))
}

/// Lower a statement that declares something, in module or class scope.
fn lower_declaration(stmt: &Stmt) -> Option<Declaration> {
    match &stmt.kind {
        StmtKind::ClassDef(class) => Some(Declaration::class(
            class.name.text.clone(),
            stmt.range,
            ClassDecl {
                bases: class
                    .bases
                    .iter()
                    .filter(|arg| arg.name.is_none())
                    .map(|arg| lower_type(&arg.value))
                    .collect(),
                body: class.body.iter().filter_map(lower_class_member).collect(),
            },
        )),
        StmtKind::FunctionDef(func) => Some(Declaration::function(
            func.name.text.clone(),
            stmt.range,
            FunctionDecl {
                params: func
                    .params
                    .iter()
                    .map(|p| ParamDecl {
                        name: p.name.text.clone(),
                        kind: match p.kind {
                            syntax::ParamKind::Positional => ParamKind::Positional,
                            syntax::ParamKind::KeywordOnly => ParamKind::KeywordOnly,
                            syntax::ParamKind::VarArgs => ParamKind::VarArgs,
                            syntax::ParamKind::KwArgs => ParamKind::KwArgs,
                        },
                        annotation: p.annotation.as_ref().map(lower_type),
                        has_default: p.default.is_some(),
                    })
                    .collect(),
                returns: func.returns.as_ref().map(lower_type),
                decorators: func.decorators.iter().filter_map(decorator_name).collect(),
            },
        )),
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            let name = target.as_name()?;
            Some(Declaration::constant(
                name.clone(),
                target.range,
                ConstantDecl {
                    annotation: Some(lower_type(annotation)),
                    value: value.as_ref().and_then(literal_kind),
                    assigned: value.is_some(),
                },
            ))
        }
        StmtKind::Error(message) => Some(Declaration {
            name: SmolStr::default(),
            range: stmt.range,
            kind: DeclarationKind::Malformed {
                message: message.clone(),
            },
        }),
        _ => None,
    }
}

fn lower_class_member(stmt: &Stmt) -> Option<Declaration> {
    match &stmt.kind {
        // Class attributes assigned without annotation: `x = 1`, `y = SomeCall()`.
        StmtKind::Assign { targets, value } => {
            let name = targets.first()?.as_name()?;
            Some(Declaration::constant(
                name.clone(),
                stmt.range,
                ConstantDecl {
                    annotation: None,
                    value: literal_kind(value),
                    assigned: true,
                },
            ))
        }
        _ => lower_declaration(stmt),
    }
}

fn literal_kind(expr: &Expr) -> Option<LiteralKind> {
    match &expr.kind {
        ExprKind::Literal(literal) => Some(match literal {
            Literal::Int => LiteralKind::Int,
            Literal::Float => LiteralKind::Float,
            Literal::Str(_) => LiteralKind::Str,
            Literal::Bytes => LiteralKind::Bytes,
            Literal::Bool(_) => LiteralKind::Bool,
            Literal::None => LiteralKind::None,
            Literal::Ellipsis => LiteralKind::Ellipsis,
        }),
        _ => None,
    }
}

/// `a.b.c` for a chain of names and attribute accesses.
fn dotted_path(expr: &Expr) -> Option<SmolStr> {
    match &expr.kind {
        ExprKind::Name(name) => Some(name.clone()),
        ExprKind::Attribute { base, attr } => {
            let base = dotted_path(base)?;
            Some(smol_str::format_smolstr!("{base}.{}", attr.text))
        }
        _ => None,
    }
}

fn decorator_name(expr: &Expr) -> Option<SmolStr> {
    match &expr.kind {
        ExprKind::Call { callee, .. } => dotted_path(callee),
        _ => dotted_path(expr),
    }
}

/// Lower an annotation expression.
pub fn lower_type(expr: &Expr) -> TypeExpr {
    match &expr.kind {
        ExprKind::Name(_) | ExprKind::Attribute { .. } => {
            dotted_path(expr).map_or(TypeExpr::Opaque, TypeExpr::Name)
        }
        ExprKind::Literal(Literal::None) => TypeExpr::NoneType,
        ExprKind::Literal(Literal::Ellipsis) => TypeExpr::Ellipsis,
        ExprKind::Literal(Literal::Str(text)) => forward_reference(text),
        ExprKind::Subscript { base, items } => match dotted_path(base) {
            Some(base) => TypeExpr::Generic {
                base,
                args: items.iter().map(lower_type).collect(),
            },
            None => TypeExpr::Opaque,
        },
        ExprKind::BinOp { lhs, op, rhs } if op == "|" => {
            let mut members = Vec::new();
            for side in [lower_type(lhs), lower_type(rhs)] {
                match side {
                    TypeExpr::Union(inner) => members.extend(inner),
                    other => members.push(other),
                }
            }
            TypeExpr::Union(members)
        }
        ExprKind::Other(items) => TypeExpr::List(items.iter().map(lower_type).collect()),
        ExprKind::Literal(_) | ExprKind::Call { .. } | ExprKind::BinOp { .. } => TypeExpr::Opaque,
    }
}

/// A quoted annotation such as `"MyClass"` or `"list[MyClass]"`.
fn forward_reference(text: &str) -> TypeExpr {
    let parse = syntax::parse(text.trim());
    if !parse.ok() {
        return TypeExpr::Opaque;
    }
    match parse.file.body.as_slice() {
        [Stmt {
            kind: StmtKind::Expr(expr),
            ..
        }] => match &expr.kind {
            // Nested quotes are not annotations.
            ExprKind::Literal(Literal::Str(_)) => TypeExpr::Opaque,
            _ => lower_type(expr),
        },
        _ => TypeExpr::Opaque,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(text: &str) -> LoweredModule {
        let parse = syntax::parse(text);
        lower_module(&ModuleName::new("pkg.usage"), false, &parse.file)
    }

    #[test]
    fn test_lower_stub_declarations() {
        let lowered = lower(
            "\
class MyClass:
    def __init__(self, x: int): ...
    def get_value(self) -> bool: ...

def utility_function(a: int, b: str) -> bool: ...

MY_CONSTANT: int
",
        );

        let names: Vec<_> = lowered.declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["MyClass", "utility_function", "MY_CONSTANT"]);

        let DeclarationKind::Class(class) = &lowered.declarations[0].kind else {
            panic!("expected class");
        };
        assert_eq!(class.body.len(), 2);

        let DeclarationKind::Function(func) = &lowered.declarations[1].kind else {
            panic!("expected function");
        };
        assert_eq!(func.params[1].annotation, Some(TypeExpr::name("str")));
        assert_eq!(func.returns, Some(TypeExpr::name("bool")));
    }

    #[test]
    fn test_lower_assignments() {
        let lowered = lower("LIMIT = 10\ninstance = MyClass(42)\n");

        assert_eq!(lowered.declarations.len(), 1);
        assert_eq!(lowered.declarations[0].name, "LIMIT");
        assert_eq!(lowered.assignments.len(), 2);
        assert_eq!(lowered.assignments[1].name, "instance");
        assert_eq!(u32::from(lowered.assignments[1].available_from), 33);
    }

    #[test]
    fn test_lower_annotated_assignments() {
        let lowered = lower("x: MyClass = MyClass(1)
y: int
");

        let names: Vec<_> = lowered.declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(lowered.assignments.len(), 2);
        assert!(lowered.assignments[0].annotation.is_some());
        assert!(lowered.assignments[0].value.is_some());
        assert!(lowered.assignments[1].value.is_none());
    }

    #[test]
    fn test_lower_relative_imports() {
        let lowered =
            lower("from . import sibling\nfrom .types import MyClass\nimport os.path as p\n");

        let modules: Vec<_> = lowered
            .imports
            .iter()
            .map(|i| i.module().as_str().to_owned())
            .collect();
        assert_eq!(modules, vec!["pkg", "pkg.types", "os.path"]);
    }

    #[test]
    fn test_lower_types() {
        let lowered = lower(
            "a: dict[str, int]\nb: int | None\nc: \"MyClass\"\nd: Callable[[int], str]\n",
        );
        let annotation = |idx: usize| match &lowered.declarations[idx].kind {
            DeclarationKind::Constant(c) => c.annotation.clone(),
            other => panic!("expected constant, got {other:?}"),
        };

        assert_eq!(
            annotation(0),
            Some(TypeExpr::generic(
                "dict",
                vec![TypeExpr::name("str"), TypeExpr::name("int")]
            ))
        );
        assert_eq!(
            annotation(1),
            Some(TypeExpr::Union(vec![TypeExpr::name("int"), TypeExpr::NoneType]))
        );
        assert_eq!(annotation(2), Some(TypeExpr::name("MyClass")));
        assert_eq!(
            annotation(3),
            Some(TypeExpr::generic(
                "Callable",
                vec![TypeExpr::List(vec![TypeExpr::name("int")]), TypeExpr::name("str")]
            ))
        );
    }

    #[test]
    fn test_lower_parse_error_is_malformed() {
        let lowered = lower("class Broken(:\n    pass\n");
        assert!(matches!(
            lowered.declarations[0].kind,
            DeclarationKind::Malformed { .. }
        ));
    }

    #[test]
    fn test_lower_decorators() {
        let lowered = lower(
            "\
class C:
    @staticmethod
    def make() -> C: ...
    @functools.cache()
    def cached(self) -> int: ...
",
        );
        let DeclarationKind::Class(class) = &lowered.declarations[0].kind else {
            panic!("expected class");
        };
        let decorators: Vec<_> = class
            .body
            .iter()
            .map(|d| match &d.kind {
                DeclarationKind::Function(f) => f.decorators.clone(),
                _ => Vec::new(),
            })
            .collect();
        assert_eq!(
            decorators,
            vec![
                vec![SmolStr::new("staticmethod")],
                vec![SmolStr::new("functools.cache")]
            ]
        );
    }
}
