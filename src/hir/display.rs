//! Rendering types and tables as text.
//!
//! Type names follow Python conventions: an instance renders as its class
//! name, the class object as `type[Class]`, functions as their signature.

use std::fmt::{self, Write};

use super::decl::ParamKind;
use super::table::{DeclarationTable, MemberBinding};
use super::types::{FunctionType, ParamType, Type};

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Class(class) => write!(f, "type[{}]", class.name()),
            Type::Function(func) => fmt::Display::fmt(func, f),
            Type::Scalar(name) => f.write_str(name),
            Type::Instance(class) => f.write_str(class.name()),
            Type::Module(module) => write!(f, "Module[{module}]"),
            Type::Unknown => f.write_str("Unknown"),
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('(')?;
        let mut seen_star = false;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match param.kind {
                ParamKind::VarArgs => seen_star = true,
                ParamKind::KeywordOnly if !seen_star => {
                    f.write_str("*, ")?;
                    seen_star = true;
                }
                _ => {}
            }
            fmt::Display::fmt(param, f)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParamKind::VarArgs => f.write_char('*')?,
            ParamKind::KwArgs => f.write_str("**")?,
            ParamKind::Positional | ParamKind::KeywordOnly => {}
        }
        f.write_str(&self.name)?;
        if let Some(ty) = &self.ty {
            write!(f, ": {ty}")?;
        }
        if self.has_default {
            f.write_str(" = ...")?;
        }
        Ok(())
    }
}

/// A stable, line-per-symbol dump of a table, for logs and snapshots.
///
/// ```text
/// types_stub
///   class MyClass: type[MyClass]
///     method get_value: () -> bool
///   constant MY_CONSTANT: int
/// ```
pub fn format_table(table: &DeclarationTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", table.module());
    for symbol in table.symbols() {
        let _ = writeln!(
            out,
            "  {} {}: {}",
            symbol.kind.display(),
            symbol.name,
            symbol.declared_type
        );
        if let Type::Class(class) = &symbol.declared_type {
            format_members(&mut out, table, &class.path, 2);
        }
    }
    out
}

fn format_members(out: &mut String, table: &DeclarationTable, path: &str, depth: usize) {
    let Some(class) = table.class(path) else {
        return;
    };
    let indent = "  ".repeat(depth);
    for member in class.members.values() {
        let marker = match member.binding {
            MemberBinding::Class => " [class]",
            MemberBinding::Instance => "",
        };
        let _ = writeln!(
            out,
            "{indent}{} {}: {}{marker}",
            member.symbol.kind.display(),
            member.symbol.name,
            member.symbol.declared_type
        );
        if let Type::Class(nested) = &member.symbol.declared_type {
            format_members(out, table, &nested.path, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::ids::{ModuleName, SymbolRef};
    use crate::hir::lower::lower_module;
    use crate::syntax;

    fn param(name: &str, kind: ParamKind, ty: Option<Type>, has_default: bool) -> ParamType {
        ParamType {
            name: name.into(),
            kind,
            ty,
            has_default,
        }
    }

    #[test]
    fn test_display_types() {
        let class = SymbolRef::new(ModuleName::new("types_stub"), "MyClass");
        assert_eq!(Type::Instance(class.clone()).to_string(), "MyClass");
        assert_eq!(Type::Class(class).to_string(), "type[MyClass]");
        assert_eq!(Type::Module(ModuleName::new("os.path")).to_string(), "Module[os.path]");
        assert_eq!(Type::scalar("list[int]").to_string(), "list[int]");
        assert_eq!(Type::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_display_signature() {
        let func = FunctionType::new(
            vec![
                param("a", ParamKind::Positional, Some(Type::scalar("int")), false),
                param("b", ParamKind::Positional, Some(Type::scalar("str")), false),
            ],
            Type::scalar("bool"),
        );
        assert_eq!(func.to_string(), "(a: int, b: str) -> bool");
    }

    #[test]
    fn test_display_signature_markers() {
        let keyword_only = FunctionType::new(
            vec![
                param("x", ParamKind::Positional, None, false),
                param("flag", ParamKind::KeywordOnly, Some(Type::scalar("bool")), true),
            ],
            Type::scalar("None"),
        );
        assert_eq!(keyword_only.to_string(), "(x, *, flag: bool = ...) -> None");

        let star = FunctionType::new(
            vec![
                param("args", ParamKind::VarArgs, Some(Type::scalar("int")), false),
                param("sep", ParamKind::KeywordOnly, None, true),
                param("kwargs", ParamKind::KwArgs, None, false),
            ],
            Type::Unknown,
        );
        assert_eq!(star.to_string(), "(*args: int, sep = ..., **kwargs) -> Unknown");
    }

    #[test]
    fn test_format_table() {
        let module = ModuleName::new("types_stub");
        let parse = syntax::parse(
            "class MyClass:\n    def get_value(self) -> bool: ...\n\
             \x20   @staticmethod\n    def make() -> int: ...\n\nMY_CONSTANT: int\n",
        );
        let lowered = lower_module(&module, false, &parse.file);
        let table = DeclarationTable::build(module, &lowered.declarations).unwrap();

        assert_eq!(
            format_table(&table),
            "\
types_stub
  class MyClass: type[MyClass]
    method get_value: () -> bool
    method make: () -> int [class]
  constant MY_CONSTANT: int
"
        );
    }
}
