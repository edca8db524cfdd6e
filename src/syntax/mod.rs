//! Front end for Python stub (`.pyi`) and usage (`.py`) files.
//!
//! Only the subset the resolver consumes is modelled: imports, class and
//! function signatures, annotated and plain assignments, and expressions built
//! from names, calls, attribute access, subscripts and literals. Everything
//! else parses as an opaque statement so the surrounding file stays usable.

mod ast;
mod lexer;
mod parser;

use smol_str::SmolStr;
use thiserror::Error;

use crate::base::TextRange;

pub use ast::{
    Arg, ClassDef, DottedName, Expr, ExprKind, FromImport, FromName, FromNames, FunctionDef,
    Ident, ImportAlias, Literal, NodeAt, Param, ParamKind, SourceFile, Stmt, StmtKind,
};
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{Parse, parse};

/// A syntax error with location and message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: SmolStr,
    pub range: TextRange,
}

impl SyntaxError {
    pub fn new(message: impl Into<SmolStr>, range: TextRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}
