//! High-level IR: declarations, tables, imports and type resolution.
//!
//! ```text
//! syntax::SourceFile
//!   └─ lower ──▶ Declaration records ──▶ DeclarationTable ──▶ ModuleRegistry
//!   └─ lower ──▶ ImportStatement / LocalAssignment ──▶ LocalScope
//!                                                         │
//!                            Resolver(snapshot, scope) ◀──┘
//! ```
//!
//! Tables are immutable once built. Cross-module references are name keyed
//! ([`SymbolRef`]) and looked up in a [`RegistrySnapshot`] when used, so a
//! reloaded module never leaves dangling pointers behind.

mod decl;
mod diagnostics;
mod display;
mod error;
mod ids;
mod imports;
mod lower;
mod registry;
mod resolve;
mod table;
mod types;

pub use decl::{
    ClassDecl, ConstantDecl, Declaration, DeclarationKind, FunctionDecl, LiteralKind, ParamDecl,
    ParamKind, TypeExpr,
};
pub use diagnostics::{
    Diagnostic, DiagnosticCollector, DocumentFacts, RelatedInfo, Severity, check_document, codes,
};
pub use display::format_table;
pub use error::BuildError;
pub use ids::{ModuleName, SymbolRef};
pub use imports::{
    BindingTarget, ImportBinder, ImportBinding, ImportStatement, ImportedName, LocalAssignment,
    LocalScope,
};
pub use lower::{LoweredModule, lower_module, lower_type};
pub use registry::{ModuleRegistry, RegistrySnapshot, builtins_table};
pub use resolve::{Resolver, Unresolved};
pub use table::{
    ClassInfo, DeclarationTable, InsertOutcome, Member, MemberAccess, MemberBinding, Redefinition,
    Symbol, SymbolKind,
};
pub use types::{FunctionType, ParamType, Type};
