//! # stubtype-base
//!
//! Core library for resolving the declared types of Python symbols through
//! stub (`.pyi`) files.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide     → AnalysisHost, type queries, inlay hints, diagnostics
//!   ↓
//! hir     → Declaration tables, module registry, import binding, resolution
//!   ↓
//! syntax  → Lexer + parser for the stub/usage subset, position lookup
//!   ↓
//! base    → Primitives (FileId, FileSet, TextRange, LineIndex)
//!
//! project → Stub directory loader, feeds an AnalysisHost
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Foundation types: FileId, FileSet, positions
pub mod base;

/// Declarations, tables, registry and the expression resolver
pub mod hir;

/// Query API: AnalysisHost / Analysis snapshots
pub mod ide;

/// Loading stubs from search roots
pub mod project;

/// Lexer, parser and syntax tree
pub mod syntax;

// Re-export commonly needed items
pub use base::{FileId, LineCol, LineIndex, TextRange, TextSize};
pub use hir::{ModuleName, ModuleRegistry, RegistrySnapshot, Type};
pub use ide::{Analysis, AnalysisHost, ProvideTypeResponse, TypeDescriptor, TypeKind};
