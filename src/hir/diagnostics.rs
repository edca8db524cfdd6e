//! Diagnostics: import and declaration problems in a document.
//!
//! Resolution never fails loudly, so these are the only place unresolved
//! imports and shadowed declarations surface to a user.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::imports::{BindingTarget, ImportStatement, LocalScope};
use super::registry::RegistrySnapshot;
use super::resolve::Unresolved;
use super::table::Redefinition;
use crate::base::{FileId, LineIndex, TextRange};
use crate::syntax::SyntaxError;

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Convert to LSP severity number.
    pub fn to_lsp(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Info => 3,
            Severity::Hint => 4,
        }
    }
}

/// A diagnostic message with location. Lines and columns are 0-indexed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: FileId,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub severity: Severity,
    /// Error/warning code (e.g., "E0001").
    pub code: Option<Arc<str>>,
    pub message: Arc<str>,
    pub related: Vec<RelatedInfo>,
}

/// Related information for a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedInfo {
    pub file: FileId,
    pub line: u32,
    pub col: u32,
    pub message: Arc<str>,
}

impl Diagnostic {
    pub fn error(file: FileId, line: u32, col: u32, message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Error, file, line, col, message)
    }

    pub fn warning(file: FileId, line: u32, col: u32, message: impl Into<Arc<str>>) -> Self {
        Self::new(Severity::Warning, file, line, col, message)
    }

    fn new(
        severity: Severity,
        file: FileId,
        line: u32,
        col: u32,
        message: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            file,
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
            severity,
            code: None,
            message: message.into(),
            related: Vec::new(),
        }
    }

    /// Set the end of the span.
    pub fn with_span(mut self, end_line: u32, end_col: u32) -> Self {
        self.end_line = end_line;
        self.end_col = end_col;
        self
    }

    pub fn with_code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

pub mod codes {
    /// A name imported from a loaded module that does not declare it.
    pub const UNRESOLVED_IMPORT: &str = "E0001";
    /// An import from a module that is not loaded.
    pub const MISSING_MODULE: &str = "E0008";
    /// The document could not be parsed.
    pub const SYNTAX_ERROR: &str = "E0009";

    /// A name declared twice in the same scope; the later one wins.
    pub const REDEFINITION: &str = "W0004";
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics for one file, converting offsets to line/column.
#[derive(Clone, Debug)]
pub struct DiagnosticCollector<'a> {
    file: FileId,
    line_index: &'a LineIndex,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> DiagnosticCollector<'a> {
    pub fn new(file: FileId, line_index: &'a LineIndex) -> Self {
        Self {
            file,
            line_index,
            diagnostics: Vec::new(),
        }
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn at(&self, severity: Severity, range: TextRange, message: String) -> Diagnostic {
        let start = self.line_index.line_col(range.start());
        let end = self.line_index.line_col(range.end());
        Diagnostic::new(severity, self.file, start.line, start.col, message)
            .with_span(end.line, end.col)
    }

    pub fn syntax_error(&mut self, error: &SyntaxError) {
        let diagnostic = self
            .at(Severity::Error, error.range, error.message.to_string())
            .with_code(codes::SYNTAX_ERROR);
        self.add(diagnostic);
    }

    pub fn unresolved_import(&mut self, range: TextRange, reason: &Unresolved) {
        let diagnostic = self
            .at(Severity::Error, range, format!("unresolved import: {reason}"))
            .with_code(codes::UNRESOLVED_IMPORT);
        self.add(diagnostic);
    }

    pub fn missing_module(&mut self, range: TextRange, module: &str) {
        let diagnostic = self
            .at(Severity::Error, range, format!("module '{module}' is not loaded"))
            .with_code(codes::MISSING_MODULE);
        self.add(diagnostic);
    }

    pub fn redefinition(&mut self, redefinition: &Redefinition) {
        let name = match &redefinition.scope {
            Some(scope) => format!("{scope}.{}", redefinition.name),
            None => redefinition.name.to_string(),
        };
        let previous = self.line_index.line_col(redefinition.previous.start());
        let diagnostic = self
            .at(
                Severity::Warning,
                redefinition.current,
                format!("'{name}' is redefined; the earlier declaration is ignored"),
            )
            .with_code(codes::REDEFINITION)
            .with_related(RelatedInfo {
                file: self.file,
                line: previous.line,
                col: previous.col,
                message: Arc::from("previous declaration"),
            });
        self.add(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Diagnostics in source order.
    pub fn finish(mut self) -> Vec<Diagnostic> {
        self.diagnostics
            .sort_by_key(|d| (d.start_line, d.start_col, d.end_line, d.end_col));
        self.diagnostics
    }
}

// ============================================================================
// DOCUMENT CHECKS
// ============================================================================

/// What a document check looks at.
#[derive(Clone, Copy, Debug)]
pub struct DocumentFacts<'a> {
    pub syntax_errors: &'a [SyntaxError],
    pub imports: &'a [ImportStatement],
    pub scope: &'a LocalScope,
    /// Redefinitions from the document's own declaration table.
    pub redefinitions: &'a [Redefinition],
}

/// Check one document against a registry snapshot.
pub fn check_document(
    file: FileId,
    line_index: &LineIndex,
    facts: DocumentFacts<'_>,
    snapshot: &RegistrySnapshot,
) -> Vec<Diagnostic> {
    let mut collector = DiagnosticCollector::new(file, line_index);

    for error in facts.syntax_errors {
        collector.syntax_error(error);
    }

    // One missing-module error per statement, however many names it imports.
    let mut reported = FxHashSet::default();
    for binding in facts.scope.import_bindings() {
        match &binding.target {
            BindingTarget::Unresolved(Unresolved::MissingModule { module }) => {
                if reported.insert(binding.module_range) {
                    collector.missing_module(binding.module_range, module.as_str());
                }
            }
            BindingTarget::Unresolved(reason) => collector.unresolved_import(binding.range, reason),
            BindingTarget::Symbol(_) | BindingTarget::Module(_) => {}
        }
    }

    // Star imports from missing modules bind nothing, so they have no binding
    // to carry the error.
    for stmt in facts.imports {
        if let ImportStatement::FromStar { module, module_range, .. } = stmt {
            if !snapshot.has_module(module) && reported.insert(*module_range) {
                collector.missing_module(*module_range, module.as_str());
            }
        }
    }

    for redefinition in facts.redefinitions {
        collector.redefinition(redefinition);
    }

    collector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::ids::ModuleName;
    use crate::hir::lower::lower_module;
    use crate::hir::registry::ModuleRegistry;
    use crate::hir::table::DeclarationTable;
    use crate::syntax;

    fn check(registry: &ModuleRegistry, text: &str) -> Vec<Diagnostic> {
        let module = ModuleName::new("usage");
        let parse = syntax::parse(text);
        let lowered = lower_module(&module, false, &parse.file);
        let snapshot = registry.snapshot();
        let scope = LocalScope::build(
            module.clone(),
            &lowered.imports,
            &lowered.assignments,
            &snapshot,
        );
        let table = DeclarationTable::build(module, &lowered.declarations).ok();
        let line_index = LineIndex::new(text);
        check_document(
            FileId::new(0),
            &line_index,
            DocumentFacts {
                syntax_errors: &parse.errors,
                imports: &lowered.imports,
                scope: &scope,
                redefinitions: table.as_ref().map_or(&[][..], |t| t.redefinitions()),
            },
            &snapshot,
        )
    }

    fn registry() -> ModuleRegistry {
        let registry = ModuleRegistry::new();
        let module = ModuleName::new("types_stub");
        let parse = syntax::parse("MY_CONSTANT: int\n");
        let lowered = lower_module(&module, false, &parse.file);
        registry.publish(DeclarationTable::build(module, &lowered.declarations).unwrap());
        registry
    }

    #[test]
    fn test_diagnostic_with_code() {
        let diag = Diagnostic::error(FileId::new(0), 3, 1, "test").with_code(codes::MISSING_MODULE);
        assert_eq!(diag.code.as_deref(), Some("E0008"));
        assert_eq!((diag.start_line, diag.start_col), (3, 1));
    }

    #[test]
    fn test_severity_to_lsp() {
        assert_eq!(Severity::Error.to_lsp(), 1);
        assert_eq!(Severity::Warning.to_lsp(), 2);
        assert_eq!(Severity::Info.to_lsp(), 3);
        assert_eq!(Severity::Hint.to_lsp(), 4);
    }

    #[test]
    fn test_unresolved_import_name() {
        let diagnostics = check(&registry(), "from types_stub import MY_CONSTANT, Missing\n");

        assert_eq!(diagnostics.len(), 1);
        let diag = &diagnostics[0];
        assert_eq!(diag.code.as_deref(), Some(codes::UNRESOLVED_IMPORT));
        assert_eq!((diag.start_line, diag.start_col), (0, 36));
        assert_eq!((diag.end_line, diag.end_col), (0, 43));
        assert!(diag.message.contains("Missing"));
    }

    #[test]
    fn test_missing_module_reported_once_per_statement() {
        let diagnostics = check(
            &registry(),
            "from nowhere import a, b\nimport elsewhere\nfrom gone import *\n",
        );

        let codes: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.start_line, d.code.as_deref()))
            .collect();
        assert_eq!(
            codes,
            vec![
                (0, Some(codes::MISSING_MODULE)),
                (1, Some(codes::MISSING_MODULE)),
                (2, Some(codes::MISSING_MODULE)),
            ]
        );
        assert_eq!(diagnostics[0].start_col, 5);
    }

    #[test]
    fn test_redefinition_warning() {
        let diagnostics = check(&registry(), "LIMIT = 1\nLIMIT = 2\n");

        assert_eq!(diagnostics.len(), 1);
        let diag = &diagnostics[0];
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.code.as_deref(), Some(codes::REDEFINITION));
        assert_eq!(diag.start_line, 1);
        assert_eq!(diag.related[0].line, 0);
    }

    #[test]
    fn test_clean_document_has_no_diagnostics() {
        let diagnostics = check(
            &registry(),
            "from types_stub import MY_CONSTANT\nvalue = MY_CONSTANT\n",
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_collector_counts() {
        let line_index = LineIndex::new("x\n");
        let mut collector = DiagnosticCollector::new(FileId::new(0), &line_index);
        collector.add(Diagnostic::error(FileId::new(0), 0, 0, "error"));
        collector.add(Diagnostic::warning(FileId::new(0), 0, 0, "warning"));

        assert_eq!(collector.error_count(), 1);
        assert_eq!(collector.warning_count(), 1);
        assert!(collector.has_errors());
        assert_eq!(collector.diagnostics().len(), 2);
    }
}
