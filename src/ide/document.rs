//! Per-file analysis state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::base::{FileId, LineIndex, SourceKind};
use crate::hir::{
    BuildError, DeclarationTable, LocalScope, LoweredModule, ModuleName, RegistrySnapshot,
    lower_module,
};
use crate::syntax::{self, Parse};

/// Everything the host knows about one file, for one version of its text.
///
/// Cheap to clone; rebuilding the scope after an imported module changes
/// produces a new `Document` sharing everything else.
#[derive(Clone, Debug)]
pub(crate) struct Document {
    pub file: FileId,
    pub path: PathBuf,
    pub module: ModuleName,
    pub kind: SourceKind,
    pub text: Arc<str>,
    pub line_index: Arc<LineIndex>,
    pub parse: Arc<Parse>,
    pub lowered: Arc<LoweredModule>,
    pub scope: Arc<LocalScope>,
    /// The document's own table, kept even when another file owns the module.
    pub table: Option<Arc<DeclarationTable>>,
    pub build_error: Option<BuildError>,
}

/// A document before it has been bound against a registry snapshot.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub document: Document,
    pub table: Result<Arc<DeclarationTable>, BuildError>,
}

impl Document {
    /// Parse, lower and build. Touches no shared state, so many files can be
    /// prepared in parallel.
    pub fn prepare(
        file: FileId,
        path: &Path,
        module: ModuleName,
        is_package: bool,
        text: Arc<str>,
    ) -> Prepared {
        let parse = syntax::parse(&text);
        let lowered = lower_module(&module, is_package, &parse.file);
        let table = DeclarationTable::build_with_imports(
            module.clone(),
            &lowered.declarations,
            &lowered.imports,
        )
        .map(Arc::new);

        let document = Document {
            file,
            path: path.to_path_buf(),
            module: module.clone(),
            kind: SourceKind::of(path),
            line_index: Arc::new(LineIndex::new(&text)),
            text,
            parse: Arc::new(parse),
            lowered: Arc::new(lowered),
            scope: Arc::new(LocalScope::empty(module)),
            table: table.as_ref().ok().cloned(),
            build_error: table.as_ref().err().cloned(),
        };
        Prepared { document, table }
    }

    /// Bind the document's imports against `snapshot`.
    pub fn bind(&mut self, snapshot: &RegistrySnapshot) {
        self.scope = Arc::new(LocalScope::build(
            self.module.clone(),
            &self.lowered.imports,
            &self.lowered.assignments,
            snapshot,
        ));
    }

    pub fn rebound(&self, snapshot: &RegistrySnapshot) -> Self {
        let mut document = self.clone();
        document.bind(snapshot);
        document
    }

    pub fn is_stub(&self) -> bool {
        self.kind == SourceKind::Stub
    }
}
