//! AnalysisHost and Analysis: state management for type queries.
//!
//! The `AnalysisHost` owns all mutable state: file texts, per-file documents
//! and the module registry. `analysis()` hands out an owned, immutable
//! `Analysis` snapshot that can be queried from any thread while the host
//! keeps applying changes.
//!
//! ## Usage
//!
//! ```ignore
//! let mut host = AnalysisHost::new();
//! host.set_file_content("types_stub.pyi", stub_text)?;
//! let usage = host.set_file_content("usage.py", usage_text)?;
//!
//! let analysis = host.analysis();
//! let response = analysis.provide_type(usage, &[LineCol::new(1, 0)]);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::base::{FileId, FileSet, LineCol, TextSize};
use crate::hir::{
    BuildError, Diagnostic, DocumentFacts, ModuleName, ModuleRegistry, RegistrySnapshot,
    check_document,
};

use super::document::{Document, Prepared};
use super::inlay_hints::{InlayHint, inlay_hints};
use super::provide_type::{self, CacheInvalidated, Cancelled, ProvideTypeResponse, TypeDescriptor};

/// Module name for files that live outside every search root and have no
/// usable file stem.
const FALLBACK_MODULE: &str = "__main__";

/// Owns all mutable state for type queries.
///
/// Apply changes via `set_file_content()`, `load_modules()` and
/// `remove_file()`, then get a consistent snapshot via `analysis()`.
#[derive(Debug)]
pub struct AnalysisHost {
    files: FileSet,
    registry: Arc<ModuleRegistry>,
    documents: IndexMap<FileId, Arc<Document>>,
    search_roots: Vec<PathBuf>,
    /// Files whose results changed because a module they import changed.
    invalidated: IndexSet<FileId>,
}

impl Default for AnalysisHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisHost {
    /// A host with a fresh registry holding only builtins.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ModuleRegistry::new()))
    }

    pub fn with_registry(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            files: FileSet::new(),
            registry,
            documents: IndexMap::new(),
            search_roots: Vec::new(),
            invalidated: IndexSet::new(),
        }
    }

    /// Module names are derived from paths relative to the first search root
    /// that contains the file.
    pub fn add_search_root(&mut self, root: impl Into<PathBuf>) {
        self.search_roots.push(root.into());
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn file_id(&self, path: &Path) -> Option<FileId> {
        self.files.lookup(path)
    }

    pub fn file_path(&self, file: FileId) -> Option<PathBuf> {
        self.files.path(file)
    }

    pub fn file_count(&self) -> usize {
        self.documents.len()
    }

    /// The module a path maps to, and whether it is a package `__init__`.
    pub fn module_for(&self, path: &Path) -> (ModuleName, bool) {
        self.search_roots
            .iter()
            .filter_map(|root| path.strip_prefix(root).ok())
            .find_map(ModuleName::from_relative_path)
            .or_else(|| {
                let name = path.file_name()?;
                ModuleName::from_relative_path(Path::new(name))
            })
            .unwrap_or_else(|| (ModuleName::new(FALLBACK_MODULE), false))
    }

    /// Set the content of a file, rebuilding and publishing its module.
    ///
    /// On a build failure the module's table is withdrawn and the error
    /// returned; the document itself stays queryable.
    pub fn set_file_content(
        &mut self,
        path: impl AsRef<Path>,
        text: &str,
    ) -> Result<FileId, BuildError> {
        let path = path.as_ref();
        let file = self.files.file_id(path);
        let text: Arc<str> = Arc::from(text);

        if !self.files.set_contents(file, Arc::clone(&text)) {
            if let Some(document) = self.documents.get(&file) {
                trace!(path = %path.display(), "content unchanged");
                return match &document.build_error {
                    Some(err) => Err(err.clone()),
                    None => Ok(file),
                };
            }
        }

        let (module, is_package) = self.module_for(path);
        let prepared = Document::prepare(file, path, module, is_package, text);
        match self.install(vec![prepared]).pop() {
            Some(result) => result,
            None => Ok(file),
        }
    }

    /// Load many files at once. Tables are built in parallel and published
    /// as a single registry update.
    pub fn load_modules(
        &mut self,
        files: Vec<(PathBuf, String)>,
    ) -> Vec<(PathBuf, Result<FileId, BuildError>)> {
        let inputs: Vec<_> = files
            .into_iter()
            .map(|(path, text)| {
                let file = self.files.file_id(&path);
                let text: Arc<str> = Arc::from(text);
                self.files.set_contents(file, Arc::clone(&text));
                let (module, is_package) = self.module_for(&path);
                (file, path, module, is_package, text)
            })
            .collect();

        let prepared: Vec<Prepared> = inputs
            .into_par_iter()
            .map(|(file, path, module, is_package, text)| {
                Document::prepare(file, &path, module, is_package, text)
            })
            .collect();
        info!(files = prepared.len(), "prepared module batch");

        let paths: Vec<PathBuf> = prepared.iter().map(|p| p.document.path.clone()).collect();
        let results = self.install(prepared);
        paths.into_iter().zip(results).collect()
    }

    /// Forget a file and withdraw its module. Returns whether it was known.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Some(file) = self.files.lookup(path) else {
            return false;
        };
        self.files.remove(file);
        self.invalidated.shift_remove(&file);

        if let Some(document) = self.documents.shift_remove(&file) {
            debug!(path = %path.display(), module = %document.module, "removing file");
            let changed = self.republish(std::slice::from_ref(&document.module));
            self.rebind(&changed, &IndexSet::new());
        }
        true
    }

    /// Drain the files whose query results may have changed since the last
    /// call.
    pub fn take_invalidated(&mut self) -> CacheInvalidated {
        let invalidated_files = std::mem::take(&mut self.invalidated)
            .into_iter()
            .filter_map(|file| self.files.path(file))
            .collect();
        CacheInvalidated { invalidated_files }
    }

    /// Get a consistent snapshot for querying.
    pub fn analysis(&self) -> Analysis {
        Analysis {
            snapshot: self.registry.snapshot(),
            documents: Arc::new(self.documents.clone()),
        }
    }

    fn install(&mut self, batch: Vec<Prepared>) -> Vec<Result<FileId, BuildError>> {
        let mut modules = IndexSet::new();
        let mut batch_files = IndexSet::new();
        let mut results = Vec::with_capacity(batch.len());

        for Prepared { document, table } in batch {
            if let Err(err) = &table {
                warn!(
                    path = %document.path.display(),
                    error = %err,
                    "declaration table failed to build"
                );
            }
            results.push(table.map(|_| document.file));
            modules.insert(document.module.clone());
            batch_files.insert(document.file);
            self.documents.insert(document.file, Arc::new(document));
        }

        let modules: Vec<_> = modules.into_iter().collect();
        let changed = self.republish(&modules);

        let snapshot = self.registry.snapshot();
        for file in &batch_files {
            if let Some(document) = self.documents.get_mut(file) {
                *document = Arc::new(document.rebound(&snapshot));
            }
        }
        self.rebind(&changed, &batch_files);
        results
    }

    /// The document whose table represents `module`. Stubs win over sources;
    /// among equals the first loaded wins.
    fn owner(&self, module: &ModuleName) -> Option<&Arc<Document>> {
        let mut candidates = self.documents.values().filter(|d| &d.module == module);
        let first = candidates.next()?;
        if first.is_stub() {
            return Some(first);
        }
        candidates.find(|d| d.is_stub()).or(Some(first))
    }

    /// Publish the owning table of each module, or withdraw modules with no
    /// buildable owner. Returns the modules touched.
    fn republish(&self, modules: &[ModuleName]) -> Vec<ModuleName> {
        let mut tables = Vec::new();
        let mut withdrawn = Vec::new();
        for module in modules {
            match self.owner(module).and_then(|d| d.table.clone()) {
                Some(table) => tables.push(table),
                None => withdrawn.push(module.clone()),
            }
        }
        let generation = self.registry.update(tables, &withdrawn);
        debug!(generation, modules = modules.len(), "republished modules");
        modules.to_vec()
    }

    /// Rebind every document (outside `skip`) that depends on a changed module.
    fn rebind(&mut self, changed: &[ModuleName], skip: &IndexSet<FileId>) {
        if changed.is_empty() {
            return;
        }
        let snapshot = self.registry.snapshot();
        for (file, document) in self.documents.iter_mut() {
            if skip.contains(file) {
                continue;
            }
            let affected = changed
                .iter()
                .any(|m| document.scope.depends_on(m) || &document.module == m);
            if affected {
                trace!(path = %document.path.display(), "rebinding dependent document");
                *document = Arc::new(document.rebound(&snapshot));
                self.invalidated.insert(*file);
            }
        }
    }
}

/// An immutable snapshot of the analysis state.
///
/// Owns everything it reads, so it is `Send + Sync` and unaffected by later
/// changes to the host.
#[derive(Clone, Debug)]
pub struct Analysis {
    snapshot: Arc<RegistrySnapshot>,
    documents: Arc<IndexMap<FileId, Arc<Document>>>,
}

impl Analysis {
    /// The registry generation this snapshot was taken at.
    pub fn generation(&self) -> u64 {
        self.snapshot.generation()
    }

    pub fn registry(&self) -> &RegistrySnapshot {
        &self.snapshot
    }

    pub fn file_id(&self, path: &Path) -> Option<FileId> {
        self.documents
            .values()
            .find(|d| d.path == path)
            .map(|d| d.file)
    }

    pub fn module_name(&self, file: FileId) -> Option<&ModuleName> {
        self.documents.get(&file).map(|d| &d.module)
    }

    pub fn text(&self, file: FileId) -> Option<&str> {
        self.documents.get(&file).map(|d| &*d.text)
    }

    /// The type at a byte offset.
    pub fn type_at(&self, file: FileId, offset: TextSize) -> TypeDescriptor {
        match self.documents.get(&file) {
            Some(document) => provide_type::type_at(document, &self.snapshot, offset),
            None => TypeDescriptor::no_node(),
        }
    }

    /// The type at a line/column position.
    pub fn type_at_position(&self, file: FileId, position: LineCol) -> TypeDescriptor {
        let Some(document) = self.documents.get(&file) else {
            return TypeDescriptor::no_node();
        };
        match document.line_index.offset(position) {
            Some(offset) => provide_type::type_at(document, &self.snapshot, offset),
            None => TypeDescriptor::no_node(),
        }
    }

    /// Answer a batch of positions. `None` when the file is not tracked.
    pub fn provide_type(&self, file: FileId, positions: &[LineCol]) -> Option<ProvideTypeResponse> {
        self.provide_type_cancellable(file, positions, &CancellationToken::new())
            .ok()
            .flatten()
    }

    /// Like [`Analysis::provide_type`], checking `token` between positions.
    pub fn provide_type_cancellable(
        &self,
        file: FileId,
        positions: &[LineCol],
        token: &CancellationToken,
    ) -> Result<Option<ProvideTypeResponse>, Cancelled> {
        let Some(document) = self.documents.get(&file) else {
            info!(%file, "type query for untracked file");
            return Ok(None);
        };

        let mut contents = Vec::with_capacity(positions.len());
        for &position in positions {
            if token.is_cancelled() {
                debug!(%file, answered = contents.len(), "type query cancelled");
                return Err(Cancelled { file });
            }
            let descriptor = match document.line_index.offset(position) {
                Some(offset) => provide_type::type_at(document, &self.snapshot, offset),
                None => TypeDescriptor::no_node(),
            };
            contents.push(descriptor);
        }
        Ok(Some(ProvideTypeResponse { contents }))
    }

    /// Import, syntax and redefinition problems in a file.
    pub fn diagnostics(&self, file: FileId) -> Vec<Diagnostic> {
        let Some(document) = self.documents.get(&file) else {
            return Vec::new();
        };
        let redefinitions = document
            .table
            .as_ref()
            .map_or(&[][..], |table| table.redefinitions());
        check_document(
            file,
            &document.line_index,
            DocumentFacts {
                syntax_errors: &document.parse.errors,
                imports: &document.lowered.imports,
                scope: &document.scope,
                redefinitions,
            },
            &self.snapshot,
        )
    }

    /// Type hints after module-level assignment targets.
    pub fn inlay_hints(&self, file: FileId) -> Vec<InlayHint> {
        match self.documents.get(&file) {
            Some(document) => inlay_hints(document, &self.snapshot),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ide::TypeKind;

    const STUB: &str = "\
class MyClass:
    def __init__(self, x: int) -> None: ...
    def get_value(self) -> bool: ...

MY_CONSTANT: int
";

    const USAGE: &str = "\
from types_stub import MyClass, MY_CONSTANT
instance = MyClass(42)
value = MY_CONSTANT
";

    fn host() -> (AnalysisHost, FileId) {
        let mut host = AnalysisHost::new();
        host.set_file_content("/project/types_stub.pyi", STUB).unwrap();
        let usage = host.set_file_content("/project/usage.py", USAGE).unwrap();
        (host, usage)
    }

    #[test]
    fn test_analysis_host_basic() {
        let (host, usage) = host();
        let analysis = host.analysis();

        assert_eq!(analysis.file_id(Path::new("/project/usage.py")), Some(usage));
        assert_eq!(analysis.module_name(usage).map(ModuleName::as_str), Some("usage"));

        let descriptor = analysis.type_at_position(usage, LineCol::new(1, 0));
        assert_eq!(descriptor.kind, Some(TypeKind::Instance));
        assert_eq!(descriptor.display_name, "MyClass");
    }

    #[test]
    fn test_module_for_uses_search_roots() {
        let mut host = AnalysisHost::new();
        host.add_search_root("/stubs");

        assert_eq!(
            host.module_for(Path::new("/stubs/pkg/sub.pyi")),
            (ModuleName::new("pkg.sub"), false)
        );
        assert_eq!(
            host.module_for(Path::new("/stubs/pkg/__init__.pyi")),
            (ModuleName::new("pkg"), true)
        );
        assert_eq!(
            host.module_for(Path::new("/elsewhere/usage.py")),
            (ModuleName::new("usage"), false)
        );
    }

    #[test]
    fn test_stub_takes_precedence_over_source() {
        let mut host = AnalysisHost::new();
        host.set_file_content("/p/types_stub.pyi", "MY_CONSTANT: int\n").unwrap();
        host.set_file_content("/p/types_stub.py", "MY_CONSTANT = \"text\"\n").unwrap();
        let usage = host
            .set_file_content(
                "/p/usage.py",
                "from types_stub import MY_CONSTANT\nx = MY_CONSTANT\n",
            )
            .unwrap();

        let descriptor = host.analysis().type_at_position(usage, LineCol::new(1, 0));
        assert_eq!(descriptor.display_name, "int");

        // Without the stub, the source module takes over.
        host.remove_file("/p/types_stub.pyi");
        let descriptor = host.analysis().type_at_position(usage, LineCol::new(1, 0));
        assert_eq!(descriptor.display_name, "str");
    }

    #[test]
    fn test_build_failure_withdraws_module() {
        let (mut host, usage) = host();
        let err = host
            .set_file_content("/project/types_stub.pyi", "class Broken(:\n    pass\n")
            .unwrap_err();
        assert_eq!(err.module().as_str(), "types_stub");

        let analysis = host.analysis();
        assert!(analysis.registry().get(&ModuleName::new("types_stub")).is_none());

        let descriptor = analysis.type_at_position(usage, LineCol::new(2, 0));
        assert!(descriptor.resolved);
        assert!(descriptor.is_unknown());
    }

    #[test]
    fn test_unchanged_content_is_a_no_op() {
        let (mut host, _) = host();
        let generation = host.analysis().generation();
        host.set_file_content("/project/types_stub.pyi", STUB).unwrap();
        assert_eq!(host.analysis().generation(), generation);
    }

    #[test]
    fn test_untracked_file() {
        let (host, _) = host();
        let analysis = host.analysis();
        let missing = FileId::new(999);

        assert!(analysis.provide_type(missing, &[LineCol::new(0, 0)]).is_none());
        assert!(!analysis.type_at(missing, TextSize::from(0)).resolved);
        assert!(analysis.diagnostics(missing).is_empty());
    }

    #[test]
    fn test_cancelled_batch() {
        let (host, usage) = host();
        let token = CancellationToken::new();
        token.cancel();

        let result = host
            .analysis()
            .provide_type_cancellable(usage, &[LineCol::new(1, 0)], &token);
        assert_eq!(result, Err(Cancelled { file: usage }));
    }

    #[test]
    fn test_return_annotation_names_imported_class() {
        let mut host = AnalysisHost::new();
        host.set_file_content(
            "/p/base_mod.pyi",
            "class Widget:\n    def size(self) -> int: ...\n",
        )
        .unwrap();
        host.set_file_content(
            "/p/factory.pyi",
            "from base_mod import Widget\ndef make() -> Widget: ...\n",
        )
        .unwrap();
        let usage = host
            .set_file_content(
                "/p/usage.py",
                "from factory import make\nw = make()\nn = w.size()\n",
            )
            .unwrap();
        let analysis = host.analysis();

        let descriptor = analysis.type_at_position(usage, LineCol::new(1, 0));
        assert_eq!(descriptor.kind, Some(TypeKind::Instance));
        assert_eq!(descriptor.display_name, "Widget");
        assert_eq!(descriptor.origin_module.as_deref(), Some("base_mod"));

        let descriptor = analysis.type_at_position(usage, LineCol::new(2, 0));
        assert_eq!(descriptor.display_name, "int");
    }

    #[test]
    fn test_annotated_assignment_in_usage() {
        let (mut host, _) = host();
        let usage = host
            .set_file_content(
                "/project/annotated.py",
                "from types_stub import MyClass\nx: MyClass = MyClass(1)\nok = x.get_value()\n",
            )
            .unwrap();
        let analysis = host.analysis();

        let descriptor = analysis.type_at_position(usage, LineCol::new(1, 0));
        assert_eq!(descriptor.kind, Some(TypeKind::Instance));
        assert_eq!(descriptor.display_name, "MyClass");
        let descriptor = analysis.type_at_position(usage, LineCol::new(2, 0));
        assert_eq!(descriptor.display_name, "bool");
    }

    #[test]
    fn test_huge_column_clamps_to_line_end() {
        let (host, usage) = host();
        let analysis = host.analysis();

        let line_end = analysis.type_at_position(usage, LineCol::new(2, 19));
        assert_eq!(analysis.type_at_position(usage, LineCol::new(2, u32::MAX)), line_end);

        let response = analysis
            .provide_type(usage, &[LineCol::new(1, u32::MAX), LineCol::new(u32::MAX, 0)])
            .unwrap();
        assert_eq!(response.contents.len(), 2);
        assert!(!response.contents[1].resolved);
    }

    #[test]
    fn test_analysis_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Analysis>();
    }
}
